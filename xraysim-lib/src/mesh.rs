use std::f64::consts::PI;

use nalgebra::{Matrix4, Point3, Vector3};

use crate::error::{Result, XraySimError};

const RAY_EPSILON: f64 = 1.0e-12;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub fn empty() -> Self {
        BoundingBox {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Length of the diagonal, zero when empty.
    pub fn diagonal(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            (self.max - self.min).norm()
        }
    }

    /// Bounding box of the eight transformed corners.
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> BoundingBox {
        let mut out = BoundingBox::empty();
        if self.is_empty() {
            return out;
        }
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.extend(&matrix.transform_point(&corner));
        }
        out
    }
}

/// One crossing of a ray with a mesh surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Distance along the ray.
    pub t: f64,
    /// +1 when the ray leaves the surface (normal along the ray), -1 when it enters.
    pub sign: f64,
}

/// A closed triangle mesh with counter-clockwise, outward-facing winding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonMesh {
    vertices: Vec<Point3<f64>>,
    triangles: Vec<[u32; 3]>,
}

impl PolygonMesh {
    pub fn new(vertices: Vec<Point3<f64>>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        let n = vertices.len();
        if let Some(bad) = triangles
            .iter()
            .find(|tri| tri.iter().any(|&i| i as usize >= n))
        {
            return Err(XraySimError::DataError(format!(
                "triangle {bad:?} indexes past {n} vertices"
            )));
        }
        Ok(PolygonMesh {
            vertices,
            triangles,
        })
    }

    /// Axis-aligned box centred on the origin.
    pub fn cuboid(size_x: f64, size_y: f64, size_z: f64) -> Self {
        let (hx, hy, hz) = (size_x / 2.0, size_y / 2.0, size_z / 2.0);
        let vertices = vec![
            Point3::new(-hx, -hy, -hz),
            Point3::new(hx, -hy, -hz),
            Point3::new(hx, hy, -hz),
            Point3::new(-hx, hy, -hz),
            Point3::new(-hx, -hy, hz),
            Point3::new(hx, -hy, hz),
            Point3::new(hx, hy, hz),
            Point3::new(-hx, hy, hz),
        ];
        let triangles = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        PolygonMesh {
            vertices,
            triangles,
        }
    }

    pub fn cube(size: f64) -> Self {
        Self::cuboid(size, size, size)
    }

    /// UV sphere centred on the origin.
    pub fn sphere(radius: f64, stacks: u32, slices: u32) -> Self {
        let stacks = stacks.max(2);
        let slices = slices.max(3);
        let mut vertices = vec![Point3::new(0.0, 0.0, radius)];
        for i in 1..stacks {
            let theta = PI * f64::from(i) / f64::from(stacks);
            for j in 0..slices {
                let phi = 2.0 * PI * f64::from(j) / f64::from(slices);
                vertices.push(Point3::new(
                    radius * theta.sin() * phi.cos(),
                    radius * theta.sin() * phi.sin(),
                    radius * theta.cos(),
                ));
            }
        }
        let south = vertices.len() as u32;
        vertices.push(Point3::new(0.0, 0.0, -radius));

        let ring = |i: u32, j: u32| 1 + i * slices + j % slices;
        let mut triangles = Vec::new();
        for j in 0..slices {
            triangles.push([0, ring(0, j), ring(0, j + 1)]);
        }
        for i in 0..stacks - 2 {
            for j in 0..slices {
                let (a, b) = (ring(i, j), ring(i, j + 1));
                let (c, d) = (ring(i + 1, j), ring(i + 1, j + 1));
                triangles.push([a, c, d]);
                triangles.push([a, d, b]);
            }
        }
        for j in 0..slices {
            triangles.push([south, ring(stacks - 2, j + 1), ring(stacks - 2, j)]);
        }
        PolygonMesh {
            vertices,
            triangles,
        }
    }

    /// Capped cylinder along z, centred on the origin.
    pub fn cylinder(radius: f64, height: f64, slices: u32) -> Self {
        let slices = slices.max(3);
        let h = height / 2.0;
        let mut vertices = vec![Point3::new(0.0, 0.0, -h), Point3::new(0.0, 0.0, h)];
        for j in 0..slices {
            let phi = 2.0 * PI * f64::from(j) / f64::from(slices);
            let (x, y) = (radius * phi.cos(), radius * phi.sin());
            vertices.push(Point3::new(x, y, -h));
            vertices.push(Point3::new(x, y, h));
        }
        let bottom = |j: u32| 2 + 2 * (j % slices);
        let top = |j: u32| 3 + 2 * (j % slices);
        let mut triangles = Vec::new();
        for j in 0..slices {
            triangles.push([0, bottom(j + 1), bottom(j)]);
            triangles.push([1, top(j), top(j + 1)]);
            triangles.push([bottom(j), bottom(j + 1), top(j + 1)]);
            triangles.push([bottom(j), top(j + 1), top(j)]);
        }
        PolygonMesh {
            vertices,
            triangles,
        }
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle(&self, index: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for v in &self.vertices {
            bbox.extend(v);
        }
        bbox
    }

    pub fn transformed(&self, matrix: &Matrix4<f64>) -> PolygonMesh {
        PolygonMesh {
            vertices: self
                .vertices
                .iter()
                .map(|v| matrix.transform_point(v))
                .collect(),
            triangles: self.triangles.clone(),
        }
    }

    /// Flip every triangle so normals point the other way.
    pub fn invert_winding(&mut self) {
        for tri in &mut self.triangles {
            tri.swap(1, 2);
        }
    }

    /// Enclosed volume by the divergence theorem. Positive for outward winding.
    pub fn signed_volume(&self) -> f64 {
        (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.triangle(i);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }

    /// Every crossing of the ray with the surface, sorted by distance.
    ///
    /// Crossings closer than a relative tolerance with the same sign are
    /// merged, so a ray grazing a shared edge counts once.
    pub fn ray_intersections(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Vec<Intersection> {
        let mut hits: Vec<Intersection> = (0..self.triangles.len())
            .filter_map(|i| intersect_triangle(&self.triangle(i), origin, direction))
            .collect();
        hits.sort_by(|a, b| a.t.total_cmp(&b.t));

        let tolerance = 1.0e-9 * self.bounding_box().diagonal().max(1.0);
        hits.dedup_by(|next, kept| next.sign == kept.sign && (next.t - kept.t).abs() < tolerance);
        hits
    }
}

/// Möller-Trumbore, both faces. `t` may be negative.
fn intersect_triangle(
    [v0, v1, v2]: &[Point3<f64>; 3],
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
) -> Option<Intersection> {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let p = direction.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < RAY_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - v0;
    let u = s.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = direction.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&q) * inv_det;
    let normal = e1.cross(&e2);
    Some(Intersection {
        t,
        sign: normal.dot(direction).signum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_primitives_are_outward() {
        assert_relative_eq!(PolygonMesh::cube(2.0).signed_volume(), 8.0, max_relative = 1e-12);
        let sphere = PolygonMesh::sphere(1.0, 32, 64);
        let v = sphere.signed_volume();
        assert!(v > 0.0 && v < 4.0 / 3.0 * PI);
        assert_relative_eq!(v, 4.0 / 3.0 * PI, max_relative = 1e-2);
        let cylinder = PolygonMesh::cylinder(1.0, 2.0, 128);
        assert_relative_eq!(cylinder.signed_volume(), 2.0 * PI, max_relative = 1e-3);
    }

    #[test]
    fn test_ray_through_cube() {
        let cube = PolygonMesh::cube(10.0);
        let hits = cube.ray_intersections(&Point3::new(0.3, 0.2, -20.0), &Vector3::z());
        assert_eq!(hits.len(), 2);
        assert_relative_eq!(hits[0].t, 15.0, epsilon = 1e-12);
        assert_eq!(hits[0].sign, -1.0);
        assert_relative_eq!(hits[1].t, 25.0, epsilon = 1e-12);
        assert_eq!(hits[1].sign, 1.0);
    }

    #[test]
    fn test_ray_along_shared_diagonal_counts_once() {
        let cube = PolygonMesh::cube(10.0);
        // (0, 0) lies on the diagonal shared by the two triangles of each z face.
        let hits = cube.ray_intersections(&Point3::new(0.0, 0.0, -20.0), &Vector3::z());
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_transformed_bbox() {
        let cube = PolygonMesh::cube(2.0);
        let m = Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0));
        let bbox = cube.transformed(&m).bounding_box();
        assert_relative_eq!(bbox.min.x, 4.0);
        assert_relative_eq!(bbox.max.x, 6.0);
        assert_eq!(cube.bounding_box().transformed(&m), bbox);
        assert_relative_eq!(bbox.diagonal(), 12.0_f64.sqrt());
    }

    #[test]
    fn test_out_of_range_index() {
        let err = PolygonMesh::new(vec![Point3::origin()], vec![[0, 1, 0]]);
        assert!(matches!(err, Err(XraySimError::DataError(_))));
    }
}
