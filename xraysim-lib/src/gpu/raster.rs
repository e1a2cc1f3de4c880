use nalgebra::{Matrix4, Point3};

use crate::detector::Projection;
use crate::mesh::PolygonMesh;
use crate::units::CM;

/// Counters from one mesh draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RasterStats {
    pub triangles: usize,
    /// Triangles with a vertex behind a cone-beam source.
    pub rejected: usize,
    pub fragments: usize,
}

/// One covered pixel of one triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    /// Distance along the pixel ray, internal units.
    pub depth: f64,
    /// Signed path length (cm), facing sign and count.
    pub value: [f32; 3],
}

type Point2 = [f64; 2];

fn edge_raw(a: Point2, b: Point2, p: Point2) -> f64 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Edge function of the directed edge `a -> b`, evaluated with the
/// endpoints in a fixed order so the two triangles sharing an edge get
/// exactly opposite values.
fn edge(a: Point2, b: Point2, p: Point2) -> f64 {
    if (a[0], a[1]) <= (b[0], b[1]) {
        edge_raw(a, b, p)
    } else {
        -edge_raw(b, a, p)
    }
}

/// Whether a pixel centre lying exactly on the directed edge belongs to
/// the triangle on its left. Opposite directions give opposite answers.
fn owns_boundary(a: Point2, b: Point2) -> bool {
    let dy = b[1] - a[1];
    dy > 0.0 || (dy == 0.0 && b[0] - a[0] < 0.0)
}

fn covers(edges: &[(Point2, Point2); 3], p: Point2) -> bool {
    edges.iter().all(|&(a, b)| {
        let e = edge(a, b, p);
        e > 0.0 || (e == 0.0 && owns_boundary(a, b))
    })
}

/// Rasterize every triangle of `mesh`, placed by `modelview`, onto the
/// detector pixels.
///
/// For every covered pixel centre the ray through it is intersected with
/// the triangle plane and a fragment with value `[sign * t / CM, sign, 1]`
/// is emitted, where `sign` is -1 for a surface facing the ray and +1
/// otherwise.
/// Summing these over a closed mesh yields the path length in cm in the
/// first channel.
pub fn rasterize(
    mesh: &PolygonMesh,
    modelview: &Matrix4<f64>,
    projection: &Projection,
    mut emit: impl FnMut(Fragment),
) -> RasterStats {
    let world: Vec<Point3<f64>> = mesh
        .vertices()
        .iter()
        .map(|v| modelview.transform_point(v))
        .collect();
    let screen: Vec<Option<Point2>> = world.iter().map(|p| projection.project(p)).collect();
    let [width, height] = projection.pixels;
    let mut stats = RasterStats {
        triangles: mesh.triangle_count(),
        ..RasterStats::default()
    };
    if width == 0 || height == 0 {
        return stats;
    }

    for tri in mesh.triangles() {
        let [i0, i1, i2] = tri.map(|i| i as usize);
        let (Some(a), Some(b), Some(c)) = (screen[i0], screen[i1], screen[i2]) else {
            stats.rejected += 1;
            continue;
        };
        let area = edge_raw(a, b, c);
        if area == 0.0 || !area.is_finite() {
            continue;
        }
        let edges = if area > 0.0 {
            [(a, b), (b, c), (c, a)]
        } else {
            [(a, c), (c, b), (b, a)]
        };

        let min_x = a[0].min(b[0]).min(c[0]).ceil().max(0.0);
        let max_x = a[0].max(b[0]).max(c[0]).floor().min(f64::from(width - 1));
        let min_y = a[1].min(b[1]).min(c[1]).ceil().max(0.0);
        let max_y = a[1].max(b[1]).max(c[1]).floor().min(f64::from(height - 1));
        if min_x > max_x || min_y > max_y {
            continue;
        }

        let p0 = world[i0];
        let normal = (world[i1] - p0).cross(&(world[i2] - p0));
        for y in min_y as u32..=max_y as u32 {
            for x in min_x as u32..=max_x as u32 {
                let (fx, fy) = (f64::from(x), f64::from(y));
                if !covers(&edges, [fx, fy]) {
                    continue;
                }
                let (origin, direction) = projection.ray(fx, fy);
                let denom = normal.dot(&direction);
                if denom == 0.0 {
                    continue;
                }
                let t = normal.dot(&(p0 - origin)) / denom;
                let sign = denom.signum();
                emit(Fragment {
                    x,
                    y,
                    depth: t,
                    value: [(sign * t / CM) as f32, sign as f32, 1.0],
                });
                stats.fragments += 1;
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::XRayDetector;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn parallel_projection(pixels: u32, pixel_size: f64) -> Projection {
        let mut detector = XRayDetector::new();
        detector.set_detector_position(Point3::new(0.0, 0.0, 100.0));
        detector.set_up_vector(Vector3::y());
        detector.set_parallel_beam(Point3::new(0.0, 0.0, -100.0));
        detector.set_number_of_pixels(pixels, pixels);
        detector.set_pixel_size(pixel_size, pixel_size);
        detector.projection(0).unwrap()
    }

    fn accumulate(mesh: &PolygonMesh, projection: &Projection) -> (Vec<[f32; 3]>, RasterStats) {
        let [w, h] = projection.pixels;
        let mut buffer = vec![[0.0_f32; 3]; (w * h) as usize];
        let stats = rasterize(mesh, &Matrix4::identity(), projection, |f| {
            let px = &mut buffer[(f.y * w + f.x) as usize];
            for (acc, v) in px.iter_mut().zip(f.value) {
                *acc += v;
            }
        });
        (buffer, stats)
    }

    #[test]
    fn test_cube_chord_under_parallel_beam() {
        // 20 mm cube, 8 x 8 detector of 5 mm pixels: the middle 4 x 4
        // pixels see 2 cm of material.
        let projection = parallel_projection(8, 5.0);
        let (buffer, stats) = accumulate(&PolygonMesh::cube(20.0), &projection);
        assert_eq!(stats.rejected, 0);
        for y in 0..8 {
            for x in 0..8 {
                let [l, crossings, hits] = buffer[y * 8 + x];
                let inside = (2..6).contains(&x) && (2..6).contains(&y);
                if inside {
                    assert_relative_eq!(l, 2.0, epsilon = 1e-5);
                    assert_eq!(crossings, 0.0);
                    assert_eq!(hits, 2.0);
                } else {
                    assert_eq!(hits, 0.0, "pixel ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_shared_edges_are_covered_once() {
        // Pixel centres fall exactly on the cube face diagonals.
        let projection = parallel_projection(9, 5.0);
        let (buffer, _) = accumulate(&PolygonMesh::cube(20.0), &projection);
        for px in &buffer {
            assert!(px[2] == 0.0 || px[2] == 2.0, "{px:?}");
            assert!(px[0].abs() < 1e-5 || (px[0] - 2.0).abs() < 1e-5, "{px:?}");
        }
        // The centre pixel is on both diagonals of the front and back faces.
        assert_relative_eq!(buffer[4 * 9 + 4][0], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_vertices_behind_cone_source_are_rejected() {
        let mut detector = XRayDetector::new();
        detector.set_detector_position(Point3::new(0.0, 0.0, 100.0));
        detector.set_point_source(Point3::new(0.0, 0.0, 0.0));
        detector.set_number_of_pixels(4, 4);
        let projection = detector.projection(0).unwrap();
        let (_, stats) = accumulate(&PolygonMesh::cube(20.0), &projection);
        assert!(stats.rejected > 0);
    }
}
