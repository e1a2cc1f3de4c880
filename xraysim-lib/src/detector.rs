use nalgebra::{Matrix4, Point3, Vector2, Vector3};

use crate::error::{Result, XraySimError};

/// Shape of the X-ray focal spot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceShape {
    Point,
    /// Parallel rays along the source-to-detector direction.
    Parallel,
    /// `samples x samples` grid of side `length` facing the detector.
    Square { length: f64, samples: u32 },
    /// `samples` points along `direction`.
    Line {
        direction: Vector3<f64>,
        length: f64,
        samples: u32,
    },
    /// `samples^3` grid of side `length`, axis aligned.
    Cube { length: f64, samples: u32 },
}

/// Per-sample projection onto the detector plane.
///
/// Fractional pixel coordinates put the centre of pixel `(i, j)` at
/// `(i, j)`. Row 0 is at the bottom, on the `-up` side of the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub source: Point3<f64>,
    pub centre: Point3<f64>,
    pub right: Vector3<f64>,
    pub up: Vector3<f64>,
    pub normal: Vector3<f64>,
    pub pixel_size: Vector2<f64>,
    pub pixels: [u32; 2],
    pub parallel: bool,
}

impl Projection {
    pub fn size(&self) -> Vector2<f64> {
        Vector2::new(
            self.pixel_size.x * f64::from(self.pixels[0]),
            self.pixel_size.y * f64::from(self.pixels[1]),
        )
    }

    /// World position of fractional pixel `(i, j)`.
    pub fn pixel_position(&self, i: f64, j: f64) -> Point3<f64> {
        let size = self.size();
        let u = -size.x / 2.0 + self.pixel_size.x * (i + 0.5);
        let v = -size.y / 2.0 + self.pixel_size.y * (j + 0.5);
        self.centre + self.right * u + self.up * v
    }

    /// Fractional pixel coordinates of a world point, or `None` when the
    /// point is not in front of a cone-beam source.
    pub fn project(&self, p: &Point3<f64>) -> Option<[f64; 2]> {
        let on_plane = if self.parallel {
            p - self.normal * (p - self.centre).dot(&self.normal)
        } else {
            let d = p - self.source;
            let along = d.dot(&self.normal);
            if along <= f64::EPSILON * d.norm().max(1.0) {
                return None;
            }
            self.source + d * ((self.centre - self.source).dot(&self.normal) / along)
        };
        let offset = on_plane - self.centre;
        let size = self.size();
        Some([
            (offset.dot(&self.right) + size.x / 2.0) / self.pixel_size.x - 0.5,
            (offset.dot(&self.up) + size.y / 2.0) / self.pixel_size.y - 0.5,
        ])
    }

    /// Ray through pixel `(i, j)`. Cone-beam rays start at the source and
    /// point at the pixel; parallel rays start at the pixel and point back
    /// towards the source.
    pub fn ray(&self, i: f64, j: f64) -> (Point3<f64>, Vector3<f64>) {
        let pixel = self.pixel_position(i, j);
        if self.parallel {
            (pixel, -self.normal)
        } else {
            (self.source, (pixel - self.source).normalize())
        }
    }
}

/// Detector geometry and the X-ray source sampling that goes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct XRayDetector {
    pixels: [u32; 2],
    pixel_size: Vector2<f64>,
    position: Point3<f64>,
    source_centre: Point3<f64>,
    up: Vector3<f64>,
    rotation: Matrix4<f64>,
    shape: SourceShape,
    source_positions: Vec<Point3<f64>>,
}

impl Default for XRayDetector {
    fn default() -> Self {
        XRayDetector {
            pixels: [0, 0],
            pixel_size: Vector2::new(1.0, 1.0),
            position: Point3::origin(),
            source_centre: Point3::origin(),
            up: Vector3::y(),
            rotation: Matrix4::identity(),
            shape: SourceShape::Point,
            source_positions: vec![Point3::origin()],
        }
    }
}

impl XRayDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_number_of_pixels(&mut self, width: u32, height: u32) {
        self.pixels = [width, height];
    }

    pub fn set_pixel_size(&mut self, width: f64, height: f64) {
        self.pixel_size = Vector2::new(width, height);
    }

    /// Set the pixel size from the total detector size.
    pub fn set_detector_size(&mut self, width: f64, height: f64) -> Result<()> {
        let [w, h] = self.pixels;
        if w == 0 || h == 0 {
            return Err(XraySimError::InvalidDetectorSize {
                width: w,
                height: h,
            });
        }
        self.pixel_size = Vector2::new(width / f64::from(w), height / f64::from(h));
        Ok(())
    }

    pub fn set_detector_position(&mut self, position: Point3<f64>) {
        self.position = position;
    }

    pub fn set_up_vector(&mut self, up: Vector3<f64>) {
        self.up = up.normalize();
    }

    pub fn set_rotation_matrix(&mut self, rotation: Matrix4<f64>) {
        self.rotation = rotation;
    }

    /// Rotate the detector about an axis through its own centre.
    pub fn rotate(&mut self, angle_degrees: f64, axis: Vector3<f64>) {
        let axis = nalgebra::Unit::new_normalize(axis);
        let r = Matrix4::from_axis_angle(&axis, angle_degrees.to_radians());
        self.rotation = r * self.rotation;
    }

    pub fn set_point_source(&mut self, position: Point3<f64>) {
        self.source_centre = position;
        self.shape = SourceShape::Point;
        self.source_positions = vec![position];
    }

    pub fn set_parallel_beam(&mut self, position: Point3<f64>) {
        self.set_point_source(position);
        self.shape = SourceShape::Parallel;
    }

    /// Square focal spot facing the detector. One sample per side falls
    /// back to a point source.
    pub fn set_square_source(&mut self, position: Point3<f64>, samples: u32, length: f64) {
        if samples <= 1 {
            return self.set_point_source(position);
        }
        self.source_centre = position;
        let look_at = (self.position - position).normalize();
        let right = look_at.cross(&self.up);
        let corner = position - right * (length / 2.0) - self.up * (length / 2.0);
        let step = length / f64::from(samples - 1);
        self.source_positions = (0..samples)
            .flat_map(|j| (0..samples).map(move |i| (i, j)))
            .map(|(i, j)| corner + self.up * (step * f64::from(j)) + right * (step * f64::from(i)))
            .collect();
        self.shape = SourceShape::Square { length, samples };
    }

    pub fn set_line_source(&mut self, position: Point3<f64>, direction: Vector3<f64>, samples: u32, length: f64) {
        if samples <= 1 {
            return self.set_point_source(position);
        }
        self.source_centre = position;
        let direction = direction.normalize();
        let start = position - direction * (length / 2.0);
        let step = length / f64::from(samples - 1);
        self.source_positions = (0..samples)
            .map(|i| start + direction * (step * f64::from(i)))
            .collect();
        self.shape = SourceShape::Line {
            direction,
            length,
            samples,
        };
    }

    pub fn set_cubic_source(&mut self, position: Point3<f64>, samples: u32, length: f64) {
        if samples <= 1 {
            return self.set_point_source(position);
        }
        self.source_centre = position;
        let corner = position - Vector3::repeat(length / 2.0);
        let step = length / f64::from(samples - 1);
        let mut positions = Vec::with_capacity((samples as usize).pow(3));
        for k in 0..samples {
            for j in 0..samples {
                for i in 0..samples {
                    positions.push(
                        corner + Vector3::new(f64::from(i), f64::from(j), f64::from(k)) * step,
                    );
                }
            }
        }
        self.source_positions = positions;
        self.shape = SourceShape::Cube { length, samples };
    }

    pub fn number_of_pixels(&self) -> [u32; 2] {
        self.pixels
    }

    pub fn pixel_size(&self) -> Vector2<f64> {
        self.pixel_size
    }

    pub fn size(&self) -> Vector2<f64> {
        Vector2::new(
            self.pixel_size.x * f64::from(self.pixels[0]),
            self.pixel_size.y * f64::from(self.pixels[1]),
        )
    }

    pub fn detector_position(&self) -> Point3<f64> {
        self.position
    }

    pub fn source_centre(&self) -> Point3<f64> {
        self.source_centre
    }

    pub fn source_shape(&self) -> SourceShape {
        self.shape
    }

    pub fn source_positions(&self) -> &[Point3<f64>] {
        &self.source_positions
    }

    pub fn number_of_source_samples(&self) -> usize {
        self.source_positions.len()
    }

    pub fn is_parallel_beam(&self) -> bool {
        self.shape == SourceShape::Parallel
    }

    pub fn rotation_matrix(&self) -> &Matrix4<f64> {
        &self.rotation
    }

    pub fn source_detector_distance(&self) -> f64 {
        (self.position - self.source_centre).norm()
    }

    /// Orthonormal `(right, up, normal)` frame after rotation. The normal
    /// points from the source towards the detector.
    pub fn frame(&self) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let look_at = (self.position - self.source_centre).normalize();
        let right = look_at.cross(&self.up).normalize();
        let up = right.cross(&look_at);
        let normal = up.cross(&right);
        (
            self.rotation.transform_vector(&right),
            self.rotation.transform_vector(&up),
            self.rotation.transform_vector(&normal),
        )
    }

    pub fn right_vector(&self) -> Vector3<f64> {
        self.frame().0
    }

    pub fn up_vector(&self) -> Vector3<f64> {
        self.frame().1
    }

    pub fn normal_vector(&self) -> Vector3<f64> {
        self.frame().2
    }

    /// Detector plane `ax + by + cz + d = 0`.
    pub fn plane_equation(&self) -> [f64; 4] {
        let n = self.normal_vector();
        [n.x, n.y, n.z, -n.dot(&self.position.coords)]
    }

    /// Vertical field of view in degrees, as seen from the source centre.
    pub fn field_of_view_y(&self) -> f64 {
        2.0 * (self.size().y / 2.0).atan2(self.source_detector_distance()).to_degrees()
    }

    /// Projection for the `sample`-th source position.
    pub fn projection(&self, sample: usize) -> Option<Projection> {
        let source = *self.source_positions.get(sample)?;
        let (right, up, normal) = self.frame();
        Some(Projection {
            source,
            centre: self.position,
            right,
            up,
            normal,
            pixel_size: self.pixel_size,
            pixels: self.pixels,
            parallel: self.is_parallel_beam(),
        })
    }

    /// World centre of pixel `(i, j)`.
    pub fn pixel_position(&self, i: u32, j: u32) -> Option<Point3<f64>> {
        let projection = self.projection(0)?;
        Some(projection.pixel_position(f64::from(i), f64::from(j)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn detector() -> XRayDetector {
        let mut d = XRayDetector::new();
        d.set_detector_position(Point3::new(0.0, 100.0, 0.0));
        d.set_up_vector(Vector3::new(0.0, 0.0, -1.0));
        d.set_point_source(Point3::new(0.0, -400.0, 0.0));
        d.set_number_of_pixels(4, 2);
        d.set_pixel_size(0.5, 0.5);
        d
    }

    #[test]
    fn test_frame_matches_look_at() {
        let d = detector();
        let (right, up, normal) = d.frame();
        assert_relative_eq!(right, Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(up, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
        assert_relative_eq!(normal, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(d.plane_equation()[3], -100.0);
    }

    #[test]
    fn test_pixel_centres_and_projection_agree() {
        let d = detector();
        let projection = d.projection(0).unwrap();
        let corner = d.pixel_position(0, 0).unwrap();
        assert_relative_eq!(corner, Point3::new(0.75, 100.0, 0.25), epsilon = 1e-12);

        let [x, y] = projection.project(&Point3::new(-0.25, 100.0, -0.25)).unwrap();
        assert_relative_eq!(x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(y, 1.0, epsilon = 1e-12);

        // Halfway to the source, everything is magnified by two.
        let [x, _] = projection.project(&Point3::new(-0.125, -150.0, 0.0)).unwrap();
        assert_relative_eq!(x, 2.0, epsilon = 1e-12);
        assert!(projection.project(&Point3::new(0.0, -500.0, 0.0)).is_none());
    }

    #[test]
    fn test_source_sampling() {
        let mut d = detector();
        d.set_square_source(Point3::new(0.0, -400.0, 0.0), 3, 2.0);
        assert_eq!(d.number_of_source_samples(), 9);
        assert_relative_eq!(d.source_positions()[4], Point3::new(0.0, -400.0, 0.0), epsilon = 1e-12);

        d.set_cubic_source(Point3::origin(), 2, 2.0);
        assert_eq!(d.number_of_source_samples(), 8);
        assert_relative_eq!(d.source_positions()[7], Point3::new(1.0, 1.0, 1.0));

        d.set_line_source(Point3::origin(), Vector3::new(0.0, 0.0, 5.0), 1, 2.0);
        assert_eq!(d.source_shape(), SourceShape::Point);

        d.set_parallel_beam(Point3::new(0.0, -400.0, 0.0));
        assert!(d.is_parallel_beam());
        let (origin, dir) = d.projection(0).unwrap().ray(0.0, 0.0);
        assert_relative_eq!(origin, d.pixel_position(0, 0).unwrap());
        assert_relative_eq!(dir, Vector3::new(0.0, -1.0, 0.0), epsilon = 1e-12);
    }
}
