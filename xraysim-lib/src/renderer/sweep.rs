use nalgebra::{Matrix4, Point3, Unit, Vector3};

use crate::error::{Result, XraySimError};
use crate::units::CM;
use crate::volume::Image;

use super::XRayRenderer;

/// `T(centre) R(angle, axis) T(-centre) modelling`.
fn sweep_transform(
    modelling: &Matrix4<f64>,
    centre: &Point3<f64>,
    axis: &Unit<Vector3<f64>>,
    angle_degrees: f64,
) -> Matrix4<f64> {
    Matrix4::new_translation(&centre.coords)
        * Matrix4::from_axis_angle(axis, angle_degrees.to_radians())
        * Matrix4::new_translation(&-centre.coords)
        * modelling
}

fn z_spacing(value: f64) -> f64 {
    if value.abs() < f64::EPSILON { 1.0 } else { value }
}

fn allocate(len: usize, what: &str) -> Result<Vec<f32>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|e| XraySimError::OutOfMemory(format!("{what} of {len} values: {e}")))?;
    data.resize(len, 0.0);
    Ok(data)
}

impl<'a> XRayRenderer<'a> {
    /// Rotate the scene about `centre` around the detector's up vector and
    /// stack one detector row per angle.
    ///
    /// The result is indexed `(x, angle, row)` and holds
    /// `w / (W / cm) * ln(E_total / E_pixel)`, where `w` is the number of
    /// pixel columns and `W` the detector width.
    pub fn compute_sinogram(
        &mut self,
        modelling: &Matrix4<f64>,
        centre: &Point3<f64>,
        angles: u32,
        increment_degrees: f64,
    ) -> Result<&Image> {
        if increment_degrees == 0.0 {
            return Err(XraySimError::DegenerateSweep(
                "sinogram angular increment is 0".to_string(),
            ));
        }
        if angles == 0 {
            return Err(XraySimError::DegenerateSweep("sinogram with 0 angles".to_string()));
        }
        let detector = self.detector.ok_or(XraySimError::NoDetector)?;
        let beam = self.beam.ok_or(XraySimError::NoBeam)?;
        let [w, h] = detector.number_of_pixels();
        let (w, h, n) = (w as usize, h as usize, angles as usize);
        let axis = Unit::new_normalize(detector.up_vector());
        let total = beam.total_energy();
        let scale = w as f64 / (detector.size().x / CM);

        log::info!("sinogram: {angles} angles every {increment_degrees} degrees");
        let mut data = allocate(w * n * h, "sinogram")?;
        for i in 0..n {
            let transform = sweep_transform(modelling, centre, &axis, i as f64 * increment_degrees);
            let fluence = self.compute_image(&transform)?;
            for j in 0..h {
                let row = fluence.row(j, 0);
                let start = j * n * w + i * w;
                for (out, &v) in data[start..start + w].iter_mut().zip(row) {
                    *out = (scale * (total / f64::from(v)).ln()) as f32;
                }
            }
        }

        let pixel_size = detector.pixel_size();
        let sinogram = Image::from_data(w, n, h, data)?
            .with_spacing([pixel_size.x, increment_degrees, z_spacing(pixel_size.y)])
            .with_label("Sinogram");
        Ok(self.sinogram.insert(sinogram))
    }

    /// Rotate the scene about `centre` around the detector's up vector and
    /// stack the raw energy fluence images, indexed `(x, y, angle)`.
    pub fn compute_projection_set(
        &mut self,
        modelling: &Matrix4<f64>,
        centre: &Point3<f64>,
        angles: u32,
        increment_degrees: f64,
    ) -> Result<&Image> {
        if angles == 0 {
            return Err(XraySimError::DegenerateSweep(
                "projection set with 0 angles".to_string(),
            ));
        }
        let detector = self.detector.ok_or(XraySimError::NoDetector)?;
        let [w, h] = detector.number_of_pixels();
        let (w, h, n) = (w as usize, h as usize, angles as usize);
        let axis = Unit::new_normalize(detector.up_vector());

        log::info!("projection set: {angles} angles every {increment_degrees} degrees");
        let mut data = allocate(w * h * n, "projection set")?;
        for (i, slice) in data.chunks_exact_mut(w * h).enumerate() {
            let transform = sweep_transform(modelling, centre, &axis, i as f64 * increment_degrees);
            slice.copy_from_slice(self.compute_image(&transform)?.data());
        }

        let pixel_size = detector.pixel_size();
        let projections = Image::from_data(w, h, n, data)?
            .with_spacing([pixel_size.x, pixel_size.y, z_spacing(increment_degrees)])
            .with_label("Projection set (MeV)");
        Ok(self.projection_set.insert(projections))
    }

    pub fn sinogram(&self) -> Option<&Image> {
        self.sinogram.as_ref()
    }

    pub fn projection_set(&self) -> Option<&Image> {
        self.projection_set.as_ref()
    }
}
