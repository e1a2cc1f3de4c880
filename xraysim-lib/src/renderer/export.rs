use std::path::Path;

use crate::config::ArtefactFilter;
use crate::error::{Result, XraySimError};
use crate::volume::Image;

use super::{Resources, Target, XRayRenderer, not_initialised};

impl<'a> XRayRenderer<'a> {
    fn read_target(&self, target: impl Fn(&Resources) -> Target, label: &str) -> Result<Image> {
        let detector = self.detector.ok_or(XraySimError::NoDetector)?;
        let device = self.device.as_ref().ok_or_else(not_initialised)?;
        let resources = self.resources.as_ref().ok_or_else(not_initialised)?;
        let target = target(resources);
        let texture = device.texture(target.texture)?;
        let (w, h, layers) = (texture.width() as usize, texture.height() as usize, texture.layers());

        let mut data = Vec::with_capacity(w * h * layers as usize);
        for layer in 0..layers {
            data.extend(device.read_channel(target.texture, layer, 0)?);
        }
        let pixel_size = detector.pixel_size();
        Ok(Image::from_data(w, h, layers as usize, data)?
            .with_spacing([pixel_size.x, pixel_size.y, 1.0])
            .with_label(label))
    }

    /// Path length (cm) through the last rendered surface bucket, after
    /// artefact filtering.
    pub fn l_buffer(&self) -> Result<Image> {
        let filter = self.config.artefact_filter;
        self.read_target(
            |r| match filter {
                ArtefactFilter::Gpu => r.clean_l_buffer,
                ArtefactFilter::Cpu | ArtefactFilter::None => r.l_buffer,
            },
            "L-buffer (cm)",
        )
    }

    /// Summed path length (cm) of all inner surfaces, kept when the scene
    /// has an outer surface.
    pub fn cumulated_l_buffer(&self) -> Result<Image> {
        self.read_target(|r| r.cumulated_l_buffer, "Cumulated L-buffer (cm)")
    }

    /// Sum of mu x, one slice per energy channel.
    pub fn sum_mux(&self) -> Result<Image> {
        self.read_target(|r| r.sum_mux, "Sum of mu x")
    }

    /// The last energy fluence image.
    pub fn energy_fluence(&self) -> &Image {
        &self.energy_fluence
    }

    pub fn save_l_buffer(&self, path: impl AsRef<Path>) -> Result<()> {
        self.l_buffer()?.flipped_vertically().save_mhd(path)
    }

    pub fn save_cumulated_l_buffer(&self, path: impl AsRef<Path>) -> Result<()> {
        self.cumulated_l_buffer()?.flipped_vertically().save_mhd(path)
    }

    pub fn save_sum_mux(&self, path: impl AsRef<Path>) -> Result<()> {
        self.sum_mux()?.flipped_vertically().save_mhd(path)
    }

    pub fn save_energy_fluence(&self, path: impl AsRef<Path>) -> Result<()> {
        self.energy_fluence.flipped_vertically().save_mhd(path)
    }

    pub fn save_sinogram(&self, path: impl AsRef<Path>) -> Result<()> {
        self.sinogram
            .as_ref()
            .ok_or_else(|| XraySimError::DataError("no sinogram has been computed".to_string()))?
            .save_mhd(path)
    }

    pub fn save_projection_set(&self, path: impl AsRef<Path>) -> Result<()> {
        self.projection_set
            .as_ref()
            .ok_or_else(|| XraySimError::DataError("no projection set has been computed".to_string()))?
            .save_mhd(path)
    }
}
