use std::path::Path;

use crate::error::{Result, XraySimError};
use crate::gpu::{ToneCurve, ToneMapping, Viewport};
use crate::volume::Image;

use super::{XRayRenderer, not_initialised, passes};

const LOG_EPSILON: f64 = 1.0e-9;

/// How the energy fluence is mapped to grey levels.
///
/// At most one of `log` and `power_law` may be set. With `normalise`, shift
/// and scale are derived from the fluence range; otherwise `shift` and
/// `scale` are used as given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySettings {
    pub log: bool,
    /// Gamma of a power-law curve.
    pub power_law: Option<f64>,
    pub normalise: bool,
    pub shift: f64,
    pub scale: f64,
    pub negative: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        DisplaySettings {
            log: false,
            power_law: None,
            normalise: true,
            shift: 0.0,
            scale: 1.0,
            negative: false,
        }
    }
}

impl DisplaySettings {
    /// Resolve the curve, shift and scale for a fluence range.
    pub fn tone_mapping(&self, min: f64, max: f64) -> Result<ToneMapping> {
        let curve = match (self.log, self.power_law) {
            (true, Some(_)) => return Err(XraySimError::ConflictingDisplayMode),
            (true, None) => ToneCurve::Log,
            (false, Some(gamma)) => ToneCurve::Power(gamma),
            (false, None) => ToneCurve::Linear,
        };
        let (mut shift, mut scale) = (self.shift, self.scale);
        if self.normalise {
            let (lo, hi) = match curve {
                ToneCurve::Linear => (min, max),
                ToneCurve::Log => ((min + LOG_EPSILON).log10(), (max + LOG_EPSILON).log10()),
                ToneCurve::Power(gamma) => (min.powf(gamma), max.powf(gamma)),
            };
            shift = -lo;
            scale = if hi - lo > f64::EPSILON { 1.0 / (hi - lo) } else { 1.0 };
        }
        Ok(ToneMapping {
            curve,
            shift,
            scale,
            negative: self.negative,
        })
    }
}

impl<'a> XRayRenderer<'a> {
    /// Tone-map the last energy fluence image to `[0, 1]`.
    pub fn display_image(&mut self, settings: &DisplaySettings) -> Result<Image> {
        let (min, max) = self.energy_fluence_min_max()?;
        let tone = settings.tone_mapping(min, max)?;
        let (width, height) = (self.energy_fluence.width(), self.energy_fluence.height());

        let device = self.device.as_mut().ok_or_else(not_initialised)?;
        let resources = self.resources.as_ref().ok_or_else(not_initialised)?;
        let viewport = Viewport::full(width as u32, height as u32);
        passes::tone_map(device, resources.energy_fluence, resources.display, viewport, tone)?;
        let data = device.read_channel(resources.display.texture, 0, 0)?;
        Ok(Image::from_data(width, height, 1, data)?
            .with_spacing(self.energy_fluence.spacing())
            .with_label("Display"))
    }

    /// Write the tone-mapped image as an 8-bit grey PNG, top row first.
    pub fn save_display_png(&mut self, path: impl AsRef<Path>, settings: &DisplaySettings) -> Result<()> {
        let image = self.display_image(settings)?.flipped_vertically();
        let pixels: Vec<u8> = image
            .data()
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        let png = image::GrayImage::from_raw(image.width() as u32, image.height() as u32, pixels)
            .ok_or_else(|| XraySimError::DataError("display buffer size mismatch".to_string()))?;
        png.save(path.as_ref())?;
        log::info!("saved display image {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_and_power_conflict() {
        let settings = DisplaySettings {
            log: true,
            power_law: Some(0.5),
            ..DisplaySettings::default()
        };
        assert!(matches!(
            settings.tone_mapping(0.0, 1.0),
            Err(XraySimError::ConflictingDisplayMode)
        ));
    }

    #[test]
    fn test_normalised_ranges_map_to_unit_interval() {
        let linear = DisplaySettings::default().tone_mapping(2.0, 6.0).unwrap();
        assert_relative_eq!(linear.apply(2.0), 0.0);
        assert_relative_eq!(linear.apply(4.0), 0.5);
        assert_relative_eq!(linear.apply(6.0), 1.0);

        let log = DisplaySettings {
            log: true,
            ..DisplaySettings::default()
        }
        .tone_mapping(1.0, 100.0)
        .unwrap();
        assert_relative_eq!(log.apply(10.0), 0.5, epsilon = 1e-6);

        let power = DisplaySettings {
            power_law: Some(2.0),
            ..DisplaySettings::default()
        }
        .tone_mapping(0.0, 2.0)
        .unwrap();
        assert_relative_eq!(power.apply(1.0), 0.25);
    }

    #[test]
    fn test_flat_range_keeps_unit_scale() {
        let tone = DisplaySettings::default().tone_mapping(3.0, 3.0).unwrap();
        assert_eq!(tone.scale, 1.0);
        assert_eq!(tone.shift, -3.0);
    }

    #[test]
    fn test_manual_shift_scale() {
        let tone = DisplaySettings {
            normalise: false,
            shift: 1.0,
            scale: 0.1,
            negative: true,
            ..DisplaySettings::default()
        }
        .tone_mapping(0.0, 100.0)
        .unwrap();
        assert_relative_eq!(tone.apply(4.0), 0.5);
    }
}
