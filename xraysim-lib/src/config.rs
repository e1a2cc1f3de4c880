use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XraySimError};

/// Storage precision of the L-buffer textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFormat {
    /// Half-precision channels.
    Rgb16F,
    /// Single-precision channels.
    #[default]
    Rgb32F,
}

impl FromStr for TextureFormat {
    type Err = XraySimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rgb16f" => Ok(TextureFormat::Rgb16F),
            "rgb32f" => Ok(TextureFormat::Rgb32F),
            _ => Err(XraySimError::InvalidTextureFormat(s.to_string())),
        }
    }
}

/// How the L-buffer is corrected for rasterization artefacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtefactFilter {
    None,
    /// Re-cast ambiguous pixels analytically on the CPU.
    Cpu,
    /// Zero implausible path lengths in a device pass.
    #[default]
    Gpu,
}

/// Renderer settings, loadable from TOML.
///
/// ```
/// let config = xraysim::RendererConfig::from_toml_str(
///     "texture_format = \"rgb16f\"\nartefact_filter = \"cpu\"",
/// )
/// .unwrap();
/// assert_eq!(config.artefact_filter, xraysim::ArtefactFilter::Cpu);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    pub texture_format: TextureFormat,
    pub artefact_filter: ArtefactFilter,
    /// Path lengths below this fraction of the bounding-box diagonal are
    /// treated as noise by the device clean pass.
    pub clean_noise_fraction: f64,
    /// Largest texture width or height the device accepts.
    pub max_texture_size: u32,
    /// Largest number of layers of a 3D texture.
    pub max_texture_layers: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            texture_format: TextureFormat::default(),
            artefact_filter: ArtefactFilter::default(),
            clean_noise_fraction: 1.0e-6,
            max_texture_size: 16384,
            max_texture_layers: 2048,
        }
    }
}

impl RendererConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: RendererConfig =
            toml::from_str(s).map_err(|e| XraySimError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| XraySimError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.clean_noise_fraction) {
            return Err(XraySimError::InvalidConfig(format!(
                "clean_noise_fraction must be in [0, 1), got {}",
                self.clean_noise_fraction
            )));
        }
        if self.max_texture_size == 0 || self.max_texture_layers == 0 {
            return Err(XraySimError::InvalidConfig(
                "texture limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = RendererConfig::from_toml_str("").unwrap();
        assert_eq!(config, RendererConfig::default());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = RendererConfig {
            texture_format: TextureFormat::Rgb16F,
            artefact_filter: ArtefactFilter::None,
            ..RendererConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("rgb16f"));
        assert_eq!(RendererConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            RendererConfig::from_toml_str("texture_format = \"rgba8\""),
            Err(XraySimError::InvalidConfig(_))
        ));
        assert!(matches!(
            RendererConfig::from_toml_str("clean_noise_fraction = 2.0"),
            Err(XraySimError::InvalidConfig(_))
        ));
        assert!(matches!(
            "rgb8".parse::<TextureFormat>(),
            Err(XraySimError::InvalidTextureFormat(_))
        ));
    }
}
