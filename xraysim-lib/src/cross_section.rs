use crate::db::ReferenceData;
use crate::error::{Result, XraySimError};
use crate::mixture::Mixture;
use crate::tissue::density_from_hu;
use crate::units::{CM, MASS_ATTENUATION};

/// Where the attenuation properties of a material come from.
#[derive(Debug, Clone, PartialEq)]
pub enum AttenuationSource {
    /// Tissue looked up by Hounsfield value.
    Hounsfield(i16),
    /// A pure element, by atomic number.
    Element(u16),
    /// A mixture or compound.
    Mixture(Mixture),
    /// Explicit mass attenuation coefficient (internal units).
    MassCoefficient(f64),
    /// Explicit linear attenuation coefficient (internal units).
    LinearCoefficient(f64),
}

/// The photon cross-section of a material: one attenuation source plus an
/// optional density override.
///
/// Equality compares the source and the density override; the label is
/// descriptive only.
#[derive(Debug, Clone, Default)]
pub struct PhotonCrossSection {
    source: Option<AttenuationSource>,
    density: Option<f64>,
    label: String,
}

impl PartialEq for PhotonCrossSection {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.density == other.density
    }
}

impl PhotonCrossSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the attenuation source, the density override and the label.
    pub fn reset(&mut self) {
        self.source = None;
        self.density = None;
        self.label.clear();
    }

    fn set_source(&mut self, source: AttenuationSource, label: String) {
        self.reset();
        self.source = Some(source);
        self.label = label;
    }

    /// Use a pure element given by symbol, name or atomic number.
    pub fn use_element(&mut self, data: &ReferenceData, element: &str) -> Result<()> {
        let elem = data.elements().find(element)?;
        let label = format!("Element: {}", elem.symbol());
        self.set_source(AttenuationSource::Element(elem.atomic_number()), label);
        Ok(())
    }

    pub fn use_element_z(&mut self, data: &ReferenceData, atomic_number: u16) -> Result<()> {
        self.use_element(data, &atomic_number.to_string())
    }

    /// Use a mixture given in mixture notation (`"Ti90Al6V4"`).
    pub fn use_mixture(&mut self, data: &ReferenceData, formula: &str) -> Result<()> {
        let mixture = Mixture::from_mixture_formula(data.elements(), formula)?;
        self.set_source(AttenuationSource::Mixture(mixture), format!("Mixture: {formula}"));
        Ok(())
    }

    /// Use a compound given in chemical notation (`"H2O"`).
    pub fn use_compound(&mut self, data: &ReferenceData, formula: &str) -> Result<()> {
        let mixture = Mixture::from_compound_formula(data.elements(), formula)?;
        self.set_source(AttenuationSource::Mixture(mixture), format!("Compound: {formula}"));
        Ok(())
    }

    /// Use an already built mixture.
    pub fn use_mixture_weights(&mut self, mixture: Mixture, label: &str) {
        self.set_source(AttenuationSource::Mixture(mixture), format!("Mixture: {label}"));
    }

    pub fn use_hu(&mut self, hu: i16) {
        self.set_source(AttenuationSource::Hounsfield(hu), format!("HU: {hu}"));
    }

    pub fn use_mass_attenuation_coefficient(&mut self, coefficient: f64) {
        let label = format!("mu/rho: {} cm2/g", coefficient / MASS_ATTENUATION);
        self.set_source(AttenuationSource::MassCoefficient(coefficient), label);
    }

    pub fn use_linear_attenuation_coefficient(&mut self, coefficient: f64) {
        let label = format!("mu: {} cm-1", coefficient * CM);
        self.set_source(AttenuationSource::LinearCoefficient(coefficient), label);
    }

    /// Override the density. A value below -0.5 clears the override.
    pub fn set_density(&mut self, density: f64) {
        self.density = (density >= -0.5).then_some(density);
    }

    pub fn source(&self) -> Option<&AttenuationSource> {
        self.source.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.source.is_some()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn density_override(&self) -> Option<f64> {
        self.density
    }

    fn active(&self) -> Result<&AttenuationSource> {
        self.source.as_ref().ok_or(XraySimError::NoPropertiesSet)
    }

    /// Density from the override, else from the attenuation source.
    pub fn density(&self, data: &ReferenceData) -> Result<f64> {
        let source = self.active()?;
        if let Some(density) = self.density {
            return Ok(density);
        }
        match source {
            AttenuationSource::Hounsfield(hu) => Ok(density_from_hu(f64::from(*hu))),
            AttenuationSource::Element(z) => Ok(data.elements().get(*z)?.density()),
            AttenuationSource::Mixture(mixture) => mixture
                .density()
                .ok_or_else(|| XraySimError::MissingDensity(self.label.clone())),
            AttenuationSource::MassCoefficient(_) | AttenuationSource::LinearCoefficient(_) => {
                Err(XraySimError::MissingDensity(self.label.clone()))
            }
        }
    }

    pub fn mass_attenuation_coefficient(&self, data: &ReferenceData, energy: f64) -> Result<f64> {
        match self.active()? {
            AttenuationSource::Hounsfield(hu) => {
                data.materials()
                    .mass_attenuation_coefficient(data.elements(), *hu, energy)
            }
            AttenuationSource::Element(z) => {
                data.elements().get(*z)?.mass_attenuation_coefficient(energy)
            }
            AttenuationSource::Mixture(mixture) => {
                mixture.mass_attenuation_coefficient(data.elements(), energy)
            }
            AttenuationSource::MassCoefficient(mu) => Ok(*mu),
            AttenuationSource::LinearCoefficient(mu) => Ok(mu / self.density(data)?),
        }
    }

    pub fn linear_attenuation_coefficient(&self, data: &ReferenceData, energy: f64) -> Result<f64> {
        match self.active()? {
            AttenuationSource::LinearCoefficient(mu) => Ok(*mu),
            _ => Ok(self.mass_attenuation_coefficient(data, energy)? * self.density(data)?),
        }
    }

    /// Molar mass of the source material, when it has one.
    pub fn molar_mass(&self, data: &ReferenceData) -> Result<Option<f64>> {
        Ok(match self.active()? {
            AttenuationSource::Hounsfield(hu) => {
                Some(data.materials().material(*hu)?.mixture().molar_mass())
            }
            AttenuationSource::Element(z) => Some(data.elements().get(*z)?.molar_mass()),
            AttenuationSource::Mixture(mixture) => Some(mixture.molar_mass()),
            AttenuationSource::MassCoefficient(_) | AttenuationSource::LinearCoefficient(_) => None,
        })
    }
}
