use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::element::ElementSet;
use crate::error::{Result, XraySimError};
use crate::formula::{compound_weight_set, mixture_weight_set};

/// Mass fractions of elements, keyed by atomic number.
///
/// Two mixtures are equal when they have the same weights, molar mass and
/// density.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mixture {
    weights: BTreeMap<u16, f64>,
    molar_mass: f64,
    density: Option<f64>,
}

impl Mixture {
    /// Build a mixture from `Z → weight`.
    ///
    /// The weights are normalised to sum to one when their sum is not
    /// negligible.
    pub fn from_weights(elements: &ElementSet, weights: &BTreeMap<u16, f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(XraySimError::InvalidFormula(
                "a mixture needs at least one element".to_string(),
            ));
        }
        if let Some((z, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(XraySimError::InvalidFormula(format!(
                "invalid weight {w} for Z={z}"
            )));
        }

        let sum: f64 = weights.values().sum();
        let scale = if sum > f64::EPSILON { 1.0 / sum } else { 1.0 };
        let weights: BTreeMap<u16, f64> = weights.iter().map(|(&z, &w)| (z, w * scale)).collect();

        let mut molar_mass = 0.0;
        for (&z, &w) in &weights {
            molar_mass += w * elements.get(z)?.molar_mass();
        }

        Ok(Mixture {
            weights,
            molar_mass,
            density: None,
        })
    }

    /// Build a mixture from element identifiers (symbols, names or atomic numbers).
    pub fn from_named_weights(elements: &ElementSet, weights: &HashMap<String, f64>) -> Result<Self> {
        let mut by_z = BTreeMap::new();
        for (name, &w) in weights {
            *by_z.entry(elements.resolve(name)?).or_insert(0.0) += w;
        }
        Self::from_weights(elements, &by_z)
    }

    /// Mixture notation, e.g. `"Ti90Al6V4"`.
    pub fn from_mixture_formula(elements: &ElementSet, formula: &str) -> Result<Self> {
        Self::from_named_weights(elements, &mixture_weight_set(formula)?)
    }

    /// Compound notation, e.g. `"H2O"`.
    pub fn from_compound_formula(elements: &ElementSet, formula: &str) -> Result<Self> {
        Self::from_named_weights(elements, &compound_weight_set(elements, formula)?)
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.set_density(density);
        self
    }

    /// A negative density unsets it.
    pub fn set_density(&mut self, density: f64) {
        self.density = (density >= 0.0).then_some(density);
    }

    pub fn density(&self) -> Option<f64> {
        self.density
    }

    pub fn weights(&self) -> &BTreeMap<u16, f64> {
        &self.weights
    }

    pub fn weight(&self, atomic_number: u16) -> f64 {
        self.weights.get(&atomic_number).copied().unwrap_or(0.0)
    }

    pub fn molar_mass(&self) -> f64 {
        self.molar_mass
    }

    /// Σ weight × (mu/rho) of every constituent.
    pub fn mass_attenuation_coefficient(&self, elements: &ElementSet, energy: f64) -> Result<f64> {
        let mut mu = 0.0;
        for (&z, &w) in &self.weights {
            mu += w * elements.get(z)?.mass_attenuation_coefficient(energy)?;
        }
        Ok(mu)
    }

    pub fn linear_attenuation_coefficient(&self, elements: &ElementSet, energy: f64) -> Result<f64> {
        let density = self
            .density
            .ok_or_else(|| XraySimError::MissingDensity("mixture linear attenuation".to_string()))?;
        Ok(self.mass_attenuation_coefficient(elements, energy)? * density)
    }
}
