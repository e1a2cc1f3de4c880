use std::collections::HashMap;

use xraysim_data::ElementRecord;

use crate::error::{Result, XraySimError};
use crate::interp::interp_loglog_one;
use crate::units::{DENSITY, G, MASS_ATTENUATION, MEV};

/// A chemical element and its photon mass attenuation table, in internal units.
#[derive(Debug, Clone)]
pub struct AtomicElement {
    atomic_number: u16,
    symbol: String,
    name: String,
    molar_mass: f64,
    density: f64,
    energy: Vec<f64>,
    mass_attenuation: Vec<f64>,
}

impl AtomicElement {
    fn from_record(record: &ElementRecord) -> Result<Self> {
        if record.energy.len() != record.mass_attenuation.len() {
            return Err(XraySimError::DataError(format!(
                "{}: {} energies for {} coefficients",
                record.symbol,
                record.energy.len(),
                record.mass_attenuation.len()
            )));
        }
        if record.energy.windows(2).any(|w| w[0] > w[1]) {
            return Err(XraySimError::DataError(format!(
                "{}: energy table is not sorted",
                record.symbol
            )));
        }
        if record.mass_attenuation.iter().any(|&mu| mu <= 0.0) {
            return Err(XraySimError::DataError(format!(
                "{}: non-positive mass attenuation coefficient",
                record.symbol
            )));
        }

        Ok(AtomicElement {
            atomic_number: record.atomic_number,
            symbol: record.symbol.clone(),
            name: record.name.clone(),
            molar_mass: record.molar_mass * G,
            density: record.density * DENSITY,
            energy: record.energy.iter().map(|e| e * MEV).collect(),
            mass_attenuation: record
                .mass_attenuation
                .iter()
                .map(|mu| mu * MASS_ATTENUATION)
                .collect(),
        })
    }

    pub fn atomic_number(&self) -> u16 {
        self.atomic_number
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Molar mass (g/mol).
    pub fn molar_mass(&self) -> f64 {
        self.molar_mass
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    /// Tabulated energies, ascending.
    pub fn energies(&self) -> &[f64] {
        &self.energy
    }

    pub fn mass_attenuation_table(&self) -> &[f64] {
        &self.mass_attenuation
    }

    pub fn has_attenuation_table(&self) -> bool {
        !self.energy.is_empty()
    }

    /// Mass attenuation coefficient at `energy`, log-log interpolated and
    /// clamped to the table boundaries.
    pub fn mass_attenuation_coefficient(&self, energy: f64) -> Result<f64> {
        if self.energy.is_empty() {
            return Err(XraySimError::EmptyTable(format!(
                "mass attenuation of {}",
                self.symbol
            )));
        }
        Ok(interp_loglog_one(energy, &self.energy, &self.mass_attenuation))
    }

    /// Linear attenuation coefficient of the pure element at its tabulated density.
    pub fn linear_attenuation_coefficient(&self, energy: f64) -> Result<f64> {
        Ok(self.mass_attenuation_coefficient(energy)? * self.density)
    }
}

/// All known elements, indexed by atomic number, symbol and name.
#[derive(Debug, Clone)]
pub struct ElementSet {
    elements: Vec<AtomicElement>,
    by_z: HashMap<u16, usize>,
    by_key: HashMap<String, u16>,
}

impl ElementSet {
    pub fn from_records(records: &[ElementRecord]) -> Result<Self> {
        let mut elements = records
            .iter()
            .map(AtomicElement::from_record)
            .collect::<Result<Vec<_>>>()?;
        elements.sort_by_key(|e| e.atomic_number);

        let mut by_z = HashMap::new();
        let mut by_key = HashMap::new();
        for (index, elem) in elements.iter().enumerate() {
            if by_z.insert(elem.atomic_number, index).is_some() {
                return Err(XraySimError::DataError(format!(
                    "duplicate element Z={}",
                    elem.atomic_number
                )));
            }
            by_key.insert(elem.symbol.to_lowercase(), elem.atomic_number);
            by_key.insert(elem.name.to_lowercase(), elem.atomic_number);
        }

        Ok(ElementSet {
            elements,
            by_z,
            by_key,
        })
    }

    /// Resolve an element identifier (atomic number, symbol or name) to Z.
    ///
    /// Symbols and names are matched case-insensitively.
    pub fn resolve(&self, element: &str) -> Result<u16> {
        let element = element.trim();
        if let Ok(z) = element.parse::<u16>() {
            if self.by_z.contains_key(&z) {
                return Ok(z);
            }
        }
        self.by_key
            .get(&element.to_lowercase())
            .copied()
            .ok_or_else(|| XraySimError::UnknownElement(element.to_string()))
    }

    pub fn get(&self, atomic_number: u16) -> Result<&AtomicElement> {
        self.by_z
            .get(&atomic_number)
            .map(|&index| &self.elements[index])
            .ok_or_else(|| XraySimError::UnknownElement(atomic_number.to_string()))
    }

    pub fn find(&self, element: &str) -> Result<&AtomicElement> {
        self.get(self.resolve(element)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AtomicElement> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
