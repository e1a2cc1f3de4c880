use std::collections::BTreeMap;

use xraysim_data::TissueMaterialRecord;

use crate::element::ElementSet;
use crate::error::{Result, XraySimError};
use crate::mixture::Mixture;
use crate::units::DENSITY;

const AIR_DENSITY: f64 = 1.21e-3;
const LUNG_HU: f64 = -98.0;
const LUNG_DENSITY: f64 = 0.93;

/// Tissue density (internal units) for a Hounsfield value.
///
/// Piecewise calibration of Schneider et al. (2000): air below -1000 HU, a
/// linear ramp from air to lung, then three affine fits through soft tissue
/// and bone separated by a constant plateau between 14 and 23 HU.
pub fn density_from_hu(hu: f64) -> f64 {
    let g_per_cm3 = if hu <= -1000.0 {
        AIR_DENSITY
    } else if hu < LUNG_HU {
        let t = (hu + 1000.0) / (LUNG_HU + 1000.0);
        AIR_DENSITY + t * (LUNG_DENSITY - AIR_DENSITY)
    } else if hu <= 14.0 {
        1.018 + 0.893e-3 * hu
    } else if hu < 23.0 {
        1.03
    } else if hu <= 100.0 {
        1.003 + 1.169e-3 * hu
    } else {
        1.017 + 0.592e-3 * hu
    };
    g_per_cm3 * DENSITY
}

/// A Hounsfield unit interval and the tissue composition it maps to.
#[derive(Debug, Clone, PartialEq)]
pub struct TissueMaterial {
    min_hu: i16,
    max_hu: i16,
    mixture: Mixture,
}

impl TissueMaterial {
    pub fn new(min_hu: i16, max_hu: i16, mixture: Mixture) -> Self {
        TissueMaterial {
            min_hu,
            max_hu,
            mixture,
        }
    }

    pub fn min_hu(&self) -> i16 {
        self.min_hu
    }

    pub fn max_hu(&self) -> i16 {
        self.max_hu
    }

    pub fn contains(&self, hu: i16) -> bool {
        (self.min_hu..=self.max_hu).contains(&hu)
    }

    pub fn mixture(&self) -> &Mixture {
        &self.mixture
    }

    pub fn density(&self, hu: i16) -> f64 {
        density_from_hu(f64::from(hu))
    }

    pub fn mass_attenuation_coefficient(&self, elements: &ElementSet, energy: f64) -> Result<f64> {
        self.mixture.mass_attenuation_coefficient(elements, energy)
    }
}

/// Tissue materials ordered by HU interval.
#[derive(Debug, Clone, Default)]
pub struct MaterialSet {
    materials: Vec<TissueMaterial>,
}

impl MaterialSet {
    pub fn new(mut materials: Vec<TissueMaterial>) -> Self {
        materials.sort_by_key(|m| (m.min_hu, m.max_hu));
        MaterialSet { materials }
    }

    pub fn from_records(records: &[TissueMaterialRecord], elements: &ElementSet) -> Result<Self> {
        let mut materials = Vec::with_capacity(records.len());
        for record in records {
            if record.min_hu > record.max_hu {
                return Err(XraySimError::DataError(format!(
                    "tissue interval [{}, {}] is reversed",
                    record.min_hu, record.max_hu
                )));
            }
            let weights: BTreeMap<u16, f64> = record
                .weights
                .iter()
                .map(|w| (w.atomic_number, w.weight))
                .collect();
            let mixture = Mixture::from_weights(elements, &weights)?;
            materials.push(TissueMaterial::new(record.min_hu, record.max_hu, mixture));
        }
        Ok(Self::new(materials))
    }

    /// The first interval whose upper bound reaches `hu`, else the last one.
    pub fn material(&self, hu: i16) -> Result<&TissueMaterial> {
        self.materials
            .iter()
            .find(|m| hu <= m.max_hu)
            .or_else(|| self.materials.last())
            .ok_or_else(|| XraySimError::EmptyTable("tissue materials".to_string()))
    }

    pub fn mass_attenuation_coefficient(&self, elements: &ElementSet, hu: i16, energy: f64) -> Result<f64> {
        self.material(hu)?.mass_attenuation_coefficient(elements, energy)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TissueMaterial> {
        self.materials.iter()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
