#![no_std]

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// The reference dataset of the simulator, deserialized from the embedded blob.
#[derive(Debug, Serialize, Deserialize)]
pub struct SimDatabase {
    pub version: Vec<VersionRecord>,
    pub elements: Vec<ElementRecord>,
    pub tissue_materials: Vec<TissueMaterialRecord>,
    pub mu_water: Vec<AttenuationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub tag: String,
    pub date: String,
    pub notes: String,
}

/// One chemical element with its photon mass attenuation table.
///
/// Units are the tabulated ones: g/mol, g/cm³, MeV and cm²/g. Absorption
/// edges appear as two consecutive entries sharing the same energy. Elements
/// without tabulated attenuation carry empty vectors.
#[derive(Debug, Serialize, Deserialize)]
pub struct ElementRecord {
    pub atomic_number: u16,
    pub symbol: String,
    pub name: String,
    pub molar_mass: f64,
    pub density: f64,
    pub energy: Vec<f64>,
    pub mass_attenuation: Vec<f64>,
}

/// A Hounsfield unit interval and its elemental composition (percent by mass).
#[derive(Debug, Serialize, Deserialize)]
pub struct TissueMaterialRecord {
    pub min_hu: i16,
    pub max_hu: i16,
    pub weights: Vec<ElementWeight>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ElementWeight {
    pub atomic_number: u16,
    pub weight: f64,
}

/// Linear attenuation coefficient of water (cm⁻¹) at one energy (MeV).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttenuationRecord {
    pub energy: f64,
    pub mu: f64,
}
