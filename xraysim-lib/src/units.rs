//! Internal unit system.
//!
//! Lengths are in millimetres, energies in MeV and masses in grams. Multiply a
//! value by a unit to convert it into internal units; divide to read it back.

pub const MM: f64 = 1.0;
pub const UM: f64 = 1.0e-3 * MM;
pub const CM: f64 = 10.0 * MM;
pub const DM: f64 = 100.0 * MM;
pub const M: f64 = 1000.0 * MM;

pub const MM2: f64 = MM * MM;
pub const CM2: f64 = CM * CM;
pub const MM3: f64 = MM * MM * MM;
pub const CM3: f64 = CM * CM * CM;

pub const MEV: f64 = 1.0;
pub const KEV: f64 = 1.0e-3 * MEV;
pub const EV: f64 = 1.0e-6 * MEV;

pub const G: f64 = 1.0;
pub const MG: f64 = 1.0e-3 * G;
pub const KG: f64 = 1000.0 * G;

/// Tabulated mass attenuation coefficients (cm²/g) to internal units.
pub const MASS_ATTENUATION: f64 = CM2 / G;

/// Tabulated densities (g/cm³) to internal units.
pub const DENSITY: f64 = G / CM3;

/// Tabulated linear attenuation coefficients (cm⁻¹) to internal units.
pub const LINEAR_ATTENUATION: f64 = 1.0 / CM;
