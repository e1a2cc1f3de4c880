use xraysim_data::AttenuationRecord;

use crate::error::{Result, XraySimError};
use crate::interp::{interp_loglinear_one, interp_one};
use crate::units::{LINEAR_ATTENUATION, MEV};

/// Linear attenuation coefficient of a material at one photon energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttenuationCoefficient {
    energy: f64,
    coefficient: f64,
}

impl AttenuationCoefficient {
    pub fn new(energy: f64, coefficient: f64) -> Self {
        AttenuationCoefficient {
            energy,
            coefficient,
        }
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }
}

/// The attenuation of water, sorted by energy.
///
/// Both interpolations clamp to the first and last record outside the
/// tabulated range.
#[derive(Debug, Clone, Default)]
pub struct WaterAttenuation {
    energy: Vec<f64>,
    mu: Vec<f64>,
}

impl WaterAttenuation {
    pub fn new(mut records: Vec<AttenuationCoefficient>) -> Self {
        records.sort_by(|a, b| a.energy.total_cmp(&b.energy));
        WaterAttenuation {
            energy: records.iter().map(|r| r.energy).collect(),
            mu: records.iter().map(|r| r.coefficient).collect(),
        }
    }

    pub fn from_records(records: &[AttenuationRecord]) -> Self {
        Self::new(
            records
                .iter()
                .map(|r| AttenuationCoefficient::new(r.energy * MEV, r.mu * LINEAR_ATTENUATION))
                .collect(),
        )
    }

    fn check(&self) -> Result<()> {
        if self.energy.is_empty() {
            return Err(XraySimError::EmptyTable("mu water".to_string()));
        }
        Ok(())
    }

    pub fn linear_interpolation(&self, energy: f64) -> Result<f64> {
        self.check()?;
        Ok(interp_one(energy, &self.energy, &self.mu))
    }

    pub fn log_linear_interpolation(&self, energy: f64) -> Result<f64> {
        self.check()?;
        Ok(interp_loglinear_one(energy, &self.energy, &self.mu))
    }

    /// Linear attenuation coefficient for a Hounsfield value: `mu_w (1 + HU/1000)`.
    pub fn mu_from_hu(&self, hu: f64, energy: f64) -> Result<f64> {
        Ok(self.linear_interpolation(energy)? * (1.0 + hu / 1000.0))
    }

    /// Hounsfield value of a linear attenuation coefficient: `1000 (mu - mu_w) / mu_w`.
    pub fn hu_from_mu(&self, mu: f64, energy: f64) -> Result<f64> {
        let mu_water = self.linear_interpolation(energy)?;
        Ok(1000.0 * (mu - mu_water) / mu_water)
    }

    pub fn first(&self) -> Option<AttenuationCoefficient> {
        Some(AttenuationCoefficient::new(*self.energy.first()?, *self.mu.first()?))
    }

    pub fn last(&self) -> Option<AttenuationCoefficient> {
        Some(AttenuationCoefficient::new(*self.energy.last()?, *self.mu.last()?))
    }

    pub fn iter(&self) -> impl Iterator<Item = AttenuationCoefficient> + '_ {
        self.energy
            .iter()
            .zip(&self.mu)
            .map(|(&e, &mu)| AttenuationCoefficient::new(e, mu))
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }
}
