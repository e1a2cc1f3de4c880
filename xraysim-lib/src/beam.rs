use crate::units::MEV;

/// Photons of one energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyChannel {
    pub photon_count: f64,
    /// Photon energy, internal units.
    pub energy: f64,
}

/// A polychromatic X-ray beam as a list of energy channels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XRayBeam {
    channels: Vec<EnergyChannel>,
}

impl XRayBeam {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn monochromatic(photon_count: f64, energy: f64) -> Self {
        let mut beam = Self::new();
        beam.add_channel(photon_count, energy);
        beam
    }

    pub fn add_channel(&mut self, photon_count: f64, energy: f64) -> &mut Self {
        self.channels.push(EnergyChannel {
            photon_count,
            energy,
        });
        self
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }

    pub fn channels(&self) -> &[EnergyChannel] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Total energy carried by the beam, in MeV.
    pub fn total_energy(&self) -> f64 {
        self.channels
            .iter()
            .map(|c| c.photon_count * c.energy / MEV)
            .sum()
    }

    /// Highest photon energy, internal units.
    pub fn max_energy(&self) -> Option<f64> {
        self.channels.iter().map(|c| c.energy).reduce(f64::max)
    }
}
