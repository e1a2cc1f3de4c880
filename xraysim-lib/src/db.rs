use xraysim_data::{SimDatabase, VersionRecord};

use crate::attenuation::WaterAttenuation;
use crate::element::ElementSet;
use crate::error::{Result, XraySimError};
use crate::tissue::MaterialSet;

const COMPRESSED_DATA: &[u8] = include_bytes!("../data/xraysim.bin.zst");

/// Immutable reference data shared by every physics consumer.
///
/// Built once, usually at startup, and passed around by reference. The
/// embedded dataset holds the element table with mass attenuation
/// coefficients, the Hounsfield unit tissue table and the attenuation of
/// water.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    version: Vec<VersionRecord>,
    elements: ElementSet,
    materials: MaterialSet,
    mu_water: WaterAttenuation,
}

impl ReferenceData {
    /// Inflate and index the embedded dataset.
    pub fn load() -> Result<Self> {
        let data = Self::from_compressed(COMPRESSED_DATA)?;
        log::info!(
            "loaded reference data: {} elements, {} tissue materials, {} water records",
            data.elements.len(),
            data.materials.len(),
            data.mu_water.len()
        );
        Ok(data)
    }

    /// Decode a zstd-compressed postcard blob.
    pub fn from_compressed(bytes: &[u8]) -> Result<Self> {
        let mut decoder = ruzstd::decoding::StreamingDecoder::new(bytes)
            .map_err(|e| XraySimError::DataError(format!("failed to create zstd decoder: {e}")))?;
        let mut decompressed = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut decompressed)
            .map_err(|e| XraySimError::DataError(format!("failed to decompress data: {e}")))?;

        let data: SimDatabase = postcard::from_bytes(&decompressed)
            .map_err(|e| XraySimError::DataError(format!("failed to deserialize data: {e}")))?;
        Self::from_database(data)
    }

    pub fn from_database(data: SimDatabase) -> Result<Self> {
        let elements = ElementSet::from_records(&data.elements)?;
        let materials = MaterialSet::from_records(&data.tissue_materials, &elements)?;
        let mu_water = WaterAttenuation::from_records(&data.mu_water);
        Ok(ReferenceData {
            version: data.version,
            elements,
            materials,
            mu_water,
        })
    }

    pub fn elements(&self) -> &ElementSet {
        &self.elements
    }

    pub fn materials(&self) -> &MaterialSet {
        &self.materials
    }

    pub fn mu_water(&self) -> &WaterAttenuation {
        &self.mu_water
    }

    /// Version of the embedded tables, if recorded.
    pub fn version(&self) -> Option<&VersionRecord> {
        self.version.last()
    }
}
