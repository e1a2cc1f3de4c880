use thiserror::Error;

#[derive(Debug, Error)]
pub enum XraySimError {
    // Configuration
    #[error("no X-ray detector has been set")]
    NoDetector,
    #[error("no X-ray beam has been set")]
    NoBeam,
    #[error("invalid texture format: {0} (expected rgb16f or rgb32f)")]
    InvalidTextureFormat(String),
    #[error("invalid detector size: {width}x{height} pixels")]
    InvalidDetectorSize { width: u32, height: u32 },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Device resources
    #[error("device capability not met: {0}")]
    DeviceCapability(String),
    #[error("out of memory: {0}")]
    OutOfMemory(String),
    #[error("failed to create resource: {0}")]
    ResourceCreation(String),
    #[error("unknown device resource: {0}")]
    UnknownResource(String),

    // Lookup
    #[error("unknown element: {0}")]
    UnknownElement(String),
    #[error("unknown material: {0}")]
    UnknownMaterial(String),
    #[error("empty reference table: {0}")]
    EmptyTable(String),
    #[error("no photon cross-section properties set")]
    NoPropertiesSet,
    #[error("cannot compute {0} without density")]
    MissingDensity(String),
    #[error("invalid formula: {0}")]
    InvalidFormula(String),

    // State
    #[error("renderer is not ready: {}", .0.join("; "))]
    RendererNotReady(Vec<String>),
    #[error("log and power-law display modes cannot be combined")]
    ConflictingDisplayMode,
    #[error("degenerate sweep: {0}")]
    DegenerateSweep(String),

    // Data
    #[error("data error: {0}")]
    DataError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, XraySimError>;
