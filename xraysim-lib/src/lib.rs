pub mod attenuation;
pub mod beam;
pub mod config;
pub mod cross_section;
pub mod db;
pub mod detector;
pub mod element;
pub mod error;
pub mod formula;
pub mod gpu;
pub mod interp;
pub mod mesh;
pub mod mixture;
pub mod renderer;
pub mod scene;
pub mod tissue;
pub mod units;
pub mod volume;

pub use attenuation::{AttenuationCoefficient, WaterAttenuation};
pub use beam::{EnergyChannel, XRayBeam};
pub use config::{ArtefactFilter, RendererConfig, TextureFormat};
pub use cross_section::{AttenuationSource, PhotonCrossSection};
pub use db::ReferenceData;
pub use detector::{Projection, SourceShape, XRayDetector};
pub use element::{AtomicElement, ElementSet};
pub use error::{Result, XraySimError};
pub use mesh::{BoundingBox, Intersection, PolygonMesh};
pub use mixture::Mixture;
pub use renderer::{DisplaySettings, XRayRenderer};
pub use scene::{Scene, SceneGraphNode};
pub use tissue::{MaterialSet, TissueMaterial, density_from_hu};
pub use volume::Image;
pub use xraysim_data;
