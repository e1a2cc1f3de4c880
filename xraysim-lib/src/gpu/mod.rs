//! Software rendering device.
//!
//! Mirrors the resource model of a GPU pipeline: textures and framebuffers
//! addressed by id, compiled programs, and a single current pipeline state
//! that passes save and restore through [`StateGuard`].

mod device;
mod programs;
mod raster;
mod state;

pub use device::{
    BlendMode, Device, DeviceLimits, FramebufferId, PipelineState, Texture, TextureId, Viewport,
};
pub use programs::{Program, QuadPass, ToneCurve, ToneMapping};
pub use raster::{RasterStats, rasterize};
pub use state::StateGuard;
