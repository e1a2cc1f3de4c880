//! The X-ray attenuation renderer.
//!
//! Per source sample, every material bucket of the scene is rasterized into
//! an L-buffer, multiplied by its linear attenuation coefficient for every
//! beam channel into the sum(mu x) buffer, and the transmitted energy of all
//! channels is accumulated into the energy fluence image.

mod display;
mod export;
mod integration;
mod lifecycle;
mod passes;
mod sweep;

use crate::beam::XRayBeam;
use crate::config::RendererConfig;
use crate::db::ReferenceData;
use crate::detector::XRayDetector;
use crate::error::XraySimError;
use crate::gpu::{Device, FramebufferId, Program, TextureId};
use crate::scene::Scene;
use crate::volume::Image;

pub use display::DisplaySettings;

const NOT_INITIALISED: &str = "device resources are not allocated, call initialise()";

fn not_initialised() -> XraySimError {
    XraySimError::RendererNotReady(vec![NOT_INITIALISED.to_string()])
}

/// A texture and the framebuffer that renders into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    texture: TextureId,
    framebuffer: FramebufferId,
}

#[derive(Debug, Clone, Copy)]
struct Resources {
    l_buffer: Target,
    clean_l_buffer: Target,
    cumulated_l_buffer: Target,
    sum_mux: Target,
    energy_fluence: Target,
    display: Target,
    sum_mux_depth: u32,
}

impl Resources {
    fn targets(&self) -> [(&'static str, Target); 6] {
        [
            ("L-buffer", self.l_buffer),
            ("cleaned L-buffer", self.clean_l_buffer),
            ("cumulated L-buffer", self.cumulated_l_buffer),
            ("sum(mu x)", self.sum_mux),
            ("energy fluence", self.energy_fluence),
            ("display", self.display),
        ]
    }
}

/// Renders energy fluence images of a scene for a detector and a beam.
///
/// The detector and the beam are borrowed for the renderer's lifetime. A
/// different detector needs [`set_detector`](Self::set_detector) followed
/// by [`initialise`](Self::initialise); a beam with a different channel
/// count is picked up by the next render.
pub struct XRayRenderer<'a> {
    data: &'a ReferenceData,
    config: RendererConfig,
    detector: Option<&'a XRayDetector>,
    beam: Option<&'a XRayBeam>,
    scene: Scene,
    device: Option<Device>,
    resources: Option<Resources>,
    energy_fluence: Image,
    sinogram: Option<Image>,
    projection_set: Option<Image>,
}

impl<'a> XRayRenderer<'a> {
    pub fn new(data: &'a ReferenceData) -> Self {
        Self::with_config(data, RendererConfig::default())
    }

    pub fn with_config(data: &'a ReferenceData, config: RendererConfig) -> Self {
        XRayRenderer {
            data,
            config,
            detector: None,
            beam: None,
            scene: Scene::new(),
            device: None,
            resources: None,
            energy_fluence: Image::default(),
            sinogram: None,
            projection_set: None,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn reference_data(&self) -> &'a ReferenceData {
        self.data
    }

    pub fn detector(&self) -> Option<&'a XRayDetector> {
        self.detector
    }

    pub fn beam(&self) -> Option<&'a XRayBeam> {
        self.beam
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Scene access. Material buckets are rebuilt by every mutation.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Bind a detector. Device buffers are sized at the next `initialise()`.
    pub fn set_detector(&mut self, detector: &'a XRayDetector) {
        self.detector = Some(detector);
    }

    /// Bind a beam. The sum(mu x) buffer follows its channel count on the
    /// next render.
    pub fn set_beam(&mut self, beam: &'a XRayBeam) {
        self.beam = Some(beam);
    }

    /// Why the renderer cannot run, one line per problem. Empty when ready.
    pub fn readiness(&self) -> Vec<String> {
        let mut problems = Vec::new();
        match self.detector {
            None => problems.push("no X-ray detector has been set".to_string()),
            Some(detector) => {
                let [w, h] = detector.number_of_pixels();
                if w == 0 || h == 0 {
                    problems.push(format!("the detector has {w}x{h} pixels"));
                }
            }
        }
        match self.beam {
            None => problems.push("no X-ray beam has been set".to_string()),
            Some(beam) if beam.is_empty() => {
                problems.push("the X-ray beam has no energy channel".to_string())
            }
            Some(_) => {}
        }
        match (&self.device, &self.resources) {
            (Some(device), Some(resources)) => {
                for program in Program::ALL {
                    if !device.is_compiled(program) {
                        problems.push(format!("program {program:?} is not compiled"));
                    }
                }
                for (name, target) in resources.targets() {
                    if device.texture(target.texture).is_err() {
                        problems.push(format!("the {name} texture is missing"));
                    }
                }
            }
            _ => problems.push(NOT_INITIALISED.to_string()),
        }
        if !self.scene.has_geometry() {
            problems.push("the scene has no geometry".to_string());
        }
        for node in self
            .scene
            .inner_surfaces()
            .iter()
            .chain(self.scene.outer_surface())
        {
            if !node.material().is_set() {
                problems.push(format!("surface {} has no photon cross-section", node.name()));
            }
        }
        problems
    }

    pub fn is_ready(&self) -> bool {
        self.readiness().is_empty()
    }
}

impl Drop for XRayRenderer<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
