use crate::config::TextureFormat;
use crate::error::{Result, XraySimError};
use crate::gpu::{Device, DeviceLimits, Program};
use crate::units::{CM, KEV};
use crate::volume::Image;

use super::{Resources, Target, XRayRenderer, not_initialised};

fn create_target(
    device: &mut Device,
    width: u32,
    height: u32,
    layers: u32,
    channels: usize,
    format: TextureFormat,
) -> Result<Target> {
    let texture = device.create_texture(width, height, layers, channels, format)?;
    let framebuffer = device.create_framebuffer(texture)?;
    Ok(Target {
        texture,
        framebuffer,
    })
}

fn delete_target(device: &mut Device, name: &str, target: Target) {
    if let Err(e) = device.delete_framebuffer(target.framebuffer) {
        log::error!("failed to delete the {name} framebuffer: {e}");
    }
    if let Err(e) = device.delete_texture(target.texture) {
        log::error!("failed to delete the {name} texture: {e}");
    }
}

impl<'a> XRayRenderer<'a> {
    /// Allocate device resources for the bound detector and beam.
    ///
    /// Any previous resources are released first. Fails without allocating
    /// anything when the detector or beam is missing or the detector has no
    /// pixels.
    pub fn initialise(&mut self) -> Result<()> {
        self.config.validate()?;
        let detector = self.detector.ok_or(XraySimError::NoDetector)?;
        let beam = self.beam.ok_or(XraySimError::NoBeam)?;
        if beam.is_empty() {
            return Err(XraySimError::NoBeam);
        }
        let [width, height] = detector.number_of_pixels();
        if width == 0 || height == 0 {
            return Err(XraySimError::InvalidDetectorSize { width, height });
        }

        self.release();

        if let Some(energy) = beam.max_energy() {
            let mu = self.data.mu_water().linear_interpolation(energy)?;
            log::debug!("mu water at {} keV: {} cm-1", energy / KEV, mu * CM);
        }

        let mut device = Device::new(DeviceLimits {
            max_texture_size: self.config.max_texture_size,
            max_texture_layers: self.config.max_texture_layers,
        });
        for program in Program::ALL {
            device.compile(program);
        }

        let format = self.config.texture_format;
        let depth = channel_depth(beam.channel_count())?;
        let resources = Resources {
            l_buffer: create_target(&mut device, width, height, 1, 3, format)?,
            clean_l_buffer: create_target(&mut device, width, height, 1, 3, format)?,
            cumulated_l_buffer: create_target(&mut device, width, height, 1, 3, format)?,
            sum_mux: create_target(&mut device, width, height, depth, 1, TextureFormat::Rgb32F)?,
            energy_fluence: create_target(&mut device, width, height, 1, 1, TextureFormat::Rgb32F)?,
            display: create_target(&mut device, width, height, 1, 1, TextureFormat::Rgb32F)?,
            sum_mux_depth: depth,
        };

        self.device = Some(device);
        self.resources = Some(resources);
        self.energy_fluence = Image::new(width as usize, height as usize, 1);
        log::info!(
            "initialised a {width}x{height} renderer with {depth} energy channels ({:?}, {:?} artefact filter, {:.3} MeV incident)",
            format,
            self.config.artefact_filter,
            beam.total_energy()
        );
        Ok(())
    }

    /// Delete all device resources. Failures are logged and do not stop
    /// the remaining deletions.
    pub fn release(&mut self) {
        let (Some(mut device), resources) = (self.device.take(), self.resources.take()) else {
            return;
        };
        if let Some(resources) = resources {
            for (name, target) in resources.targets() {
                delete_target(&mut device, name, target);
            }
        }
        log::info!("released renderer device resources");
    }

    /// Reallocate the sum(mu x) buffer when the beam's channel count no
    /// longer matches its depth.
    pub(super) fn ensure_sum_mux_depth(&mut self) -> Result<()> {
        let beam = self.beam.ok_or(XraySimError::NoBeam)?;
        let Self {
            device, resources, ..
        } = self;
        let (Some(device), Some(resources)) = (device.as_mut(), resources.as_mut()) else {
            return Err(not_initialised());
        };
        let depth = channel_depth(beam.channel_count())?;
        if depth == resources.sum_mux_depth {
            return Ok(());
        }
        log::warn!(
            "beam has {depth} channels, reallocating the sum(mu x) buffer from {} layers",
            resources.sum_mux_depth
        );
        let (width, height) = {
            let texture = device.texture(resources.sum_mux.texture)?;
            (texture.width(), texture.height())
        };
        let replacement = create_target(device, width, height, depth, 1, TextureFormat::Rgb32F)?;
        delete_target(device, "sum(mu x)", resources.sum_mux);
        resources.sum_mux = replacement;
        resources.sum_mux_depth = depth;
        Ok(())
    }
}

fn channel_depth(channels: usize) -> Result<u32> {
    u32::try_from(channels)
        .map_err(|_| XraySimError::DeviceCapability(format!("{channels} energy channels")))
}
