use std::collections::HashMap;

use half::f16;
use nalgebra::Matrix4;

use crate::config::TextureFormat;
use crate::detector::Projection;
use crate::error::{Result, XraySimError};
use crate::mesh::PolygonMesh;

use super::programs::{Program, QuadPass};
use super::raster::{Fragment, RasterStats, rasterize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Replace,
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Viewport {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Everything a pass may change and must put back.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub program: Option<Program>,
    pub framebuffer: Option<FramebufferId>,
    pub layer: u32,
    pub blend: BlendMode,
    /// Keep only the nearest fragment per pixel of each mesh draw.
    pub depth_test: bool,
    pub viewport: Viewport,
    pub projection: Option<Projection>,
    pub modelview: Matrix4<f64>,
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState {
            program: None,
            framebuffer: None,
            layer: 0,
            blend: BlendMode::Replace,
            depth_test: false,
            viewport: Viewport::default(),
            projection: None,
            modelview: Matrix4::identity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_texture_size: u32,
    pub max_texture_layers: u32,
}

/// A layered float texture, channels interleaved.
#[derive(Debug, Clone)]
pub struct Texture {
    width: u32,
    height: u32,
    layers: u32,
    channels: usize,
    format: TextureFormat,
    data: Vec<f32>,
}

impl Texture {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    fn layer_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels
    }

    fn offset(&self, x: u32, y: u32, layer: u32) -> usize {
        ((layer as usize * self.height as usize + y as usize) * self.width as usize + x as usize)
            * self.channels
    }

    /// Value of one channel, zero outside the texture.
    pub fn fetch(&self, x: u32, y: u32, layer: u32, channel: usize) -> f32 {
        if x >= self.width || y >= self.height || layer >= self.layers || channel >= self.channels {
            return 0.0;
        }
        self.data[self.offset(x, y, layer) + channel]
    }

    fn quantize(&self, value: f32) -> f32 {
        match self.format {
            TextureFormat::Rgb16F => f16::from_f32(value).to_f32(),
            TextureFormat::Rgb32F => value,
        }
    }

    fn write(&mut self, x: u32, y: u32, layer: u32, value: &[f32], blend: BlendMode) {
        let offset = self.offset(x, y, layer);
        for c in 0..self.channels.min(value.len()) {
            let v = match blend {
                BlendMode::Replace => value[c],
                BlendMode::Add => self.data[offset + c] + value[c],
            };
            self.data[offset + c] = self.quantize(v);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Framebuffer {
    texture: TextureId,
}

/// Software rendering device.
///
/// Resources are addressed by id, a single pipeline state is current at a
/// time, and every draw is synchronous: a read-back always sees the result
/// of all earlier draws.
#[derive(Debug)]
pub struct Device {
    limits: DeviceLimits,
    textures: HashMap<TextureId, Texture>,
    framebuffers: HashMap<FramebufferId, Framebuffer>,
    compiled: Vec<Program>,
    state: PipelineState,
    next_id: u32,
}

impl Device {
    pub fn new(limits: DeviceLimits) -> Self {
        Device {
            limits,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            compiled: Vec::new(),
            state: PipelineState::default(),
            next_id: 1,
        }
    }

    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // Programs

    pub fn compile(&mut self, program: Program) {
        if !self.compiled.contains(&program) {
            log::debug!("compiled program {program:?}");
            self.compiled.push(program);
        }
    }

    pub fn is_compiled(&self, program: Program) -> bool {
        self.compiled.contains(&program)
    }

    pub fn use_program(&mut self, program: Program) -> Result<()> {
        if !self.is_compiled(program) {
            return Err(XraySimError::UnknownResource(format!(
                "program {program:?} has not been compiled"
            )));
        }
        self.state.program = Some(program);
        Ok(())
    }

    // Textures

    pub fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        layers: u32,
        channels: usize,
        format: TextureFormat,
    ) -> Result<TextureId> {
        if width == 0 || height == 0 || layers == 0 || channels == 0 {
            return Err(XraySimError::ResourceCreation(format!(
                "empty texture {width}x{height}x{layers} with {channels} channels"
            )));
        }
        if width > self.limits.max_texture_size || height > self.limits.max_texture_size {
            return Err(XraySimError::DeviceCapability(format!(
                "texture {width}x{height} exceeds the maximum size {}",
                self.limits.max_texture_size
            )));
        }
        if layers > self.limits.max_texture_layers {
            return Err(XraySimError::DeviceCapability(format!(
                "{layers} texture layers exceed the maximum {}",
                self.limits.max_texture_layers
            )));
        }
        let len = width as usize * height as usize * layers as usize * channels;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            XraySimError::OutOfMemory(format!("texture {width}x{height}x{layers}: {e}"))
        })?;
        data.resize(len, 0.0);

        let id = TextureId(self.next_id());
        self.textures.insert(
            id,
            Texture {
                width,
                height,
                layers,
                channels,
                format,
                data,
            },
        );
        Ok(id)
    }

    pub fn delete_texture(&mut self, id: TextureId) -> Result<()> {
        self.textures
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| XraySimError::UnknownResource(format!("texture {id:?}")))
    }

    pub fn texture(&self, id: TextureId) -> Result<&Texture> {
        self.textures
            .get(&id)
            .ok_or_else(|| XraySimError::UnknownResource(format!("texture {id:?}")))
    }

    fn texture_mut(&mut self, id: TextureId) -> Result<&mut Texture> {
        self.textures
            .get_mut(&id)
            .ok_or_else(|| XraySimError::UnknownResource(format!("texture {id:?}")))
    }

    /// Replace one layer. `data` holds interleaved channels.
    pub fn upload(&mut self, id: TextureId, layer: u32, data: &[f32]) -> Result<()> {
        let texture = self.texture_mut(id)?;
        let len = texture.layer_len();
        if layer >= texture.layers || data.len() != len {
            return Err(XraySimError::DataError(format!(
                "upload of {} values to layer {layer} of texture {id:?}",
                data.len()
            )));
        }
        let start = layer as usize * len;
        let format = texture.format;
        for (dst, &src) in texture.data[start..start + len].iter_mut().zip(data) {
            *dst = match format {
                TextureFormat::Rgb16F => f16::from_f32(src).to_f32(),
                TextureFormat::Rgb32F => src,
            };
        }
        Ok(())
    }

    /// One channel of one layer, row 0 first.
    pub fn read_channel(&self, id: TextureId, layer: u32, channel: usize) -> Result<Vec<f32>> {
        let texture = self.texture(id)?;
        if layer >= texture.layers || channel >= texture.channels {
            return Err(XraySimError::DataError(format!(
                "read of channel {channel} of layer {layer} of texture {id:?}"
            )));
        }
        let len = texture.layer_len();
        let start = layer as usize * len;
        Ok(texture.data[start..start + len]
            .iter()
            .skip(channel)
            .step_by(texture.channels)
            .copied()
            .collect())
    }

    /// Interleaved channels of one layer.
    pub fn read_layer(&self, id: TextureId, layer: u32) -> Result<Vec<f32>> {
        let texture = self.texture(id)?;
        if layer >= texture.layers {
            return Err(XraySimError::DataError(format!(
                "read of layer {layer} of texture {id:?}"
            )));
        }
        let len = texture.layer_len();
        let start = layer as usize * len;
        Ok(texture.data[start..start + len].to_vec())
    }

    // Framebuffers

    pub fn create_framebuffer(&mut self, texture: TextureId) -> Result<FramebufferId> {
        if !self.textures.contains_key(&texture) {
            return Err(XraySimError::ResourceCreation(format!(
                "framebuffer attachment {texture:?} does not exist"
            )));
        }
        let id = FramebufferId(self.next_id());
        self.framebuffers.insert(id, Framebuffer { texture });
        Ok(id)
    }

    pub fn delete_framebuffer(&mut self, id: FramebufferId) -> Result<()> {
        if self.state.framebuffer == Some(id) {
            self.state.framebuffer = None;
        }
        self.framebuffers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| XraySimError::UnknownResource(format!("framebuffer {id:?}")))
    }

    pub fn bind_framebuffer(&mut self, id: FramebufferId, layer: u32) -> Result<()> {
        let framebuffer = self
            .framebuffers
            .get(&id)
            .ok_or_else(|| XraySimError::UnknownResource(format!("framebuffer {id:?}")))?;
        let texture = self.texture(framebuffer.texture)?;
        if layer >= texture.layers {
            return Err(XraySimError::UnknownResource(format!(
                "layer {layer} of framebuffer {id:?}"
            )));
        }
        self.state.framebuffer = Some(id);
        self.state.layer = layer;
        Ok(())
    }

    pub fn unbind_framebuffer(&mut self) {
        self.state.framebuffer = None;
        self.state.layer = 0;
    }

    fn target(&self) -> Result<TextureId> {
        let id = self
            .state
            .framebuffer
            .ok_or_else(|| XraySimError::UnknownResource("no framebuffer bound".to_string()))?;
        self.framebuffers
            .get(&id)
            .map(|f| f.texture)
            .ok_or_else(|| XraySimError::UnknownResource(format!("framebuffer {id:?}")))
    }

    // State

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn restore_state(&mut self, state: PipelineState) {
        self.state = state;
    }

    pub fn set_blend(&mut self, blend: BlendMode) {
        self.state.blend = blend;
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.state.viewport = viewport;
    }

    pub fn set_projection(&mut self, projection: Option<Projection>) {
        self.state.projection = projection;
    }

    pub fn set_modelview(&mut self, modelview: Matrix4<f64>) {
        self.state.modelview = modelview;
    }

    fn check_program(&self, expected: Program) -> Result<()> {
        if self.state.program != Some(expected) {
            return Err(XraySimError::UnknownResource(format!(
                "draw needs program {expected:?}, bound {:?}",
                self.state.program
            )));
        }
        Ok(())
    }

    /// Pixels of the viewport that fall inside `texture`.
    fn clipped_viewport(&self, texture: &Texture) -> (std::ops::Range<u32>, std::ops::Range<u32>) {
        let v = self.state.viewport;
        let xs = v.x.min(texture.width)..(v.x.saturating_add(v.width)).min(texture.width);
        let ys = v.y.min(texture.height)..(v.y.saturating_add(v.height)).min(texture.height);
        (xs, ys)
    }

    // Drawing

    /// Set every channel of the viewport region of the bound layer.
    pub fn clear(&mut self, value: f32) -> Result<()> {
        let id = self.target()?;
        let layer = self.state.layer;
        let (xs, ys) = self.clipped_viewport(self.texture(id)?);
        let texture = self.texture_mut(id)?;
        let fill = vec![value; texture.channels];
        for y in ys {
            for x in xs.clone() {
                texture.write(x, y, layer, &fill, BlendMode::Replace);
            }
        }
        Ok(())
    }

    /// Rasterize a mesh with the bound projection and modelview into the
    /// bound framebuffer using the L-buffer program.
    pub fn draw_mesh(&mut self, mesh: &PolygonMesh) -> Result<RasterStats> {
        self.check_program(Program::LBuffer)?;
        let projection = self
            .state
            .projection
            .ok_or_else(|| XraySimError::UnknownResource("no projection bound".to_string()))?;
        let id = self.target()?;
        let (xs, ys) = self.clipped_viewport(self.texture(id)?);
        let layer = self.state.layer;
        let blend = self.state.blend;
        let depth_test = self.state.depth_test;
        let modelview = self.state.modelview;
        let texture = self.texture_mut(id)?;

        let mut nearest: HashMap<(u32, u32), Fragment> = HashMap::new();
        let stats = rasterize(mesh, &modelview, &projection, |f| {
            if !xs.contains(&f.x) || !ys.contains(&f.y) {
                return;
            }
            if depth_test {
                nearest
                    .entry((f.x, f.y))
                    .and_modify(|kept| {
                        if f.depth < kept.depth {
                            *kept = f;
                        }
                    })
                    .or_insert(f);
            } else {
                texture.write(f.x, f.y, layer, &f.value, blend);
            }
        });
        for f in nearest.values() {
            texture.write(f.x, f.y, layer, &f.value, blend);
        }
        Ok(stats)
    }

    /// Run a full-screen pass over the viewport of the bound framebuffer.
    pub fn draw_quad(&mut self, pass: &QuadPass) -> Result<()> {
        self.check_program(pass.program())?;
        let id = self.target()?;
        let (xs, ys) = self.clipped_viewport(self.texture(id)?);
        let inputs = pass
            .inputs()
            .into_iter()
            .map(|input| self.texture(input))
            .collect::<Result<Vec<_>>>()?;
        for input in &inputs {
            if input.width < xs.end || input.height < ys.end {
                return Err(XraySimError::DeviceCapability(format!(
                    "input texture {}x{} is smaller than the viewport",
                    input.width, input.height
                )));
            }
        }

        let mut shaded = Vec::with_capacity(xs.len() * ys.len());
        for y in ys.clone() {
            for x in xs.clone() {
                shaded.push(pass.shade(&inputs, x, y));
            }
        }

        let layer = self.state.layer;
        let blend = self.state.blend;
        let texture = self.texture_mut(id)?;
        let mut values = shaded.into_iter();
        for y in ys {
            for x in xs.clone() {
                if let Some(value) = values.next() {
                    texture.write(x, y, layer, &value, blend);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device::new(DeviceLimits {
            max_texture_size: 64,
            max_texture_layers: 4,
        })
    }

    #[test]
    fn test_capability_limits() {
        let mut device = device();
        assert!(matches!(
            device.create_texture(65, 1, 1, 1, TextureFormat::Rgb32F),
            Err(XraySimError::DeviceCapability(_))
        ));
        assert!(matches!(
            device.create_texture(1, 1, 5, 1, TextureFormat::Rgb32F),
            Err(XraySimError::DeviceCapability(_))
        ));
        assert!(matches!(
            device.create_texture(0, 1, 1, 1, TextureFormat::Rgb32F),
            Err(XraySimError::ResourceCreation(_))
        ));
    }

    #[test]
    fn test_delete_unknown_resource() {
        let mut device = device();
        let texture = device.create_texture(2, 2, 1, 3, TextureFormat::Rgb32F).unwrap();
        let framebuffer = device.create_framebuffer(texture).unwrap();
        device.delete_framebuffer(framebuffer).unwrap();
        device.delete_texture(texture).unwrap();
        assert!(matches!(
            device.delete_texture(texture),
            Err(XraySimError::UnknownResource(_))
        ));
        assert!(matches!(
            device.delete_framebuffer(framebuffer),
            Err(XraySimError::UnknownResource(_))
        ));
        assert!(matches!(
            device.create_framebuffer(texture),
            Err(XraySimError::ResourceCreation(_))
        ));
    }

    #[test]
    fn test_half_precision_upload_is_quantized() {
        let mut device = device();
        let texture = device.create_texture(1, 1, 1, 1, TextureFormat::Rgb16F).unwrap();
        device.upload(texture, 0, &[1.0 + 1.0e-4]).unwrap();
        assert_eq!(device.read_channel(texture, 0, 0).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_clear_and_read_back_layers() {
        let mut device = device();
        let texture = device.create_texture(2, 1, 2, 2, TextureFormat::Rgb32F).unwrap();
        let framebuffer = device.create_framebuffer(texture).unwrap();
        device.set_viewport(Viewport::full(2, 1));
        device.bind_framebuffer(framebuffer, 1).unwrap();
        device.clear(3.0).unwrap();
        assert_eq!(device.read_channel(texture, 0, 1).unwrap(), vec![0.0, 0.0]);
        assert_eq!(device.read_layer(texture, 1).unwrap(), vec![3.0; 4]);
        assert!(device.bind_framebuffer(framebuffer, 2).is_err());
    }

    #[test]
    fn test_depth_test_keeps_nearest_surface() {
        use crate::detector::XRayDetector;
        use nalgebra::{Point3, Vector3};

        let mut detector = XRayDetector::new();
        detector.set_detector_position(Point3::new(0.0, 0.0, 100.0));
        detector.set_up_vector(Vector3::y());
        detector.set_parallel_beam(Point3::new(0.0, 0.0, -100.0));
        detector.set_number_of_pixels(1, 1);

        let mut device = device();
        let texture = device.create_texture(1, 1, 1, 3, TextureFormat::Rgb32F).unwrap();
        let framebuffer = device.create_framebuffer(texture).unwrap();
        device.compile(Program::LBuffer);
        device.use_program(Program::LBuffer).unwrap();
        device.bind_framebuffer(framebuffer, 0).unwrap();
        device.set_viewport(Viewport::full(1, 1));
        device.set_projection(detector.projection(0));
        device.set_blend(BlendMode::Add);

        device.draw_mesh(&PolygonMesh::cube(20.0)).unwrap();
        assert_eq!(device.read_layer(texture, 0).unwrap(), vec![2.0, 0.0, 2.0]);

        device.clear(0.0).unwrap();
        device.set_depth_test(true);
        device.draw_mesh(&PolygonMesh::cube(20.0)).unwrap();
        // The depth test keeps the smallest ray distance: the face the ray
        // reaches first, 9 cm from the detector plane.
        assert_eq!(device.read_layer(texture, 0).unwrap(), vec![-9.0, -1.0, 1.0]);
    }

    #[test]
    fn test_draw_requires_bound_program() {
        let mut device = device();
        let texture = device.create_texture(1, 1, 1, 3, TextureFormat::Rgb32F).unwrap();
        let framebuffer = device.create_framebuffer(texture).unwrap();
        device.bind_framebuffer(framebuffer, 0).unwrap();
        assert!(device.draw_mesh(&PolygonMesh::cube(1.0)).is_err());
        assert!(device.use_program(Program::LBuffer).is_err());
        device.compile(Program::LBuffer);
        device.use_program(Program::LBuffer).unwrap();
        // Still no projection bound.
        assert!(device.draw_mesh(&PolygonMesh::cube(1.0)).is_err());
    }
}
