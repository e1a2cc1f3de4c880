//! Device passes. Each one runs under a [`StateGuard`] and leaves the
//! pipeline state as it found it.

use nalgebra::Matrix4;
use rayon::prelude::*;

use crate::detector::Projection;
use crate::error::Result;
use crate::gpu::{BlendMode, Device, Program, QuadPass, StateGuard, ToneMapping, Viewport};
use crate::mesh::{BoundingBox, PolygonMesh};
use crate::units::CM;

use super::Target;

fn first_or_add(first: bool) -> BlendMode {
    if first { BlendMode::Replace } else { BlendMode::Add }
}

/// Rasterize meshes, each with its own modelview, into a cleared L-buffer.
/// Returns the world bounding box of what was drawn.
pub(super) fn render_l_buffer<'m>(
    device: &mut Device,
    target: Target,
    viewport: Viewport,
    projection: Projection,
    meshes: impl IntoIterator<Item = (&'m PolygonMesh, Matrix4<f64>)>,
) -> Result<BoundingBox> {
    let mut gpu = StateGuard::new(device);
    gpu.use_program(Program::LBuffer)?;
    gpu.bind_framebuffer(target.framebuffer, 0)?;
    gpu.set_viewport(viewport);
    gpu.set_depth_test(false);
    gpu.set_projection(Some(projection));
    gpu.clear(0.0)?;
    gpu.set_blend(BlendMode::Add);

    let mut bbox = BoundingBox::empty();
    for (mesh, modelview) in meshes {
        gpu.set_modelview(modelview);
        let stats = gpu.draw_mesh(mesh)?;
        if stats.rejected > 0 {
            log::warn!(
                "{} of {} triangles have a vertex behind the X-ray source and were skipped",
                stats.rejected,
                stats.triangles
            );
        }
        log::trace!("L-buffer draw: {} fragments", stats.fragments);
        bbox = bbox.union(&mesh.bounding_box().transformed(&modelview));
    }
    Ok(bbox)
}

/// Zero path lengths that are too short to be real or longer than the
/// bounding-box diagonal.
pub(super) fn clean_l_buffer(
    device: &mut Device,
    input: Target,
    output: Target,
    viewport: Viewport,
    bbox: &BoundingBox,
    noise_fraction: f64,
) -> Result<()> {
    let diagonal_cm = bbox.diagonal() / CM;
    let mut gpu = StateGuard::new(device);
    gpu.use_program(Program::CleanLBuffer)?;
    gpu.bind_framebuffer(output.framebuffer, 0)?;
    gpu.set_viewport(viewport);
    gpu.set_blend(BlendMode::Replace);
    gpu.draw_quad(&QuadPass::Clean {
        input: input.texture,
        min_length: (noise_fraction * diagonal_cm) as f32,
        max_length: diagonal_cm as f32,
    })
}

/// Re-cast every pixel whose crossings do not balance against the
/// world-space meshes and keep the analytic path length when the ray
/// crosses the surfaces ahead of its origin an even number of times.
pub(super) fn filter_l_buffer_on_cpu(
    device: &mut Device,
    target: Target,
    projection: &Projection,
    world_meshes: &[PolygonMesh],
) -> Result<usize> {
    let mut pixels = device.read_layer(target.texture, 0)?;
    let width = projection.pixels[0] as usize;
    let fixed: usize = pixels
        .par_chunks_mut(width * 3)
        .enumerate()
        .map(|(y, row)| {
            let mut fixed = 0;
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                if px[1].abs() <= 0.5 {
                    continue;
                }
                let (origin, direction) = projection.ray(x as f64, y as f64);
                let hits: Vec<_> = world_meshes
                    .iter()
                    .flat_map(|mesh| mesh.ray_intersections(&origin, &direction))
                    .filter(|hit| hit.t > 0.0)
                    .collect();
                if !hits.is_empty() && hits.len() % 2 == 0 {
                    let length: f64 = hits.iter().map(|h| h.sign * h.t).sum();
                    px[0] = (length / CM) as f32;
                    px[1] = hits.iter().map(|h| h.sign as f32).sum();
                    px[2] = hits.len() as f32;
                    fixed += 1;
                }
            }
            fixed
        })
        .sum();
    device.upload(target.texture, 0, &pixels)?;
    Ok(fixed)
}

/// Copy an L-buffer into the cumulated L-buffer, or add it.
pub(super) fn cumulate_l_buffer(
    device: &mut Device,
    input: Target,
    cumulated: Target,
    viewport: Viewport,
    first: bool,
) -> Result<()> {
    let mut gpu = StateGuard::new(device);
    gpu.use_program(Program::Cumulate)?;
    gpu.bind_framebuffer(cumulated.framebuffer, 0)?;
    gpu.set_viewport(viewport);
    gpu.set_blend(first_or_add(first));
    gpu.draw_quad(&QuadPass::Cumulate {
        input: input.texture,
    })
}

/// Subtract the cumulated inner L-buffers from the outer surface's.
pub(super) fn subtract_inner_surfaces(
    device: &mut Device,
    outer: Target,
    cumulated: Target,
    viewport: Viewport,
) -> Result<()> {
    let mut gpu = StateGuard::new(device);
    gpu.use_program(Program::OuterSurface)?;
    gpu.bind_framebuffer(outer.framebuffer, 0)?;
    gpu.set_viewport(viewport);
    gpu.set_blend(BlendMode::Add);
    gpu.draw_quad(&QuadPass::OuterSurface {
        cumulated: cumulated.texture,
    })
}

/// Write or add `L * mu` into every layer of the sum(mu x) buffer, one
/// layer per energy channel. `mu` is in cm^-1.
pub(super) fn accumulate_sum_mux(
    device: &mut Device,
    l_buffer: Target,
    sum_mux: Target,
    viewport: Viewport,
    mu: &[f32],
    first: bool,
) -> Result<()> {
    let mut gpu = StateGuard::new(device);
    gpu.use_program(Program::SumMuxDx)?;
    gpu.set_viewport(viewport);
    gpu.set_blend(first_or_add(first));
    for (layer, &mu) in mu.iter().enumerate() {
        gpu.bind_framebuffer(sum_mux.framebuffer, layer as u32)?;
        gpu.draw_quad(&QuadPass::SumMuxDx {
            l_buffer: l_buffer.texture,
            mu,
        })?;
    }
    Ok(())
}

/// Add the transmitted energy of every channel to the fluence image. The
/// first channel overwrites when `first` is set.
pub(super) fn accumulate_energy_fluence(
    device: &mut Device,
    sum_mux: Target,
    fluence: Target,
    viewport: Viewport,
    input_energy: &[f32],
    first: bool,
) -> Result<()> {
    let mut gpu = StateGuard::new(device);
    gpu.use_program(Program::EnergyFluence)?;
    gpu.bind_framebuffer(fluence.framebuffer, 0)?;
    gpu.set_viewport(viewport);
    for (layer, &energy) in input_energy.iter().enumerate() {
        gpu.set_blend(first_or_add(first && layer == 0));
        gpu.draw_quad(&QuadPass::EnergyFluence {
            sum_mux: sum_mux.texture,
            layer: layer as u32,
            energy,
        })?;
    }
    Ok(())
}

pub(super) fn tone_map(
    device: &mut Device,
    input: Target,
    output: Target,
    viewport: Viewport,
    tone: ToneMapping,
) -> Result<()> {
    let mut gpu = StateGuard::new(device);
    gpu.use_program(Program::Display)?;
    gpu.bind_framebuffer(output.framebuffer, 0)?;
    gpu.set_viewport(viewport);
    gpu.set_blend(BlendMode::Replace);
    gpu.draw_quad(&QuadPass::Display {
        input: input.texture,
        tone,
    })
}
