use nalgebra::Matrix4;

use crate::config::ArtefactFilter;
use crate::cross_section::PhotonCrossSection;
use crate::db::ReferenceData;
use crate::detector::Projection;
use crate::error::{Result, XraySimError};
use crate::gpu::{Device, Viewport};
use crate::mesh::{BoundingBox, PolygonMesh};
use crate::scene::{Scene, SceneGraphNode};
use crate::units::{CM, MEV};
use crate::volume::Image;

use super::passes;
use super::{Resources, Target, XRayRenderer, not_initialised};

/// Linear attenuation coefficient (cm^-1) of a material for every channel.
fn channel_mu(data: &ReferenceData, material: &PhotonCrossSection, energies: &[f64]) -> Result<Vec<f32>> {
    energies
        .iter()
        .map(|&e| Ok((material.linear_attenuation_coefficient(data, e)? * CM) as f32))
        .collect()
}

/// Everything one source sample needs, computed once per image.
struct SamplePlan<'s> {
    scene: &'s Scene,
    modelling: Matrix4<f64>,
    bucket_mu: Vec<Vec<f32>>,
    outer_mu: Option<Vec<f32>>,
    filter: ArtefactFilter,
    noise_fraction: f64,
    viewport: Viewport,
}

impl SamplePlan<'_> {
    fn placed<'n>(&self, nodes: impl IntoIterator<Item = &'n SceneGraphNode>) -> Vec<(&'n PolygonMesh, Matrix4<f64>)> {
        nodes
            .into_iter()
            .map(|node| (node.mesh(), self.modelling * node.transform()))
            .collect()
    }

    /// Render the L-buffer of some nodes and apply the artefact filter.
    /// Returns the target holding the final L-buffer.
    fn l_buffer(
        &self,
        device: &mut Device,
        resources: &Resources,
        projection: &Projection,
        placed: &[(&PolygonMesh, Matrix4<f64>)],
    ) -> Result<Target> {
        let bbox: BoundingBox = passes::render_l_buffer(
            device,
            resources.l_buffer,
            self.viewport,
            *projection,
            placed.iter().map(|&(mesh, m)| (mesh, m)),
        )?;
        match self.filter {
            ArtefactFilter::None => Ok(resources.l_buffer),
            ArtefactFilter::Gpu => {
                passes::clean_l_buffer(
                    device,
                    resources.l_buffer,
                    resources.clean_l_buffer,
                    self.viewport,
                    &bbox,
                    self.noise_fraction,
                )?;
                Ok(resources.clean_l_buffer)
            }
            ArtefactFilter::Cpu => {
                let world: Vec<PolygonMesh> = placed.iter().map(|(mesh, m)| mesh.transformed(m)).collect();
                let fixed = passes::filter_l_buffer_on_cpu(device, resources.l_buffer, projection, &world)?;
                if fixed > 0 {
                    log::debug!("CPU artefact filter corrected {fixed} pixels");
                }
                Ok(resources.l_buffer)
            }
        }
    }

    /// Fill the sum(mu x) buffer for one source sample.
    fn sum_mux(&self, device: &mut Device, resources: &Resources, projection: &Projection) -> Result<()> {
        let has_outer = self.scene.outer_surface().is_some();
        for (b, mu) in self.bucket_mu.iter().enumerate() {
            let placed = self.placed(self.scene.bucket(b));
            let l_buffer = self.l_buffer(device, resources, projection, &placed)?;
            passes::accumulate_sum_mux(device, l_buffer, resources.sum_mux, self.viewport, mu, b == 0)?;
            if has_outer {
                passes::cumulate_l_buffer(device, l_buffer, resources.cumulated_l_buffer, self.viewport, b == 0)?;
            }
        }

        if let (Some(outer), Some(mu)) = (self.scene.outer_surface(), &self.outer_mu) {
            let placed = self.placed([outer]);
            let l_buffer = self.l_buffer(device, resources, projection, &placed)?;
            if !self.bucket_mu.is_empty() {
                passes::subtract_inner_surfaces(device, l_buffer, resources.cumulated_l_buffer, self.viewport)?;
            }
            passes::accumulate_sum_mux(
                device,
                l_buffer,
                resources.sum_mux,
                self.viewport,
                mu,
                self.bucket_mu.is_empty(),
            )?;
        }
        Ok(())
    }
}

impl<'a> XRayRenderer<'a> {
    /// Render the energy fluence image of the scene under `modelling`.
    ///
    /// Extended sources are averaged over their samples. The returned image
    /// has row 0 at the bottom of the detector; values are in MeV.
    pub fn compute_image(&mut self, modelling: &Matrix4<f64>) -> Result<&Image> {
        let problems = self.readiness();
        if !problems.is_empty() {
            for problem in &problems {
                log::warn!("renderer not ready: {problem}");
            }
            return Err(XraySimError::RendererNotReady(problems));
        }
        self.ensure_sum_mux_depth()?;

        let detector = self.detector.ok_or(XraySimError::NoDetector)?;
        let beam = self.beam.ok_or(XraySimError::NoBeam)?;
        let energies: Vec<f64> = beam.channels().iter().map(|c| c.energy).collect();

        let scene = &self.scene;
        let bucket_mu = (0..scene.material_buckets().len())
            .map(|b| {
                let material = scene
                    .bucket(b)
                    .next()
                    .map(|node| node.material())
                    .ok_or(XraySimError::NoPropertiesSet)?;
                channel_mu(self.data, material, &energies)
            })
            .collect::<Result<Vec<_>>>()?;
        let outer_mu = scene
            .outer_surface()
            .map(|node| channel_mu(self.data, node.material(), &energies))
            .transpose()?;

        let [width, height] = detector.number_of_pixels();
        let plan = SamplePlan {
            scene,
            modelling: *modelling,
            bucket_mu,
            outer_mu,
            filter: self.config.artefact_filter,
            noise_fraction: self.config.clean_noise_fraction,
            viewport: Viewport::full(width, height),
        };

        let samples = detector.number_of_source_samples();
        let input_energy: Vec<f32> = beam
            .channels()
            .iter()
            .map(|c| (c.photon_count * (c.energy / MEV) / samples as f64) as f32)
            .collect();

        let device = self.device.as_mut().ok_or_else(not_initialised)?;
        let resources = self.resources.as_ref().ok_or_else(not_initialised)?;
        let mut fluence_empty = true;
        for sample in 0..samples {
            let projection = detector.projection(sample).ok_or_else(|| {
                XraySimError::DataError(format!("source sample {sample} does not exist"))
            })?;
            plan.sum_mux(device, resources, &projection)?;
            passes::accumulate_energy_fluence(
                device,
                resources.sum_mux,
                resources.energy_fluence,
                plan.viewport,
                &input_energy,
                fluence_empty,
            )?;
            fluence_empty = false;
        }
        log::debug!("rendered {samples} source samples, {} channels", energies.len());

        let pixel_size = detector.pixel_size();
        let data = device.read_channel(resources.energy_fluence.texture, 0, 0)?;
        self.energy_fluence = Image::from_data(width as usize, height as usize, 1, data)?
            .with_spacing([pixel_size.x, pixel_size.y, 1.0])
            .with_label("Energy fluence (MeV)");
        Ok(&self.energy_fluence)
    }

    /// Range of the last energy fluence image for display.
    ///
    /// Non-finite pixels are ignored. A flat image gives a zero minimum, a
    /// negative minimum is raised to zero, and the maximum never exceeds
    /// the beam's total energy.
    pub fn energy_fluence_min_max(&self) -> Result<(f64, f64)> {
        let beam = self.beam.ok_or(XraySimError::NoBeam)?;
        let Some((min, max)) = self.energy_fluence.finite_min_max() else {
            return Ok((0.0, 0.0));
        };
        let (mut min, max) = (f64::from(min), f64::from(max));
        if min == max || min < 0.0 {
            min = 0.0;
        }
        Ok((min, max.min(beam.total_energy())))
    }
}
