use super::device::{Texture, TextureId};

/// The device programs. Each full-screen pass names the one it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    LBuffer,
    CleanLBuffer,
    Cumulate,
    OuterSurface,
    SumMuxDx,
    EnergyFluence,
    Display,
}

impl Program {
    pub const ALL: [Program; 7] = [
        Program::LBuffer,
        Program::CleanLBuffer,
        Program::Cumulate,
        Program::OuterSurface,
        Program::SumMuxDx,
        Program::EnergyFluence,
        Program::Display,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToneCurve {
    Linear,
    Log,
    Power(f64),
}

/// Maps a fluence value to `[0, 1]`: `curve(x) + shift`, times `scale`,
/// optionally inverted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneMapping {
    pub curve: ToneCurve,
    pub shift: f64,
    pub scale: f64,
    pub negative: bool,
}

impl ToneMapping {
    pub fn apply(&self, x: f64) -> f64 {
        let curved = match self.curve {
            ToneCurve::Linear => x,
            ToneCurve::Log => (x + 1.0e-9).log10(),
            ToneCurve::Power(gamma) => x.max(0.0).powf(gamma),
        };
        let out = ((curved + self.shift) * self.scale).clamp(0.0, 1.0);
        if self.negative { 1.0 - out } else { out }
    }
}

/// A full-screen pass and its inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuadPass {
    /// Zero path lengths outside `[min_length, max_length]` (cm).
    Clean {
        input: TextureId,
        min_length: f32,
        max_length: f32,
    },
    /// Copy an L-buffer.
    Cumulate { input: TextureId },
    /// Negated path length of the cumulated inner surfaces, for additive
    /// blending over the outer surface's L-buffer.
    OuterSurface { cumulated: TextureId },
    /// Path length times linear attenuation coefficient (cm^-1).
    SumMuxDx { l_buffer: TextureId, mu: f32 },
    /// `energy * exp(-sum_mux)` for one energy channel.
    EnergyFluence {
        sum_mux: TextureId,
        layer: u32,
        energy: f32,
    },
    Display {
        input: TextureId,
        tone: ToneMapping,
    },
}

impl QuadPass {
    pub fn program(&self) -> Program {
        match self {
            QuadPass::Clean { .. } => Program::CleanLBuffer,
            QuadPass::Cumulate { .. } => Program::Cumulate,
            QuadPass::OuterSurface { .. } => Program::OuterSurface,
            QuadPass::SumMuxDx { .. } => Program::SumMuxDx,
            QuadPass::EnergyFluence { .. } => Program::EnergyFluence,
            QuadPass::Display { .. } => Program::Display,
        }
    }

    pub fn inputs(&self) -> Vec<TextureId> {
        match *self {
            QuadPass::Clean { input, .. }
            | QuadPass::Cumulate { input }
            | QuadPass::Display { input, .. } => vec![input],
            QuadPass::OuterSurface { cumulated } => vec![cumulated],
            QuadPass::SumMuxDx { l_buffer, .. } => vec![l_buffer],
            QuadPass::EnergyFluence { sum_mux, .. } => vec![sum_mux],
        }
    }

    /// Output of one pixel. `inputs` are the textures named by `inputs()`.
    pub fn shade(&self, inputs: &[&Texture], x: u32, y: u32) -> [f32; 3] {
        let input = inputs[0];
        match *self {
            QuadPass::Clean {
                min_length,
                max_length,
                ..
            } => {
                let l = input.fetch(x, y, 0, 0);
                let kept = if (min_length..=max_length).contains(&l.abs()) { l } else { 0.0 };
                [kept, input.fetch(x, y, 0, 1), input.fetch(x, y, 0, 2)]
            }
            QuadPass::Cumulate { .. } => [
                input.fetch(x, y, 0, 0),
                input.fetch(x, y, 0, 1),
                input.fetch(x, y, 0, 2),
            ],
            QuadPass::OuterSurface { .. } => [-input.fetch(x, y, 0, 0), 0.0, 0.0],
            QuadPass::SumMuxDx { mu, .. } => [input.fetch(x, y, 0, 0) * mu, 0.0, 0.0],
            QuadPass::EnergyFluence { layer, energy, .. } => {
                [energy * (-input.fetch(x, y, layer, 0)).exp(), 0.0, 0.0]
            }
            QuadPass::Display { tone, .. } => {
                [tone.apply(f64::from(input.fetch(x, y, 0, 0))) as f32, 0.0, 0.0]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tone_mapping_curves() {
        let linear = ToneMapping {
            curve: ToneCurve::Linear,
            shift: -1.0,
            scale: 0.5,
            negative: false,
        };
        assert_relative_eq!(linear.apply(2.0), 0.5);
        assert_relative_eq!(linear.apply(10.0), 1.0);
        assert_relative_eq!(linear.apply(0.0), 0.0);

        let negative = ToneMapping {
            negative: true,
            ..linear
        };
        assert_relative_eq!(negative.apply(2.0), 0.5);
        assert_relative_eq!(negative.apply(3.0), 0.0);

        let log = ToneMapping {
            curve: ToneCurve::Log,
            shift: 0.0,
            scale: 0.5,
            negative: false,
        };
        assert_relative_eq!(log.apply(10.0), 0.5, epsilon = 1e-9);

        let power = ToneMapping {
            curve: ToneCurve::Power(0.5),
            shift: 0.0,
            scale: 0.25,
            negative: false,
        };
        assert_relative_eq!(power.apply(4.0), 0.5);
    }
}
