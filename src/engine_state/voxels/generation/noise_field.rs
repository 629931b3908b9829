//! Seeded fractal noise channels normalized to `[0, 1]`.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::core::NoiseParams;

/// Seed offsets of the individual channels. Each channel gets its own seed so that
/// samples from different channels at the same position are uncorrelated.
pub mod channel_offsets {
    pub const ELEVATION: u32 = 0;
    pub const TEMPERATURE: u32 = 101;
    pub const HUMIDITY: u32 = 202;
    pub const RUGGEDNESS: u32 = 303;
    pub const DETAIL: u32 = 404;
    pub const ORE: u32 = 505;
    pub const STRUCTURE_DENSITY: u32 = 606;
    pub const STRUCTURE_PROBABILITY: u32 = 707;
}

/// One fractal Brownian motion channel over Perlin noise.
///
/// Frequency is applied by the underlying `Fbm`, so callers pass raw world
/// coordinates.
pub struct NoiseChannel {
    noise: Fbm<Perlin>,
}

impl NoiseChannel {
    pub fn new(seed: u32, offset: u32, params: NoiseParams) -> Self {
        let noise = Fbm::<Perlin>::new(seed.wrapping_add(offset))
            .set_octaves(params.octaves.max(1))
            .set_frequency(params.frequency);
        Self { noise }
    }

    /// 2D sample in `[0, 1]`.
    pub fn sample_2d(&self, x: f64, z: f64) -> f64 {
        normalize(self.noise.get([x, z]))
    }

    /// 3D sample in `[0, 1]`.
    pub fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        normalize(self.noise.get([x, y, z]))
    }
}

fn normalize(value: f64) -> f64 {
    ((value + 1.0) * 0.5).clamp(0.0, 1.0)
}
