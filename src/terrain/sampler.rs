//! Height sources consumed by tile generation

use std::sync::Arc;

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

/// Weight sums below this are treated as zero by [`LayeredSampler`]
const WEIGHT_EPSILON: f32 = 1e-6;

/// Scalar height source over the XZ plane.
///
/// Returns values roughly in `[-1, 1]`; amplitude scaling happens in the
/// tile. Implementations must be deterministic and are called concurrently
/// from generation workers.
pub trait HeightSampler: Send + Sync {
    fn sample(&self, x: f32, z: f32) -> f32;
}

impl<F> HeightSampler for F
where
    F: Fn(f32, f32) -> f32 + Send + Sync,
{
    fn sample(&self, x: f32, z: f32) -> f32 {
        self(x, z)
    }
}

/// Adapts any 2D `noise` generator to [`HeightSampler`]
#[derive(Clone, Debug)]
pub struct NoiseSampler<N> {
    noise: N,
}

impl<N> NoiseSampler<N>
where
    N: NoiseFn<f64, 2>,
{
    pub fn new(noise: N) -> Self {
        Self { noise }
    }

    pub fn inner(&self) -> &N {
        &self.noise
    }
}

impl NoiseSampler<Fbm<Perlin>> {
    /// Fractal Brownian motion over Perlin noise
    pub fn fbm(seed: u32, octaves: u32, persistence: f32, lacunarity: f32) -> Self {
        let noise = Fbm::<Perlin>::new(seed)
            .set_octaves(octaves as usize)
            .set_persistence(persistence as f64)
            .set_lacunarity(lacunarity as f64);

        Self { noise }
    }
}

impl<N> HeightSampler for NoiseSampler<N>
where
    N: NoiseFn<f64, 2> + Send + Sync,
{
    fn sample(&self, x: f32, z: f32) -> f32 {
        self.noise.get([x as f64, z as f64]) as f32
    }
}

/// Weighted average of several samplers.
///
/// An empty sampler, or one whose weights sum to zero, returns 0.
#[derive(Clone, Default)]
pub struct LayeredSampler {
    layers: Vec<(Arc<dyn HeightSampler>, f32)>,
}

impl LayeredSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style layer addition
    pub fn with_layer(mut self, sampler: impl HeightSampler + 'static, weight: f32) -> Self {
        self.push(Arc::new(sampler), weight);
        self
    }

    pub fn push(&mut self, sampler: Arc<dyn HeightSampler>, weight: f32) {
        self.layers.push((sampler, weight));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn total_weight(&self) -> f32 {
        self.layers.iter().map(|(_, w)| *w).sum()
    }
}

impl HeightSampler for LayeredSampler {
    fn sample(&self, x: f32, z: f32) -> f32 {
        let total = self.total_weight();
        if total.abs() < WEIGHT_EPSILON {
            return 0.0;
        }

        let sum: f32 = self
            .layers
            .iter()
            .map(|(sampler, weight)| sampler.sample(x, z) * weight)
            .sum();
        sum / total
    }
}
