//! Dense square heightmap grid

/// Square `resolution × resolution` grid of heights, row-major by Z.
#[derive(Clone, Debug, PartialEq)]
pub struct Heightmap {
    resolution: u32,
    heights: Vec<f32>,
}

impl Heightmap {
    /// Flat heightmap at height 0
    pub fn new(resolution: u32) -> Self {
        let len = resolution as usize * resolution as usize;
        Self {
            resolution,
            heights: vec![0.0; len],
        }
    }

    /// Fill every cell from `f(x, z)`
    pub fn from_fn(resolution: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut heights = Vec::with_capacity(resolution as usize * resolution as usize);
        for z in 0..resolution {
            for x in 0..resolution {
                heights.push(f(x, z));
            }
        }
        Self { resolution, heights }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    #[inline]
    fn index(&self, x: u32, z: u32) -> usize {
        debug_assert!(x < self.resolution && z < self.resolution);
        z as usize * self.resolution as usize + x as usize
    }

    /// Height at an integer cell
    #[inline]
    pub fn get(&self, x: u32, z: u32) -> f32 {
        self.heights[self.index(x, z)]
    }

    pub fn set(&mut self, x: u32, z: u32, height: f32) {
        let i = self.index(x, z);
        self.heights[i] = height;
    }

    /// Bilinear sample at fractional cell coordinates, clamped to the grid.
    ///
    /// Integral coordinates return the stored cell value exactly.
    pub fn sample_bilinear(&self, fx: f32, fz: f32) -> f32 {
        if self.resolution == 0 {
            return 0.0;
        }
        let max = self.resolution.saturating_sub(1) as f32;
        let fx = fx.clamp(0.0, max);
        let fz = fz.clamp(0.0, max);

        let x0 = fx.floor() as u32;
        let z0 = fz.floor() as u32;
        let x1 = (x0 + 1).min(self.resolution - 1);
        let z1 = (z0 + 1).min(self.resolution - 1);
        let tx = fx - x0 as f32;
        let tz = fz - z0 as f32;

        let h00 = self.get(x0, z0);
        if tx == 0.0 && tz == 0.0 {
            return h00;
        }

        let h10 = self.get(x1, z0);
        let h01 = self.get(x0, z1);
        let h11 = self.get(x1, z1);

        let near = h00 + (h10 - h00) * tx;
        let far = h01 + (h11 - h01) * tx;
        near + (far - near) * tz
    }

    /// Minimum and maximum height, or `None` for an empty grid
    pub fn min_max(&self) -> Option<(f32, f32)> {
        if self.heights.is_empty() {
            return None;
        }
        let min = self.heights.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self.heights.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        Some((min, max))
    }
}
