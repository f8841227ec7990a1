//! Level of Detail (LOD) selection for tile meshes
//!
//! Each level covers a band of grid distances from the viewer and names the
//! mesh resolution (vertices per side) used inside that band. Nearer bands
//! normally carry higher resolutions.

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Default LOD bands in tile units
/// - LOD 0: 129 vertices per side - closer than 2 tiles
/// - LOD 1: 65 - closer than 4 tiles
/// - LOD 2: 33 - closer than 8 tiles
/// - LOD 3: 17 - beyond
pub const DEFAULT_LOD_LEVELS: [(f32, u32); 4] = [(2.0, 129), (4.0, 65), (8.0, 33), (f32::MAX, 17)];

/// One LOD band
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodLevel {
    /// Exclusive upper bound of the band, in tiles
    pub max_distance: f32,
    /// Mesh vertices per side
    pub resolution: u32,
}

impl LodLevel {
    pub const fn new(max_distance: f32, resolution: u32) -> Self {
        Self { max_distance, resolution }
    }
}

/// Ordered LOD bands, nearest first
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodConfig {
    pub levels: Vec<LodLevel>,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LOD_LEVELS
                .iter()
                .map(|&(d, r)| LodLevel::new(d, r))
                .collect(),
        }
    }
}

impl LodConfig {
    /// A single band covering every distance
    pub fn uniform(resolution: u32) -> Self {
        Self {
            levels: vec![LodLevel::new(f32::MAX, resolution)],
        }
    }

    /// LOD index for a distance: first band whose bound exceeds it
    ///
    /// Distances beyond the last band use the last band. `None` when empty.
    ///
    /// # Examples
    /// ```
    /// use terrastream::streaming::lod::LodConfig;
    ///
    /// let lod = LodConfig::default();
    /// assert_eq!(lod.level_for_distance(0.0), Some(0));
    /// assert_eq!(lod.level_for_distance(3.0), Some(1));
    /// assert_eq!(lod.level_for_distance(1.0e9), Some(3));
    /// ```
    pub fn level_for_distance(&self, distance: f32) -> Option<usize> {
        if self.levels.is_empty() {
            return None;
        }
        let level = self
            .levels
            .iter()
            .position(|level| distance < level.max_distance)
            .unwrap_or(self.levels.len() - 1);
        Some(level)
    }

    /// Mesh resolution for a distance
    ///
    /// # Arguments
    /// * `distance` - Grid distance from the viewer, in tiles
    ///
    /// # Returns
    /// Resolution of the matching band, or `None` if no bands are configured
    pub fn resolution_for_distance(&self, distance: f32) -> Option<u32> {
        self.level_for_distance(distance)
            .map(|level| self.levels[level].resolution)
    }

    /// Highest resolution of any band
    pub fn max_resolution(&self) -> Option<u32> {
        self.levels.iter().map(|level| level.resolution).max()
    }

    /// Bands must be strictly ascending in distance with resolutions of at least 2
    pub fn validate(&self) -> Result<()> {
        for (i, level) in self.levels.iter().enumerate() {
            if level.resolution < 2 {
                return Err(Error::Config(format!(
                    "LOD level {} resolution {} is below 2",
                    i, level.resolution
                )));
            }
            if level.max_distance.is_nan() || level.max_distance <= 0.0 {
                return Err(Error::Config(format!(
                    "LOD level {} max_distance {} must be positive",
                    i, level.max_distance
                )));
            }
            if i > 0 && level.max_distance <= self.levels[i - 1].max_distance {
                return Err(Error::Config(format!(
                    "LOD level {} max_distance {} is not above level {}",
                    i,
                    level.max_distance,
                    i - 1
                )));
            }
        }
        Ok(())
    }
}
