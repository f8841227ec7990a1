//! Terrain streaming configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::streaming::lod::LodConfig;

/// Largest accepted generation radius or collider extent, in tiles
pub const MAX_RADIUS: u32 = 256;

/// Read-only inputs to tile generation and scheduling.
///
/// Passed explicitly into [`crate::streaming::TilePool`]; nothing reads a
/// global instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// World-space edge length of one tile
    pub tile_length: f32,
    /// Horizontal noise scale (larger = smoother)
    pub spread: f32,
    /// Vertical scale applied to sampler output
    pub amplitude: f32,
    /// Mesh resolution used when no LOD band applies
    pub mesh_resolution: u32,
    /// Circular footprint of active tiles, in tiles
    pub generation_radius: u32,
    /// Colliders are built for tiles within this radius; `None` = every active tile
    pub collider_extent: Option<u32>,
    /// Mesh resolution for colliders
    pub collider_resolution: u32,
    /// Seconds between collider passes
    pub collider_delay_secs: f32,
    /// Parked tiles retained before eviction
    pub cache_capacity: usize,
    /// Generation worker threads (0 = one per core)
    pub worker_threads: usize,
    /// Distance-based mesh resolutions
    pub lod: LodConfig,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            tile_length: 64.0,
            spread: 128.0,
            amplitude: 40.0,
            mesh_resolution: 65,
            generation_radius: 4,
            collider_extent: Some(2),
            collider_resolution: 33,
            collider_delay_secs: 0.5,
            cache_capacity: 25,
            worker_threads: 0,
            lod: LodConfig::default(),
        }
    }
}

impl TerrainConfig {
    /// Mesh resolution for a tile `distance` tiles from the viewer
    pub fn resolution_for_distance(&self, distance: f32) -> u32 {
        self.lod
            .resolution_for_distance(distance)
            .unwrap_or(self.mesh_resolution)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.tile_length.is_finite() && self.tile_length > 0.0) {
            return Err(Error::Config(format!(
                "tile_length must be positive, got {}",
                self.tile_length
            )));
        }
        if !(self.spread.is_finite() && self.spread > 0.0) {
            return Err(Error::Config(format!(
                "spread must be positive, got {}",
                self.spread
            )));
        }
        if !self.amplitude.is_finite() {
            return Err(Error::Config(format!(
                "amplitude must be finite, got {}",
                self.amplitude
            )));
        }
        if self.generation_radius > MAX_RADIUS {
            return Err(Error::Config(format!(
                "generation_radius must be at most {}, got {}",
                MAX_RADIUS, self.generation_radius
            )));
        }
        if let Some(extent) = self.collider_extent.filter(|&extent| extent > MAX_RADIUS) {
            return Err(Error::Config(format!(
                "collider_extent must be at most {}, got {}",
                MAX_RADIUS, extent
            )));
        }
        if self.mesh_resolution < 2 {
            return Err(Error::Config(format!(
                "mesh_resolution must be at least 2, got {}",
                self.mesh_resolution
            )));
        }
        if self.collider_resolution < 2 {
            return Err(Error::Config(format!(
                "collider_resolution must be at least 2, got {}",
                self.collider_resolution
            )));
        }
        if !(self.collider_delay_secs.is_finite() && self.collider_delay_secs >= 0.0) {
            return Err(Error::Config(format!(
                "collider_delay_secs must be non-negative, got {}",
                self.collider_delay_secs
            )));
        }
        self.lod.validate()
    }

    /// Load and validate a JSON config file
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON, creating parent directories
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }
}
