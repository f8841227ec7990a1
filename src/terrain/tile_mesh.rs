//! Per-tile heightmap and LOD mesh ownership
//!
//! A [`TileMesh`] owns the single heightmap of its tile and every mesh
//! derived from it. The heightmap only ever grows in resolution; meshes are
//! cached per resolution and rebuilt only when the heightmap beneath them
//! changed.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::{Error, Result};
use crate::math::GridPosition;
use crate::streaming::config::TerrainConfig;
use crate::streaming::dispatcher::DispatchHandle;
use crate::terrain::heightmap::Heightmap;
use crate::terrain::mesh::MeshData;
use crate::terrain::sampler::HeightSampler;

/// Sampler plus the world scaling applied to it
#[derive(Clone)]
pub struct HeightField {
    sampler: Arc<dyn HeightSampler>,
    pub tile_length: f32,
    pub spread: f32,
    pub amplitude: f32,
}

impl HeightField {
    pub fn new(sampler: Arc<dyn HeightSampler>, tile_length: f32, spread: f32, amplitude: f32) -> Self {
        Self {
            sampler,
            tile_length,
            spread,
            amplitude,
        }
    }

    pub fn from_config(sampler: Arc<dyn HeightSampler>, config: &TerrainConfig) -> Self {
        Self::new(sampler, config.tile_length, config.spread, config.amplitude)
    }

    /// World height: `sample(x / spread, z / spread) * amplitude`
    #[inline]
    pub fn height_at(&self, world_x: f32, world_z: f32) -> f32 {
        self.sampler.sample(world_x / self.spread, world_z / self.spread) * self.amplitude
    }

    /// Sample a full heightmap for the tile at `position`.
    ///
    /// Cell `(i, j)` sits at `origin + (i, j) / (R - 1) * tile_length`, so the
    /// last row and column coincide with the neighbouring tile's first.
    fn sample_heightmap(&self, position: GridPosition, resolution: u32) -> Heightmap {
        let origin = position.world_origin(self.tile_length);
        let last = (resolution - 1) as f32;

        Heightmap::from_fn(resolution, |x, z| {
            let wx = origin.x + (x as f32 / last) * self.tile_length;
            let wz = origin.z + (z as f32 / last) * self.tile_length;
            self.height_at(wx, wz)
        })
    }
}

struct CachedMesh {
    /// Heightmap resolution the mesh was derived from
    source_resolution: u32,
    mesh: Arc<MeshData>,
}

/// Heightmap and LOD meshes of one tile
pub struct TileMesh {
    position: GridPosition,
    field: HeightField,
    heightmap: Arc<Mutex<Option<Heightmap>>>,
    meshes: HashMap<u32, CachedMesh>,
}

impl TileMesh {
    pub fn new(position: GridPosition, field: HeightField) -> Self {
        Self {
            position,
            field,
            heightmap: Arc::new(Mutex::new(None)),
            meshes: HashMap::new(),
        }
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    pub fn field(&self) -> &HeightField {
        &self.field
    }

    /// Scaled sampler height at a world position
    pub fn height_at(&self, world_x: f32, world_z: f32) -> f32 {
        self.field.height_at(world_x, world_z)
    }

    /// Resolution of the stored heightmap, if one has been generated
    pub fn heightmap_resolution(&self) -> Option<u32> {
        lock(&self.heightmap).as_ref().map(Heightmap::resolution)
    }

    /// Run `f` against the stored heightmap
    pub fn with_heightmap<R>(&self, f: impl FnOnce(&Heightmap) -> R) -> Option<R> {
        lock(&self.heightmap).as_ref().map(f)
    }

    /// Generate the heightmap at `resolution` unless one at least as fine exists.
    ///
    /// Returns `Ok(true)` when a new heightmap was stored. A panicking sampler
    /// is reported as [`Error::GenerationFailed`] and leaves the previous
    /// heightmap in place.
    pub fn build_heightmap(&self, resolution: u32) -> Result<bool> {
        fill_guarded(&self.heightmap, &self.field, self.position, resolution)
    }

    /// Generate the heightmap on `workers` and deliver the result through `dispatcher`.
    ///
    /// `on_complete` runs on the dispatcher's owning thread. The fill always
    /// runs to completion; callers that lost interest ignore the callback.
    pub fn build_heightmap_async<F>(
        &self,
        resolution: u32,
        workers: &rayon::ThreadPool,
        dispatcher: &DispatchHandle,
        on_complete: F,
    ) where
        F: FnOnce(Result<bool>) + Send + 'static,
    {
        let slot = Arc::clone(&self.heightmap);
        let field = self.field.clone();
        let position = self.position;
        let dispatcher = dispatcher.clone();

        workers.spawn(move || {
            let result = fill_guarded(&slot, &field, position, resolution);
            if !dispatcher.enqueue(move || on_complete(result)) {
                log::debug!("Tile {}: dispatcher gone, dropping generation result", position);
            }
        });
    }

    /// Mesh at `resolution` vertices per side.
    ///
    /// Upgrades the heightmap first when it is coarser than the mesh.
    ///
    /// # Arguments
    /// * `resolution` - Vertices per side, at least 2
    ///
    /// # Returns
    /// The cached `Arc` when the heightmap is unchanged since it was built,
    /// otherwise a freshly built mesh
    pub fn build_mesh(&mut self, resolution: u32) -> Result<Arc<MeshData>> {
        if resolution < 2 {
            return Err(Error::InvalidResolution {
                requested: resolution,
                available: self.heightmap_resolution().unwrap_or(0),
            });
        }

        let current = self.heightmap_resolution();
        if let Some(cached) = self.meshes.get(&resolution) {
            if Some(cached.source_resolution) == current {
                return Ok(Arc::clone(&cached.mesh));
            }
        }

        if current.is_none_or(|r| r < resolution) {
            log::debug!(
                "Tile {}: upgrading heightmap {:?} -> {} for mesh",
                self.position, current, resolution
            );
            self.build_heightmap(resolution)?;
        }

        let (source_resolution, mesh) = {
            let guard = lock(&self.heightmap);
            let heightmap = guard.as_ref().ok_or(Error::InvalidResolution {
                requested: resolution,
                available: 0,
            })?;
            let mesh = MeshData::from_heightmap(heightmap, resolution, self.field.tile_length)?;
            (heightmap.resolution(), Arc::new(mesh))
        };

        log::trace!(
            "Tile {}: built mesh {} from heightmap {}",
            self.position, resolution, source_resolution
        );
        self.meshes.insert(
            resolution,
            CachedMesh {
                source_resolution,
                mesh: Arc::clone(&mesh),
            },
        );
        Ok(mesh)
    }

    /// Cached mesh at `resolution`, without building
    pub fn cached_mesh(&self, resolution: u32) -> Option<Arc<MeshData>> {
        self.meshes.get(&resolution).map(|cached| Arc::clone(&cached.mesh))
    }

    /// Resolutions with a cached mesh, ascending
    pub fn cached_resolutions(&self) -> Vec<u32> {
        let mut resolutions: Vec<u32> = self.meshes.keys().copied().collect();
        resolutions.sort_unstable();
        resolutions
    }
}

fn lock(slot: &Mutex<Option<Heightmap>>) -> std::sync::MutexGuard<'_, Option<Heightmap>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fill under the tile lock, turning sampler panics into errors
fn fill_guarded(
    slot: &Mutex<Option<Heightmap>>,
    field: &HeightField,
    position: GridPosition,
    resolution: u32,
) -> Result<bool> {
    if resolution < 2 {
        return Err(Error::InvalidResolution {
            requested: resolution,
            available: lock(slot).as_ref().map_or(0, Heightmap::resolution),
        });
    }

    panic::catch_unwind(AssertUnwindSafe(|| {
        let mut guard = lock(slot);
        if guard.as_ref().is_some_and(|hm| hm.resolution() >= resolution) {
            return false;
        }
        // The slot is only written once the fill is complete
        let heightmap = field.sample_heightmap(position, resolution);
        *guard = Some(heightmap);
        true
    }))
    .map_err(|payload| Error::GenerationFailed {
        position,
        reason: panic_reason(payload.as_ref()),
    })
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "sampler panicked".to_string()
    }
}
