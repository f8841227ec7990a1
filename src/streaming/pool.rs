//! Tile working-set scheduling around a tracked viewpoint
//!
//! The host calls [`TilePool::tick`] once per frame from the thread that
//! created the pool. Each tick applies finished generations, reconciles the
//! active set against the generation radius and, on a slower cadence,
//! refreshes colliders near the viewer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use tokio::sync::mpsc;

use crate::core::time::Cadence;
use crate::core::{Error, Result};
use crate::math::{GridPosition, positions_within_radius, within_radius};
use crate::streaming::attachment::{EngineAttachment, HeadlessAttachment};
use crate::streaming::cache::TileCache;
use crate::streaming::config::{MAX_RADIUS, TerrainConfig};
use crate::streaming::dispatcher::MainThreadDispatcher;
use crate::streaming::tile::Tile;
use crate::terrain::sampler::HeightSampler;
use crate::terrain::tile_mesh::HeightField;

/// Why a tick skipped reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No viewpoint to stream around
    NoTrackedPosition,
    /// Generations from the previous pass have not all completed
    GenerationInFlight,
}

/// What one tick (or drain) did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tiles moved from active to parked
    pub parked: usize,
    /// Freshly generated tiles made active
    pub activated: usize,
    /// Parked tiles reused
    pub recycled: usize,
    /// Heightmap generations started
    pub requested: usize,
    /// Generations or mesh builds that failed
    pub failed: usize,
    /// Parked tiles destroyed to respect capacity
    pub evicted: usize,
    /// Active tiles that switched render mesh
    pub lod_updates: usize,
    /// Colliders built or rebuilt
    pub colliders_built: usize,
    pub skipped: Option<SkipReason>,
}

impl TickReport {
    /// Nothing changed
    pub fn is_idle(&self) -> bool {
        *self
            == Self {
                skipped: self.skipped,
                ..Default::default()
            }
    }

    /// Add another report's counters into this one
    pub fn merge(&mut self, other: &TickReport) {
        self.parked += other.parked;
        self.activated += other.activated;
        self.recycled += other.recycled;
        self.requested += other.requested;
        self.failed += other.failed;
        self.evicted += other.evicted;
        self.lod_updates += other.lod_updates;
        self.colliders_built += other.colliders_built;
    }
}

/// Result of one background generation, delivered on the owning thread
struct GenerationOutcome {
    position: GridPosition,
    result: Result<bool>,
}

/// Keeps the tiles around a viewpoint generated, meshed and attached
pub struct TilePool<E: EngineAttachment = HeadlessAttachment> {
    config: TerrainConfig,
    sampler: Arc<dyn HeightSampler>,
    cache: TileCache,
    engine: E,
    workers: rayon::ThreadPool,
    dispatcher: MainThreadDispatcher,
    completed_tx: mpsc::UnboundedSender<GenerationOutcome>,
    completed_rx: mpsc::UnboundedReceiver<GenerationOutcome>,
    /// Tiles whose heightmap is being generated
    in_flight: HashMap<GridPosition, Tile>,
    tracked: Option<Vec3>,
    /// Grid position of the last reconciliation
    last_center: Option<GridPosition>,
    collider_cadence: Cadence,
}

impl<E: EngineAttachment> TilePool<E> {
    /// Create a pool owned by the calling thread
    ///
    /// # Arguments
    /// * `config` - Validated before use
    /// * `sampler` - Height source shared by every tile
    /// * `engine` - Host attachment receiving entities, meshes and colliders
    ///
    /// # Returns
    /// `Error::Config` for invalid settings, `Error::WorkerPool` if the
    /// generation threads cannot be started
    pub fn new(config: TerrainConfig, sampler: Arc<dyn HeightSampler>, engine: E) -> Result<Self> {
        config.validate()?;

        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("tile-gen-{i}"));
        if config.worker_threads > 0 {
            builder = builder.num_threads(config.worker_threads);
        }
        let workers = builder
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        log::info!(
            "TilePool: radius {}, tile length {}, cache capacity {}, {} generation workers",
            config.generation_radius,
            config.tile_length,
            config.cache_capacity,
            workers.current_num_threads()
        );

        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Ok(Self {
            cache: TileCache::new(config.cache_capacity),
            collider_cadence: Cadence::from_secs_f32(config.collider_delay_secs),
            config,
            sampler,
            engine,
            workers,
            dispatcher: MainThreadDispatcher::new(),
            completed_tx,
            completed_rx,
            in_flight: HashMap::new(),
            tracked: None,
            last_center: None,
        })
    }

    /// Advance scheduling by one host frame
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        let mut report = TickReport::default();
        self.apply_completed(&mut report);

        match self.tracked {
            None => report.skipped = Some(SkipReason::NoTrackedPosition),
            Some(_) if !self.in_flight.is_empty() => {
                report.skipped = Some(SkipReason::GenerationInFlight);
            }
            Some(point) => self.reconcile(point, &mut report),
        }

        if self.collider_cadence.advance(dt) {
            if let Some(point) = self.tracked {
                self.update_colliders(point, &mut report);
            }
        }

        if !report.is_idle() {
            log::debug!("TilePool tick: {:?}", report);
        }
        report
    }

    /// Block until every in-flight generation has been applied
    pub fn finish_in_flight(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.apply_completed(&mut report);

        while !self.in_flight.is_empty() {
            if self.dispatcher.block_on_next() == 0 {
                break;
            }
            self.apply_completed(&mut report);
        }
        report
    }

    /// Run queued continuations and apply the generations they delivered
    fn apply_completed(&mut self, report: &mut TickReport) {
        self.dispatcher.run_pending();
        while let Ok(outcome) = self.completed_rx.try_recv() {
            self.finish_generation(outcome, report);
        }
    }

    fn reconcile(&mut self, point: Vec3, report: &mut TickReport) {
        let center = GridPosition::from_world(point, self.config.tile_length);
        let desired = positions_within_radius(center, self.config.generation_radius);
        let desired_set: HashSet<GridPosition> = desired.iter().copied().collect();
        self.last_center = Some(center);

        let stale: Vec<GridPosition> = self
            .cache
            .active_positions()
            .filter(|position| !desired_set.contains(position))
            .collect();
        for position in stale {
            if let Some(tile) = self.cache.take_active(position) {
                report.evicted += self.cache.park(tile, &mut self.engine).len();
                report.parked += 1;
            }
        }

        for tile in self.cache.active_tiles_mut() {
            let resolution = lod_resolution(&self.config, center, tile.position());
            match tile.apply_lod(resolution, &mut self.engine) {
                Ok(true) => report.lod_updates += 1,
                Ok(false) => {}
                Err(e) => log::warn!("Tile {}: LOD update failed: {}", tile.position(), e),
            }
        }

        for position in self.cache.diff_new_positions(&desired) {
            match self.cache.take_parked(position) {
                Some(tile) => {
                    if self.show(tile, center, report) {
                        report.recycled += 1;
                    }
                }
                None => self.request_generation(position, center, report),
            }
        }
    }

    /// Start a background heightmap fill for a new tile at `position`
    fn request_generation(&mut self, position: GridPosition, center: GridPosition, report: &mut TickReport) {
        let entity = self.engine.create_entity(position);
        let field = HeightField::from_config(Arc::clone(&self.sampler), &self.config);
        let tile = Tile::new(position, field, entity);

        let resolution = lod_resolution(&self.config, center, position);
        let completed = self.completed_tx.clone();
        tile.mesh().build_heightmap_async(
            resolution,
            &self.workers,
            &self.dispatcher.handle(),
            move |result| {
                let _ = completed.send(GenerationOutcome { position, result });
            },
        );

        log::trace!("Tile {}: generation requested at resolution {}", position, resolution);
        self.in_flight.insert(position, tile);
        report.requested += 1;
    }

    fn finish_generation(&mut self, outcome: GenerationOutcome, report: &mut TickReport) {
        let GenerationOutcome { position, result } = outcome;
        let Some(tile) = self.in_flight.remove(&position) else {
            log::warn!("Tile {}: completion with no pending generation", position);
            return;
        };

        if let Err(e) = result {
            log::warn!("Tile {}: {}", position, e);
            self.engine.destroy(tile.entity());
            report.failed += 1;
            return;
        }

        let center = self
            .tracked
            .map(|point| GridPosition::from_world(point, self.config.tile_length))
            .or(self.last_center);
        match center {
            Some(center) if within_radius(center, position, self.config.generation_radius) => {
                if self.show(tile, center, report) {
                    report.activated += 1;
                }
            }
            _ => {
                log::trace!("Tile {}: no longer wanted, parking", position);
                report.evicted += self.cache.park(tile, &mut self.engine).len();
                report.parked += 1;
            }
        }
    }

    /// Assign the LOD mesh and activate. Destroys the tile if meshing fails.
    fn show(&mut self, mut tile: Tile, center: GridPosition, report: &mut TickReport) -> bool {
        let resolution = lod_resolution(&self.config, center, tile.position());
        match tile.apply_lod(resolution, &mut self.engine) {
            Ok(_) => {
                self.cache.activate(tile, &mut self.engine);
                true
            }
            Err(e) => {
                log::warn!("Tile {}: mesh build failed: {}", tile.position(), e);
                self.engine.destroy(tile.entity());
                report.failed += 1;
                false
            }
        }
    }

    fn update_colliders(&mut self, point: Vec3, report: &mut TickReport) {
        let center = GridPosition::from_world(point, self.config.tile_length);
        let extent = self.config.collider_extent;
        let resolution = self.config.collider_resolution;

        for tile in self.cache.active_tiles_mut() {
            if extent.is_some_and(|radius| !within_radius(center, tile.position(), radius)) {
                continue;
            }
            match tile.apply_collider(resolution, &mut self.engine) {
                Ok(true) => report.colliders_built += 1,
                Ok(false) => {}
                Err(e) => log::warn!("Tile {}: collider build failed: {}", tile.position(), e),
            }
        }
    }

    /// Set or clear the viewpoint to stream around
    pub fn set_tracked_position(&mut self, point: Option<Vec3>) {
        self.tracked = point;
    }

    pub fn tracked_position(&self) -> Option<Vec3> {
        self.tracked
    }

    /// Positions the next reconciliation will want active
    pub fn desired_positions(&self) -> Vec<GridPosition> {
        match self.tracked {
            Some(point) => positions_within_radius(
                GridPosition::from_world(point, self.config.tile_length),
                self.config.generation_radius,
            ),
            None => Vec::new(),
        }
    }

    /// Change the generation radius; takes effect on the next reconciliation
    ///
    /// # Arguments
    /// * `radius` - New radius in tiles, at most [`MAX_RADIUS`]
    ///
    /// # Returns
    /// `Error::Config` if the radius is out of range; the old radius is kept
    pub fn set_generation_radius(&mut self, radius: u32) -> Result<()> {
        if radius > MAX_RADIUS {
            return Err(Error::Config(format!(
                "generation_radius must be at most {}, got {}",
                MAX_RADIUS, radius
            )));
        }
        self.config.generation_radius = radius;
        Ok(())
    }

    /// Change parked-tile capacity, evicting immediately if it shrank
    pub fn set_cache_capacity(&mut self, capacity: usize) -> Vec<GridPosition> {
        self.config.cache_capacity = capacity;
        self.cache.set_capacity(capacity, &mut self.engine)
    }

    pub fn active_positions(&self) -> Vec<GridPosition> {
        self.cache.active_positions().collect()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, position: GridPosition) -> bool {
        self.in_flight.contains_key(&position)
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

/// Render-mesh resolution for a tile at `position`
fn lod_resolution(config: &TerrainConfig, center: GridPosition, position: GridPosition) -> u32 {
    config.resolution_for_distance(center.distance(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::lod::{LodConfig, LodLevel};
    use std::sync::{Condvar, Mutex};

    fn test_config() -> TerrainConfig {
        TerrainConfig {
            tile_length: 10.0,
            spread: 20.0,
            amplitude: 1.0,
            mesh_resolution: 9,
            generation_radius: 1,
            collider_extent: Some(1),
            collider_resolution: 9,
            collider_delay_secs: 0.5,
            cache_capacity: 4,
            worker_threads: 1,
            lod: LodConfig::uniform(9),
        }
    }

    fn wavy() -> Arc<dyn HeightSampler> {
        Arc::new(|x: f32, z: f32| (x * 1.3).sin() * (z * 0.7).cos())
    }

    fn pool(config: TerrainConfig) -> TilePool {
        TilePool::new(config, wavy(), HeadlessAttachment::new()).unwrap()
    }

    /// World point in the middle of tile `(x, z)` for 10-unit tiles
    fn tile_center(x: i32, z: i32) -> Vec3 {
        Vec3::new(x as f32 * 10.0 + 5.0, 0.0, z as f32 * 10.0 + 5.0)
    }

    /// Tick and drain so every requested tile is applied
    fn settle(pool: &mut TilePool) -> TickReport {
        let mut report = pool.tick(Duration::ZERO);
        let drained = pool.finish_in_flight();
        report.merge(&drained);
        report
    }

    /// Sampler that blocks until the gate opens
    fn gated() -> (Arc<dyn HeightSampler>, Arc<(Mutex<bool>, Condvar)>) {
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let waiter = Arc::clone(&gate);
        let sampler: Arc<dyn HeightSampler> = Arc::new(move |_: f32, _: f32| {
            let (open, cvar) = &*waiter;
            let mut open = open.lock().unwrap();
            while !*open {
                open = cvar.wait(open).unwrap();
            }
            0.0f32
        });
        (sampler, gate)
    }

    fn open_gate(gate: &(Mutex<bool>, Condvar)) {
        *gate.0.lock().unwrap() = true;
        gate.1.notify_all();
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = TerrainConfig { tile_length: -1.0, ..test_config() };
        let result = TilePool::new(config, wavy(), HeadlessAttachment::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_skips_without_tracked_position() {
        let mut pool = pool(test_config());
        let report = pool.tick(Duration::from_millis(16));
        assert_eq!(report.skipped, Some(SkipReason::NoTrackedPosition));
        assert_eq!(report.requested, 0);
        assert!(pool.desired_positions().is_empty());
        assert_eq!(pool.engine().live_count(), 0);
    }

    #[test]
    fn test_origin_radius_one_single_tile() {
        let mut pool = pool(test_config());
        pool.set_tracked_position(Some(Vec3::ZERO));
        assert_eq!(pool.desired_positions(), vec![GridPosition::ORIGIN]);

        let report = settle(&mut pool);
        assert_eq!(report.requested, 1);
        assert_eq!(report.activated, 1);
        assert_eq!(pool.active_positions(), vec![GridPosition::ORIGIN]);
        assert_eq!(pool.in_flight_count(), 0);

        let engine = pool.engine();
        let state = engine.entity_at(GridPosition::ORIGIN).unwrap();
        assert!(state.active);
        assert_eq!(state.mesh.as_ref().unwrap().vertex_count(), 81);
    }

    #[test]
    fn test_radius_two_activates_nine() {
        let mut pool = pool(TerrainConfig { generation_radius: 2, ..test_config() });
        pool.set_tracked_position(Some(tile_center(0, 0)));

        let report = settle(&mut pool);
        assert_eq!(report.activated, 9);
        assert_eq!(pool.cache().active_count(), 9);
        assert_eq!(pool.engine().active_count(), 9);

        // Steady state: nothing to do
        let report = pool.tick(Duration::ZERO);
        assert!(report.is_idle());
        assert_eq!(report.skipped, None);
    }

    #[test]
    fn test_skips_while_generation_in_flight() {
        let (sampler, gate) = gated();
        let mut pool = TilePool::new(test_config(), sampler, HeadlessAttachment::new()).unwrap();
        pool.set_tracked_position(Some(tile_center(0, 0)));

        let report = pool.tick(Duration::ZERO);
        assert_eq!(report.requested, 1);
        assert!(pool.is_in_flight(GridPosition::ORIGIN));

        let report = pool.tick(Duration::ZERO);
        assert_eq!(report.skipped, Some(SkipReason::GenerationInFlight));
        assert_eq!(report.requested, 0);

        open_gate(&gate);
        let report = pool.finish_in_flight();
        assert_eq!(report.activated, 1);
        assert_eq!(pool.tick(Duration::ZERO).skipped, None);
    }

    #[test]
    fn test_late_generation_is_parked() {
        let (sampler, gate) = gated();
        let mut pool = TilePool::new(test_config(), sampler, HeadlessAttachment::new()).unwrap();
        pool.set_tracked_position(Some(tile_center(0, 0)));
        pool.tick(Duration::ZERO);

        // Viewer leaves before the fill completes
        pool.set_tracked_position(Some(tile_center(10, 0)));
        open_gate(&gate);
        let report = pool.finish_in_flight();

        assert_eq!(report.activated, 0);
        assert_eq!(report.parked, 1);
        assert!(pool.cache().is_parked_at(GridPosition::ORIGIN));
        assert!(pool.active_positions().is_empty());
        assert!(!pool.engine().entity_at(GridPosition::ORIGIN).unwrap().active);
    }

    #[test]
    fn test_walk_away_and_back_recycles() {
        let mut pool = pool(test_config());
        pool.set_tracked_position(Some(tile_center(0, 0)));
        settle(&mut pool);

        pool.set_tracked_position(Some(tile_center(3, 0)));
        let report = settle(&mut pool);
        assert_eq!(report.parked, 1);
        assert_eq!(report.requested, 1);
        assert_eq!(pool.active_positions(), vec![GridPosition::new(3, 0)]);

        pool.set_tracked_position(Some(tile_center(0, 0)));
        let report = settle(&mut pool);
        assert_eq!(report.parked, 1);
        assert_eq!(report.recycled, 1);
        assert_eq!(report.requested, 0);
        assert_eq!(pool.active_positions(), vec![GridPosition::ORIGIN]);
        assert_eq!(pool.cache().stats().hits, 1);
        assert_eq!(pool.engine().destroyed_count(), 0);
        assert_eq!(pool.engine().live_count(), 2);
    }

    #[test]
    fn test_cache_capacity_evicts() {
        let mut pool = pool(TerrainConfig { cache_capacity: 1, ..test_config() });

        let mut evicted = 0;
        for x in [0, 5, 10] {
            pool.set_tracked_position(Some(tile_center(x, 0)));
            evicted += settle(&mut pool).evicted;
            assert!(pool.cache().parked_count() <= 1);
        }

        assert_eq!(evicted, 1);
        assert_eq!(pool.engine().destroyed_count(), 1);
        assert!(pool.engine().entity_at(GridPosition::ORIGIN).is_none());
        assert_eq!(pool.cache().parked_positions().collect::<Vec<_>>(), vec![GridPosition::new(5, 0)]);

        assert_eq!(pool.set_cache_capacity(0), vec![GridPosition::new(5, 0)]);
        assert_eq!(pool.engine().live_count(), 1);
    }

    #[test]
    fn test_failed_generation_is_retried() {
        let sampler: Arc<dyn HeightSampler> = Arc::new(|_: f32, _: f32| -> f32 { panic!("bad sample") });
        let mut pool = TilePool::new(test_config(), sampler, HeadlessAttachment::new()).unwrap();
        pool.set_tracked_position(Some(tile_center(0, 0)));

        let report = settle(&mut pool);
        assert_eq!(report.failed, 1);
        assert_eq!(report.activated, 0);
        assert!(pool.active_positions().is_empty());
        assert_eq!(pool.engine().live_count(), 0);
        assert_eq!(pool.engine().destroyed_count(), 1);

        let report = pool.tick(Duration::ZERO);
        assert_eq!(report.requested, 1);
        pool.finish_in_flight();
    }

    #[test]
    fn test_colliders_follow_cadence_and_extent() {
        let mut pool = pool(TerrainConfig { generation_radius: 2, ..test_config() });
        pool.set_tracked_position(Some(tile_center(0, 0)));
        settle(&mut pool);

        assert_eq!(pool.tick(Duration::from_millis(100)).colliders_built, 0);
        assert_eq!(pool.tick(Duration::from_millis(500)).colliders_built, 1);
        assert_eq!(pool.tick(Duration::from_millis(600)).colliders_built, 0);

        let engine = pool.engine();
        assert!(engine.entity_at(GridPosition::ORIGIN).unwrap().collider.is_some());
        assert!(engine.entity_at(GridPosition::new(1, 0)).unwrap().collider.is_none());
    }

    #[test]
    fn test_unlimited_collider_extent() {
        let config = TerrainConfig {
            generation_radius: 2,
            collider_extent: None,
            ..test_config()
        };
        let mut pool = pool(config);
        pool.set_tracked_position(Some(tile_center(0, 0)));
        settle(&mut pool);

        assert_eq!(pool.tick(Duration::from_millis(600)).colliders_built, 9);
    }

    #[test]
    fn test_lod_by_distance() {
        let config = TerrainConfig {
            generation_radius: 2,
            lod: LodConfig {
                levels: vec![LodLevel::new(1.0, 17), LodLevel::new(f32::MAX, 9)],
            },
            ..test_config()
        };
        let mut pool = pool(config);
        pool.set_tracked_position(Some(tile_center(0, 0)));
        settle(&mut pool);

        let cache = pool.cache();
        assert_eq!(cache.active_tile(GridPosition::ORIGIN).unwrap().mesh_resolution(), Some(17));
        assert_eq!(cache.active_tile(GridPosition::new(1, 0)).unwrap().mesh_resolution(), Some(9));

        // Step one tile east: the new center upgrades, the old one drops back
        pool.set_tracked_position(Some(tile_center(1, 0)));
        let report = settle(&mut pool);
        assert!(report.lod_updates >= 2);
        let cache = pool.cache();
        assert_eq!(cache.active_tile(GridPosition::new(1, 0)).unwrap().mesh_resolution(), Some(17));
        assert_eq!(cache.active_tile(GridPosition::ORIGIN).unwrap().mesh_resolution(), Some(9));
    }

    #[test]
    fn test_set_generation_radius_bounds() {
        let mut pool = pool(test_config());
        assert!(matches!(pool.set_generation_radius(MAX_RADIUS + 1), Err(Error::Config(_))));
        assert_eq!(pool.config().generation_radius, 1);

        pool.set_generation_radius(2).unwrap();
        pool.set_tracked_position(Some(tile_center(0, 0)));
        assert_eq!(pool.desired_positions().len(), 9);
    }

    #[test]
    fn test_far_tracked_point_streams_edge_tile() {
        let mut pool = pool(test_config());
        pool.set_tracked_position(Some(Vec3::new(1.0e12, 0.0, 5.0)));

        let edge = GridPosition::new(i32::MAX, 0);
        assert_eq!(pool.desired_positions(), vec![edge]);

        let report = settle(&mut pool);
        assert_eq!(report.activated, 1);
        assert_eq!(pool.active_positions(), vec![edge]);
    }

    #[test]
    fn test_clearing_tracked_position_keeps_tiles() {
        let mut pool = pool(test_config());
        pool.set_tracked_position(Some(tile_center(0, 0)));
        settle(&mut pool);

        pool.set_tracked_position(None);
        let report = pool.tick(Duration::from_secs(1));
        assert_eq!(report.skipped, Some(SkipReason::NoTrackedPosition));
        assert_eq!(report.colliders_built, 0);
        assert_eq!(pool.active_positions(), vec![GridPosition::ORIGIN]);
    }
}
