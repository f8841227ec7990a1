//! Active tile list and bounded cache of parked tiles
//!
//! Tiles that leave the generation radius are parked rather than dropped,
//! so walking back over old ground reuses their heightmaps and meshes.
//! Parked tiles are kept most-recently-parked first; when the cache is over
//! capacity the oldest parked tile is destroyed.

use std::collections::VecDeque;
use std::thread::{self, ThreadId};

use crate::math::GridPosition;
use crate::streaming::attachment::EngineAttachment;
use crate::streaming::tile::Tile;

/// Running cache counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `take_parked` calls that found a tile
    pub hits: u64,
    /// `take_parked` calls that found nothing
    pub misses: u64,
    /// Tiles parked
    pub parks: u64,
    /// Tiles destroyed by capacity enforcement
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f32 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f32 / lookups as f32
    }
}

/// Active tiles plus an LRU list of parked tiles.
///
/// Single-writer: every mutation must happen on the thread that created the
/// cache (checked in debug builds).
pub struct TileCache {
    /// Visible tiles, in activation order
    active: Vec<Tile>,
    /// Parked tiles: front = most recently parked
    parked: VecDeque<Tile>,
    /// Maximum number of parked tiles
    capacity: usize,
    stats: CacheStats,
    owner: ThreadId,
}

impl TileCache {
    /// Create a cache owned by the calling thread
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of parked tiles kept before eviction
    pub fn new(capacity: usize) -> Self {
        Self {
            active: Vec::new(),
            parked: VecDeque::with_capacity(capacity),
            capacity,
            stats: CacheStats::default(),
            owner: thread::current().id(),
        }
    }

    /// Is a tile at `position` active? Linear in the active count.
    pub fn is_active_at(&self, position: GridPosition) -> bool {
        self.active.iter().any(|tile| tile.position() == position)
    }

    /// Is a tile at `position` parked?
    pub fn is_parked_at(&self, position: GridPosition) -> bool {
        self.parked.iter().any(|tile| tile.position() == position)
    }

    /// Remove and return the parked tile at `position`.
    ///
    /// The caller owns the tile afterwards and is expected to activate it.
    ///
    /// # Arguments
    /// * `position` - Grid slot to look up
    ///
    /// # Returns
    /// The parked tile on a hit, `None` on a miss
    pub fn take_parked(&mut self, position: GridPosition) -> Option<Tile> {
        self.assert_owner();

        match self.parked.iter().position(|tile| tile.position() == position) {
            Some(index) => {
                self.stats.hits += 1;
                self.parked.remove(index)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Hide a tile and park it at the front, then enforce capacity.
    ///
    /// # Arguments
    /// * `tile` - Tile no longer in the active list
    /// * `engine` - Attachment that hides the tile and destroys evicted ones
    ///
    /// # Returns
    /// Positions of tiles evicted to make room, oldest first
    pub fn park<E>(&mut self, mut tile: Tile, engine: &mut E) -> Vec<GridPosition>
    where
        E: EngineAttachment + ?Sized,
    {
        self.assert_owner();
        debug_assert!(
            !self.is_active_at(tile.position()),
            "tile {} parked while still active",
            tile.position()
        );
        debug_assert!(
            !self.is_parked_at(tile.position()),
            "tile {} parked twice",
            tile.position()
        );

        engine.set_active(tile.entity(), false);
        tile.set_active(false);
        log::trace!("Parking tile {}", tile.position());

        self.parked.push_front(tile);
        self.stats.parks += 1;
        self.enforce_capacity(engine)
    }

    /// Destroy parked tiles from the back until within capacity
    pub fn enforce_capacity<E>(&mut self, engine: &mut E) -> Vec<GridPosition>
    where
        E: EngineAttachment + ?Sized,
    {
        self.assert_owner();

        let mut evicted = Vec::new();
        while self.parked.len() > self.capacity {
            let Some(tile) = self.parked.pop_back() else {
                break;
            };
            log::trace!("Evicting tile {}", tile.position());
            engine.destroy(tile.entity());
            evicted.push(tile.position());
            self.stats.evictions += 1;
        }
        evicted
    }

    /// Show a tile and append it to the active list
    pub fn activate<E>(&mut self, mut tile: Tile, engine: &mut E)
    where
        E: EngineAttachment + ?Sized,
    {
        self.assert_owner();
        debug_assert!(
            !self.is_active_at(tile.position()),
            "tile {} activated twice",
            tile.position()
        );
        debug_assert!(
            !self.is_parked_at(tile.position()),
            "tile {} activated while parked",
            tile.position()
        );

        engine.set_active(tile.entity(), true);
        tile.set_active(true);
        self.active.push(tile);
    }

    /// Remove and return the active tile at `position`
    pub fn take_active(&mut self, position: GridPosition) -> Option<Tile> {
        self.assert_owner();

        let index = self.active.iter().position(|tile| tile.position() == position)?;
        Some(self.active.remove(index))
    }

    /// Candidates with no active tile, in candidate order
    pub fn diff_new_positions(&self, candidates: &[GridPosition]) -> Vec<GridPosition> {
        candidates
            .iter()
            .copied()
            .filter(|&position| !self.is_active_at(position))
            .collect()
    }

    /// Change capacity, evicting immediately if it shrank
    pub fn set_capacity<E>(&mut self, capacity: usize, engine: &mut E) -> Vec<GridPosition>
    where
        E: EngineAttachment + ?Sized,
    {
        self.capacity = capacity;
        self.enforce_capacity(engine)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    pub fn active_positions(&self) -> impl Iterator<Item = GridPosition> + '_ {
        self.active.iter().map(Tile::position)
    }

    /// Parked positions, most recently parked first
    pub fn parked_positions(&self) -> impl Iterator<Item = GridPosition> + '_ {
        self.parked.iter().map(Tile::position)
    }

    pub fn active_tiles(&self) -> &[Tile] {
        &self.active
    }

    pub fn active_tiles_mut(&mut self) -> &mut [Tile] {
        self.assert_owner();
        &mut self.active
    }

    pub fn active_tile(&self, position: GridPosition) -> Option<&Tile> {
        self.active.iter().find(|tile| tile.position() == position)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    #[inline]
    fn assert_owner(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "TileCache mutated off its owning thread"
        );
    }
}
