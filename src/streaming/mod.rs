//! Tile streaming around a moving viewpoint

pub mod attachment;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod lod;
pub mod pool;
pub mod tile;

pub use attachment::{EngineAttachment, EntityHandle, EntityState, HeadlessAttachment};
pub use cache::{CacheStats, TileCache};
pub use config::{MAX_RADIUS, TerrainConfig};
pub use dispatcher::{DispatchHandle, MainThreadDispatcher};
pub use lod::{DEFAULT_LOD_LEVELS, LodConfig, LodLevel};
pub use pool::{SkipReason, TickReport, TilePool};
pub use tile::Tile;
