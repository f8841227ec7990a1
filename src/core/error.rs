//! Error types for terrain streaming

use thiserror::Error;

use crate::math::GridPosition;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid resolution {requested} (heightmap resolution {available})")]
    InvalidResolution { requested: u32, available: u32 },

    #[error("Generation failed for tile {position}: {reason}")]
    GenerationFailed { position: GridPosition, reason: String },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
