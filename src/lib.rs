//! Terrastream - procedural terrain tile streaming
//!
//! Streams heightmap terrain tiles around a moving viewpoint: tiles are
//! generated on worker threads, meshed per level of detail, and parked in a
//! bounded cache when they leave the generation radius.

pub mod core;
pub mod math;
pub mod terrain;
pub mod streaming;
