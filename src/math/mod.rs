//! Grid math utilities

pub mod grid;

pub use grid::{GridPosition, positions_within_radius, within_radius};
