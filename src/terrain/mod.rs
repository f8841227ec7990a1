//! Procedural terrain: height sampling, heightmaps and tile meshes

pub mod sampler;
pub use sampler::{HeightSampler, LayeredSampler, NoiseSampler};

pub mod heightmap;
pub use heightmap::Heightmap;

pub mod mesh;
pub use mesh::{MeshData, Vertex};

pub mod tile_mesh;
pub use tile_mesh::{HeightField, TileMesh};
