//! A streamed terrain tile

use std::sync::Arc;

use crate::core::Result;
use crate::math::GridPosition;
use crate::streaming::attachment::{EngineAttachment, EntityHandle};
use crate::terrain::mesh::MeshData;
use crate::terrain::tile_mesh::{HeightField, TileMesh};

/// One terrain tile: grid slot, owned geometry and engine entity
pub struct Tile {
    position: GridPosition,
    mesh: TileMesh,
    entity: EntityHandle,
    active: bool,
    /// Render mesh last handed to the engine
    render_mesh: Option<(u32, Arc<MeshData>)>,
    /// Collision mesh last handed to the engine
    collider_mesh: Option<(u32, Arc<MeshData>)>,
}

impl Tile {
    pub fn new(position: GridPosition, field: HeightField, entity: EntityHandle) -> Self {
        Self {
            position,
            mesh: TileMesh::new(position, field),
            entity,
            active: false,
            render_mesh: None,
            collider_mesh: None,
        }
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    pub fn entity(&self) -> EntityHandle {
        self.entity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn mesh(&self) -> &TileMesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut TileMesh {
        &mut self.mesh
    }

    /// Resolution of the render mesh currently assigned
    pub fn mesh_resolution(&self) -> Option<u32> {
        self.render_mesh.as_ref().map(|(resolution, _)| *resolution)
    }

    /// Resolution of the collider currently assigned
    pub fn collider_resolution(&self) -> Option<u32> {
        self.collider_mesh.as_ref().map(|(resolution, _)| *resolution)
    }

    /// Assign the render mesh for `resolution`, building it if needed.
    ///
    /// Returns `Ok(true)` when the engine received a different mesh.
    pub fn apply_lod<E>(&mut self, resolution: u32, engine: &mut E) -> Result<bool>
    where
        E: EngineAttachment + ?Sized,
    {
        let mesh = self.mesh.build_mesh(resolution)?;
        if is_same(&self.render_mesh, &mesh) {
            return Ok(false);
        }

        engine.assign_mesh(self.entity, &mesh);
        self.render_mesh = Some((resolution, mesh));
        Ok(true)
    }

    /// Assign the collider for `resolution` if it is missing or stale.
    ///
    /// Returns `Ok(true)` when a collider was (re)built.
    pub fn apply_collider<E>(&mut self, resolution: u32, engine: &mut E) -> Result<bool>
    where
        E: EngineAttachment + ?Sized,
    {
        let mesh = self.mesh.build_mesh(resolution)?;
        if is_same(&self.collider_mesh, &mesh) {
            return Ok(false);
        }

        engine.assign_collider(self.entity, &mesh);
        self.collider_mesh = Some((resolution, mesh));
        Ok(true)
    }

    /// Force the next collider pass to rebuild this tile's collider
    pub fn mark_collider_dirty(&mut self) {
        self.collider_mesh = None;
    }
}

fn is_same(current: &Option<(u32, Arc<MeshData>)>, mesh: &Arc<MeshData>) -> bool {
    current
        .as_ref()
        .is_some_and(|(_, assigned)| Arc::ptr_eq(assigned, mesh))
}
