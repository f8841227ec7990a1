//! Engine-side hooks for tile entities
//!
//! The streaming core never owns render or physics objects. It refers to
//! them by [`EntityHandle`] and drives them through [`EngineAttachment`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::math::GridPosition;
use crate::terrain::mesh::MeshData;

/// Opaque id of an engine entity backing one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u64);

/// Operations the streaming core needs from the host engine
pub trait EngineAttachment {
    /// Create an inactive entity for a tile
    fn create_entity(&mut self, position: GridPosition) -> EntityHandle;
    /// Show or hide an entity
    fn set_active(&mut self, entity: EntityHandle, active: bool);
    /// Replace the render mesh
    fn assign_mesh(&mut self, entity: EntityHandle, mesh: &Arc<MeshData>);
    /// Replace the collision mesh
    fn assign_collider(&mut self, entity: EntityHandle, mesh: &Arc<MeshData>);
    /// Destroy the entity; the handle is dead afterwards
    fn destroy(&mut self, entity: EntityHandle);
}

/// Last known state of a headless entity
#[derive(Debug, Clone)]
pub struct EntityState {
    pub position: GridPosition,
    pub active: bool,
    pub mesh: Option<Arc<MeshData>>,
    pub collider: Option<Arc<MeshData>>,
    pub mesh_assignments: u32,
    pub collider_assignments: u32,
}

/// Bookkeeping-only attachment for tools, tests and servers without a renderer
#[derive(Debug, Default)]
pub struct HeadlessAttachment {
    next_id: u64,
    entities: HashMap<EntityHandle, EntityState>,
    destroyed: u64,
}

impl HeadlessAttachment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, entity: EntityHandle) -> Option<&EntityState> {
        self.entities.get(&entity)
    }

    /// Live entity at a grid position
    pub fn entity_at(&self, position: GridPosition) -> Option<&EntityState> {
        self.entities.values().find(|state| state.position == position)
    }

    pub fn live_count(&self) -> usize {
        self.entities.len()
    }

    pub fn active_count(&self) -> usize {
        self.entities.values().filter(|state| state.active).count()
    }

    pub fn destroyed_count(&self) -> u64 {
        self.destroyed
    }

    fn state_mut(&mut self, entity: EntityHandle) -> Option<&mut EntityState> {
        let state = self.entities.get_mut(&entity);
        if state.is_none() {
            log::warn!("HeadlessAttachment: unknown entity {:?}", entity);
        }
        state
    }
}

impl EngineAttachment for HeadlessAttachment {
    fn create_entity(&mut self, position: GridPosition) -> EntityHandle {
        let handle = EntityHandle(self.next_id);
        self.next_id += 1;
        self.entities.insert(
            handle,
            EntityState {
                position,
                active: false,
                mesh: None,
                collider: None,
                mesh_assignments: 0,
                collider_assignments: 0,
            },
        );
        handle
    }

    fn set_active(&mut self, entity: EntityHandle, active: bool) {
        if let Some(state) = self.state_mut(entity) {
            state.active = active;
        }
    }

    fn assign_mesh(&mut self, entity: EntityHandle, mesh: &Arc<MeshData>) {
        if let Some(state) = self.state_mut(entity) {
            state.mesh = Some(Arc::clone(mesh));
            state.mesh_assignments += 1;
        }
    }

    fn assign_collider(&mut self, entity: EntityHandle, mesh: &Arc<MeshData>) {
        if let Some(state) = self.state_mut(entity) {
            state.collider = Some(Arc::clone(mesh));
            state.collider_assignments += 1;
        }
    }

    fn destroy(&mut self, entity: EntityHandle) {
        if self.entities.remove(&entity).is_some() {
            self.destroyed += 1;
        } else {
            log::warn!("HeadlessAttachment: destroy of unknown entity {:?}", entity);
        }
    }
}
