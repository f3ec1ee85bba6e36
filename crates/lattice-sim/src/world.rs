//! An in-memory world of resource containers.
//!
//! The world plays the host's part: it answers probes and hands out handles.
//! Containers are shared behind `Arc<Mutex<_>>` so a handle keeps working on
//! the live container until the world drops it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lattice_grid::{EndpointRef, Face, GridPosition, SpaceId};
use lattice_routing::{CapabilityProbe, EndpointHandle, Payload, ResourceId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A fixed number of single-resource slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    slots: Vec<Payload>,
    limit: u64,
    /// Faces the container is reachable through; empty means all of them
    faces: Vec<Face>,
    /// Only this resource is accepted, if set
    accepts: Option<ResourceId>,
}

impl Container {
    /// `slots` empty slots holding at most `limit` each.
    pub fn new(slots: usize, limit: u64) -> Self {
        Self {
            slots: vec![Payload::empty(); slots],
            limit,
            faces: Vec::new(),
            accepts: None,
        }
    }

    /// Only expose the container through these faces.
    pub fn with_faces(mut self, faces: impl IntoIterator<Item = Face>) -> Self {
        self.faces = faces.into_iter().collect();
        self
    }

    pub fn with_filter(mut self, resource: impl Into<ResourceId>) -> Self {
        self.accepts = Some(resource.into());
        self
    }

    /// Fill slots in order, clamped to the slot limit.
    pub fn with_contents(mut self, contents: impl IntoIterator<Item = Payload>) -> Self {
        for (slot, payload) in self.slots.iter_mut().zip(contents) {
            *slot = payload.with_amount(payload.amount.min(self.limit));
        }
        self
    }

    pub fn slots(&self) -> &[Payload] {
        &self.slots
    }

    /// Total amount of one resource across all slots.
    pub fn total(&self, resource: &ResourceId) -> u64 {
        self.slots
            .iter()
            .filter(|p| !p.is_empty() && p.resource == *resource)
            .map(|p| p.amount)
            .sum()
    }

    fn exposes(&self, face: Option<Face>) -> bool {
        match face {
            Some(face) => self.faces.is_empty() || self.faces.contains(&face),
            None => true,
        }
    }

    fn accepts(&self, payload: &Payload) -> bool {
        match &self.accepts {
            Some(resource) => payload.is_empty() || payload.resource == *resource,
            None => true,
        }
    }
}

/// Handle on one live container.
struct ContainerHandle {
    position: GridPosition,
    container: Arc<Mutex<Container>>,
}

impl EndpointHandle for ContainerHandle {
    fn slot_count(&self) -> usize {
        self.container.lock().slots.len()
    }

    fn peek(&self, slot: usize) -> Payload {
        self.container.lock().slots.get(slot).cloned().unwrap_or_default()
    }

    fn extract(&self, slot: usize, amount: u64, simulate: bool) -> Payload {
        let mut container = self.container.lock();
        let Some(held) = container.slots.get_mut(slot) else {
            return Payload::empty();
        };
        let taken = held.with_amount(amount.min(held.amount));
        if !simulate && !taken.is_empty() {
            held.amount -= taken.amount;
            debug!(position = %self.position, slot, %taken, "Extracted");
        }
        taken
    }

    fn insert(&self, slot: usize, payload: Payload, simulate: bool) -> Payload {
        let mut container = self.container.lock();
        if payload.is_empty() || !container.accepts(&payload) {
            return payload;
        }
        let limit = container.limit;
        let Some(held) = container.slots.get_mut(slot) else {
            return payload;
        };
        if !held.stacks_with(&payload) {
            return payload;
        }

        let accepted = payload.amount.min(limit.saturating_sub(held.amount));
        if !simulate && accepted > 0 {
            *held = payload.with_amount(held.amount + accepted);
            debug!(
                position = %self.position, slot, accepted, resource = %payload.resource,
                "Inserted"
            );
        }
        payload.with_amount(payload.amount - accepted)
    }

    fn slot_limit(&self, slot: usize) -> u64 {
        let container = self.container.lock();
        if slot < container.slots.len() {
            container.limit
        } else {
            0
        }
    }

    fn is_valid(&self, slot: usize, payload: &Payload) -> bool {
        let container = self.container.lock();
        slot < container.slots.len() && container.accepts(payload)
    }
}

/// Containers by position, plus which spaces are loaded.
#[derive(Debug, Default)]
pub struct World {
    containers: RwLock<BTreeMap<GridPosition, Arc<Mutex<Container>>>>,
    unloaded: RwLock<BTreeSet<SpaceId>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a container, replacing any previous one at `pos`.
    pub fn place(&self, pos: GridPosition, container: Container) {
        debug!(%pos, slots = container.slots.len(), "Container placed");
        self.containers
            .write()
            .insert(pos, Arc::new(Mutex::new(container)));
    }

    pub fn remove(&self, pos: &GridPosition) -> Option<Container> {
        let removed = self.containers.write().remove(pos)?;
        debug!(%pos, "Container removed");
        let container = removed.lock().clone();
        Some(container)
    }

    /// Copy of a container's current state.
    pub fn container(&self, pos: &GridPosition) -> Option<Container> {
        let containers = self.containers.read();
        let container = containers.get(pos)?.lock().clone();
        Some(container)
    }

    /// Every container, in position order.
    pub fn containers(&self) -> Vec<(GridPosition, Container)> {
        self.containers
            .read()
            .iter()
            .map(|(pos, c)| (*pos, c.lock().clone()))
            .collect()
    }

    /// Make a space unreachable; probes into it find nothing.
    pub fn unload(&self, space: SpaceId) {
        self.unloaded.write().insert(space);
    }

    pub fn load(&self, space: SpaceId) {
        self.unloaded.write().remove(&space);
    }

    pub fn is_loaded(&self, space: SpaceId) -> bool {
        !self.unloaded.read().contains(&space)
    }
}

impl CapabilityProbe for World {
    fn probe(&self, endpoint: &EndpointRef) -> Option<Box<dyn EndpointHandle>> {
        if !self.is_loaded(endpoint.position.space) {
            return None;
        }
        let container = self.containers.read().get(&endpoint.position)?.clone();
        if !container.lock().exposes(endpoint.face) {
            return None;
        }
        Some(Box::new(ContainerHandle {
            position: endpoint.position,
            container,
        }))
    }
}
