//! The flattened slot view a controller routes through.
//!
//! A view concatenates the native slots of every resolved endpoint into one
//! zero-based slot space. It owns the handles it was built from and is meant
//! to be dropped at the end of the operation that asked for it.

use lattice_grid::{EndpointRef, GridPosition};
use tracing::{debug, error, warn};

use crate::{EndpointHandle, Payload, ProxiedRole};

/// One endpoint inside a view.
pub struct ViewEndpoint {
    endpoint: EndpointRef,
    origin: GridPosition,
    role: ProxiedRole,
    handle: Box<dyn EndpointHandle>,
}

impl ViewEndpoint {
    pub fn endpoint(&self) -> EndpointRef {
        self.endpoint
    }

    /// Bridge the endpoint was reached through.
    pub fn origin(&self) -> GridPosition {
        self.origin
    }

    pub fn role(&self) -> ProxiedRole {
        self.role
    }

    pub fn slot_count(&self) -> usize {
        self.handle.slot_count()
    }
}

impl std::fmt::Debug for ViewEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewEndpoint")
            .field("endpoint", &self.endpoint)
            .field("origin", &self.origin)
            .field("role", &self.role)
            .field("slots", &self.handle.slot_count())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotRef {
    endpoint: usize,
    native: usize,
}

/// Slot-addressed aggregate of several endpoints.
#[derive(Debug, Default)]
pub struct CombinedEndpointView {
    endpoints: Vec<ViewEndpoint>,
    slots: Vec<SlotRef>,
    stale: Vec<EndpointRef>,
}

impl CombinedEndpointView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an endpoint; its native slots follow all existing ones.
    ///
    /// The native slot count is read once, here.
    pub fn push(
        &mut self,
        endpoint: EndpointRef,
        origin: GridPosition,
        role: ProxiedRole,
        handle: Box<dyn EndpointHandle>,
    ) {
        let index = self.endpoints.len();
        let count = handle.slot_count();
        self.slots
            .extend((0..count).map(|native| SlotRef { endpoint: index, native }));
        self.endpoints.push(ViewEndpoint {
            endpoint,
            origin,
            role,
            handle,
        });
    }

    /// Record an endpoint that was expected but did not resolve.
    pub(crate) fn mark_stale(&mut self, endpoint: EndpointRef) {
        self.stale.push(endpoint);
    }

    /// Whether an absolute endpoint is already part of the view.
    pub fn contains(&self, endpoint: &EndpointRef) -> bool {
        self.endpoints.iter().any(|e| e.endpoint == *endpoint)
    }

    /// Endpoints in slot order.
    pub fn endpoints(&self) -> &[ViewEndpoint] {
        &self.endpoints
    }

    /// Endpoints that were skipped while building the view.
    pub fn stale(&self) -> &[EndpointRef] {
        &self.stale
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Which endpoint and native slot a view slot maps to.
    pub fn locate(&self, slot: usize) -> Option<(EndpointRef, usize)> {
        let target = self.slots.get(slot)?;
        Some((self.endpoints[target.endpoint].endpoint, target.native))
    }

    fn target(&self, slot: usize) -> Option<(&dyn EndpointHandle, usize)> {
        let target = self.slots.get(slot)?;
        Some((self.endpoints[target.endpoint].handle.as_ref(), target.native))
    }

    pub fn peek(&self, slot: usize) -> Payload {
        match self.target(slot) {
            Some((handle, native)) => handle.peek(native),
            None => Payload::empty(),
        }
    }

    pub fn extract(&self, slot: usize, amount: u64, simulate: bool) -> Payload {
        match self.target(slot) {
            Some((handle, native)) => handle.extract(native, amount, simulate),
            None => Payload::empty(),
        }
    }

    /// Returns the rejected remainder; all of it for out-of-range slots.
    pub fn insert(&self, slot: usize, payload: Payload, simulate: bool) -> Payload {
        match self.target(slot) {
            Some((handle, native)) => handle.insert(native, payload, simulate),
            None => payload,
        }
    }

    pub fn slot_limit(&self, slot: usize) -> u64 {
        self.target(slot)
            .map(|(handle, native)| handle.slot_limit(native))
            .unwrap_or(0)
    }

    pub fn is_valid(&self, slot: usize, payload: &Payload) -> bool {
        self.target(slot)
            .map(|(handle, native)| handle.is_valid(native, payload))
            .unwrap_or(false)
    }

    /// Move up to `max` from one slot to another, never creating or
    /// destroying anything. Returns the amount actually moved.
    ///
    /// Both sides are simulated first and only the amount the destination
    /// accepts is extracted. If the real insert still rejects part of it,
    /// the leftover goes back into the source slot.
    pub fn transfer(&self, from: usize, to: usize, max: u64) -> u64 {
        if from == to || max == 0 {
            return 0;
        }

        let offered = self.extract(from, max, true);
        if offered.is_empty() {
            return 0;
        }
        let rejected = self.insert(to, offered.clone(), true);
        let acceptable = offered.amount.saturating_sub(rejected.amount);
        if acceptable == 0 {
            debug!(from, to, %offered, "Destination accepts nothing");
            return 0;
        }

        let taken = self.extract(from, acceptable, false);
        if taken.is_empty() {
            return 0;
        }
        let leftover = self.insert(to, taken.clone(), false);
        if !leftover.is_empty() {
            warn!(
                from, to, %leftover,
                "Destination rejected more than simulated; returning leftover"
            );
            let lost = self.insert(from, leftover.clone(), false);
            if !lost.is_empty() {
                error!(from, to, %lost, "Source refused returned leftover");
            }
        }

        let moved = taken.amount.saturating_sub(leftover.amount);
        debug!(from, to, moved, resource = %taken.resource, "Transferred");
        moved
    }
}
