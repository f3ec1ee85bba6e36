//! Collaborator contracts: probing the world for endpoints and talking to them.
//!
//! The routing layer never owns resource containers. It asks a
//! [`CapabilityProbe`] for a live [`EndpointHandle`] whenever it needs one and
//! drops the handle when the operation ends.

use lattice_grid::EndpointRef;
use serde::{Deserialize, Serialize};

/// Opaque resource type ("iron_ingot", "water", ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A quantity of one resource.
///
/// A payload with `amount == 0` is empty regardless of its resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Payload {
    pub resource: ResourceId,
    pub amount: u64,
}

impl Payload {
    pub fn new(resource: impl Into<ResourceId>, amount: u64) -> Self {
        Self {
            resource: resource.into(),
            amount,
        }
    }

    /// The empty payload.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }

    /// Same resource, different amount.
    pub fn with_amount(&self, amount: u64) -> Self {
        Self {
            resource: self.resource.clone(),
            amount,
        }
    }

    /// Whether two payloads can share a slot.
    pub fn stacks_with(&self, other: &Payload) -> bool {
        self.is_empty() || other.is_empty() || self.resource == other.resource
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            f.write_str("empty")
        } else {
            write!(f, "{}x{}", self.amount, self.resource)
        }
    }
}

/// A live, slot-addressed resource container.
///
/// Implementations use interior mutability; a handle is only valid until the
/// world changes around it. `simulate = true` must never mutate state.
pub trait EndpointHandle: Send {
    /// Number of native slots.
    fn slot_count(&self) -> usize;

    /// Contents of a slot (empty for out-of-range slots).
    fn peek(&self, slot: usize) -> Payload;

    /// Take up to `amount` out of a slot; returns what was (or would be) taken.
    fn extract(&self, slot: usize, amount: u64, simulate: bool) -> Payload;

    /// Put `payload` into a slot; returns the rejected remainder.
    fn insert(&self, slot: usize, payload: Payload, simulate: bool) -> Payload;

    /// Maximum amount a slot can hold.
    fn slot_limit(&self, slot: usize) -> u64;

    /// Whether `payload` is allowed in a slot at all.
    fn is_valid(&self, slot: usize, payload: &Payload) -> bool;
}

/// Finds live endpoints in the world.
///
/// Probing anything that cannot hold an endpoint (empty cell, unloaded
/// region, malformed position) returns `None`; it never fails.
pub trait CapabilityProbe: Send + Sync {
    fn probe(&self, endpoint: &EndpointRef) -> Option<Box<dyn EndpointHandle>>;
}

impl<F> CapabilityProbe for F
where
    F: Fn(&EndpointRef) -> Option<Box<dyn EndpointHandle>> + Send + Sync,
{
    fn probe(&self, endpoint: &EndpointRef) -> Option<Box<dyn EndpointHandle>> {
        self(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_stacks_with_anything() {
        let iron = Payload::new("iron", 3);
        assert!(Payload::empty().stacks_with(&iron));
        assert!(iron.stacks_with(&Payload::empty()));
        assert!(!iron.stacks_with(&Payload::new("gold", 1)));
        assert!(Payload::new("gold", 0).is_empty());
    }

    #[test]
    fn payload_display() {
        assert_eq!(Payload::new("water", 250).to_string(), "250xwater");
        assert_eq!(Payload::empty().to_string(), "empty");
    }

    #[test]
    fn closure_probe() {
        let probe = |_: &EndpointRef| -> Option<Box<dyn EndpointHandle>> { None };
        let endpoint = EndpointRef::new(lattice_grid::GridPosition::at(0, 0, 0), None);
        assert!(probe.probe(&endpoint).is_none());
    }
}
