//! Topology events for replication and observers.

use lattice_grid::GridPosition;
use serde::{Deserialize, Serialize};

use crate::{ControllerId, NetworkId};

/// Something that changed in the topology.
///
/// Mutations return their events in order; the owning service forwards them
/// to whatever sink the host injected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NetworkEvent {
    /// A network came into existence (fresh placement or split-off part)
    NetworkCreated { network: NetworkId },

    /// Several networks were joined under a new id
    NetworkMerged {
        sources: Vec<NetworkId>,
        into: NetworkId,
    },

    /// A network fell apart into several new ones
    NetworkSplit {
        from: NetworkId,
        into: Vec<NetworkId>,
    },

    /// A network lost its last member
    NetworkRemoved { network: NetworkId },

    /// A controller was bound (or rebound after a merge/split) to a network
    ControllerBound {
        controller: ControllerId,
        network: NetworkId,
    },

    /// A controller segment was removed and its binding released
    ControllerReleased {
        controller: ControllerId,
        network: NetworkId,
    },

    /// A controller was thrown out to keep its network's controller unique
    ControllerEvicted {
        controller: ControllerId,
        position: GridPosition,
        network: Option<NetworkId>,
    },
}

impl NetworkEvent {
    /// Networks this event mentions.
    pub fn networks(&self) -> Vec<NetworkId> {
        match self {
            NetworkEvent::NetworkCreated { network } => vec![*network],
            NetworkEvent::NetworkMerged { sources, into } => {
                let mut ids = sources.clone();
                ids.push(*into);
                ids
            }
            NetworkEvent::NetworkSplit { from, into } => {
                let mut ids = vec![*from];
                ids.extend(into.iter().copied());
                ids
            }
            NetworkEvent::NetworkRemoved { network } => vec![*network],
            NetworkEvent::ControllerBound { network, .. } => vec![*network],
            NetworkEvent::ControllerReleased { network, .. } => vec![*network],
            NetworkEvent::ControllerEvicted { network, .. } => network.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization() {
        let event = NetworkEvent::NetworkSplit {
            from: NetworkId(4),
            into: vec![NetworkId(5), NetworkId(6)],
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("NetworkSplit"));

        let parsed: NetworkEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.networks().len(), 3);
    }

    #[test]
    fn eviction_without_network() {
        let event = NetworkEvent::ControllerEvicted {
            controller: ControllerId(2),
            position: GridPosition::at(0, 0, 0),
            network: None,
        };
        assert!(event.networks().is_empty());
    }
}
