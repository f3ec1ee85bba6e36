//! Lattice Network Topology
//!
//! Tracks which grid segments form the same connected network while segments
//! are placed and removed in any order.
//!
//! # Model
//!
//! A network is a maximal set of segments connected through shared faces.
//! Every placed position belongs to exactly one network and the position
//! index is always the exact inverse of network membership.
//!
//! # Lifecycle
//!
//! - Placing a segment creates, joins, or merges networks ([`NetworkTopology::add_segment`])
//! - Removing a segment shrinks, deletes, or splits a network ([`NetworkTopology::remove_segment`])
//! - Merges and splits always allocate fresh [`NetworkId`]s
//!
//! # Controllers
//!
//! A network holds at most one [`SegmentKind::Controller`]. Collisions are
//! resolved by ejecting every controller but the first one encountered; the
//! ejections are reported as [`Ejection`]s and [`NetworkEvent::ControllerEvicted`]
//! events, never as errors.

mod segment;
mod controller;
mod events;
mod error;
mod topology;
mod snapshot;

pub use segment::{ControllerId, Network, NetworkId, SegmentKind};
pub use controller::{ControllerBinding, ControllerIndex, Ejection};
pub use events::NetworkEvent;
pub use error::{Result, SnapshotError, TopologyError};
pub use topology::{components, Members, NetworkTopology, Placement, Removal};
pub use snapshot::{NetworkSnapshot, TopologySnapshot};

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_grid::GridPosition;

    #[test]
    fn line_with_controller_is_one_network() {
        let mut topology = NetworkTopology::new();
        topology
            .add_segment(GridPosition::at(0, 0, 0), SegmentKind::Controller(ControllerId(1)))
            .unwrap();
        topology.add_segment(GridPosition::at(1, 0, 0), SegmentKind::Conduit).unwrap();
        topology.add_segment(GridPosition::at(2, 0, 0), SegmentKind::Conduit).unwrap();

        assert_eq!(topology.network_count(), 1);
        assert_eq!(topology.len(), 3);
        assert!(topology.controller_network(ControllerId(1)).is_some());
        topology.validate().unwrap();
    }
}
