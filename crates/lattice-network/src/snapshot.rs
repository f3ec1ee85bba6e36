//! Serializable topology snapshots.
//!
//! Snapshots are plain data: every list is sorted so two snapshots of the
//! same topology compare equal. Restoring rebuilds the index and controller
//! bindings from the member lists and cross-checks them against the copies
//! stored in the snapshot.

use std::collections::{HashMap, HashSet};

use lattice_grid::{GridPosition, Neighborhood};
use serde::{Deserialize, Serialize};

use crate::controller::ControllerBinding;
use crate::error::SnapshotError;
use crate::topology::{components, Members, NetworkTopology};
use crate::{ControllerId, Network, NetworkId, SegmentKind};

/// One network as plain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub id: NetworkId,
    /// Members in position order
    pub members: Vec<(GridPosition, SegmentKind)>,
}

/// The whole topology as plain data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    /// Next network id to hand out
    pub next_id: u64,
    /// Networks in id order
    pub networks: Vec<NetworkSnapshot>,
    /// Position index in position order
    pub index: Vec<(GridPosition, NetworkId)>,
    /// Controller bindings in controller order
    pub controllers: Vec<(ControllerId, ControllerBinding)>,
}

impl NetworkTopology {
    /// Capture the topology.
    pub fn snapshot(&self) -> TopologySnapshot {
        let mut networks: Vec<NetworkSnapshot> = self
            .networks
            .values()
            .map(|network| NetworkSnapshot {
                id: network.id(),
                members: network.members().iter().map(|(p, k)| (*p, *k)).collect(),
            })
            .collect();
        networks.sort_by_key(|n| n.id);

        let mut index: Vec<_> = self.index.iter().map(|(p, id)| (*p, *id)).collect();
        index.sort();

        let mut controllers: Vec<_> = self.controllers.iter().collect();
        controllers.sort_by_key(|(c, _)| *c);

        TopologySnapshot {
            next_id: self.next_id,
            networks,
            index,
            controllers,
        }
    }

    /// Rebuild a topology from a snapshot, validating every invariant.
    pub fn restore(snapshot: &TopologySnapshot) -> Result<Self, SnapshotError> {
        let mut topology = NetworkTopology {
            next_id: snapshot.next_id,
            ..NetworkTopology::default()
        };

        for network in &snapshot.networks {
            if topology.networks.contains_key(&network.id) {
                return Err(SnapshotError::DuplicateNetworkId(network.id));
            }
            let mut members = Members::new();
            for (pos, kind) in &network.members {
                if topology.index.contains_key(pos) || members.insert(*pos, *kind).is_some() {
                    return Err(SnapshotError::DuplicatePosition(*pos));
                }
            }
            if members.is_empty() {
                return Err(SnapshotError::EmptyNetwork(network.id));
            }
            for (pos, kind) in &members {
                topology.index.insert(*pos, network.id);
                if let Some(controller) = kind.controller() {
                    let duplicate = SnapshotError::DuplicateController {
                        controller,
                        network: network.id,
                    };
                    // bind() would move an already bound controller
                    if topology.controllers.binding(controller).is_some() {
                        return Err(duplicate);
                    }
                    topology
                        .controllers
                        .bind(controller, network.id, *pos)
                        .map_err(|_| duplicate)?;
                }
            }
            topology.networks.insert(network.id, Network::new(network.id, members));
        }

        topology.validate()?;

        let stored_index: HashMap<GridPosition, NetworkId> =
            snapshot.index.iter().copied().collect();
        for (pos, id) in &topology.index {
            if stored_index.get(pos) != Some(id) {
                return Err(SnapshotError::IndexMismatch(*pos));
            }
        }
        if let Some(pos) = stored_index.keys().find(|p| !topology.index.contains_key(*p)) {
            return Err(SnapshotError::IndexMismatch(*pos));
        }
        for (controller, binding) in &snapshot.controllers {
            if topology.controllers.binding(*controller) != Some(*binding) {
                return Err(SnapshotError::IndexMismatch(binding.position));
            }
        }

        Ok(topology)
    }

    /// Check every topology invariant.
    ///
    /// Used after restoring and by tests; a live topology built through
    /// `add_segment`/`remove_segment` always passes.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen: HashSet<GridPosition> = HashSet::with_capacity(self.index.len());

        for (id, network) in &self.networks {
            if id.0 >= self.next_id {
                return Err(SnapshotError::StaleIdCounter {
                    next: self.next_id,
                    existing: *id,
                });
            }
            if network.is_empty() {
                return Err(SnapshotError::EmptyNetwork(*id));
            }

            let mut controllers = network.controllers().into_iter();
            if let (Some(_), Some((_, extra))) = (controllers.next(), controllers.next()) {
                return Err(SnapshotError::DuplicateController {
                    controller: extra,
                    network: *id,
                });
            }

            for pos in network.members().keys() {
                if !seen.insert(*pos) {
                    return Err(SnapshotError::DuplicatePosition(*pos));
                }
                if self.index.get(pos) != Some(id) {
                    return Err(SnapshotError::IndexMismatch(*pos));
                }
                for (_, neighbor) in Neighborhood::of(*pos) {
                    if let Some(other) = self.index.get(&neighbor) {
                        if other != id {
                            return Err(SnapshotError::AdjacentNetworks(*id, *other));
                        }
                    }
                }
            }

            for (pos, controller) in network.controllers() {
                let expected = ControllerBinding {
                    network: *id,
                    position: pos,
                };
                if self.controllers.binding(controller) != Some(expected) {
                    return Err(SnapshotError::IndexMismatch(pos));
                }
            }

            let first = network.members().keys().next().copied();
            let reached = components(network.members(), first)
                .first()
                .map(Members::len)
                .unwrap_or(0);
            if reached != network.len() {
                return Err(SnapshotError::Disconnected(*id));
            }
        }

        if let Some(pos) = self.index.keys().find(|p| !seen.contains(*p)) {
            return Err(SnapshotError::IndexMismatch(*pos));
        }

        for (controller, binding) in self.controllers.iter() {
            let member = self
                .networks
                .get(&binding.network)
                .and_then(|n| n.members().get(&binding.position));
            if member != Some(&SegmentKind::Controller(controller)) {
                return Err(SnapshotError::IndexMismatch(binding.position));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NetworkTopology {
        let mut topology = NetworkTopology::new();
        topology
            .add_segment(GridPosition::at(0, 0, 0), SegmentKind::Controller(ControllerId(1)))
            .unwrap();
        topology
            .add_segment(GridPosition::at(1, 0, 0), SegmentKind::Conduit)
            .unwrap();
        topology
            .add_segment(GridPosition::at(2, 0, 0), SegmentKind::Bridge)
            .unwrap();
        topology
            .add_segment(GridPosition::at(9, 9, 9), SegmentKind::Custom(4))
            .unwrap();
        topology
    }

    #[test]
    fn restore_reproduces_topology() {
        let topology = sample();
        let snapshot = topology.snapshot();

        let restored = NetworkTopology::restore(&snapshot).unwrap();
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(
            restored.controller_network(ControllerId(1)),
            topology.controller_network(ControllerId(1))
        );
    }

    #[test]
    fn snapshot_survives_json() {
        let snapshot = sample().snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: TopologySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn restored_ids_are_not_reused() {
        let snapshot = sample().snapshot();
        let mut restored = NetworkTopology::restore(&snapshot).unwrap();

        let placement = restored
            .add_segment(GridPosition::at(50, 0, 0), SegmentKind::Conduit)
            .unwrap();
        assert!(placement.network.unwrap().0 >= snapshot.next_id);
    }

    #[test]
    fn disconnected_network_is_rejected() {
        let mut snapshot = sample().snapshot();
        snapshot.networks[0]
            .members
            .push((GridPosition::at(40, 0, 0), SegmentKind::Conduit));
        snapshot.index.push((GridPosition::at(40, 0, 0), snapshot.networks[0].id));

        let err = NetworkTopology::restore(&snapshot).unwrap_err();
        assert_eq!(err, SnapshotError::Disconnected(snapshot.networks[0].id));
    }

    #[test]
    fn duplicate_controller_is_rejected() {
        let mut snapshot = sample().snapshot();
        let id = snapshot.networks[0].id;
        snapshot.networks[0]
            .members
            .push((GridPosition::at(0, 1, 0), SegmentKind::Controller(ControllerId(2))));

        let err = NetworkTopology::restore(&snapshot).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::DuplicateController {
                controller: ControllerId(2),
                network: id
            }
        );
    }

    #[test]
    fn controller_in_two_networks_is_rejected() {
        let mut snapshot = sample().snapshot();
        let other = snapshot.networks[1].id;
        snapshot.networks[1]
            .members
            .push((GridPosition::at(9, 9, 10), SegmentKind::Controller(ControllerId(1))));
        snapshot.index.push((GridPosition::at(9, 9, 10), other));
        snapshot.index.sort();

        let err = NetworkTopology::restore(&snapshot).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::DuplicateController {
                controller: ControllerId(1),
                network: other
            }
        );
    }

    #[test]
    fn unbound_controller_member_fails_validation() {
        let mut topology = sample();
        topology.controllers.release(ControllerId(1));

        assert_eq!(
            topology.validate(),
            Err(SnapshotError::IndexMismatch(GridPosition::at(0, 0, 0)))
        );
    }

    #[test]
    fn stale_counter_is_rejected() {
        let mut snapshot = sample().snapshot();
        snapshot.next_id = 0;
        assert!(matches!(
            NetworkTopology::restore(&snapshot),
            Err(SnapshotError::StaleIdCounter { .. })
        ));
    }

    #[test]
    fn live_topology_validates() {
        sample().validate().unwrap();
    }
}
