//! Combined topology and proxy snapshots.

use lattice_network::{NetworkTopology, SegmentKind, TopologySnapshot};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, RoutingError};
use crate::{ProxyRegistry, RegistrySnapshot};

/// Everything a service needs to resume, as plain data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub topology: TopologySnapshot,
    pub registry: RegistrySnapshot,
}

impl ServiceSnapshot {
    /// Rebuild and cross-check both halves.
    ///
    /// Every proxy record must sit on a bridge segment. A bridge without a
    /// record is accepted with a warning; it exposes nothing until rescanned.
    pub fn restore(&self) -> Result<(NetworkTopology, ProxyRegistry)> {
        let topology = NetworkTopology::restore(&self.topology)?;
        let registry = ProxyRegistry::restore(&self.registry);

        for record in registry.iter() {
            if topology.kind_at(&record.origin()) != Some(SegmentKind::Bridge) {
                return Err(RoutingError::OrphanProxy(record.origin()));
            }
        }
        for network in topology.networks() {
            for origin in network.bridges() {
                if !registry.contains(&origin) {
                    warn!(%origin, "Bridge restored without a proxy record");
                }
            }
        }

        Ok((topology, registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProxyRecord;
    use lattice_grid::GridPosition;

    #[test]
    fn record_without_bridge_is_rejected() {
        let mut topology = NetworkTopology::new();
        topology
            .add_segment(GridPosition::at(0, 0, 0), SegmentKind::Conduit)
            .unwrap();

        let snapshot = ServiceSnapshot {
            topology: topology.snapshot(),
            registry: RegistrySnapshot {
                records: vec![ProxyRecord::empty(GridPosition::at(0, 0, 0))],
            },
        };

        assert_eq!(
            snapshot.restore().err(),
            Some(RoutingError::OrphanProxy(GridPosition::at(0, 0, 0)))
        );
    }

    #[test]
    fn bridge_with_record_restores() {
        let mut topology = NetworkTopology::new();
        topology
            .add_segment(GridPosition::at(0, 0, 0), SegmentKind::Bridge)
            .unwrap();

        let snapshot = ServiceSnapshot {
            topology: topology.snapshot(),
            registry: RegistrySnapshot {
                records: vec![ProxyRecord::empty(GridPosition::at(0, 0, 0))],
            },
        };

        let (topology, registry) = snapshot.restore().unwrap();
        assert_eq!(topology.len(), 1);
        assert_eq!(registry.len(), 1);
    }
}
