//! Segment kinds and networks.

use std::collections::BTreeMap;

use lattice_grid::GridPosition;
use serde::{Deserialize, Serialize};

/// Identity of a controller (the thing routing requests are addressed to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControllerId(pub u64);

impl std::fmt::Display for ControllerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "controller#{}", self.0)
    }
}

/// Identity of a network. Allocated fresh on every create, merge and split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub u64);

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

/// What a segment is.
///
/// Connectivity never looks at the kind; only the one-controller-per-network
/// rule and bridge discovery do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SegmentKind {
    /// Plain connecting segment
    Conduit,
    /// The network's controller
    Controller(ControllerId),
    /// Exposes nearby external endpoints to the network
    Bridge,
    /// Host-defined kind with no topology semantics
    Custom(u32),
}

impl SegmentKind {
    /// The controller identity, if this is a controller segment.
    pub fn controller(&self) -> Option<ControllerId> {
        match self {
            SegmentKind::Controller(id) => Some(*id),
            SegmentKind::Conduit | SegmentKind::Bridge | SegmentKind::Custom(_) => None,
        }
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self, SegmentKind::Bridge)
    }
}

/// A maximal 6-connected set of segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    id: NetworkId,
    members: BTreeMap<GridPosition, SegmentKind>,
}

impl Network {
    pub(crate) fn new(id: NetworkId, members: BTreeMap<GridPosition, SegmentKind>) -> Self {
        debug_assert!(!members.is_empty(), "networks are never empty");
        Self { id, members }
    }

    pub(crate) fn singleton(id: NetworkId, pos: GridPosition, kind: SegmentKind) -> Self {
        Self::new(id, BTreeMap::from([(pos, kind)]))
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    /// Members in position order.
    pub fn members(&self) -> &BTreeMap<GridPosition, SegmentKind> {
        &self.members
    }

    pub(crate) fn members_mut(&mut self) -> &mut BTreeMap<GridPosition, SegmentKind> {
        &mut self.members
    }

    pub(crate) fn into_members(self) -> BTreeMap<GridPosition, SegmentKind> {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, pos: &GridPosition) -> bool {
        self.members.contains_key(pos)
    }

    /// Positions of every member matching `predicate`, in position order.
    pub fn positions_where<F>(&self, predicate: F) -> Vec<GridPosition>
    where
        F: Fn(&SegmentKind) -> bool,
    {
        self.members
            .iter()
            .filter(|(_, kind)| predicate(kind))
            .map(|(pos, _)| *pos)
            .collect()
    }

    /// Bridge positions, in position order.
    pub fn bridges(&self) -> Vec<GridPosition> {
        self.positions_where(SegmentKind::is_bridge)
    }

    /// Every controller member, in position order.
    pub fn controllers(&self) -> Vec<(GridPosition, ControllerId)> {
        self.members
            .iter()
            .filter_map(|(pos, kind)| kind.controller().map(|c| (*pos, c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serialization() {
        let json = serde_json::to_string(&SegmentKind::Controller(ControllerId(7))).unwrap();
        assert!(json.contains("controller"));
        assert!(json.contains('7'));

        let parsed: SegmentKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.controller(), Some(ControllerId(7)));

        let conduit: SegmentKind = serde_json::from_str(r#"{"kind":"conduit"}"#).unwrap();
        assert_eq!(conduit, SegmentKind::Conduit);
    }

    #[test]
    fn network_queries() {
        let mut members = BTreeMap::new();
        members.insert(GridPosition::at(2, 0, 0), SegmentKind::Bridge);
        members.insert(GridPosition::at(0, 0, 0), SegmentKind::Controller(ControllerId(1)));
        members.insert(GridPosition::at(1, 0, 0), SegmentKind::Conduit);
        let network = Network::new(NetworkId(3), members);

        assert_eq!(network.len(), 3);
        assert_eq!(network.bridges(), vec![GridPosition::at(2, 0, 0)]);
        assert_eq!(
            network.controllers(),
            vec![(GridPosition::at(0, 0, 0), ControllerId(1))]
        );
    }
}
