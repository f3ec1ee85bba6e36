//! Error types for lattice-network.

use lattice_grid::GridPosition;
use thiserror::Error;

use crate::{ControllerId, NetworkId};

/// Result type for topology mutations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Recoverable conditions reported by topology mutations.
///
/// Neither variant changes any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// A segment is already placed at this position.
    #[error("position {0} is already tracked")]
    AlreadyTracked(GridPosition),

    /// No segment is placed at this position.
    #[error("position {0} is not tracked")]
    NotTracked(GridPosition),
}

/// Reasons a snapshot (or live topology) violates the topology invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The same position is listed in two networks (or twice in one).
    #[error("position {0} appears more than once")]
    DuplicatePosition(GridPosition),

    /// Two networks share an id.
    #[error("network id {0} appears more than once")]
    DuplicateNetworkId(NetworkId),

    /// A network without members.
    #[error("network {0} has no members")]
    EmptyNetwork(NetworkId),

    /// A network whose members are not 6-connected.
    #[error("network {0} is not connected")]
    Disconnected(NetworkId),

    /// Two members of different networks touch, so they should be one.
    #[error("networks {0} and {1} are adjacent and should be merged")]
    AdjacentNetworks(NetworkId, NetworkId),

    /// More than one controller in a network, or one controller in two places.
    #[error("controller {controller} is duplicated in network {network}")]
    DuplicateController {
        controller: ControllerId,
        network: NetworkId,
    },

    /// The id counter would hand out an id that is already in use.
    #[error("next id {next} is not above existing network {existing}")]
    StaleIdCounter { next: u64, existing: NetworkId },

    /// Position index and network membership disagree.
    #[error("index entry for {0} does not match network membership")]
    IndexMismatch(GridPosition),
}
