//! Error types for lattice-routing.

use lattice_grid::{EndpointRef, GridPosition, RelativeEndpoint};
use lattice_network::{ControllerId, SnapshotError, TopologyError};
use thiserror::Error;

/// Result type for routing and service operations.
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Recoverable conditions reported by the routing layer.
///
/// None of them aborts the caller's tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// The controller is not bound to any network.
    #[error("no network for {0}")]
    NoNetworkForController(ControllerId),

    /// An endpoint disappeared between discovery and routing.
    #[error("endpoint {0} no longer resolves")]
    StaleEndpoint(EndpointRef),

    /// No proxy record exists at this origin.
    #[error("no proxy at {0}")]
    UnknownProxy(GridPosition),

    /// The proxy exists but never discovered this endpoint.
    #[error("proxy at {origin} has no endpoint {endpoint}")]
    UnknownEndpoint {
        origin: GridPosition,
        endpoint: RelativeEndpoint,
    },

    /// The endpoint is in a different space than the proxy.
    #[error("endpoint {endpoint} is not reachable from proxy at {origin}")]
    UnreachableEndpoint {
        origin: GridPosition,
        endpoint: EndpointRef,
    },

    /// A restored proxy record does not sit on a bridge segment.
    #[error("proxy record at {0} has no bridge segment")]
    OrphanProxy(GridPosition),

    /// Topology mutation failed.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Snapshot restoration failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
