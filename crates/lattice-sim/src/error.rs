//! Error types for the simulation harness.

use lattice_routing::RoutingError;
use thiserror::Error;

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that stop a scenario.
#[derive(Debug, Error)]
pub enum SimError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed scenario or report
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A step the scenario relies on failed
    #[error("step {index} failed: {source}")]
    Step {
        index: usize,
        #[source]
        source: RoutingError,
    },

    /// A container step targeted an empty cell
    #[error("no container at {0}")]
    NoContainer(lattice_grid::GridPosition),
}
