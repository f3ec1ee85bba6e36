//! Routing configuration.

use serde::{Deserialize, Serialize};

/// Cube radius scanned around a newly placed bridge.
pub const DEFAULT_SCAN_RADIUS: u32 = 5;

/// Tunables for discovery and routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Chebyshev radius of the bridge discovery cube
    pub scan_radius: u32,
    /// Expose an endpoint reachable through several bridges only once
    pub dedupe_endpoints: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            scan_radius: DEFAULT_SCAN_RADIUS,
            dedupe_endpoints: true,
        }
    }
}
