//! Building a controller's endpoint view.

use std::collections::BTreeSet;

use lattice_network::{ControllerId, NetworkTopology};
use tracing::debug;

use crate::error::{Result, RoutingError};
use crate::{CapabilityProbe, CombinedEndpointView, ProxyRegistry, RoleSet, RoutingConfig};

/// Read-only routing over borrowed topology and registry state.
///
/// The router holds no state of its own. Every call to [`route`] resolves
/// fresh handles, so nothing it returns can go stale in a cache.
///
/// [`route`]: CapabilityRouter::route
pub struct CapabilityRouter<'a> {
    topology: &'a NetworkTopology,
    registry: &'a ProxyRegistry,
    probe: &'a dyn CapabilityProbe,
    config: &'a RoutingConfig,
}

impl<'a> CapabilityRouter<'a> {
    pub fn new(
        topology: &'a NetworkTopology,
        registry: &'a ProxyRegistry,
        probe: &'a dyn CapabilityProbe,
        config: &'a RoutingConfig,
    ) -> Self {
        Self {
            topology,
            registry,
            probe,
            config,
        }
    }

    /// Every endpoint with a role in `roles` reachable from the controller's
    /// network.
    ///
    /// Slots are ordered by bridge position, then by the endpoint's offset
    /// and face relative to that bridge, then by native slot. Endpoints that
    /// no longer resolve are skipped and listed in [`CombinedEndpointView::stale`].
    pub fn route(&self, controller: ControllerId, roles: RoleSet) -> Result<CombinedEndpointView> {
        let network = self
            .topology
            .controller_network(controller)
            .ok_or(RoutingError::NoNetworkForController(controller))?;

        let mut view = CombinedEndpointView::new();
        let mut seen = BTreeSet::new();

        for record in self.registry.records_for_network(self.topology, network) {
            let origin = record.origin();
            for (relative, role) in record.entries() {
                if !roles.contains(role) {
                    continue;
                }
                let Some(endpoint) = record.resolve(&relative) else {
                    debug!(%origin, %relative, "Endpoint offset leaves the grid; skipped");
                    continue;
                };
                if self.config.dedupe_endpoints && !seen.insert(endpoint) {
                    continue;
                }
                match self.probe.probe(&endpoint) {
                    Some(handle) => view.push(endpoint, origin, role, handle),
                    None => {
                        let error = RoutingError::StaleEndpoint(endpoint);
                        debug!(%controller, %error, "Skipping endpoint");
                        view.mark_stale(endpoint);
                    }
                }
            }
        }

        debug!(
            %controller,
            %network,
            endpoints = view.endpoints().len(),
            slots = view.slot_count(),
            stale = view.stale().len(),
            "Routed"
        );
        Ok(view)
    }
}
