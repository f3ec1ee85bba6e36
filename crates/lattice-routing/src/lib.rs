//! Lattice Capability Routing
//!
//! Lets a controller use resource endpoints that sit anywhere near the
//! bridges of its network, as if they were one container.
//!
//! # Discovery
//!
//! Each bridge scans a cube around itself once, when placed
//! ([`ProxyRegistry::on_bridge_placed`]). Found endpoints start with role
//! [`ProxiedRole::None`] and are only routed once a role is assigned.
//!
//! # Routing
//!
//! [`CapabilityRouter::route`] looks up the controller's network, gathers the
//! records of its bridges and resolves a live handle for every endpoint with
//! a requested role. The result is a [`CombinedEndpointView`]: one slot space
//! over all of them, in a stable order.
//!
//! # Service
//!
//! [`TopologyService`] owns the topology and registry behind locks, talks to
//! the world through a [`CapabilityProbe`] and reports every change to an
//! [`EventSink`].

mod capability;
mod role;
mod config;
mod error;
mod events;
mod proxy;
mod view;
mod router;
mod snapshot;
mod service;

pub use capability::{CapabilityProbe, EndpointHandle, Payload, ResourceId};
pub use role::{ProxiedRole, RoleSet};
pub use config::{RoutingConfig, DEFAULT_SCAN_RADIUS};
pub use error::{Result, RoutingError};
pub use events::{EventLog, EventSink, LatticeEvent, NullSink, ProxyEvent, RouteEvent};
pub use proxy::{discover, ProxyRecord, ProxyRegistry, RegistrySnapshot, RescanReport};
pub use view::{CombinedEndpointView, ViewEndpoint};
pub use router::CapabilityRouter;
pub use snapshot::ServiceSnapshot;
pub use service::TopologyService;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn service_is_shareable() {
        assert_send_sync::<TopologyService>();
    }
}
