//! Change notifications for replication and observers.

use lattice_grid::{EndpointRef, GridPosition, RelativeEndpoint};
use lattice_network::{ControllerId, NetworkEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ProxiedRole;

/// Proxy registry changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProxyEvent {
    /// A bridge was placed and scanned
    ProxyAdded { origin: GridPosition, endpoints: usize },

    /// A bridge was removed; views built from it are stale
    ProxyRemoved { origin: GridPosition },

    /// An endpoint's role changed
    ProxyRoleChanged {
        origin: GridPosition,
        endpoint: RelativeEndpoint,
        role: ProxiedRole,
    },

    /// A bridge was explicitly re-scanned
    ProxyRescanned {
        origin: GridPosition,
        added: usize,
        removed: usize,
    },
}

/// Routing outcomes worth observing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RouteEvent {
    /// A route was requested for a controller with no network
    RouteFailed { controller: ControllerId },

    /// An endpoint recorded by a proxy did not resolve and was skipped
    StaleEndpointSkipped {
        controller: ControllerId,
        endpoint: EndpointRef,
    },
}

/// Everything the service reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "event", rename_all = "lowercase")]
pub enum LatticeEvent {
    Topology(NetworkEvent),
    Proxy(ProxyEvent),
    Route(RouteEvent),
}

impl From<NetworkEvent> for LatticeEvent {
    fn from(event: NetworkEvent) -> Self {
        LatticeEvent::Topology(event)
    }
}

impl From<ProxyEvent> for LatticeEvent {
    fn from(event: ProxyEvent) -> Self {
        LatticeEvent::Proxy(event)
    }
}

impl From<RouteEvent> for LatticeEvent {
    fn from(event: RouteEvent) -> Self {
        LatticeEvent::Route(event)
    }
}

/// Receives events after the mutation that produced them is published.
///
/// Sinks are called without any service lock held, so they may query the
/// service.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LatticeEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &LatticeEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<LatticeEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<LatticeEvent> {
        self.events.lock().clone()
    }

    /// Take everything recorded so far.
    pub fn drain(&self) -> Vec<LatticeEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Count recorded events matching `predicate`.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&LatticeEvent) -> bool,
    {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &LatticeEvent) {
        debug!(?event, "Recorded event");
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_network::NetworkId;

    #[test]
    fn event_serialization() {
        let event = LatticeEvent::from(NetworkEvent::NetworkCreated {
            network: NetworkId(3),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""source":"topology""#));
        assert!(json.contains("NetworkCreated"));

        let parsed: LatticeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn log_records_in_order() {
        let log = EventLog::new();
        log.emit(&ProxyEvent::ProxyRemoved { origin: GridPosition::at(1, 0, 0) }.into());
        log.emit(&RouteEvent::RouteFailed { controller: ControllerId(1) }.into());

        assert_eq!(log.len(), 2);
        assert_eq!(log.count(|e| matches!(e, LatticeEvent::Route(_))), 1);
        assert!(matches!(log.events()[0], LatticeEvent::Proxy(_)));

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(log.is_empty());
    }
}
