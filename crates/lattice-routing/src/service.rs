//! The owned service tying topology, proxies and routing together.
//!
//! # Locking
//!
//! Topology and registry each sit behind a `parking_lot::RwLock`. Mutations
//! take both write locks, topology first and registry second, for the whole
//! multi-step operation, so a reader never sees half a merge or a bridge
//! without its record. Routing takes read locks in the same order.
//!
//! Bridge scans talk to the world and run before any lock is taken. Events
//! are handed to the sink after the locks are released, so a sink may call
//! back into the service.

use std::sync::Arc;

use lattice_grid::{EndpointRef, GridPosition};
use lattice_network::{ControllerId, NetworkId, NetworkTopology, Placement, Removal, SegmentKind};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, RoutingError};
use crate::events::{EventSink, LatticeEvent, ProxyEvent, RouteEvent};
use crate::proxy::{discover, ProxyRecord, ProxyRegistry, RescanReport};
use crate::{
    CapabilityProbe, CapabilityRouter, CombinedEndpointView, ProxiedRole, RoleSet, RoutingConfig,
    ServiceSnapshot,
};

/// Authoritative network state for one world.
pub struct TopologyService {
    config: RoutingConfig,
    topology: RwLock<NetworkTopology>,
    registry: RwLock<ProxyRegistry>,
    probe: Arc<dyn CapabilityProbe>,
    sink: Arc<dyn EventSink>,
}

impl TopologyService {
    pub fn new(
        config: RoutingConfig,
        probe: Arc<dyn CapabilityProbe>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            topology: RwLock::new(NetworkTopology::new()),
            registry: RwLock::new(ProxyRegistry::new()),
            probe,
            sink,
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Place a segment. Bridges are scanned once, here.
    ///
    /// Ejected controllers are reported in the returned [`Placement`]; the
    /// host is expected to remove them from the world.
    pub fn place_segment(&self, pos: GridPosition, kind: SegmentKind) -> Result<Placement> {
        let scanned = kind
            .is_bridge()
            .then(|| ProxyRecord::scan(pos, self.probe.as_ref(), self.config.scan_radius));

        let mut events: Vec<LatticeEvent> = Vec::new();
        let placement = {
            let mut topology = self.topology.write();
            let mut registry = self.registry.write();

            let placement = topology.add_segment(pos, kind)?;
            events.extend(placement.events.iter().cloned().map(LatticeEvent::from));

            if let Some(record) = scanned {
                let endpoints = record.len();
                if registry.insert_record(record) {
                    events.push(ProxyEvent::ProxyAdded { origin: pos, endpoints }.into());
                }
            }
            placement
        };

        for ejection in &placement.ejected {
            info!(
                controller = %ejection.controller, position = %ejection.position,
                "Controller ejected"
            );
        }
        self.emit(events);
        Ok(placement)
    }

    /// Remove a segment, forgetting its proxy record if it was a bridge.
    pub fn remove_segment(&self, pos: GridPosition) -> Result<Removal> {
        let mut events: Vec<LatticeEvent> = Vec::new();
        let removal = {
            let mut topology = self.topology.write();
            let mut registry = self.registry.write();

            let removal = topology.remove_segment(pos)?;
            events.extend(removal.events.iter().cloned().map(LatticeEvent::from));

            if removal.kind.is_bridge() && registry.on_bridge_removed(pos).is_some() {
                events.push(ProxyEvent::ProxyRemoved { origin: pos }.into());
            }
            removal
        };

        self.emit(events);
        Ok(removal)
    }

    /// Assign a role to an endpoint a bridge discovered.
    ///
    /// Unknown bridges or endpoints change nothing and are logged; the error
    /// is returned for callers that care.
    pub fn set_role(
        &self,
        origin: GridPosition,
        endpoint: EndpointRef,
        role: ProxiedRole,
    ) -> Result<ProxiedRole> {
        let Some(relative) = endpoint.relative_to(&origin) else {
            warn!(%origin, %endpoint, "Role change across spaces ignored");
            return Err(RoutingError::UnreachableEndpoint { origin, endpoint });
        };

        let previous = self.registry.write().set_role(origin, relative, role)?;
        if previous != role {
            self.emit(vec![ProxyEvent::ProxyRoleChanged {
                origin,
                endpoint: relative,
                role,
            }
            .into()]);
        }
        Ok(previous)
    }

    /// Re-scan a bridge's neighborhood on request.
    pub fn rescan_bridge(&self, origin: GridPosition) -> Result<RescanReport> {
        if !self.registry.read().contains(&origin) {
            warn!(%origin, "Rescan of unknown bridge ignored");
            return Err(RoutingError::UnknownProxy(origin));
        }

        let found = discover(origin, self.probe.as_ref(), self.config.scan_radius);
        let report = {
            let _topology = self.topology.write();
            self.registry.write().apply_rescan(origin, found)?
        };

        self.emit(vec![ProxyEvent::ProxyRescanned {
            origin,
            added: report.added,
            removed: report.removed,
        }
        .into()]);
        Ok(report)
    }

    /// Build a controller's endpoint view.
    ///
    /// `None` when the controller is not bound to a network. Endpoints that
    /// no longer resolve are skipped and reported as events.
    pub fn route(&self, controller: ControllerId, roles: RoleSet) -> Option<CombinedEndpointView> {
        let routed = {
            let topology = self.topology.read();
            let registry = self.registry.read();
            CapabilityRouter::new(&topology, &registry, self.probe.as_ref(), &self.config)
                .route(controller, roles)
        };

        match routed {
            Ok(view) => {
                let skipped: Vec<LatticeEvent> = view
                    .stale()
                    .iter()
                    .map(|endpoint| {
                        RouteEvent::StaleEndpointSkipped {
                            controller,
                            endpoint: *endpoint,
                        }
                        .into()
                    })
                    .collect();
                self.emit(skipped);
                Some(view)
            }
            Err(e) => {
                debug!(%controller, error = %e, "Route failed");
                self.emit(vec![RouteEvent::RouteFailed { controller }.into()]);
                None
            }
        }
    }

    /// Route and move up to `max` between two view slots.
    ///
    /// Returns the amount moved; zero when the controller has no network.
    pub fn transfer(
        &self,
        controller: ControllerId,
        roles: RoleSet,
        from: usize,
        to: usize,
        max: u64,
    ) -> u64 {
        self.route(controller, roles)
            .map(|view| view.transfer(from, to, max))
            .unwrap_or(0)
    }

    pub fn network_of(&self, pos: &GridPosition) -> Option<NetworkId> {
        self.topology.read().network_of(pos)
    }

    pub fn controller_network(&self, controller: ControllerId) -> Option<NetworkId> {
        self.topology.read().controller_network(controller)
    }

    pub fn network_count(&self) -> usize {
        self.topology.read().network_count()
    }

    /// Copy of a bridge's proxy record.
    pub fn proxy(&self, origin: &GridPosition) -> Option<ProxyRecord> {
        self.registry.read().record(origin).cloned()
    }

    /// Run `f` against a consistent view of the topology.
    pub fn with_topology<R>(&self, f: impl FnOnce(&NetworkTopology) -> R) -> R {
        f(&*self.topology.read())
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        let topology = self.topology.read();
        let registry = self.registry.read();
        ServiceSnapshot {
            topology: topology.snapshot(),
            registry: registry.snapshot(),
        }
    }

    /// Replace all state with a validated snapshot.
    ///
    /// Nothing changes if validation fails. No events are emitted.
    pub fn restore(&self, snapshot: &ServiceSnapshot) -> Result<()> {
        let (topology, registry) = snapshot.restore()?;
        let networks = topology.network_count();
        let proxies = registry.len();

        let mut topology_guard = self.topology.write();
        let mut registry_guard = self.registry.write();
        *topology_guard = topology;
        *registry_guard = registry;

        info!(networks, proxies, "Restored from snapshot");
        Ok(())
    }

    fn emit(&self, events: Vec<LatticeEvent>) {
        for event in &events {
            debug!(?event, "Event");
            self.sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EndpointHandle, EventLog, Payload};
    use lattice_grid::Face;
    use lattice_network::NetworkEvent;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    /// One-slot tank; shared so tests can inspect it after a transfer.
    #[derive(Clone)]
    struct Tank(Arc<Mutex<Payload>>);

    impl EndpointHandle for Tank {
        fn slot_count(&self) -> usize {
            1
        }
        fn peek(&self, slot: usize) -> Payload {
            if slot == 0 {
                self.0.lock().clone()
            } else {
                Payload::empty()
            }
        }
        fn extract(&self, slot: usize, amount: u64, simulate: bool) -> Payload {
            if slot != 0 {
                return Payload::empty();
            }
            let mut held = self.0.lock();
            let taken = held.with_amount(amount.min(held.amount));
            if !simulate {
                held.amount -= taken.amount;
            }
            taken
        }
        fn insert(&self, slot: usize, payload: Payload, simulate: bool) -> Payload {
            let mut held = self.0.lock();
            if slot != 0 || !held.stacks_with(&payload) {
                return payload;
            }
            let accepted = payload.amount.min(100 - held.amount);
            if !simulate && accepted > 0 {
                *held = payload.with_amount(held.amount + accepted);
            }
            payload.with_amount(payload.amount - accepted)
        }
        fn slot_limit(&self, _slot: usize) -> u64 {
            100
        }
        fn is_valid(&self, _slot: usize, _payload: &Payload) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct Tanks(Mutex<BTreeMap<EndpointRef, Tank>>);

    impl Tanks {
        fn put(&self, endpoint: EndpointRef, payload: Payload) -> Tank {
            let tank = Tank(Arc::new(Mutex::new(payload)));
            self.0.lock().insert(endpoint, tank.clone());
            tank
        }
    }

    impl CapabilityProbe for Tanks {
        fn probe(&self, endpoint: &EndpointRef) -> Option<Box<dyn EndpointHandle>> {
            let tank = self.0.lock().get(endpoint)?.clone();
            Some(Box::new(tank))
        }
    }

    fn service() -> (TopologyService, Arc<Tanks>, Arc<EventLog>) {
        let tanks = Arc::new(Tanks::default());
        let log = Arc::new(EventLog::new());
        let service = TopologyService::new(RoutingConfig::default(), tanks.clone(), log.clone());
        (service, tanks, log)
    }

    #[test]
    fn bridge_placement_records_and_announces() {
        let (service, tanks, log) = service();
        let endpoint = EndpointRef::on_face(GridPosition::at(0, 1, 0), Face::Down);
        tanks.put(endpoint, Payload::empty());

        service
            .place_segment(GridPosition::at(0, 0, 0), SegmentKind::Bridge)
            .unwrap();

        assert_eq!(service.proxy(&GridPosition::at(0, 0, 0)).unwrap().len(), 1);
        assert_eq!(
            log.count(|e| {
                matches!(e, LatticeEvent::Proxy(ProxyEvent::ProxyAdded { endpoints: 1, .. }))
            }),
            1
        );
    }

    #[test]
    fn removing_bridge_drops_record() {
        let (service, _tanks, log) = service();
        service
            .place_segment(GridPosition::at(0, 0, 0), SegmentKind::Bridge)
            .unwrap();
        service.remove_segment(GridPosition::at(0, 0, 0)).unwrap();

        assert!(service.proxy(&GridPosition::at(0, 0, 0)).is_none());
        assert_eq!(
            log.count(|e| matches!(e, LatticeEvent::Proxy(ProxyEvent::ProxyRemoved { .. }))),
            1
        );
    }

    #[test]
    fn failed_placement_changes_nothing() {
        let (service, _tanks, log) = service();
        service
            .place_segment(GridPosition::at(0, 0, 0), SegmentKind::Conduit)
            .unwrap();
        let before = log.len();

        assert!(service
            .place_segment(GridPosition::at(0, 0, 0), SegmentKind::Bridge)
            .is_err());
        assert!(service.proxy(&GridPosition::at(0, 0, 0)).is_none());
        assert_eq!(log.len(), before);
    }

    #[test]
    fn route_without_network_reports_failure() {
        let (service, _tanks, log) = service();
        assert!(service.route(ControllerId(9), RoleSet::INPUT).is_none());
        assert_eq!(
            log.events().last(),
            Some(&LatticeEvent::Route(RouteEvent::RouteFailed {
                controller: ControllerId(9)
            }))
        );
    }

    #[test]
    fn unknown_role_target_is_refused_quietly() {
        let (service, _tanks, log) = service();
        service
            .place_segment(GridPosition::at(0, 0, 0), SegmentKind::Bridge)
            .unwrap();
        let before = log.len();

        let endpoint = EndpointRef::on_face(GridPosition::at(3, 0, 0), Face::Up);
        assert!(service
            .set_role(GridPosition::at(0, 0, 0), endpoint, ProxiedRole::Input)
            .is_err());
        assert_eq!(log.len(), before);
    }

    #[test]
    fn transfer_between_proxied_tanks() {
        let (service, tanks, _log) = service();
        let source_ref = EndpointRef::on_face(GridPosition::at(0, 1, 0), Face::Down);
        let dest_ref = EndpointRef::on_face(GridPosition::at(0, -1, 0), Face::Up);
        let source = tanks.put(source_ref, Payload::new("water", 80));
        let dest = tanks.put(dest_ref, Payload::new("water", 50));

        let origin = GridPosition::at(0, 0, 0);
        service.place_segment(origin, SegmentKind::Bridge).unwrap();
        service
            .place_segment(GridPosition::at(1, 0, 0), SegmentKind::Controller(ControllerId(1)))
            .unwrap();
        service.set_role(origin, source_ref, ProxiedRole::Input).unwrap();
        service.set_role(origin, dest_ref, ProxiedRole::Output).unwrap();

        // dest (offset y = -1) sorts before source (offset y = +1)
        let moved = service.transfer(ControllerId(1), RoleSet::INPUT_OUTPUT, 1, 0, 80);
        assert_eq!(moved, 50);
        assert_eq!(source.0.lock().amount, 30);
        assert_eq!(dest.0.lock().amount, 100);
    }

    #[test]
    fn rescan_is_explicit() {
        let (service, tanks, log) = service();
        let origin = GridPosition::at(0, 0, 0);
        service.place_segment(origin, SegmentKind::Bridge).unwrap();

        tanks.put(EndpointRef::on_face(GridPosition::at(2, 0, 0), Face::West), Payload::empty());
        assert!(service.proxy(&origin).unwrap().is_empty());

        let report = service.rescan_bridge(origin).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(service.proxy(&origin).unwrap().len(), 1);
        assert_eq!(
            log.count(|e| {
                matches!(e, LatticeEvent::Proxy(ProxyEvent::ProxyRescanned { added: 1, .. }))
            }),
            1
        );
        assert_eq!(
            service.rescan_bridge(GridPosition::at(5, 5, 5)),
            Err(RoutingError::UnknownProxy(GridPosition::at(5, 5, 5)))
        );
    }

    #[test]
    fn snapshot_restores_into_fresh_service() {
        let (service, tanks, _log) = service();
        let endpoint = EndpointRef::on_face(GridPosition::at(0, 1, 0), Face::Down);
        tanks.put(endpoint, Payload::empty());
        let origin = GridPosition::at(0, 0, 0);
        service.place_segment(origin, SegmentKind::Bridge).unwrap();
        service
            .place_segment(GridPosition::at(1, 0, 0), SegmentKind::Controller(ControllerId(4)))
            .unwrap();
        service.set_role(origin, endpoint, ProxiedRole::Output).unwrap();

        let snapshot = service.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: ServiceSnapshot = serde_json::from_str(&json).unwrap();

        let (fresh, _, _) = self::service();
        fresh.restore(&parsed).unwrap();
        assert_eq!(fresh.snapshot(), snapshot);
        assert_eq!(
            fresh.controller_network(ControllerId(4)),
            service.controller_network(ControllerId(4))
        );
    }

    #[test]
    fn split_events_reach_the_sink_in_order() {
        let (service, _tanks, log) = service();
        for x in 0..3 {
            service
                .place_segment(GridPosition::at(x, 0, 0), SegmentKind::Conduit)
                .unwrap();
        }
        log.drain();

        service.remove_segment(GridPosition::at(1, 0, 0)).unwrap();
        let events = log.events();
        assert!(matches!(
            events.first(),
            Some(LatticeEvent::Topology(NetworkEvent::NetworkSplit { .. }))
        ));
        assert_eq!(service.network_count(), 2);
    }

    #[test]
    fn readers_never_see_partial_mutations() {
        let (service, _tanks, _log) = service();
        let hub = GridPosition::at(0, 0, 0);
        service
            .place_segment(GridPosition::at(-1, 0, 0), SegmentKind::Controller(ControllerId(1)))
            .unwrap();
        service
            .place_segment(GridPosition::at(1, 0, 0), SegmentKind::Conduit)
            .unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    service.place_segment(hub, SegmentKind::Conduit).unwrap();
                    service.remove_segment(hub).unwrap();
                }
            });
            for _ in 0..2 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        service.with_topology(|topology| {
                            topology.validate().unwrap();
                            let count = topology.network_count();
                            assert!(count == 1 || count == 2);
                        });
                        assert!(service.route(ControllerId(1), RoleSet::INPUT).is_some());
                    }
                });
            }
        });
    }
}
