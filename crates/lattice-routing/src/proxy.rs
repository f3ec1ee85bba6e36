//! Bridge endpoint discovery.
//!
//! # One-shot discovery
//!
//! When a bridge is placed it scans a cube of fixed radius around itself,
//! probing all six faces of every cell. Each hit is stored relative to the
//! bridge with role [`ProxiedRole::None`]. Nothing is discovered afterwards:
//! an endpoint built next to an existing bridge stays invisible until the
//! host asks for an explicit [`ProxyRegistry::rescan`]. This bounds the cost
//! of discovery to one scan per placement.
//!
//! # Discovered vs assigned
//!
//! A record keeps two things: the endpoints found by the latest scan, and the
//! role assignments. Only endpoints from the latest scan are routed. A rescan
//! forgets vanished endpoints that never had a role, and remembers the role of
//! vanished endpoints that had one, so it comes back if the endpoint does.

use std::collections::{BTreeMap, BTreeSet};

use lattice_grid::{EndpointRef, Face, GridPosition, Neighborhood, RelativeEndpoint};
use lattice_network::{NetworkId, NetworkTopology};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, RoutingError};
use crate::{CapabilityProbe, ProxiedRole};

/// Everything one bridge knows about its surroundings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRecord {
    origin: GridPosition,
    #[serde(with = "entries")]
    endpoints: BTreeMap<RelativeEndpoint, ProxiedRole>,
    discovered: BTreeSet<RelativeEndpoint>,
}

impl ProxyRecord {
    /// A record with no endpoints.
    pub fn empty(origin: GridPosition) -> Self {
        Self {
            origin,
            endpoints: BTreeMap::new(),
            discovered: BTreeSet::new(),
        }
    }

    /// Scan the neighborhood of `origin` and build a fresh record.
    pub fn scan(origin: GridPosition, probe: &dyn CapabilityProbe, radius: u32) -> Self {
        let discovered = discover(origin, probe, radius);
        let endpoints = discovered.iter().map(|e| (*e, ProxiedRole::None)).collect();
        debug!(%origin, radius, found = discovered.len(), "Scanned bridge neighborhood");
        Self {
            origin,
            endpoints,
            discovered,
        }
    }

    pub fn origin(&self) -> GridPosition {
        self.origin
    }

    /// Role of an endpoint, whether or not the latest scan saw it.
    pub fn role(&self, endpoint: &RelativeEndpoint) -> Option<ProxiedRole> {
        self.endpoints.get(endpoint).copied()
    }

    /// Every role assignment, including remembered ones.
    pub fn assignments(&self) -> &BTreeMap<RelativeEndpoint, ProxiedRole> {
        &self.endpoints
    }

    /// Endpoints found by the latest scan.
    pub fn discovered(&self) -> &BTreeSet<RelativeEndpoint> {
        &self.discovered
    }

    /// Routable entries (discovered, with their role), in endpoint order.
    pub fn entries(&self) -> impl Iterator<Item = (RelativeEndpoint, ProxiedRole)> + '_ {
        self.discovered
            .iter()
            .map(move |e| (*e, self.endpoints.get(e).copied().unwrap_or_default()))
    }

    /// Absolute form of a relative endpoint.
    pub fn resolve(&self, endpoint: &RelativeEndpoint) -> Option<EndpointRef> {
        endpoint.resolve(&self.origin)
    }

    pub fn len(&self) -> usize {
        self.discovered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discovered.is_empty()
    }

    /// Change one role. Returns the previous role, or `None` if the endpoint
    /// is unknown (nothing is discovered on the fly).
    pub fn set_role(
        &mut self,
        endpoint: RelativeEndpoint,
        role: ProxiedRole,
    ) -> Option<ProxiedRole> {
        let slot = self.endpoints.get_mut(&endpoint)?;
        Some(std::mem::replace(slot, role))
    }

    /// Replace the discovered set, keeping roles where they matter.
    fn apply_scan(&mut self, found: BTreeSet<RelativeEndpoint>) -> RescanReport {
        let added = found.difference(&self.discovered).count();
        let removed = self.discovered.difference(&found).count();

        for endpoint in &found {
            self.endpoints.entry(*endpoint).or_default();
        }
        self.endpoints
            .retain(|endpoint, role| found.contains(endpoint) || *role != ProxiedRole::None);
        self.discovered = found;

        RescanReport { added, removed }
    }
}

/// Probe every face of every cell in the cube around `origin`.
///
/// Hits are returned relative to `origin`; the probe alone decides what
/// counts as an endpoint.
pub fn discover(
    origin: GridPosition,
    probe: &dyn CapabilityProbe,
    radius: u32,
) -> BTreeSet<RelativeEndpoint> {
    let mut found = BTreeSet::new();
    for cell in Neighborhood::cube(origin, radius) {
        for face in Face::ALL {
            let endpoint = EndpointRef::on_face(cell, face);
            if probe.probe(&endpoint).is_some() {
                if let Some(relative) = endpoint.relative_to(&origin) {
                    found.insert(relative);
                }
            }
        }
    }
    found
}

/// What an explicit rescan changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RescanReport {
    pub added: usize,
    pub removed: usize,
}

/// All proxy records, keyed by bridge position.
#[derive(Debug, Default, Clone)]
pub struct ProxyRegistry {
    records: BTreeMap<GridPosition, ProxyRecord>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan and record a newly placed bridge.
    ///
    /// Returns `false` (and scans nothing) if a record already exists.
    pub fn on_bridge_placed(
        &mut self,
        origin: GridPosition,
        probe: &dyn CapabilityProbe,
        radius: u32,
    ) -> bool {
        if self.records.contains_key(&origin) {
            debug!(%origin, "Bridge already recorded");
            return false;
        }
        self.insert_record(ProxyRecord::scan(origin, probe, radius))
    }

    /// Install a record built elsewhere (pre-scanned or restored).
    ///
    /// Returns `false` without replacing anything if one already exists.
    pub fn insert_record(&mut self, record: ProxyRecord) -> bool {
        let origin = record.origin;
        if self.records.contains_key(&origin) {
            return false;
        }
        info!(%origin, endpoints = record.len(), "Bridge recorded");
        self.records.insert(origin, record);
        true
    }

    /// Forget a removed bridge.
    pub fn on_bridge_removed(&mut self, origin: GridPosition) -> Option<ProxyRecord> {
        let record = self.records.remove(&origin);
        if record.is_some() {
            info!(%origin, "Bridge forgotten");
        }
        record
    }

    /// Assign a role to one recorded endpoint.
    ///
    /// Unknown bridges and endpoints are refused with a warning; the
    /// previous role is returned on success.
    pub fn set_role(
        &mut self,
        origin: GridPosition,
        endpoint: RelativeEndpoint,
        role: ProxiedRole,
    ) -> Result<ProxiedRole> {
        let Some(record) = self.records.get_mut(&origin) else {
            warn!(%origin, %endpoint, %role, "Role change for unknown bridge ignored");
            return Err(RoutingError::UnknownProxy(origin));
        };
        match record.set_role(endpoint, role) {
            Some(previous) => {
                debug!(%origin, %endpoint, %previous, %role, "Role changed");
                Ok(previous)
            }
            None => {
                warn!(%origin, %endpoint, %role, "Role change for undiscovered endpoint ignored");
                Err(RoutingError::UnknownEndpoint { origin, endpoint })
            }
        }
    }

    /// Explicitly re-scan a bridge's neighborhood.
    pub fn rescan(
        &mut self,
        origin: GridPosition,
        probe: &dyn CapabilityProbe,
        radius: u32,
    ) -> Result<RescanReport> {
        if !self.records.contains_key(&origin) {
            return Err(RoutingError::UnknownProxy(origin));
        }
        let found = discover(origin, probe, radius);
        self.apply_rescan(origin, found)
    }

    /// Apply a scan computed elsewhere to an existing record.
    pub fn apply_rescan(
        &mut self,
        origin: GridPosition,
        found: BTreeSet<RelativeEndpoint>,
    ) -> Result<RescanReport> {
        let record = self
            .records
            .get_mut(&origin)
            .ok_or(RoutingError::UnknownProxy(origin))?;
        let report = record.apply_scan(found);
        info!(%origin, added = report.added, removed = report.removed, "Bridge rescanned");
        Ok(report)
    }

    pub fn record(&self, origin: &GridPosition) -> Option<&ProxyRecord> {
        self.records.get(origin)
    }

    pub fn contains(&self, origin: &GridPosition) -> bool {
        self.records.contains_key(origin)
    }

    /// Records of every bridge in a network, in origin order.
    pub fn records_for_network(
        &self,
        topology: &NetworkTopology,
        network: NetworkId,
    ) -> Vec<&ProxyRecord> {
        topology
            .bridges_in(network)
            .iter()
            .filter_map(|origin| self.records.get(origin))
            .collect()
    }

    /// All records in origin order.
    pub fn iter(&self) -> impl Iterator<Item = &ProxyRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            records: self.records.values().cloned().collect(),
        }
    }

    /// Rebuild from a snapshot. Later duplicates of an origin are ignored.
    pub fn restore(snapshot: &RegistrySnapshot) -> Self {
        let mut registry = Self::new();
        for record in &snapshot.records {
            if !registry.insert_record(record.clone()) {
                warn!(origin = %record.origin, "Duplicate proxy record in snapshot ignored");
            }
        }
        registry
    }
}

/// All proxy records as plain data, in origin order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub records: Vec<ProxyRecord>,
}

/// Role maps serialize as entry lists; struct keys are not valid JSON keys.
mod entries {
    use std::collections::BTreeMap;

    use lattice_grid::RelativeEndpoint;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::ProxiedRole;

    pub fn serialize<S>(
        map: &BTreeMap<RelativeEndpoint, ProxiedRole>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<RelativeEndpoint, ProxiedRole>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<(RelativeEndpoint, ProxiedRole)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
