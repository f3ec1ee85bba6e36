//! Incremental network topology.
//!
//! # Merge on add
//!
//! A new segment looks at its six neighbors. No neighbor networks: it starts
//! a network of its own. One: it joins it. Several: all of them are merged
//! under a freshly allocated id and the sources are deleted.
//!
//! # Split on remove
//!
//! Removing a segment can only disconnect the members that were reached
//! through it, so the flood fill starts from the removed segment's own
//! neighbors. Every remaining member was connected to at least one of them,
//! which means the fills from those seeds cover the whole remainder. Each fill
//! becomes a network with a fresh id.
//!
//! Removal is O(network size). Incremental dynamic connectivity would make it
//! polylogarithmic, but networks are expected to stay small.
//!
//! # Controller rule
//!
//! A network holds at most one controller. During a merge the first
//! controller encountered (source networks in merge order, members in
//! position order) is kept and every other one is ejected. A controller
//! placed next to networks that already have one is the last one encountered,
//! so it is ejected before it joins anything.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use lattice_grid::{GridPosition, Neighborhood};
use tracing::{debug, info, warn};

use crate::controller::{ControllerIndex, Ejection};
use crate::error::{Result, TopologyError};
use crate::{ControllerId, Network, NetworkEvent, NetworkId, SegmentKind};

/// Members of a network, keyed and ordered by position.
pub type Members = BTreeMap<GridPosition, SegmentKind>;

/// Outcome of placing a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Network now containing the placed segment; `None` if it was ejected
    pub network: Option<NetworkId>,
    /// Controllers ejected by this placement (possibly the placed one)
    pub ejected: Vec<Ejection>,
    /// Events in the order they happened
    pub events: Vec<NetworkEvent>,
}

impl Placement {
    /// Whether the placed segment itself was refused.
    pub fn was_ejected(&self) -> bool {
        self.network.is_none()
    }
}

/// Outcome of removing a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// Kind of the removed segment
    pub kind: SegmentKind,
    /// Network the segment belonged to
    pub previous: NetworkId,
    /// Networks holding the remaining members (empty if none remain)
    pub networks: Vec<NetworkId>,
    /// Events in the order they happened
    pub events: Vec<NetworkEvent>,
}

impl Removal {
    /// Whether the removal split the network apart.
    pub fn is_split(&self) -> bool {
        self.networks.len() > 1
    }
}

/// All networks of a world, plus the position index and controller bindings.
///
/// Mutations take `&mut self` and leave every structure consistent before
/// returning; wrap the topology in a lock to share it with readers.
#[derive(Debug, Default, Clone)]
pub struct NetworkTopology {
    pub(crate) networks: HashMap<NetworkId, Network>,
    pub(crate) index: HashMap<GridPosition, NetworkId>,
    pub(crate) controllers: ControllerIndex,
    pub(crate) next_id: u64,
}

impl NetworkTopology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a segment.
    pub fn add_segment(&mut self, pos: GridPosition, kind: SegmentKind) -> Result<Placement> {
        if self.index.contains_key(&pos) {
            return Err(TopologyError::AlreadyTracked(pos));
        }

        let sources = self.adjacent_networks(pos);
        let mut events = Vec::new();

        if let Some(controller) = kind.controller() {
            if let Some(occupied) = self.controller_collision(controller, &sources) {
                debug!(
                    %pos, %controller, %occupied,
                    "Ejecting controller placed into an occupied network"
                );
                events.push(NetworkEvent::ControllerEvicted {
                    controller,
                    position: pos,
                    network: None,
                });
                return Ok(Placement {
                    network: None,
                    ejected: vec![Ejection {
                        controller,
                        position: pos,
                        network: None,
                    }],
                    events,
                });
            }
        }

        let (network, ejected) = match sources.as_slice() {
            [] => {
                let id = self.allocate_id();
                self.networks.insert(id, Network::singleton(id, pos, kind));
                self.index.insert(pos, id);
                events.push(NetworkEvent::NetworkCreated { network: id });
                self.bind_placed(kind, id, pos, &mut events);
                debug!(%pos, network = %id, "Created network");
                (id, Vec::new())
            }
            [only] => {
                let id = *only;
                if let Some(network) = self.networks.get_mut(&id) {
                    network.members_mut().insert(pos, kind);
                }
                self.index.insert(pos, id);
                self.bind_placed(kind, id, pos, &mut events);
                debug!(%pos, network = %id, "Joined network");
                (id, Vec::new())
            }
            _ => self.merge(&sources, pos, kind, &mut events),
        };

        Ok(Placement {
            network: Some(network),
            ejected,
            events,
        })
    }

    /// Remove a segment, splitting its network if it was an articulation point.
    pub fn remove_segment(&mut self, pos: GridPosition) -> Result<Removal> {
        let id = *self.index.get(&pos).ok_or(TopologyError::NotTracked(pos))?;
        let kind = self
            .networks
            .get_mut(&id)
            .and_then(|network| network.members_mut().remove(&pos))
            .ok_or(TopologyError::NotTracked(pos))?;
        self.index.remove(&pos);

        let mut events = Vec::new();
        if let Some(controller) = kind.controller() {
            self.controllers.release(controller);
            events.push(NetworkEvent::ControllerReleased {
                controller,
                network: id,
            });
        }

        let Some(network) = self.networks.get(&id) else {
            return Err(TopologyError::NotTracked(pos));
        };

        if network.is_empty() {
            self.networks.remove(&id);
            self.controllers.retire_network(id);
            events.push(NetworkEvent::NetworkRemoved { network: id });
            debug!(%pos, network = %id, "Removed last member");
            return Ok(Removal {
                kind,
                previous: id,
                networks: Vec::new(),
                events,
            });
        }

        let seeds: Vec<GridPosition> = Neighborhood::of(pos)
            .map(|(_, n)| n)
            .filter(|n| network.contains(n))
            .collect();

        // A single neighbor reaches everything that pos reached.
        if seeds.len() == 1 {
            return Ok(Removal {
                kind,
                previous: id,
                networks: vec![id],
                events,
            });
        }

        let parts = if seeds.is_empty() {
            components(network.members(), network.members().keys().copied())
        } else {
            components(network.members(), seeds)
        };

        if parts.len() == 1 {
            return Ok(Removal {
                kind,
                previous: id,
                networks: vec![id],
                events,
            });
        }

        self.networks.remove(&id);
        self.controllers.retire_network(id);

        let ids: Vec<NetworkId> = parts.iter().map(|_| self.allocate_id()).collect();
        events.push(NetworkEvent::NetworkSplit {
            from: id,
            into: ids.clone(),
        });
        info!(%pos, from = %id, parts = ids.len(), "Network split");

        for (part_id, members) in ids.iter().zip(parts) {
            self.publish(*part_id, members, &mut events);
        }

        Ok(Removal {
            kind,
            previous: id,
            networks: ids,
            events,
        })
    }

    /// Network containing `pos`.
    pub fn network_of(&self, pos: &GridPosition) -> Option<NetworkId> {
        self.index.get(pos).copied()
    }

    /// Kind of the segment at `pos`.
    pub fn kind_at(&self, pos: &GridPosition) -> Option<SegmentKind> {
        let id = self.index.get(pos)?;
        self.networks.get(id)?.members().get(pos).copied()
    }

    pub fn contains(&self, pos: &GridPosition) -> bool {
        self.index.contains_key(pos)
    }

    pub fn network(&self, id: NetworkId) -> Option<&Network> {
        self.networks.get(&id)
    }

    /// All networks, unordered.
    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    /// Network ids in ascending order.
    pub fn network_ids(&self) -> Vec<NetworkId> {
        let mut ids: Vec<_> = self.networks.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of networks.
    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Number of placed segments.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bridge positions of a network, in position order.
    pub fn bridges_in(&self, id: NetworkId) -> Vec<GridPosition> {
        self.networks
            .get(&id)
            .map(Network::bridges)
            .unwrap_or_default()
    }

    /// Network a controller is bound to.
    pub fn controller_network(&self, controller: ControllerId) -> Option<NetworkId> {
        self.controllers.network_of(controller)
    }

    /// Controller bound to a network.
    pub fn controller_of(&self, id: NetworkId) -> Option<ControllerId> {
        self.controllers.controller_of(id)
    }

    pub fn controllers(&self) -> &ControllerIndex {
        &self.controllers
    }

    /// Remove every network, index entry and binding.
    ///
    /// The id counter is kept so ids are never reused.
    pub fn clear(&mut self) {
        self.networks.clear();
        self.index.clear();
        self.controllers.clear();
    }

    fn allocate_id(&mut self) -> NetworkId {
        let id = NetworkId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Distinct networks around `pos`, in face order.
    fn adjacent_networks(&self, pos: GridPosition) -> Vec<NetworkId> {
        let mut ids = Vec::with_capacity(6);
        for (_, neighbor) in Neighborhood::of(pos) {
            if let Some(&id) = self.index.get(&neighbor) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// The network an incoming controller would collide in, if any.
    fn controller_collision(
        &self,
        controller: ControllerId,
        sources: &[NetworkId],
    ) -> Option<NetworkId> {
        if let Some(bound) = self.controllers.network_of(controller) {
            return Some(bound);
        }
        sources
            .iter()
            .copied()
            .find(|id| self.controllers.is_occupied(*id))
    }

    fn bind_placed(
        &mut self,
        kind: SegmentKind,
        id: NetworkId,
        pos: GridPosition,
        events: &mut Vec<NetworkEvent>,
    ) {
        let Some(controller) = kind.controller() else {
            return;
        };
        match self.controllers.bind(controller, id, pos) {
            Ok(()) => events.push(NetworkEvent::ControllerBound {
                controller,
                network: id,
            }),
            Err(existing) => {
                warn!(%controller, %existing, network = %id, "Controller binding refused")
            }
        }
    }

    fn merge(
        &mut self,
        sources: &[NetworkId],
        pos: GridPosition,
        kind: SegmentKind,
        events: &mut Vec<NetworkEvent>,
    ) -> (NetworkId, Vec<Ejection>) {
        let mut members = Members::new();
        let mut kept: Option<ControllerId> = None;
        let mut ejected = Vec::new();

        for &source in sources {
            let Some(network) = self.networks.remove(&source) else {
                continue;
            };
            self.controllers.retire_network(source);

            for (member, member_kind) in network.into_members() {
                if let Some(controller) = member_kind.controller() {
                    if kept.is_some() {
                        self.controllers.release(controller);
                        self.index.remove(&member);
                        events.push(NetworkEvent::ControllerEvicted {
                            controller,
                            position: member,
                            network: Some(source),
                        });
                        ejected.push(Ejection {
                            controller,
                            position: member,
                            network: Some(source),
                        });
                        continue;
                    }
                    kept = Some(controller);
                }
                members.insert(member, member_kind);
            }
        }
        members.insert(pos, kind);

        let merged = self.allocate_id();
        events.push(NetworkEvent::NetworkMerged {
            sources: sources.to_vec(),
            into: merged,
        });
        info!(
            %pos, into = %merged, sources = sources.len(), evicted = ejected.len(),
            "Networks merged"
        );

        if ejected.is_empty() {
            self.publish(merged, members, events);
            return (merged, ejected);
        }

        // Ejected controllers may have been the only link between parts.
        let seeds = std::iter::once(pos).chain(members.keys().copied());
        let mut parts = components(&members, seeds).into_iter();
        if let Some(first) = parts.next() {
            self.publish(merged, first, events);
        }
        for part in parts {
            let id = self.allocate_id();
            events.push(NetworkEvent::NetworkCreated { network: id });
            debug!(network = %id, members = part.len(), "Eviction left a separate network");
            self.publish(id, part, events);
        }

        (merged, ejected)
    }

    /// Install a fully built network: index every member and (re)bind its
    /// controller.
    pub(crate) fn publish(
        &mut self,
        id: NetworkId,
        members: Members,
        events: &mut Vec<NetworkEvent>,
    ) {
        for (member, kind) in &members {
            self.index.insert(*member, id);
            if let Some(controller) = kind.controller() {
                match self.controllers.bind(controller, id, *member) {
                    Ok(()) => events.push(NetworkEvent::ControllerBound {
                        controller,
                        network: id,
                    }),
                    Err(existing) => {
                        warn!(%controller, %existing, network = %id, "Controller binding refused")
                    }
                }
            }
        }
        self.networks.insert(id, Network::new(id, members));
    }
}

/// Connected components of `members` reachable from `seeds`, in seed order.
///
/// Each member is visited at most once; seeds that are not members or were
/// already reached are skipped.
pub fn components<I>(members: &Members, seeds: I) -> Vec<Members>
where
    I: IntoIterator<Item = GridPosition>,
{
    let mut visited: HashSet<GridPosition> = HashSet::with_capacity(members.len());
    let mut parts = Vec::new();

    for seed in seeds {
        if visited.len() == members.len() {
            break;
        }
        if !members.contains_key(&seed) || visited.contains(&seed) {
            continue;
        }
        parts.push(flood_fill(members, seed, &mut visited));
    }

    parts
}

/// Breadth-first fill over 6-adjacency, restricted to `members`.
fn flood_fill(
    members: &Members,
    start: GridPosition,
    visited: &mut HashSet<GridPosition>,
) -> Members {
    let mut part = Members::new();
    let mut queue = VecDeque::from([start]);
    visited.insert(start);

    while let Some(current) = queue.pop_front() {
        if let Some(kind) = members.get(&current) {
            part.insert(current, *kind);
        }
        for (_, neighbor) in Neighborhood::of(current) {
            if members.contains_key(&neighbor) && visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    part
}
