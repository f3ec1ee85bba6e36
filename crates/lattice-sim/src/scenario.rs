//! Scripted scenarios and their replay.
//!
//! A scenario is a JSON document:
//!
//! ```json
//! {
//!   "name": "two tanks",
//!   "config": { "scan_radius": 5 },
//!   "steps": [
//!     { "op": "container", "at": { "x": 1, "y": 0, "z": 0 }, "slots": 1, "limit": 100 },
//!     { "op": "place", "at": { "x": 0, "y": 0, "z": 0 }, "segment": { "kind": "bridge" } }
//!   ]
//! }
//! ```
//!
//! Topology steps that fail (placing on an occupied cell, removing an empty
//! one) stop the replay. Requests the service refuses, such as a
//! role change for an undiscovered endpoint, are recorded in the report and
//! the replay goes on.

use std::path::Path;
use std::sync::Arc;

use lattice_grid::{EndpointRef, Face, GridPosition, SpaceId};
use lattice_network::{ControllerId, NetworkId, SegmentKind};
use lattice_routing::{
    EventLog, LatticeEvent, Payload, ProxiedRole, ResourceId, RoleSet, RoutingConfig,
    ServiceSnapshot, TopologyService,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SimError};
use crate::world::{Container, World};

/// A named list of steps plus the routing configuration to replay them with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: RoutingConfig,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Replay every step against a fresh world.
    pub fn run(&self) -> Result<Report> {
        let sim = Simulation::new(self.config.clone());
        info!(name = %self.name, steps = self.steps.len(), "Running scenario");

        let mut outcomes = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let outcome = sim
                .apply(step)
                .map_err(|e| match e {
                    StepError::Routing(source) => SimError::Step { index, source },
                    StepError::Sim(e) => e,
                })?;
            outcomes.push(outcome);
        }

        Ok(sim.report(self.name.clone(), outcomes))
    }
}

fn all_roles() -> RoleSet {
    RoleSet::INPUT_OUTPUT
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Place a network segment
    Place { at: GridPosition, segment: SegmentKind },

    /// Remove a network segment
    Remove { at: GridPosition },

    /// Place a container in the world (not a segment)
    Container {
        at: GridPosition,
        slots: usize,
        limit: u64,
        #[serde(default)]
        faces: Vec<Face>,
        #[serde(default)]
        contents: Vec<Payload>,
        #[serde(default)]
        accepts: Option<ResourceId>,
    },

    /// Remove a container from the world
    RemoveContainer { at: GridPosition },

    /// Assign a role to an endpoint discovered by a bridge
    SetRole {
        bridge: GridPosition,
        endpoint: EndpointRef,
        role: ProxiedRole,
    },

    /// Build the controller's view and report its size
    Route {
        controller: ControllerId,
        #[serde(default = "all_roles")]
        roles: RoleSet,
    },

    /// Move resources between two slots of the controller's view
    Transfer {
        controller: ControllerId,
        #[serde(default = "all_roles")]
        roles: RoleSet,
        from: usize,
        to: usize,
        max: u64,
    },

    /// Explicitly re-scan a bridge
    Rescan { bridge: GridPosition },

    /// Make a space unreachable to probes
    Unload { space: SpaceId },

    /// Make a space reachable again
    Load { space: SpaceId },
}

/// What one step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StepOutcome {
    Placed {
        network: Option<NetworkId>,
        ejected: Vec<ControllerId>,
    },
    Removed {
        networks: Vec<NetworkId>,
    },
    ContainerPlaced,
    ContainerRemoved,
    RoleSet {
        previous: ProxiedRole,
    },
    Routed {
        /// `None` when the controller has no network
        slots: Option<usize>,
        stale: usize,
    },
    Transferred {
        moved: u64,
    },
    Rescanned {
        added: usize,
        removed: usize,
    },
    SpaceChanged,
    /// The service refused the request; nothing changed
    Refused {
        reason: String,
    },
}

/// Final state of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    pub at: GridPosition,
    pub slots: Vec<Payload>,
}

/// Everything a replay produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub name: String,
    pub outcomes: Vec<StepOutcome>,
    pub events: Vec<LatticeEvent>,
    pub containers: Vec<ContainerState>,
    pub snapshot: ServiceSnapshot,
}

impl Report {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of recorded events matching `predicate`.
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&LatticeEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

enum StepError {
    Routing(lattice_routing::RoutingError),
    Sim(SimError),
}

impl From<lattice_routing::RoutingError> for StepError {
    fn from(e: lattice_routing::RoutingError) -> Self {
        StepError::Routing(e)
    }
}

impl From<SimError> for StepError {
    fn from(e: SimError) -> Self {
        StepError::Sim(e)
    }
}

/// A world, a service routing over it, and the log of what happened.
pub struct Simulation {
    world: Arc<World>,
    service: TopologyService,
    log: Arc<EventLog>,
}

impl Simulation {
    pub fn new(config: RoutingConfig) -> Self {
        let world = Arc::new(World::new());
        let log = Arc::new(EventLog::new());
        let service = TopologyService::new(config, world.clone(), log.clone());
        Self { world, service, log }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn service(&self) -> &TopologyService {
        &self.service
    }

    pub fn events(&self) -> Vec<LatticeEvent> {
        self.log.events()
    }

    fn apply(&self, step: &Step) -> std::result::Result<StepOutcome, StepError> {
        let outcome = match step {
            Step::Place { at, segment } => {
                let placement = self.service.place_segment(*at, *segment)?;
                StepOutcome::Placed {
                    network: placement.network,
                    ejected: placement.ejected.iter().map(|e| e.controller).collect(),
                }
            }
            Step::Remove { at } => {
                let removal = self.service.remove_segment(*at)?;
                StepOutcome::Removed {
                    networks: removal.networks,
                }
            }
            Step::Container {
                at,
                slots,
                limit,
                faces,
                contents,
                accepts,
            } => {
                let mut container = Container::new(*slots, *limit)
                    .with_faces(faces.iter().copied())
                    .with_contents(contents.iter().cloned());
                if let Some(resource) = accepts {
                    container = container.with_filter(resource.clone());
                }
                self.world.place(*at, container);
                StepOutcome::ContainerPlaced
            }
            Step::RemoveContainer { at } => {
                self.world.remove(at).ok_or(SimError::NoContainer(*at))?;
                StepOutcome::ContainerRemoved
            }
            Step::SetRole {
                bridge,
                endpoint,
                role,
            } => match self.service.set_role(*bridge, *endpoint, *role) {
                Ok(previous) => StepOutcome::RoleSet { previous },
                Err(e) => refused(e),
            },
            Step::Route { controller, roles } => match self.service.route(*controller, *roles) {
                Some(view) => StepOutcome::Routed {
                    slots: Some(view.slot_count()),
                    stale: view.stale().len(),
                },
                None => StepOutcome::Routed { slots: None, stale: 0 },
            },
            Step::Transfer {
                controller,
                roles,
                from,
                to,
                max,
            } => StepOutcome::Transferred {
                moved: self.service.transfer(*controller, *roles, *from, *to, *max),
            },
            Step::Rescan { bridge } => match self.service.rescan_bridge(*bridge) {
                Ok(report) => StepOutcome::Rescanned {
                    added: report.added,
                    removed: report.removed,
                },
                Err(e) => refused(e),
            },
            Step::Unload { space } => {
                self.world.unload(*space);
                StepOutcome::SpaceChanged
            }
            Step::Load { space } => {
                self.world.load(*space);
                StepOutcome::SpaceChanged
            }
        };
        Ok(outcome)
    }

    /// Apply one step outside of a scenario.
    pub fn step(&self, step: &Step) -> Result<StepOutcome> {
        self.apply(step).map_err(|e| match e {
            StepError::Routing(source) => SimError::Step { index: 0, source },
            StepError::Sim(e) => e,
        })
    }

    pub fn report(&self, name: String, outcomes: Vec<StepOutcome>) -> Report {
        Report {
            name,
            outcomes,
            events: self.log.events(),
            containers: self
                .world
                .containers()
                .into_iter()
                .map(|(at, container)| ContainerState {
                    at,
                    slots: container.slots().to_vec(),
                })
                .collect(),
            snapshot: self.service.snapshot(),
        }
    }
}

fn refused(error: lattice_routing::RoutingError) -> StepOutcome {
    warn!(%error, "Step refused");
    StepOutcome::Refused {
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_scenario() {
        let scenario = Scenario::from_json(
            r#"{
                "steps": [
                    {
                        "op": "place",
                        "at": { "x": 0, "y": 0, "z": 0 },
                        "segment": { "kind": "controller", "id": 1 }
                    },
                    { "op": "route", "controller": 1 }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scenario.config, RoutingConfig::default());
        assert_eq!(
            scenario.steps[0],
            Step::Place {
                at: GridPosition::at(0, 0, 0),
                segment: SegmentKind::Controller(ControllerId(1)),
            }
        );
        assert_eq!(
            scenario.steps[1],
            Step::Route {
                controller: ControllerId(1),
                roles: RoleSet::INPUT_OUTPUT,
            }
        );
    }

    #[test]
    fn occupied_cell_stops_replay() {
        let scenario = Scenario {
            name: "double place".into(),
            config: RoutingConfig::default(),
            steps: vec![
                Step::Place {
                    at: GridPosition::at(0, 0, 0),
                    segment: SegmentKind::Conduit,
                },
                Step::Place {
                    at: GridPosition::at(0, 0, 0),
                    segment: SegmentKind::Conduit,
                },
            ],
        };

        match scenario.run() {
            Err(SimError::Step { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected step failure, got {other:?}"),
        }
    }

    #[test]
    fn refused_role_change_is_recorded() {
        let scenario = Scenario {
            name: String::new(),
            config: RoutingConfig::default(),
            steps: vec![
                Step::Place {
                    at: GridPosition::at(0, 0, 0),
                    segment: SegmentKind::Bridge,
                },
                Step::SetRole {
                    bridge: GridPosition::at(0, 0, 0),
                    endpoint: EndpointRef::on_face(GridPosition::at(1, 0, 0), Face::West),
                    role: ProxiedRole::Input,
                },
            ],
        };

        let report = scenario.run().unwrap();
        assert!(matches!(report.outcomes[1], StepOutcome::Refused { .. }));
    }
}
