//! Lattice Simulation Harness
//!
//! Replays scripted placement, removal and routing steps against an
//! in-memory [`World`] of containers and reports what the network service
//! did.
//!
//! ```no_run
//! use lattice_sim::Scenario;
//!
//! let report = Scenario::load("scenarios/two_tanks.json")?.run()?;
//! println!("{}", report.to_json()?);
//! # Ok::<(), lattice_sim::SimError>(())
//! ```

mod error;
mod scenario;
mod world;

pub use error::{Result, SimError};
pub use scenario::{ContainerState, Report, Scenario, Simulation, Step, StepOutcome};
pub use world::{Container, World};
