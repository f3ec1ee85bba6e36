//! Lattice Scenario Runner
//!
//! Replay a scenario file and print the report as JSON.

use std::env;
use std::process::ExitCode;

use lattice_sim::Scenario;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "lattice_sim=info,lattice_routing=info,lattice_network=info";

fn main() -> ExitCode {
    // Initialize tracing on stderr; stdout carries the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: lattice-sim <scenario.json>");
        return ExitCode::from(2);
    };

    let report = Scenario::load(&path)
        .and_then(|scenario| scenario.run())
        .and_then(|report| report.to_json());
    match report {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Scenario failed");
            ExitCode::FAILURE
        }
    }
}
