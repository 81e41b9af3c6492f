//! Background simulation of persistent low-thrust propulsion.
//!
//! The member crates are re-exported here so front-ends (the `fleet_sim`
//! CLI, the telemetry plotter, or a game host) depend on one package.

pub mod scenario;

pub use pt_background as background;
pub use pt_config as config;
pub use pt_core as core;
pub use pt_export as export;
pub use pt_heading as heading;
pub use pt_orbits as orbits;
pub use pt_producers as producers;
pub use pt_propulsion as propulsion;
pub use pt_resources as resources;
pub use pt_state as state;

/// Returns the version of the library for smoke tests.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
