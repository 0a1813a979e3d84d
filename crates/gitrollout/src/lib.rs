//! # gitrollout
//!
//! Command line front end and HTTP surface of the rollout engine.
//!
//! The binary wires [`settings::Settings`] and [`cli::Cli`] into a
//! [`gitrollout_git::MirrorHub`], runs it under a
//! [`gitrollout_git::CycleScheduler`] and optionally serves `/health`,
//! `/trigger` and `/metrics`.

pub mod app;
pub mod cli;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod settings;
pub mod state;

pub use app::build_hub;
pub use cli::{Cli, TargetArgs};
pub use server::{create_router, run_server, shutdown_signal};
pub use settings::{Settings, SettingsError};
pub use state::AppState;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
