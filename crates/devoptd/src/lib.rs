//! Devopt daemon library - exposes modules for testing.

pub mod config;
pub mod dashboard;
pub mod probes;
pub mod prompts;
pub mod recommender;
pub mod routes;
pub mod server;
pub mod session;
pub mod telemetry;
