//! Devopt Daemon - developer environment optimizer
//!
//! Collects a system snapshot, recommends optimizations and applies editor
//! settings changes, all driven from a local web dashboard.

use anyhow::{Context, Result};
use clap::Parser;
use devoptd::config::{Config, EngineKind};
use devoptd::server::{self, AppState};
use devoptd::session::SessionController;
use devopt_common::SessionState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "devoptd", version, about = "Developer environment optimizer")]
struct Args {
    /// Config file (default: <config_dir>/devenv-optimizer/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address for the dashboard, overrides server.bind
    #[arg(long)]
    bind: Option<String>,

    /// Recommendation engine, overrides the config file
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Run one analysis, print the session as JSON and exit
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("[BOOT] Devopt Daemon v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(engine) = args.engine {
        config.engine = engine;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    info!("[BOOT] Config loaded");

    // Built outside the runtime: the AI engine owns a blocking HTTP client
    let controller = match SessionController::from_config(&config) {
        Ok(controller) => Arc::new(controller),
        Err(e) => {
            error!("[FATAL] {}", e);
            error!("[FATAL] Set the key or start with --engine rules");
            std::process::exit(1);
        }
    };

    if args.once {
        let state = controller.start(SessionState::default());
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    info!("[READY] devoptd operational ({} engine)", controller.engine_name());
    let result = runtime.block_on(server::run(AppState::new(controller.clone()), &config.server.bind));

    // Last reference to the controller is released here, outside the runtime
    drop(runtime);
    drop(controller);
    result
}
