// src/main.rs

//! Entry point: loads the config file named by the single required
//! positional argument and runs the proxy until a shutdown signal or the
//! admin `SHUTDOWN` command terminates it (§F).

use anyhow::Result;
use shardproxy::config::Config;
use shardproxy::core::LogReloadController;
use shardproxy::server;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--version") {
        println!("shardproxy version {VERSION}");
        return Ok(());
    }

    let Some(config_path) = args.get(1) else {
        eprintln!("Usage: shardproxy <config-file>");
        std::process::exit(1);
    };

    let config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e}");
            std::process::exit(1);
        }
    };

    let initial_log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(initial_log_level.clone()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_ansi(true))
        .init();

    let log_controller: Arc<dyn shardproxy::core::state::LogLevelController> =
        Arc::new(LogReloadController::new(reload_handle, initial_log_level));

    if let Err(e) = server::run(config, PathBuf::from(config_path), log_controller).await {
        error!("server runtime error: {e}");
        return Err(e);
    }

    Ok(())
}
