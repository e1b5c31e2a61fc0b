// src/server/initialization.rs

//! Handles the complete server initialization process: loads the routing
//! tables from the validated config snapshot, binds the client listener,
//! and assembles the `ServerContext` the main loop and spawner need.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::bootstrap::build_from_config;
use crate::core::state::{LogLevelController, ProxyState};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::info;

pub async fn setup(
    config: Config,
    config_path: PathBuf,
    log_controller: Arc<dyn LogLevelController>,
) -> Result<ServerContext> {
    log_startup_info(&config);

    let state = Arc::new(ProxyState::new(config.clone(), config_path, log_controller));
    build_from_config(&state, &config)?;

    info!(
        groups = state.groups.len(),
        slots = state.slot_table.max_hash(),
        overlay = state.slot_table.migration_overlay().len(),
        "routing tables loaded"
    );

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "shardproxy listening");

    Ok(ServerContext {
        state,
        listener,
        background_tasks: JoinSet::new(),
    })
}

fn log_startup_info(config: &Config) {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    info!(version = VERSION, port = config.port, groups = config.group.len(), "starting shardproxy");
}
