// src/server/mod.rs

use crate::config::Config;
use crate::core::state::LogLevelController;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config, config_path: PathBuf, log_controller: Arc<dyn LogLevelController>) -> Result<()> {
    let mut ctx = initialization::setup(config, config_path, log_controller).await?;
    spawner::spawn_all(&mut ctx);
    connection_loop::run(ctx).await;
    Ok(())
}
