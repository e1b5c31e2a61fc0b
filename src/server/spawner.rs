// src/server/spawner.rs

//! Spawns the server's long-running background tasks: the `/metrics` HTTP
//! endpoint, the migration-overlay diagnostic sweep, and the group
//! auto-restore probe.

use super::context::ServerContext;
use super::metrics_server;
use crate::core::tasks::{run_auto_restore, run_migration_sweep};

pub fn spawn_all(ctx: &mut ServerContext) {
    let metrics_port = ctx.state.config.lock().metrics_port;
    let shutdown_rx = ctx.state.shutdown_tx.subscribe();
    ctx.background_tasks.spawn(async move {
        metrics_server::run_metrics_server(metrics_port, shutdown_rx).await;
    });

    let sweep_interval = ctx.state.config.lock().migration_sweep_interval;
    let sweep_state = ctx.state.clone();
    let sweep_shutdown = ctx.state.shutdown_tx.subscribe();
    ctx.background_tasks.spawn(async move {
        run_migration_sweep(sweep_state, sweep_interval, sweep_shutdown).await;
    });

    let restore_interval = ctx.state.config.lock().group_option.auto_restore_interval;
    let restore_state = ctx.state.clone();
    let restore_shutdown = ctx.state.shutdown_tx.subscribe();
    ctx.background_tasks.spawn(async move {
        run_auto_restore(restore_state, restore_interval, restore_shutdown).await;
    });
}
