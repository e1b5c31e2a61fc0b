// src/core/tasks.rs

//! Background maintenance tasks that run for the lifetime of the process:
//! the migration-overlay diagnostic sweep (§9 item 2, `findNextMigration`)
//! and the group-level auto-restore timer (§5, §C2).

use crate::core::migration::MigrationSweep;
use crate::core::state::ProxyState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Periodically walks the migration overlay in round-robin order, logging
/// each live entry purely for operator visibility. Grounded in the
/// original's `findNextMigration` timer, which never cleared an overlay
/// slot itself (§9 item 1) — this task is diagnostic only.
pub async fn run_migration_sweep(state: Arc<ProxyState>, interval: Duration, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    let mut sweep = MigrationSweep::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let overlay = state.slot_table.migration_overlay();
                if let Some((slot, group)) = sweep.next(&overlay) {
                    info!(slot, target = %group.name, "migrating");
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}

/// Periodically probes every registered group that is currently ejected
/// with `eject_after_restore` set, re-enabling it on a successful connect.
/// Groups ejected without `eject_after_restore` clear themselves on their
/// own TTL (`Group::is_ejected`) and need no timer.
pub async fn run_auto_restore(state: Arc<ProxyState>, interval: Duration, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for entry in state.groups.iter() {
                    let group = entry.value().clone();
                    if group.is_ejected_now() && group.probe_restore().await {
                        info!(group = %group.name, "group auto-restored after successful probe");
                    }
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}
