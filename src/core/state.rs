// src/core/state.rs

//! The proxy's central, process-wide state: the group registry, slot
//! table, migration-target registry, and the handles needed by the admin
//! surface (log-level control, shutdown, config persistence).

use crate::config::Config;
use crate::core::group::Group;
use crate::core::slot::SlotTable;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Bridges the admin `LOG` command to whatever logging backend is wired up
/// at startup, without threading `tracing_subscriber`'s generic
/// `reload::Handle<L, S>` type through every module that needs it.
pub trait LogLevelController: Send + Sync {
    fn current_level(&self) -> String;
    fn set_level(&self, level: &str) -> Result<(), String>;
}

pub struct ProxyState {
    pub groups: DashMap<String, Arc<Group>>,
    pub slot_table: SlotTable,
    pub migration_targets: DashMap<String, Arc<Group>>,
    pub config_path: PathBuf,
    pub config: parking_lot::Mutex<Config>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub log_controller: Arc<dyn LogLevelController>,
    next_group_id: AtomicUsize,
}

impl ProxyState {
    pub fn new(config: Config, config_path: PathBuf, log_controller: Arc<dyn LogLevelController>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            groups: DashMap::new(),
            slot_table: SlotTable::new(config.max_hash_value),
            migration_targets: DashMap::new(),
            config_path,
            config: parking_lot::Mutex::new(config),
            shutdown_tx,
            log_controller,
            next_group_id: AtomicUsize::new(0),
        }
    }

    pub fn next_group_id(&self) -> usize {
        self.next_group_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register_group(&self, group: Arc<Group>) {
        self.groups.insert(group.name.clone(), group);
    }

    pub fn group_by_name(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.get(name).map(|g| g.clone())
    }

    /// Finds (or lazily creates, per `YMIGRATE`'s implicit target) the
    /// migration-target group for `ip:port`, reusing an existing one so
    /// repeated migrations to the same backend don't duplicate pools.
    pub fn migration_target_registry_key(ip: &str, port: u16) -> String {
        format!("{ip}:{port}")
    }
}
