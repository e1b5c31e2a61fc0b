// src/core/mod.rs

//! The routing/migration engine: everything in §2's component table (C1-C8)
//! plus the process-wide state (`state`) that ties them together.

pub mod admin;
pub mod bootstrap;
pub mod commands;
pub mod dispatcher;
pub mod errors;
pub mod group;
pub mod hash;
pub mod metrics;
pub mod migration;
pub mod pool;
pub mod protocol;
pub mod slot;
pub mod state;
pub mod tasks;

use state::LogLevelController;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::reload;

/// Bridges the admin `LOG` command to a live `tracing_subscriber::EnvFilter`
/// through its `reload::Handle`, per SPEC_FULL.md §A: the admin-visible
/// level string is whatever `EnvFilter` accepts, not a custom level enum.
pub struct LogReloadController {
    handle: reload::Handle<EnvFilter, tracing_subscriber::Registry>,
    current: parking_lot::Mutex<String>,
}

impl LogReloadController {
    pub fn new(handle: reload::Handle<EnvFilter, tracing_subscriber::Registry>, initial: String) -> Self {
        Self {
            handle,
            current: parking_lot::Mutex::new(initial),
        }
    }
}

impl LogLevelController for LogReloadController {
    fn current_level(&self) -> String {
        self.current.lock().clone()
    }

    fn set_level(&self, level: &str) -> Result<(), String> {
        let filter = EnvFilter::try_new(level).map_err(|e| e.to_string())?;
        self.handle.reload(filter).map_err(|e| e.to_string())?;
        *self.current.lock() = level.to_string();
        Ok(())
    }
}
