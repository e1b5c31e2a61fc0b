// src/config.rs

//! Configuration loading, validation, and persistence.
//!
//! The XML loader/rewriter of the original program is an external
//! collaborator this crate does not reimplement (out of scope per the
//! purpose/scope of the system); what the core needs is a resolved,
//! validated snapshot plus a way to persist mutations back to disk. This
//! module supplies both, using a TOML document whose shape mirrors the
//! original schema element-for-element, in the teacher's raw/resolved
//! two-struct pattern.

use crate::core::errors::ProxyError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn default_max_hash_value() -> u32 {
    128
}
fn default_thread_num() -> usize {
    4
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_port() -> u16 {
    8221
}
fn default_metrics_port() -> u16 {
    9221
}
fn default_connection_num() -> usize {
    50
}
fn default_migration_sweep_interval() -> Duration {
    Duration::from_millis(100)
}

/// As loaded straight off disk: individually optional fields with
/// `#[serde(default)]`, resolved into `Config` by `Config::from_raw`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_thread_num")]
    pub thread_num: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default)]
    pub daemonize: bool,
    #[serde(default)]
    pub guard: bool,
    #[serde(default = "default_max_hash_value")]
    pub max_hash_value: u32,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(with = "humantime_serde", default = "default_migration_sweep_interval")]
    pub migration_sweep_interval: Duration,
    #[serde(default)]
    pub vip: Option<VipConfig>,
    #[serde(default)]
    pub group: Vec<GroupConfig>,
    #[serde(default)]
    pub key_mapping: Vec<KeyMappingConfig>,
    #[serde(default)]
    pub migration_slots: Vec<MigrationSlotConfig>,
    #[serde(default)]
    pub group_option: GroupOptionConfig,
}

/// VIP failover is an external-collaborator concern (§1); this crate only
/// round-trips the fields so an operator-supplied VIP helper can read them
/// back out of the same config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VipConfig {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyConfig {
    MasterOnly,
    ReadBalance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub master: bool,
    #[serde(default = "default_connection_num")]
    pub connection_num: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub hash_min: u32,
    pub hash_max: u32,
    pub policy: PolicyConfig,
    #[serde(default)]
    pub host: Vec<HostConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMappingConfig {
    pub key_name: String,
    pub group_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSlotConfig {
    pub slot: u32,
    pub server_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupOptionConfig {
    #[serde(with = "humantime_serde")]
    pub backend_retry_interval: Duration,
    pub backend_retry_limit: u32,
    #[serde(with = "humantime_serde")]
    pub group_retry_time: Duration,
    pub auto_eject_group: bool,
    pub eject_after_restore: bool,
    #[serde(with = "humantime_serde", default = "default_auto_restore_interval")]
    pub auto_restore_interval: Duration,
}

fn default_auto_restore_interval() -> Duration {
    Duration::from_secs(5)
}

impl Default for GroupOptionConfig {
    fn default() -> Self {
        Self {
            backend_retry_interval: Duration::from_secs(1),
            backend_retry_limit: 100,
            group_retry_time: Duration::from_secs(30),
            auto_eject_group: false,
            eject_after_restore: false,
            auto_restore_interval: default_auto_restore_interval(),
        }
    }
}

/// The resolved, validated configuration the rest of the crate consumes.
/// Structurally identical to `RawConfig` once defaults have been applied;
/// kept as a distinct type so `from_file` is the only path that can
/// produce one, matching the teacher's raw-vs-resolved split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub thread_num: usize,
    pub log_level: String,
    pub log_file: Option<String>,
    pub daemonize: bool,
    pub guard: bool,
    pub max_hash_value: u32,
    pub metrics_port: u16,
    pub migration_sweep_interval: Duration,
    pub vip: Option<VipConfig>,
    pub group: Vec<GroupConfig>,
    pub key_mapping: Vec<KeyMappingConfig>,
    pub migration_slots: Vec<MigrationSlotConfig>,
    pub group_option: GroupOptionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            thread_num: default_thread_num(),
            log_level: default_log_level(),
            log_file: None,
            daemonize: false,
            guard: false,
            max_hash_value: default_max_hash_value(),
            metrics_port: default_metrics_port(),
            migration_sweep_interval: default_migration_sweep_interval(),
            vip: None,
            group: Vec::new(),
            key_mapping: Vec::new(),
            migration_slots: Vec::new(),
            group_option: GroupOptionConfig::default(),
        }
    }
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            port: raw.port,
            thread_num: raw.thread_num,
            log_level: raw.log_level,
            log_file: raw.log_file,
            daemonize: raw.daemonize,
            guard: raw.guard,
            max_hash_value: raw.max_hash_value,
            metrics_port: raw.metrics_port,
            migration_sweep_interval: raw.migration_sweep_interval,
            vip: raw.vip,
            group: raw.group,
            key_mapping: raw.key_mapping,
            migration_slots: raw.migration_slots,
            group_option: raw.group_option,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProxyError> {
        let text = fs::read_to_string(path.as_ref())
            .map_err(|e| ProxyError::Config(format!("reading {}: {e}", path.as_ref().display())))?;
        let raw: RawConfig = toml::from_str(&text).map_err(|e| ProxyError::Config(e.to_string()))?;
        let config = Config::from(raw);
        config.validate()?;
        Ok(config)
    }

    /// Every startup-abort condition named by the error-handling design:
    /// non-tiling slot coverage, invalid/duplicate groups, bad ports,
    /// non-positive thread count, and key/migration mappings that name a
    /// group which doesn't exist.
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.port == 0 {
            return Err(ProxyError::Config("port must be nonzero".into()));
        }
        if self.thread_num == 0 {
            return Err(ProxyError::Config("thread_num must be > 0".into()));
        }
        if self.max_hash_value == 0 || self.max_hash_value > crate::core::slot::MAX_HASH_VALUE {
            return Err(ProxyError::Config(format!(
                "max_hash_value must be in 1..={}",
                crate::core::slot::MAX_HASH_VALUE
            )));
        }
        if self.metrics_port == self.port {
            return Err(ProxyError::Config("metrics_port must differ from port".into()));
        }
        if self.group.is_empty() {
            return Err(ProxyError::Config("at least one group is required".into()));
        }

        let mut seen_names = std::collections::HashSet::new();
        let mut coverage = vec![false; self.max_hash_value as usize];
        for group in &self.group {
            if !seen_names.insert(group.name.as_str()) {
                return Err(ProxyError::Config(format!("duplicate group name '{}'", group.name)));
            }
            if group.hash_min > group.hash_max || group.hash_max >= self.max_hash_value {
                return Err(ProxyError::Config(format!(
                    "group '{}' has an invalid hash range {}..={}",
                    group.name, group.hash_min, group.hash_max
                )));
            }
            for slot in group.hash_min..=group.hash_max {
                if coverage[slot as usize] {
                    return Err(ProxyError::Config(format!("slot {slot} is claimed by more than one group")));
                }
                coverage[slot as usize] = true;
            }
            let master_count = group.host.iter().filter(|h| h.master).count();
            if master_count == 0 {
                return Err(ProxyError::Config(format!("group '{}' has no master host", group.name)));
            }
            for host in &group.host {
                if host.connection_num == 0 {
                    return Err(ProxyError::Config(format!(
                        "group '{}' host {}:{} has pool_size 0",
                        group.name, host.ip, host.port
                    )));
                }
            }
        }
        if let Some(gap) = coverage.iter().position(|&owned| !owned) {
            return Err(ProxyError::Config(format!("slot {gap} is not covered by any group")));
        }

        for mapping in &self.key_mapping {
            if !seen_names.contains(mapping.group_name.as_str()) {
                return Err(ProxyError::Config(format!(
                    "key_mapping references unknown group '{}'",
                    mapping.group_name
                )));
            }
        }
        for mig in &self.migration_slots {
            if mig.slot >= self.max_hash_value {
                return Err(ProxyError::Config(format!("migration_slots entry for slot {} is out of range", mig.slot)));
            }
        }

        Ok(())
    }

    /// Rewrites the config file with a timestamped backup of the previous
    /// contents, then an atomic rename of the new contents into place.
    /// Used by the admin surface after `ADDKEYMAPPING`/`DELKEYMAPPING`/
    /// `YMIGRATE` mutate the in-memory snapshot.
    pub fn persist_to_file(&self, path: &Path) -> Result<(), ProxyError> {
        let serialized = toml::to_string_pretty(self).map_err(|e| ProxyError::Config(e.to_string()))?;

        if path.exists() {
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let backup_path = path.with_extension(format!("toml.{timestamp}.bak"));
            // Best-effort: a failed backup must not block the rewrite.
            let _ = fs::copy(path, &backup_path);
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, serialized)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
