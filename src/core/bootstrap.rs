// src/core/bootstrap.rs

//! Builds the runtime group registry and slot table from a validated
//! `Config` snapshot at startup.

use crate::config::{Config, PolicyConfig};
use crate::core::errors::ProxyError;
use crate::core::group::{Group, GroupPolicy, Servant};
use crate::core::state::ProxyState;
use bytes::Bytes;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

pub fn build_from_config(state: &ProxyState, config: &Config) -> Result<(), ProxyError> {
    let retry_interval = config.group_option.backend_retry_interval;
    let max_reconn_count = config.group_option.backend_retry_limit.max(1);
    let group_retry_time = config.group_option.group_retry_time;

    for group_cfg in &config.group {
        let mut masters = Vec::new();
        let mut slaves = Vec::new();
        for host in &group_cfg.host {
            let addr = resolve_addr(&host.ip, host.port)?;
            let servant = Arc::new(Servant::new(addr, host.connection_num, retry_interval, max_reconn_count));
            if host.master {
                masters.push(servant);
            } else {
                slaves.push(servant);
            }
        }

        let policy = match group_cfg.policy {
            PolicyConfig::MasterOnly => GroupPolicy::MasterOnly,
            PolicyConfig::ReadBalance => GroupPolicy::ReadBalance,
        };

        let group = Arc::new(Group::new(
            group_cfg.name.clone(),
            state.next_group_id(),
            policy,
            masters,
            slaves,
            config.group_option.auto_eject_group,
            config.group_option.eject_after_restore,
            group_retry_time,
        ));

        for slot in group_cfg.hash_min..=group_cfg.hash_max {
            state.slot_table.set_owner(slot, group.clone());
        }

        state.register_group(group);
    }

    for mapping in &config.key_mapping {
        let group = state
            .group_by_name(&mapping.group_name)
            .ok_or(ProxyError::GroupNotExists)?;
        state
            .slot_table
            .add_key_override(Bytes::from(mapping.key_name.clone().into_bytes()), group);
    }

    for mig in &config.migration_slots {
        let addr = resolve_addr(&mig.server_address, mig.port)?;
        let target = get_or_create_migration_target(state, addr, &mig.server_address, mig.port, retry_interval, max_reconn_count);
        state.slot_table.start_migration(mig.slot, target);
    }

    Ok(())
}

fn resolve_addr(ip: &str, port: u16) -> Result<SocketAddr, ProxyError> {
    (ip, port)
        .to_socket_addrs()
        .map_err(|e| ProxyError::Config(format!("invalid host {ip}:{port}: {e}")))?
        .next()
        .ok_or_else(|| ProxyError::Config(format!("could not resolve {ip}:{port}")))
}

/// Reuses an existing migration-target group for a given `ip:port`, the
/// way `YMIGRATE` does at runtime, so config-declared migrations and
/// admin-triggered ones share one pool per backend.
pub fn get_or_create_migration_target(
    state: &ProxyState,
    addr: SocketAddr,
    ip: &str,
    port: u16,
    retry_interval: Duration,
    max_reconn_count: u32,
) -> Arc<Group> {
    let key = ProxyState::migration_target_registry_key(ip, port);
    if let Some(existing) = state.migration_targets.get(&key) {
        return existing.clone();
    }

    let servant = Arc::new(Servant::new(addr, 10, retry_interval, max_reconn_count));
    let group = Arc::new(Group::new(
        format!("migration-target-{key}"),
        state.next_group_id(),
        GroupPolicy::MasterOnly,
        vec![servant],
        vec![],
        false,
        false,
        Duration::from_secs(30),
    ));
    state.migration_targets.insert(key, group.clone());
    group
}
