// src/core/admin.rs

//! Admin command handlers (C8): the management surface layered over the
//! same connections as ordinary key traffic. Grounded in `cmdhandler.cpp`'s
//! `onShowMapping`/`onPoolInfo`/`onYMigrate`/... handlers.

use crate::core::bootstrap::get_or_create_migration_target;
use crate::core::commands::AdminCommand;
use crate::core::errors::ProxyError;
use crate::core::protocol::RespValue;
use crate::core::state::ProxyState;
use bytes::Bytes;
use std::net::ToSocketAddrs;
use std::time::Duration;
use tracing::info;

pub const APP_EXIT_KEY: i32 = 10;

/// Runs one admin command against live state. Returns `Ok(None)` for
/// `SHUTDOWN`, which the connection/server layer turns into a process exit
/// after the reply is flushed rather than a normal reply value.
pub async fn handle_admin(state: &ProxyState, command: AdminCommand) -> Result<AdminOutcome, ProxyError> {
    match command {
        AdminCommand::Ping => Ok(AdminOutcome::Reply(RespValue::simple("PONG"))),
        AdminCommand::ShowMapping => Ok(AdminOutcome::Reply(show_mapping(state))),
        AdminCommand::PoolInfo => Ok(AdminOutcome::Reply(pool_info(state))),
        AdminCommand::HashMapping => Err(ProxyError::OperationForbidden),
        AdminCommand::MigStat => Ok(AdminOutcome::Reply(mig_stat(state))),
        AdminCommand::AddKeyMapping { group, keys } => add_key_mapping(state, &group, keys).map(AdminOutcome::Reply),
        AdminCommand::DelKeyMapping { keys } => del_key_mapping(state, keys).map(AdminOutcome::Reply),
        AdminCommand::YMigrate { slot, ip, port } => ymigrate(state, slot, &ip, port).await.map(AdminOutcome::Reply),
        AdminCommand::Log { level } => log_command(state, level).map(AdminOutcome::Reply),
        AdminCommand::Shutdown { force } => Ok(AdminOutcome::Shutdown { force }),
    }
}

pub enum AdminOutcome {
    Reply(RespValue),
    Shutdown { force: bool },
}

/// `[HASH MAPPING]` lists every group's owned range in ascending slot
/// order; `[KEY MAPPING]` lists every per-key override. Matches the
/// original's two-section bulk reply, collapsing contiguous
/// same-owner slots into a single range the way `onShowMapping` does.
fn show_mapping(state: &ProxyState) -> RespValue {
    let mut out = String::from("\n[HASH MAPPING]\n");
    let owners = state.slot_table.owners();
    let mut i = 0usize;
    while i < owners.len() {
        let Some(group) = owners[i].clone() else {
            i += 1;
            continue;
        };
        let start = i;
        while i < owners.len() && owners[i].as_ref().map(|g| g.name == group.name).unwrap_or(false) {
            i += 1;
        }
        out.push_str(&format!("{start}-{}: {}\n", i - 1, group.name));
    }

    out.push_str("[KEY MAPPING]\n");
    for (key, group) in state.slot_table.key_overrides_snapshot() {
        out.push_str(&format!("{}: {}\n", String::from_utf8_lossy(&key), group.name));
    }

    RespValue::bulk(out.into_bytes())
}

/// `GROUP HOST ACTIVE IDLE POOLSIZE`, one line per backend, masters before
/// slaves within a group, matching the original's `onPoolInfo` column
/// order (its `UNACTIVE` column is this crate's `idle`, per §H).
fn pool_info(state: &ProxyState) -> RespValue {
    let mut out = String::from("\nGROUP HOST ACTIVE IDLE POOLSIZE\n");
    for entry in state.groups.iter() {
        let group = entry.value();
        for servant in group.masters.iter().chain(group.slaves.iter()) {
            let stats = servant.stats();
            out.push_str(&format!(
                "{} {} {} {} {}\n",
                group.name, servant.host, stats.active, stats.idle, stats.capacity
            ));
        }
    }
    RespValue::bulk(out.into_bytes())
}

/// `+<slot>-><group>; <slot>-><group>; ...\r\n` over the live migration
/// overlay, in slot order.
fn mig_stat(state: &ProxyState) -> RespValue {
    let mut entries = state.slot_table.migration_overlay();
    entries.sort_by_key(|(slot, _)| *slot);
    let body = entries
        .iter()
        .map(|(slot, group)| format!("{slot}->{}", group.name))
        .collect::<Vec<_>>()
        .join("; ");
    RespValue::simple(body)
}

/// Mutates the key-override map, replies, then persists the config file —
/// the same ordering the original uses: the client doesn't wait on the
/// rewrite (§H item 6).
fn add_key_mapping(state: &ProxyState, group_name: &str, keys: Vec<Bytes>) -> Result<RespValue, ProxyError> {
    let group = state.group_by_name(group_name).ok_or(ProxyError::GroupNotExists)?;
    for key in &keys {
        state.slot_table.add_key_override(key.clone(), group.clone());
    }

    let mut config = state.config.lock();
    for key in &keys {
        config.key_mapping.push(crate::config::KeyMappingConfig {
            key_name: String::from_utf8_lossy(key).to_string(),
            group_name: group_name.to_string(),
        });
    }
    let _ = config.persist_to_file(&state.config_path);

    Ok(RespValue::simple("OK"))
}

fn del_key_mapping(state: &ProxyState, keys: Vec<Bytes>) -> Result<RespValue, ProxyError> {
    for key in &keys {
        state.slot_table.remove_key_override(key);
    }

    let mut config = state.config.lock();
    config.key_mapping.retain(|m| !keys.iter().any(|k| k.as_ref() == m.key_name.as_bytes()));
    let _ = config.persist_to_file(&state.config_path);

    Ok(RespValue::simple("OK"))
}

/// Unlike `ADDKEYMAPPING`/`DELKEYMAPPING`, `YMIGRATE`'s reply is
/// conditioned on the config rewrite succeeding: `-Save config file
/// failed\r\n` is this command's own reply variant (§6, §H item 6).
async fn ymigrate(state: &ProxyState, slot: u32, ip: &str, port: u16) -> Result<RespValue, ProxyError> {
    let addr = (ip, port)
        .to_socket_addrs()
        .map_err(|e| ProxyError::Config(format!("invalid host {ip}:{port}: {e}")))?
        .next()
        .ok_or_else(|| ProxyError::Config(format!("could not resolve {ip}:{port}")))?;

    let retry_interval = state.config.lock().group_option.backend_retry_interval;
    let max_reconn_count = state.config.lock().group_option.backend_retry_limit.max(1);
    let target = get_or_create_migration_target(state, addr, ip, port, retry_interval, max_reconn_count);
    state.slot_table.start_migration(slot, target);

    let mut config = state.config.lock();
    config.migration_slots.push(crate::config::MigrationSlotConfig {
        slot,
        server_address: ip.to_string(),
        port,
    });
    match config.persist_to_file(&state.config_path) {
        Ok(()) => {
            info!(slot, ip, port, "slot marked as migrating");
            Ok(RespValue::simple("OK"))
        }
        Err(_) => Err(ProxyError::SaveConfigFailed),
    }
}

fn log_command(state: &ProxyState, level: Option<String>) -> Result<RespValue, ProxyError> {
    match level {
        None => Ok(RespValue::simple(state.log_controller.current_level())),
        Some(level) => match state.log_controller.set_level(&level) {
            Ok(()) => Ok(RespValue::simple(level)),
            Err(_) => Err(ProxyError::ProtoError),
        },
    }
}
