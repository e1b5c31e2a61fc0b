// src/core/migration.rs

//! The migration engine (C7): for a slot whose overlay names a target
//! group, issues `MIGRATE host port key "" 0 3000` to the source group
//! first, then forwards the original request to the target group.

use crate::core::errors::ProxyError;
use crate::core::group::{Group, Servant};
use crate::core::metrics::MIGRATIONS_TOTAL;
use crate::core::pool::send_and_receive;
use crate::core::protocol::RespValue;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

const MIGRATE_TIMEOUT_MS: &str = "3000";

/// Builds the exact `MIGRATE <ip> <port> <key> "" 0 3000` frame issued to
/// the source backend ahead of forwarding the original request. `servant`
/// must already be a usable target backend — picked by the caller before
/// any MIGRATE is sent, per §4.6 step 1.
fn build_migrate_frame(key: &Bytes, servant: &Servant) -> RespValue {
    let ip = servant.host.ip().to_string();
    let port = servant.host.port().to_string();
    RespValue::Array(vec![
        RespValue::bulk(&b"MIGRATE"[..]),
        RespValue::bulk(ip.into_bytes()),
        RespValue::bulk(port.into_bytes()),
        RespValue::bulk(key.clone()),
        RespValue::bulk(&b""[..]),
        RespValue::bulk(&b"0"[..]),
        RespValue::bulk(MIGRATE_TIMEOUT_MS.as_bytes().to_vec()),
    ])
}

fn is_migrate_success(reply: &RespValue) -> bool {
    matches!(reply, RespValue::SimpleString(_) | RespValue::Integer(_))
}

/// Runs the two-phase migration gate for a single-key request whose slot
/// is currently migrating: `MIGRATE` to the source, then the original
/// request to the target, only on success.
pub async fn forward_through_migration(
    key: &Bytes,
    source: &Arc<Group>,
    target: &Arc<Group>,
    original_request: RespValue,
) -> Result<RespValue, ProxyError> {
    // §4.6 step 1: a usable target backend must be picked before anything
    // else. If the target has none, fail outright — no MIGRATE is issued,
    // since that would move the key off the source for a target that can't
    // receive the forwarded request anyway.
    let Some(target_servant) = target.find_usable_servant(false) else {
        warn!(group = %target.name, "migration target has no usable servant, refusing to issue MIGRATE");
        return Err(ProxyError::RequestError);
    };

    let Some(source_servant) = source.find_usable_servant(false) else {
        return Err(ProxyError::RequestError);
    };

    let migrate_frame = build_migrate_frame(key, &target_servant);
    let mut conn = source_servant.pool.acquire().await?;
    let migrate_result = send_and_receive(&mut conn, migrate_frame).await;
    match migrate_result {
        Ok(reply) if is_migrate_success(&reply) => {
            source_servant.pool.release(conn).await;
            MIGRATIONS_TOTAL.with_label_values(&["ok"]).inc();
        }
        Ok(_) => {
            source_servant.pool.release(conn).await;
            debug!(group = %source.name, "MIGRATE returned a non-success reply");
            MIGRATIONS_TOTAL.with_label_values(&["failed"]).inc();
            return Err(ProxyError::MigrateFailed);
        }
        Err(e) => {
            source_servant.pool.mark_broken();
            debug!(group = %source.name, error = %e, "MIGRATE request failed");
            MIGRATIONS_TOTAL.with_label_values(&["failed"]).inc();
            return Err(ProxyError::MigrateFailed);
        }
    }

    let mut target_conn = target_servant.pool.acquire().await?;
    match send_and_receive(&mut target_conn, original_request).await {
        Ok(reply) => {
            target_servant.pool.release(target_conn).await;
            Ok(reply)
        }
        Err(e) => {
            target_servant.pool.mark_broken();
            Err(e)
        }
    }
}

/// The periodic diagnostic sweep over the migration overlay (§9 item 2):
/// purely informational, in round-robin-with-wraparound order. Grounded in
/// the original's `findNextMigration`, which the original only ever used
/// to log which slot is migrating to which group — never to clear the
/// overlay, since completion detection was left as a stub.
pub struct MigrationSweep {
    position: usize,
}

impl MigrationSweep {
    pub fn new() -> Self {
        Self { position: 0 }
    }

    /// Returns the next migrating `(slot, target group)` pair in the
    /// overlay, wrapping around to the start once every live entry has
    /// been visited in a sweep. Returns `None` exactly once per full
    /// sweep over a fixed set of migrating slots, then resumes from the
    /// start on the following call (§8's round-trip property).
    pub fn next(&mut self, overlay: &[(u32, Arc<Group>)]) -> Option<(u32, Arc<Group>)> {
        if overlay.is_empty() {
            return None;
        }
        if self.position >= overlay.len() {
            self.position = 0;
            return None;
        }
        let entry = overlay[self.position].clone();
        self.position += 1;
        Some(entry)
    }
}
