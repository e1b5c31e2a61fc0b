// src/core/dispatcher.rs

//! The command dispatcher (C5): resolves a parsed command to a handler and
//! applies multi-key fan-out for `MGET`/`MSET`/`DEL`. Routing and
//! migration gating for standard single-key commands lives here too,
//! since both the outer command and every fan-out sub-command pass
//! through the same slot/override/migration resolution.

use crate::core::commands::{is_read_command, ParsedCommand};
use crate::core::errors::ProxyError;
use crate::core::group::Group;
use crate::core::migration::forward_through_migration;
use crate::core::pool::send_and_receive;
use crate::core::protocol::RespValue;
use crate::core::state::ProxyState;
use bytes::Bytes;
use futures::future::join_all;
use std::sync::Arc;

/// Where a key resolves to: either a direct pin (key-override, which
/// bypasses migration entirely per §4.6's tie-break) or ordinary
/// slot-based ownership, possibly overlaid by an in-flight migration.
enum Routing {
    Direct(Arc<Group>),
    Slotted { owner: Arc<Group>, migrating_to: Option<Arc<Group>> },
}

fn resolve_routing(state: &ProxyState, key: &[u8]) -> Result<Routing, ProxyError> {
    if let Some(group) = state.slot_table.key_override(key) {
        return Ok(Routing::Direct(group));
    }
    let slot = state.slot_table.slot_for_key(key);
    let owner = state.slot_table.owner_for_slot(slot).ok_or(ProxyError::RequestError)?;
    let migrating_to = state.slot_table.migration_target(slot);
    Ok(Routing::Slotted { owner, migrating_to })
}

/// Sends a single already-built RESP request to a group, honoring the
/// migration gate when the slot is under migration. `is_read` only
/// matters for `ReadBalance` groups.
async fn dispatch_to_group(
    state: &ProxyState,
    key: &Bytes,
    request: RespValue,
    is_read: bool,
) -> Result<RespValue, ProxyError> {
    let routing = resolve_routing(state, key)?;

    let group = match routing {
        Routing::Direct(group) => group,
        Routing::Slotted { owner, migrating_to: Some(target) } => {
            return forward_through_migration(key, &owner, &target, request).await;
        }
        Routing::Slotted { owner, migrating_to: None } => owner,
    };

    let servant = group.find_usable_servant(is_read).ok_or_else(|| {
        group.eject();
        ProxyError::RequestError
    })?;

    let mut conn = servant.pool.acquire().await?;
    match send_and_receive(&mut conn, request).await {
        Ok(reply) => {
            servant.pool.release(conn).await;
            Ok(reply)
        }
        Err(e) => {
            servant.pool.mark_broken();
            Err(e)
        }
    }
}

fn single_key_frame(name: &str, key: &Bytes) -> RespValue {
    RespValue::Array(vec![RespValue::bulk(name.as_bytes().to_vec()), RespValue::bulk(key.clone())])
}

fn set_frame(key: &Bytes, value: &Bytes) -> RespValue {
    RespValue::Array(vec![
        RespValue::bulk(&b"SET"[..]),
        RespValue::bulk(key.clone()),
        RespValue::bulk(value.clone()),
    ])
}

fn del_frame(key: &Bytes) -> RespValue {
    single_key_frame("DEL", key)
}

/// `GET`/`SET`/`DEL` are the only sub-commands fan-out ever synthesizes;
/// reused here so `MGET k` with a single key takes the exact same
/// single-round-trip path as any other standard command (§8 boundary:
/// "MGET with exactly one key behaves as single-key GET").
async fn get(state: &ProxyState, key: &Bytes) -> Result<RespValue, ProxyError> {
    dispatch_to_group(state, key, single_key_frame("GET", key), is_read_command("GET")).await
}

async fn set(state: &ProxyState, key: &Bytes, value: &Bytes) -> Result<RespValue, ProxyError> {
    dispatch_to_group(state, key, set_frame(key, value), false).await
}

async fn del(state: &ProxyState, key: &Bytes) -> Result<RespValue, ProxyError> {
    dispatch_to_group(state, key, del_frame(key), false).await
}

pub async fn dispatch_standard(state: &ProxyState, key: &Bytes, name: &str, raw: RespValue) -> Result<RespValue, ProxyError> {
    dispatch_to_group(state, key, raw, is_read_command(name)).await
}

/// `MGET k1..kn`: replies are assembled in declared key order regardless
/// of which sub-request completes first (§4.4, §8 invariant 3). Any
/// sub-failure still contributes a value to its slot in the array rather
/// than failing the whole reply, since MGET has no natural "parent error"
/// representation for a partial failure other than per-element nulls.
pub async fn dispatch_mget(state: &ProxyState, keys: &[Bytes]) -> Result<RespValue, ProxyError> {
    if keys.len() == 1 {
        return get(state, &keys[0]).await;
    }
    let replies = join_all(keys.iter().map(|k| get(state, k))).await;
    let values = replies
        .into_iter()
        .map(|r| r.unwrap_or(RespValue::Null))
        .collect();
    Ok(RespValue::Array(values))
}

/// `MSET k1 v1 .. kn vn`: fans out into single-key `SET`s; the parent
/// replies `+OK\r\n` only once every sub-`SET` succeeds, and surfaces
/// `RequestError` the moment any one fails (§4.4).
pub async fn dispatch_mset(state: &ProxyState, pairs: &[(Bytes, Bytes)]) -> Result<RespValue, ProxyError> {
    if pairs.len() == 1 {
        let (k, v) = &pairs[0];
        return set(state, k, v).await.map(|_| RespValue::simple("OK"));
    }
    let replies = join_all(pairs.iter().map(|(k, v)| set(state, k, v))).await;
    if replies.iter().all(|r| r.is_ok()) {
        Ok(RespValue::simple("OK"))
    } else {
        Err(ProxyError::RequestError)
    }
}

/// `DEL k1..kn`: the parent's integer reply is the sum of every
/// sub-reply's integer count (§4.4, §8 invariant 4). A sub-failure
/// contributes zero rather than aborting the whole count, since a failed
/// `DEL` sub-request could not have deleted anything.
pub async fn dispatch_del(state: &ProxyState, keys: &[Bytes]) -> Result<RespValue, ProxyError> {
    if keys.len() == 1 {
        return del(state, &keys[0]).await;
    }
    let replies = join_all(keys.iter().map(|k| del(state, k))).await;
    let total: i64 = replies
        .into_iter()
        .map(|r| match r {
            Ok(RespValue::Integer(n)) => n,
            _ => 0,
        })
        .sum();
    Ok(RespValue::Integer(total))
}

/// Top-level entry point: routes a parsed command to its handler. Admin
/// commands are dispatched by the caller (they need direct access to
/// `ProxyState` machinery — shutdown, config persistence — beyond what
/// routing needs).
pub async fn dispatch(state: &ProxyState, command: ParsedCommand) -> Result<RespValue, ProxyError> {
    match command {
        ParsedCommand::Standard { name, key, raw } => dispatch_standard(state, &key, &name, raw).await,
        ParsedCommand::MGet { keys } => dispatch_mget(state, &keys).await,
        ParsedCommand::MSet { pairs } => dispatch_mset(state, &pairs).await,
        ParsedCommand::Del { keys } => dispatch_del(state, &keys).await,
        ParsedCommand::Admin(_) => unreachable!("admin commands are dispatched separately"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_key_frame_is_a_two_element_array() {
        let frame = single_key_frame("GET", &Bytes::from_static(b"foo"));
        match frame {
            RespValue::Array(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn set_frame_has_three_elements() {
        let frame = set_frame(&Bytes::from_static(b"foo"), &Bytes::from_static(b"bar"));
        match frame {
            RespValue::Array(items) => assert_eq!(items.len(), 3),
            _ => panic!("expected array"),
        }
    }
}
