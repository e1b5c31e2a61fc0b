// src/core/commands.rs

//! Command classification and parsing: the front half of C5. Turns a raw
//! `RespValue` command array into a `ParsedCommand`, and answers the
//! read-vs-write question the group policy (C3) needs.

use crate::core::errors::ProxyError;
use crate::core::protocol::RespValue;
use bytes::Bytes;
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Static read-command table (§4.5). Everything not in this set is treated
/// as a write for the purposes of `ReadBalance` servant selection.
static READ_COMMANDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "GET", "MGET", "EXISTS", "TYPE", "STRLEN", "GETRANGE", "TTL", "PTTL", "HGET", "HMGET",
        "HGETALL", "HKEYS", "HVALS", "HLEN", "HEXISTS", "LRANGE", "LLEN", "LINDEX", "SMEMBERS",
        "SISMEMBER", "SCARD", "ZRANGE", "ZSCORE", "ZCARD", "ZRANK", "DBSIZE", "KEYS",
    ]
    .into_iter()
    .collect()
});

pub fn is_read_command(name: &str) -> bool {
    READ_COMMANDS.contains(name)
}

#[derive(Debug, Clone)]
pub enum AdminCommand {
    Ping,
    ShowMapping,
    AddKeyMapping { group: String, keys: Vec<Bytes> },
    DelKeyMapping { keys: Vec<Bytes> },
    PoolInfo,
    HashMapping,
    YMigrate { slot: u32, ip: String, port: u16 },
    MigStat,
    Log { level: Option<String> },
    Shutdown { force: bool },
}

#[derive(Debug, Clone)]
pub enum ParsedCommand {
    /// Any key-bearing command this proxy doesn't special-case: forwarded
    /// byte-for-byte to whichever backend owns `key`.
    Standard { name: String, key: Bytes, raw: RespValue },
    MGet { keys: Vec<Bytes> },
    MSet { pairs: Vec<(Bytes, Bytes)> },
    Del { keys: Vec<Bytes> },
    Admin(AdminCommand),
}

/// Parses a raw command array into a `ParsedCommand`, or fails with the
/// wire-level error the dispatcher should surface directly.
pub fn parse_command(tokens: Vec<Bytes>) -> Result<ParsedCommand, ProxyError> {
    let Some(name_bytes) = tokens.first() else {
        return Err(ProxyError::ProtoNotSupport);
    };
    let name = String::from_utf8_lossy(name_bytes).to_ascii_uppercase();
    let args = &tokens[1..];

    match name.as_str() {
        "PING" => Ok(ParsedCommand::Admin(AdminCommand::Ping)),
        "SHOWMAPPING" => Ok(ParsedCommand::Admin(AdminCommand::ShowMapping)),
        "POOLINFO" => Ok(ParsedCommand::Admin(AdminCommand::PoolInfo)),
        "HASHMAPPING" => Ok(ParsedCommand::Admin(AdminCommand::HashMapping)),
        "MIGSTAT" => Ok(ParsedCommand::Admin(AdminCommand::MigStat)),
        "ADDKEYMAPPING" => {
            if args.len() < 2 {
                return Err(ProxyError::WrongNumberOfArguments);
            }
            let group = String::from_utf8_lossy(&args[0]).to_string();
            Ok(ParsedCommand::Admin(AdminCommand::AddKeyMapping {
                group,
                keys: args[1..].to_vec(),
            }))
        }
        "DELKEYMAPPING" => {
            if args.is_empty() {
                return Err(ProxyError::WrongNumberOfArguments);
            }
            Ok(ParsedCommand::Admin(AdminCommand::DelKeyMapping { keys: args.to_vec() }))
        }
        "YMIGRATE" => {
            if args.len() != 3 {
                return Err(ProxyError::WrongNumberOfArguments);
            }
            let slot = std::str::from_utf8(&args[0])
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .ok_or(ProxyError::ProtoError)?;
            let ip = String::from_utf8_lossy(&args[1]).to_string();
            let port = std::str::from_utf8(&args[2])
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
                .ok_or(ProxyError::ProtoError)?;
            Ok(ParsedCommand::Admin(AdminCommand::YMigrate { slot, ip, port }))
        }
        "LOG" => {
            let level = args.first().map(|b| String::from_utf8_lossy(b).to_string());
            Ok(ParsedCommand::Admin(AdminCommand::Log { level }))
        }
        "SHUTDOWN" => {
            let force = args
                .first()
                .map(|b| b.eq_ignore_ascii_case(b"FORCE"))
                .unwrap_or(false);
            Ok(ParsedCommand::Admin(AdminCommand::Shutdown { force }))
        }
        "MGET" => {
            if args.is_empty() {
                return Err(ProxyError::WrongNumberOfArguments);
            }
            Ok(ParsedCommand::MGet { keys: args.to_vec() })
        }
        "MSET" => {
            if args.is_empty() || !args.len().is_multiple_of(2) {
                return Err(ProxyError::WrongNumberOfArguments);
            }
            let pairs = args.chunks_exact(2).map(|c| (c[0].clone(), c[1].clone())).collect();
            Ok(ParsedCommand::MSet { pairs })
        }
        "DEL" => {
            if args.is_empty() {
                return Err(ProxyError::WrongNumberOfArguments);
            }
            Ok(ParsedCommand::Del { keys: args.to_vec() })
        }
        _ => {
            // Any other key-bearing command: token[1] is the key, and the
            // whole frame is forwarded to the backend unchanged.
            let Some(key) = args.first() else {
                return Err(ProxyError::ProtoNotSupport);
            };
            Ok(ParsedCommand::Standard {
                name,
                key: key.clone(),
                raw: RespValue::Array(tokens.into_iter().map(RespValue::BulkString).collect()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())).collect()
    }

    #[test]
    fn classifies_reads_and_writes() {
        assert!(is_read_command("GET"));
        assert!(!is_read_command("SET"));
    }

    #[test]
    fn parses_standard_command() {
        let cmd = parse_command(tokens(&["GET", "foo"])).unwrap();
        match cmd {
            ParsedCommand::Standard { name, key, .. } => {
                assert_eq!(name, "GET");
                assert_eq!(key, Bytes::from_static(b"foo"));
            }
            _ => panic!("expected Standard"),
        }
    }

    #[test]
    fn mget_zero_keys_is_wrong_arity() {
        assert!(matches!(
            parse_command(tokens(&["MGET"])),
            Err(ProxyError::WrongNumberOfArguments)
        ));
    }

    #[test]
    fn mset_odd_tokens_is_wrong_arity() {
        assert!(matches!(
            parse_command(tokens(&["MSET", "a", "1", "b"])),
            Err(ProxyError::WrongNumberOfArguments)
        ));
    }

    #[test]
    fn mget_single_key_still_returns_mget_for_fanout_layer_to_fast_path() {
        let cmd = parse_command(tokens(&["MGET", "a"])).unwrap();
        assert!(matches!(cmd, ParsedCommand::MGet { keys } if keys.len() == 1));
    }

    #[test]
    fn unknown_zero_arg_command_is_not_supported() {
        assert!(matches!(
            parse_command(tokens(&["FROBNICATE"])),
            Err(ProxyError::ProtoNotSupport)
        ));
    }
}
