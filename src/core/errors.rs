// src/core/errors.rs

//! The primary error type for the proxy.

use std::sync::Arc;
use thiserror::Error;

/// All failure modes of the proxy, from wire-level protocol errors through
/// backend connectivity and configuration problems.
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("incomplete frame")]
    IncompleteData,

    #[error("protocol error")]
    ProtoError,

    #[error("protocol not supported")]
    ProtoNotSupport,

    #[error("wrong number of arguments")]
    WrongNumberOfArguments,

    #[error("request error")]
    RequestError,

    #[error("migrate failed")]
    MigrateFailed,

    #[error("operation forbidden")]
    OperationForbidden,

    #[error("group is not exists")]
    GroupNotExists,

    #[error("save config file failed")]
    SaveConfigFailed,

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        ProxyError::Io(Arc::new(e))
    }
}

impl ProxyError {
    /// The exact RESP error line a client should see for this failure, per
    /// the wire-text table. Connection-fatal errors (`ProtoError`) are
    /// still encoded as a normal error line; the caller decides whether to
    /// close the connection afterward.
    pub fn to_wire_text(&self) -> &'static str {
        match self {
            ProxyError::ProtoError => "-Proto error\r\n",
            ProxyError::ProtoNotSupport => "-Proto not support\r\n",
            ProxyError::WrongNumberOfArguments => "-Wrong number of arguments\r\n",
            ProxyError::RequestError => "-Request error\r\n",
            ProxyError::MigrateFailed => "-Migrate failed\r\n",
            ProxyError::OperationForbidden => "-Operation forbidden\r\n",
            ProxyError::GroupNotExists => "-Group is not exists\r\n",
            ProxyError::SaveConfigFailed => "-Save config file failed\r\n",
            // Anything else (IO, config, internal) surfaces to clients as a
            // generic request error; the detail stays in the logs.
            _ => "-Request error\r\n",
        }
    }
}
