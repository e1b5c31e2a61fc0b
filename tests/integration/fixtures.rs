// tests/integration/fixtures.rs

//! Shared test scaffolding: a fake backend that answers a handful of
//! commands deterministically, and a `TestContext` that wires up a real
//! `ProxyState` plus a live client-facing `TcpListener`, the same
//! accept-then-`handle_connection` path the real binary runs, minus the
//! signal handling and metrics server that don't matter for these tests.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use shardproxy::config::{Config, GroupConfig, HostConfig, PolicyConfig};
use shardproxy::connection::handle_connection;
use shardproxy::core::bootstrap::build_from_config;
use shardproxy::core::protocol::{RespCodec, RespValue};
use shardproxy::core::state::{LogLevelController, ProxyState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

pub struct NoopLogController;
impl LogLevelController for NoopLogController {
    fn current_level(&self) -> String {
        "info".to_string()
    }
    fn set_level(&self, _level: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Spins up a fake single-master backend answering GET/SET/DEL and echoing
/// anything else back as `+OK`, plus a real proxy instance routing its
/// whole slot range to that one backend.
pub struct TestContext {
    pub proxy_addr: SocketAddr,
    pub backend_addr: SocketAddr,
    pub state: Arc<ProxyState>,
}

impl TestContext {
    pub async fn new() -> Self {
        let backend_addr = spawn_fake_backend().await;

        let mut config = Config::default();
        config.max_hash_value = 16;
        config.group = vec![GroupConfig {
            name: "g0".to_string(),
            hash_min: 0,
            hash_max: 15,
            policy: PolicyConfig::MasterOnly,
            host: vec![HostConfig {
                ip: backend_addr.ip().to_string(),
                port: backend_addr.port(),
                master: true,
                connection_num: 4,
            }],
        }];

        let state = Arc::new(ProxyState::new(
            config.clone(),
            PathBuf::from("/tmp/shardproxy-test-unused.toml"),
            Arc::new(NoopLogController),
        ));
        build_from_config(&state, &config).expect("valid routing config");

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind proxy listener");
        let proxy_addr = listener.local_addr().unwrap();

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else { break };
                let state = accept_state.clone();
                tokio::spawn(async move { handle_connection(socket, state).await });
            }
        });

        Self { proxy_addr, backend_addr, state }
    }

    /// Opens a fresh client connection to the proxy.
    pub async fn connect(&self) -> Framed<TcpStream, RespCodec> {
        let stream = TcpStream::connect(self.proxy_addr).await.expect("connect to proxy");
        Framed::new(stream, RespCodec)
    }

    /// Sends one command array and reads back exactly one reply, the
    /// strictly-serial request/response shape the proxy guarantees.
    pub async fn roundtrip(&self, parts: &[&str]) -> RespValue {
        let mut conn = self.connect().await;
        let request = RespValue::Array(parts.iter().map(|p| RespValue::BulkString(Bytes::copy_from_slice(p.as_bytes()))).collect());
        conn.send(request).await.expect("send request");
        conn.next().await.expect("connection closed early").expect("decode reply")
    }

    /// Spawns a second fake backend (a migration target distinct from the
    /// group's original backend) whose `GET` replies are tagged so tests
    /// can tell which backend actually answered.
    pub async fn spawn_migration_target(&self) -> SocketAddr {
        spawn_fake_backend_tagged(b"target-value").await
    }
}

async fn spawn_fake_backend() -> SocketAddr {
    spawn_fake_backend_tagged(b"fake-value").await
}

async fn spawn_fake_backend_tagged(get_value: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind fake backend");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let mut conn = Framed::new(socket, RespCodec);
                while let Some(Ok(frame)) = conn.next().await {
                    let reply = fake_backend_reply(&frame, get_value);
                    if conn.send(reply).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    addr
}

fn fake_backend_reply(frame: &RespValue, get_value: &'static [u8]) -> RespValue {
    let RespValue::Array(items) = frame else {
        return RespValue::error("unexpected frame shape");
    };
    let Some(RespValue::BulkString(name)) = items.first() else {
        return RespValue::error("missing command name");
    };

    match name.to_ascii_uppercase().as_slice() {
        b"GET" => match items.get(1) {
            Some(RespValue::BulkString(key)) if key.starts_with(b"missing") => RespValue::Null,
            _ => RespValue::bulk(Bytes::from_static(get_value)),
        },
        b"SET" => RespValue::simple("OK"),
        b"DEL" => RespValue::Integer(1),
        b"MIGRATE" => RespValue::simple("OK"),
        _ => RespValue::simple("OK"),
    }
}
