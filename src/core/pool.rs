// src/core/pool.rs

//! Per-backend connection pool (C2): a bounded set of long-lived
//! connections to a single upstream `(ip, port)`, with idle/active
//! accounting and an exponential-capped reconnect policy.

use crate::core::errors::ProxyError;
use crate::core::metrics::BACKEND_RECONNECTS_TOTAL;
use crate::core::protocol::{RespCodec, RespValue};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const INITIAL_RECONNECT_DELAY_FLOOR: Duration = Duration::from_millis(250);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

pub type BackendConnection = Framed<TcpStream, RespCodec>;

/// Snapshot used by `POOLINFO` (C8): active, idle, and capacity counts.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub active: usize,
    pub idle: usize,
    pub capacity: usize,
}

/// A bounded pool of connections to one backend address. Connections are
/// created lazily up to `capacity`; a connection that errors is dropped
/// rather than returned to the pool, and a background task re-establishes
/// the pool's headroom on a doubling backoff.
pub struct BackendPool {
    pub addr: SocketAddr,
    capacity: usize,
    reconnect_interval: Duration,
    max_reconn_count: u32,
    idle: AsyncMutex<VecDeque<BackendConnection>>,
    active: AtomicUsize,
    enabled: AtomicBool,
    fail_count: AtomicU32,
}

impl BackendPool {
    pub fn new(addr: SocketAddr, capacity: usize, reconnect_interval: Duration, max_reconn_count: u32) -> Arc<Self> {
        Arc::new(Self {
            addr,
            capacity: capacity.max(1),
            reconnect_interval,
            max_reconn_count,
            idle: AsyncMutex::new(VecDeque::new()),
            active: AtomicUsize::new(0),
            enabled: AtomicBool::new(true),
            fail_count: AtomicU32::new(0),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Manual admin probe: clears the disabled flag and resets the failure
    /// counter so the next `acquire` gets a fresh chance to connect.
    pub fn reenable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
        self.fail_count.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.active.load(Ordering::Relaxed),
            idle: self.idle.try_lock().map(|q| q.len()).unwrap_or(0),
            capacity: self.capacity,
        }
    }

    /// Acquires a connection: returns an idle one if available, otherwise
    /// opens a new one if under capacity.
    pub async fn acquire(self: &Arc<Self>) -> Result<BackendConnection, ProxyError> {
        if !self.is_enabled() {
            return Err(ProxyError::RequestError);
        }

        {
            let mut idle = self.idle.lock().await;
            if let Some(conn) = idle.pop_front() {
                return Ok(conn);
            }
        }

        if self.active.load(Ordering::Relaxed) >= self.capacity {
            return Err(ProxyError::RequestError);
        }

        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(self.addr)).await {
            Ok(Ok(stream)) => {
                self.active.fetch_add(1, Ordering::Relaxed);
                self.fail_count.store(0, Ordering::Relaxed);
                Ok(Framed::new(stream, RespCodec))
            }
            _ => {
                self.on_connect_failure();
                Err(ProxyError::RequestError)
            }
        }
    }

    /// Returns a healthy connection to the idle queue.
    pub async fn release(&self, conn: BackendConnection) {
        self.idle.lock().await.push_back(conn);
    }

    /// Drops a connection that errored mid-request and frees its capacity
    /// slot. Does not itself trigger reconnection — the next `acquire`
    /// call will open a fresh connection as long as the pool is enabled.
    pub fn mark_broken(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    fn on_connect_failure(self: &Arc<Self>) {
        let failures = self.fail_count.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.max_reconn_count {
            warn!(addr = %self.addr, failures, "backend exceeded max reconnect attempts, disabling");
            self.enabled.store(false, Ordering::Relaxed);
            return;
        }

        let delay = reconnect_delay(self.reconnect_interval, failures);
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(addr = %pool.addr, attempt = failures, ?delay, "probing backend after reconnect delay");
            BACKEND_RECONNECTS_TOTAL.inc();
            match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(pool.addr)).await {
                Ok(Ok(stream)) => {
                    pool.fail_count.store(0, Ordering::Relaxed);
                    pool.active.fetch_add(1, Ordering::Relaxed);
                    info!(addr = %pool.addr, "backend reconnect probe succeeded");
                    pool.idle.lock().await.push_back(Framed::new(stream, RespCodec));
                }
                _ => pool.on_connect_failure(),
            }
        });
    }
}

/// Exponential-capped backoff: `reconnect_interval * 2^(failures-1)`,
/// capped at `MAX_RECONNECT_DELAY`, floored so very small configured
/// intervals still back off meaningfully.
fn reconnect_delay(base: Duration, failures: u32) -> Duration {
    let base = base.max(INITIAL_RECONNECT_DELAY_FLOOR);
    let shift = failures.saturating_sub(1).min(20);
    base.checked_mul(1u32 << shift).unwrap_or(MAX_RECONNECT_DELAY).min(MAX_RECONNECT_DELAY)
}

/// Sends one request on an acquired connection and reads back exactly one
/// reply frame. Used by both the normal routing path and by the sub-packet
/// synthesis paths (fan-out, `MIGRATE`).
pub async fn send_and_receive(conn: &mut BackendConnection, request: RespValue) -> Result<RespValue, ProxyError> {
    use futures::{SinkExt, StreamExt};
    conn.send(request).await?;
    match conn.next().await {
        Some(Ok(reply)) => Ok(reply),
        Some(Err(e)) => Err(e),
        None => Err(ProxyError::RequestError),
    }
}
