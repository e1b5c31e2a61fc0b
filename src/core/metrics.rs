// src/core/metrics.rs

//! Prometheus metrics for the proxy. Registered once globally via
//! `lazy_static`, exposed over HTTP by `server::metrics_server`. Ambient
//! observability, carried regardless of the per-key "top-key statistics"
//! non-goal — it reports proxy-wide counters, not per-key ones.

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Gauge, TextEncoder, register_counter, register_counter_vec, register_gauge};

lazy_static! {
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("shardproxy_connections_received_total", "Total number of client connections accepted.").unwrap();
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("shardproxy_connected_clients", "Number of currently connected clients.").unwrap();
    pub static ref COMMANDS_PROCESSED_TOTAL: CounterVec = register_counter_vec!(
        "shardproxy_commands_processed_total",
        "Total number of commands processed, labeled by outcome.",
        &["outcome"]
    )
    .unwrap();
    pub static ref MIGRATIONS_TOTAL: CounterVec = register_counter_vec!(
        "shardproxy_migrations_total",
        "Total number of MIGRATE attempts issued, labeled by outcome.",
        &["outcome"]
    )
    .unwrap();
    pub static ref BACKEND_RECONNECTS_TOTAL: Counter =
        register_counter!("shardproxy_backend_reconnects_total", "Total number of backend reconnect attempts.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text
/// format, for the `/metrics` HTTP endpoint.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
