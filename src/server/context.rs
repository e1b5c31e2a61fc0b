// src/server/context.rs

use crate::core::state::ProxyState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the server's main loop.
/// Shutdown is coordinated through `state.shutdown_tx` directly — the admin
/// `SHUTDOWN` handler and the accept loop both subscribe to the one channel
/// rather than threading a second one through here.
pub struct ServerContext {
    pub state: Arc<ProxyState>,
    pub listener: TcpListener,
    pub background_tasks: JoinSet<()>,
}
