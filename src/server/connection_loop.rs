// src/server/connection_loop.rs

//! The main accept loop: one spawned task per client connection, each
//! reading, dispatching, and replying strictly serially (§5). Tokio's
//! work-stealing scheduler distributes connection tasks across
//! `thread_num` worker threads, standing in for the original's explicit
//! round-robin event-loop assignment.

use super::context::ServerContext;
use crate::connection::handle_connection;
use crate::core::metrics::{CONNECTED_CLIENTS, CONNECTIONS_RECEIVED_TOTAL};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, shutting down"),
            _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received, shutting down");
    }
}

pub async fn run(mut ctx: ServerContext) {
    let mut client_tasks: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = await_shutdown_signal() => break,

            Some(res) = ctx.background_tasks.join_next() => {
                if let Err(e) = res {
                    error!("background task panicked: {e:?}");
                }
            }

            accepted = ctx.listener.accept() => {
                match accepted {
                    Ok((socket, addr)) => {
                        info!(%addr, "accepted connection");
                        CONNECTIONS_RECEIVED_TOTAL.inc();
                        CONNECTED_CLIENTS.inc();
                        let state = ctx.state.clone();
                        client_tasks.spawn(async move {
                            handle_connection(socket, state).await;
                            CONNECTED_CLIENTS.dec();
                        });
                    }
                    Err(e) => error!(error = %e, "failed to accept connection"),
                }
            }

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!("client handler panicked: {e:?}");
                    }
                }
            }
        }
    }

    info!("stopped accepting new connections, draining in-flight work");
    let _ = ctx.state.shutdown_tx.send(());
    client_tasks.shutdown().await;

    if tokio::time::timeout(Duration::from_secs(5), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("timed out waiting for background tasks to finish cleanly");
    }
    info!("shutdown complete");
}
