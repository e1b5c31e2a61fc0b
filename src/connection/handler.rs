// src/connection/handler.rs

use crate::core::admin::{handle_admin, AdminOutcome, APP_EXIT_KEY};
use crate::core::commands::{parse_command, ParsedCommand};
use crate::core::dispatcher::dispatch;
use crate::core::errors::ProxyError;
use crate::core::metrics::COMMANDS_PROCESSED_TOTAL;
use crate::core::protocol::{RespCodec, RespValue};
use crate::core::state::ProxyState;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Turns a `ProxyError`'s wire text (a full `-...\r\n` line) into the bare
/// error message the codec's `Encoder` will re-wrap, so every error path
/// produces byte-identical output whether it started as a `RespValue::Error`
/// or a `ProxyError`.
fn error_value(err: &ProxyError) -> RespValue {
    let text = err.to_wire_text();
    let body = text.trim_start_matches('-').trim_end_matches("\r\n");
    RespValue::error(body)
}

/// Owns one client connection end to end: accept, frame, read one command,
/// dispatch it, write back one reply, repeat. Never pipelines: the next
/// frame isn't read until the previous reply has been written, matching
/// strictly serial request/response semantics (§5).
pub async fn handle_connection(stream: TcpStream, state: Arc<ProxyState>) {
    let peer = stream.peer_addr().ok();
    let mut framed = Framed::new(stream, RespCodec);
    let mut shutdown_rx = state.shutdown_tx.subscribe();

    loop {
        let frame = tokio::select! {
            frame = framed.next() => frame,
            _ = shutdown_rx.recv() => {
                debug!(?peer, "connection closing for shutdown");
                break;
            }
        };

        let Some(frame) = frame else {
            break;
        };

        let reply = match frame {
            Ok(value) => match value.as_command_tokens().and_then(parse_command) {
                Ok(ParsedCommand::Admin(admin_cmd)) => match handle_admin(&state, admin_cmd).await {
                    Ok(AdminOutcome::Reply(reply)) => reply,
                    Ok(AdminOutcome::Shutdown { force }) => {
                        info!(?peer, force, "SHUTDOWN received, terminating process");
                        let _ = state.shutdown_tx.send(());
                        std::process::exit(if force { APP_EXIT_KEY } else { 0 });
                    }
                    Err(e) => error_value(&e),
                },
                Ok(command) => match dispatch(&state, command).await {
                    Ok(reply) => {
                        COMMANDS_PROCESSED_TOTAL.with_label_values(&["ok"]).inc();
                        reply
                    }
                    Err(e) => {
                        COMMANDS_PROCESSED_TOTAL.with_label_values(&["error"]).inc();
                        error_value(&e)
                    }
                },
                Err(e @ ProxyError::ProtoError) => {
                    warn!(?peer, error = %e, "malformed command frame, closing connection");
                    let _ = framed.send(error_value(&e)).await;
                    break;
                }
                Err(e) => error_value(&e),
            },
            Err(e) => {
                warn!(?peer, error = %e, "malformed frame, closing connection");
                let _ = framed.send(error_value(&e)).await;
                break;
            }
        };

        if framed.send(reply).await.is_err() {
            break;
        }
    }

    debug!(?peer, "connection closed");
}
