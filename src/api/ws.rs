// =============================================================================
// WebSocket Handler — push-based opportunity/status updates (spec §6)
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive a tagged JSON envelope:
//   {"type": "opportunities", "data": [...]}   on every new engine snapshot
//   {"type": "status", "data": {...}}          whenever exchange status changes
//
// Grounded on the teacher's `api/ws.rs` `tokio::select!` push/recv loop
// shape, with the 500ms version-polling replaced by subscribing directly to
// `PublishPort`'s watch channel (no polling needed — the channel itself
// wakes the task), and the per-connection auth/token validation dropped
// along with the rest of the auth layer (see `api/mod.rs`).
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::ApiState;

#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum WsEnvelope<'a> {
    #[serde(rename = "opportunities")]
    Opportunities(&'a [crate::types::Opportunity]),
    #[serde(rename = "status")]
    Status(&'a std::collections::HashMap<String, crate::types::ExchangeStatus>),
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ApiState>>,
) -> impl IntoResponse {
    info!("WebSocket connection accepted — upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut opp_rx = state.publish.subscribe();
    let mut status_poll = interval(Duration::from_millis(500));
    let mut last_status = state.status.snapshot();

    if let Err(e) = send_json(&mut sender, &WsEnvelope::Opportunities(&opp_rx.borrow())).await {
        warn!(error = %e, "failed to send initial opportunities snapshot");
        return;
    }
    if let Err(e) = send_json(&mut sender, &WsEnvelope::Status(&last_status)).await {
        warn!(error = %e, "failed to send initial status snapshot");
        return;
    }

    loop {
        tokio::select! {
            changed = opp_rx.changed() => {
                if changed.is_err() {
                    info!("publish channel closed — disconnecting");
                    break;
                }
                let snapshot = opp_rx.borrow_and_update().clone();
                if let Err(e) = send_json(&mut sender, &WsEnvelope::Opportunities(&snapshot)).await {
                    debug!(error = %e, "send failed — disconnecting");
                    break;
                }
            }

            _ = status_poll.tick() => {
                let current = state.status.snapshot();
                if current != last_status {
                    if let Err(e) = send_json(&mut sender, &WsEnvelope::Status(&current)).await {
                        debug!(error = %e, "send failed — disconnecting");
                        break;
                    }
                    last_status = current;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error — disconnecting");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn send_json<S>(sender: &mut S, envelope: &WsEnvelope<'_>) -> Result<(), axum::Error>
where
    S: futures_util::Sink<Message, Error = axum::Error> + Unpin,
{
    match serde_json::to_string(envelope) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!(error = %e, "failed to serialize WebSocket envelope");
            Ok(())
        }
    }
}
