use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::state::AppState;

/// Streams dispatch notifications to subscribers. Transport only; the engine
/// treats the sink as an external collaborator.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_notifications(socket, state))
}

/// Push-only loop: every notification the engine fans out is forwarded as a
/// JSON text frame. A subscriber that falls behind the channel's buffer skips
/// the dropped messages and resumes from the current position.
async fn stream_notifications(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.events_tx.subscribe();

    info!("websocket subscriber connected");

    loop {
        let notification = match rx.recv().await {
            Ok(notification) => notification,
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "websocket subscriber lagged; skipping");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let json = match serde_json::to_string(&notification) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to serialize notification for ws");
                continue;
            }
        };

        if socket.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }

    info!("websocket subscriber disconnected");
}
