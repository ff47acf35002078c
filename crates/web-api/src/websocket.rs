use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use std::sync::Arc;
use tradestate_core::Subscription;

/// Upgrades to a websocket that receives every change event published after
/// the upgrade. Refused with 503 when the observer set is full.
///
/// # Errors
/// Returns `ApiError::Unavailable` if no more observers can subscribe.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let subscription = state
        .notifier
        .subscribe()
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;

    Ok(ws.on_upgrade(move |socket| websocket_connection(socket, subscription)))
}

async fn websocket_connection(mut socket: WebSocket, mut subscription: Subscription) {
    let observer = subscription.id();
    tracing::info!(observer, "WebSocket observer connected");

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let text = match event.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(observer, "Dropping unencodable event: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                // Inbound frames carry nothing; only a close matters.
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::info!(observer, "WebSocket connection closed");
}
