use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::auth::Identity;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    identity: Identity,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.location_events_tx.subscribe());

    state.metrics.ws_clients.inc();
    info!(user_id = %identity.user_id, role = ?identity.role, "websocket client connected");

    let send_state = Arc::clone(&state);
    let send_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "websocket client lagging, events skipped");
                    continue;
                }
            };

            let visible = send_state
                .loads
                .get(&event.load_id)
                .is_some_and(|load| identity.can_view(load.value()));
            if !visible {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize location event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    first_to_finish(send_task, recv_task).await;

    state.metrics.ws_clients.dec();
    info!("websocket client disconnected");
}

/// Waits for either half of the socket to end, then aborts the other.
async fn first_to_finish(mut send_task: JoinHandle<()>, mut recv_task: JoinHandle<()>) {
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}
