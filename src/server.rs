use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{self, Instant};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::relay::Relay;

#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub ping_interval: Duration,
}

impl AppState {
    pub fn new(relay: Relay, ping_interval: Duration) -> Self {
        Self { relay, ping_interval }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Relay::new(), config.ping_interval())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (client_id, mut rx) = state.relay.connect();
    tracing::info!(client = %client_id, clients = state.relay.client_count(), "client connected");

    // Task 1: drain this client's queue onto the socket, with keepalive pings
    let period = state.ping_interval;
    let send_task = tokio::spawn(async move {
        let mut ping_interval = time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    if sender.send(msg).await.is_err() { break; }
                }
                _ = ping_interval.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() { break; }
                }
            }
        }
    });

    // Task 2: validate and fan out inbound frames
    while let Some(frame) = receiver.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(client = %client_id, error = %e, "websocket read failed");
                break;
            }
        };
        match msg {
            Message::Text(text) => {
                if let Err(rejection) = state.relay.relay_frame(&client_id, text) {
                    tracing::warn!(client = %client_id, reason = ?rejection, "frame rejected");
                    state.relay.reject(&client_id, &rejection);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Cleanup: deregister before the writer goes away
    state.relay.disconnect(&client_id);
    send_task.abort();
    tracing::info!(client = %client_id, clients = state.relay.client_count(), "client disconnected");
}
