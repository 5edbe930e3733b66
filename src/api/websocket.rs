//! WebSocket stream of round events for spectators.
//!
//! A new connection first receives a `round-state` snapshot, then every
//! broadcast event. A spectator that lags behind the channel is resynced with
//! a fresh snapshot instead of being disconnected.

use super::handlers::AppState;
use crate::broadcast::RoundEvent;
use crate::round::RoundSnapshot;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_spectator(socket, state))
}

async fn handle_spectator(socket: WebSocket, state: Arc<AppState>) {
    let client_id = generate_client_id();
    // Subscribe before taking the snapshot so nothing falls in between
    let mut rx = state.scheduler.broadcaster().subscribe();
    state.metrics.spectator_joined();
    info!(
        "WebSocket spectator {} connected (total: {})",
        client_id,
        state.scheduler.broadcaster().spectator_count()
    );

    let (mut sender, mut receiver) = socket.split();

    let mut snapshot = state.scheduler.snapshot().await;
    if send_event(&mut sender, &RoundEvent::RoundState(snapshot.clone())).await.is_err() {
        warn!("Failed to send round snapshot to spectator {}", client_id);
        state.metrics.spectator_left();
        return;
    }

    let receive_id = client_id.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!("Spectator {} requested close", receive_id);
                    break;
                }
                Ok(Message::Text(text)) => {
                    debug!("Ignoring message from spectator {}: {}", receive_id, text);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error from spectator {}: {}", receive_id, e);
                    break;
                }
            }
        }
    });

    let send_state = state.clone();
    let send_id = client_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if is_stale(&event, &snapshot) {
                        continue;
                    }
                    if send_event(&mut sender, &event).await.is_err() {
                        debug!("Spectator {} disconnected", send_id);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Spectator {} lagged by {} events, resyncing", send_id, skipped);
                    snapshot = send_state.scheduler.snapshot().await;
                    if send_event(&mut sender, &RoundEvent::RoundState(snapshot.clone()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::select! {
        _ = &mut receive_task => send_task.abort(),
        _ = &mut send_task => receive_task.abort(),
    }

    state.metrics.spectator_left();
    info!("WebSocket spectator {} disconnected", client_id);
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &RoundEvent) -> Result<(), ()> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize round event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await.map_err(|_| ())
}

/// Events queued before the snapshot was taken and already reflected in it
fn is_stale(event: &RoundEvent, snapshot: &RoundSnapshot) -> bool {
    match event {
        RoundEvent::RoundStarted { round_id, .. } => *round_id <= snapshot.round_id,
        RoundEvent::MultiplierTick { round_id, multiplier } => {
            *round_id < snapshot.round_id
                || (*round_id == snapshot.round_id && *multiplier <= snapshot.multiplier && snapshot.round_id > 0)
        }
        // One bet per user and balance per round, so a listed bet is this one
        RoundEvent::BetPlaced {
            round_id,
            user,
            is_demo,
            ..
        } => {
            *round_id < snapshot.round_id
                || (*round_id == snapshot.round_id
                    && snapshot.bets.iter().any(|b| b.user == *user && b.is_demo == *is_demo))
        }
        other => other.round_id() < snapshot.round_id,
    }
}

fn generate_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("ws_{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}
