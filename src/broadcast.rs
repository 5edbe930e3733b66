//! Broadcast Channel: fan-out of round events to every spectator.
//!
//! Publishing never blocks and never fails the publisher. A spectator that
//! falls behind the channel capacity loses the oldest events and is expected
//! to resynchronize from a round snapshot.

use crate::round::RoundSnapshot;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Events pushed to spectators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoundEvent {
    /// A round was armed; the crash point stays hidden
    #[serde(rename = "round-started", rename_all = "camelCase")]
    RoundStarted { round_id: u64, multiplier: f64 },

    #[serde(rename = "multiplier-tick", rename_all = "camelCase")]
    MultiplierTick { round_id: u64, multiplier: f64 },

    /// Terminal event of a round
    #[serde(rename = "round-crashed", rename_all = "camelCase")]
    RoundCrashed { round_id: u64, crash_point: f64 },

    #[serde(rename = "bet-placed", rename_all = "camelCase")]
    BetPlaced {
        round_id: u64,
        user: String,
        amount: f64,
        is_demo: bool,
    },

    /// Sent to a single spectator on connect, never broadcast
    #[serde(rename = "round-state")]
    RoundState(RoundSnapshot),
}

impl RoundEvent {
    pub fn round_id(&self) -> u64 {
        match self {
            RoundEvent::RoundStarted { round_id, .. }
            | RoundEvent::MultiplierTick { round_id, .. }
            | RoundEvent::RoundCrashed { round_id, .. }
            | RoundEvent::BetPlaced { round_id, .. } => *round_id,
            RoundEvent::RoundState(snapshot) => snapshot.round_id,
        }
    }
}

#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<RoundEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: RoundEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("No spectators to receive round event: {}", e);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.tx.subscribe()
    }

    pub fn spectator_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(1024)
    }
}
