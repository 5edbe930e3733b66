//! Continuous multiplier round

pub mod scheduler;
pub mod state;

pub use scheduler::{CashOutReceipt, RoundBetReceipt, RoundScheduler, TickReport, ROUND_GAME_CODE};
pub use state::{RoundPhase, RoundSnapshot, SnapshotBet};
