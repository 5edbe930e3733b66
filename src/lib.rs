//! LuckyBet - real-money ledger and round-based wagering engine
//!
//! Balances, game history and the transaction log live in RocksDB behind
//! per-account locks. Discrete games settle in a single atomic unit of work;
//! the continuous multiplier round is driven by one scheduler task and fanned
//! out to spectators over a broadcast channel.

pub mod api;
pub mod auth;
pub mod broadcast;
pub mod config;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod metrics;
pub mod round;
pub mod storage;

pub use config::LuckyBetConfig;
pub use errors::{LuckyBetError, LuckyBetResult, WagerError, WagerResult};
