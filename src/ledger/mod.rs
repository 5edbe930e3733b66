//! Ledger Store: balances, game history and the transaction log

pub mod settlement;
pub mod store;
pub mod types;

pub use settlement::SettlementOutcome;
pub use store::{Ledger, LedgerTxn};
pub use types::{
    apply_bps, Account, BalanceField, GameHistory, LedgerStats, OpenRoundBet, TransactionKind,
    TransactionRecord,
    TransactionStats, TransactionStatus, UserStats, BPS_SCALE,
};
