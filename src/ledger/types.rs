//! Ledger records persisted in RocksDB.
//!
//! Money is `i64` minor units (cents). Multipliers are basis points where
//! `10_000` is 1.00x.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Basis points representing a 1.00x multiplier
pub const BPS_SCALE: u32 = 10_000;

/// Minor units per currency unit
pub const CENTS_PER_UNIT: i64 = 100;

/// `amount * bps / 10_000`, truncated toward zero
pub fn apply_bps(amount: i64, bps: u32) -> i64 {
    (amount as i128 * bps as i128 / BPS_SCALE as i128) as i64
}

/// Convert a currency-unit amount to cents, rejecting non-finite values
pub fn cents_from_units(units: f64) -> Option<i64> {
    if !units.is_finite() {
        return None;
    }
    let cents = (units * CENTS_PER_UNIT as f64).round();
    if cents.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    Some(cents as i64)
}

pub fn units_from_cents(cents: i64) -> f64 {
    cents as f64 / CENTS_PER_UNIT as f64
}

pub fn bps_to_multiplier(bps: u32) -> f64 {
    bps as f64 / BPS_SCALE as f64
}

/// Which of the two balances an operation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceField {
    Real,
    Demo,
}

impl BalanceField {
    pub fn from_demo_flag(is_demo: bool) -> Self {
        if is_demo {
            BalanceField::Demo
        } else {
            BalanceField::Real
        }
    }

    pub fn is_demo(self) -> bool {
        self == BalanceField::Demo
    }
}

/// A user's balances and referral linkage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    pub balance: i64,
    pub demo_balance: i64,
    /// Immutable after creation
    pub referred_by: Option<String>,
    pub referral_earnings: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn get(&self, field: BalanceField) -> i64 {
        match field {
            BalanceField::Real => self.balance,
            BalanceField::Demo => self.demo_balance,
        }
    }

    pub(crate) fn slot_mut(&mut self, field: BalanceField) -> &mut i64 {
        match field {
            BalanceField::Real => &mut self.balance,
            BalanceField::Demo => &mut self.demo_balance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    GameWin,
    GameLoss,
    /// Stake returned with zero net
    Push,
    ReferralEarn,
}

impl TransactionKind {
    /// Classify a settled game by its net amount
    pub fn for_net(net_amount: i64) -> Self {
        match net_amount {
            n if n > 0 => TransactionKind::GameWin,
            n if n < 0 => TransactionKind::GameLoss,
            _ => TransactionKind::Push,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "rejected" => Ok(TransactionStatus::Rejected),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// Append-only money movement record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub kind: TransactionKind,
    /// Signed: withdrawals and losses are negative
    pub amount: i64,
    pub status: TransactionStatus,
    pub description: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    /// A game-outcome or referral record, completed at creation
    pub fn completed(user_id: &str, kind: TransactionKind, amount: i64, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            amount,
            status: TransactionStatus::Completed,
            description,
            payment_method: None,
            wallet_address: None,
            created_at: now,
            settled_at: Some(now),
        }
    }

    pub fn pending(user_id: &str, kind: TransactionKind, amount: i64, description: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            amount,
            status: TransactionStatus::Pending,
            description,
            payment_method: None,
            wallet_address: None,
            created_at: Utc::now(),
            settled_at: None,
        }
    }
}

/// A round stake that has been debited but not yet won or lost.
///
/// Written in the same batch as the debit and removed in the batch that
/// settles it, so a restart mid-round can always account for the stake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRoundBet {
    pub round_id: u64,
    pub user_id: String,
    pub field: BalanceField,
    pub amount: i64,
    pub placed_at: DateTime<Utc>,
}

/// One resolved wager; never mutated after it is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameHistory {
    pub id: String,
    pub user_id: String,
    pub game_code: String,
    pub bet_amount: i64,
    pub win_amount: i64,
    pub multiplier_bps: u32,
    pub result: String,
    /// Draw details (dice, cards, reels, crash point) for replay
    pub outcome: serde_json::Value,
    pub is_demo: bool,
    pub created_at: DateTime<Utc>,
}

impl GameHistory {
    pub fn new(
        user_id: &str,
        game_code: &str,
        bet_amount: i64,
        multiplier_bps: u32,
        result: String,
        outcome: serde_json::Value,
        is_demo: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            game_code: game_code.to_string(),
            bet_amount,
            win_amount: apply_bps(bet_amount, multiplier_bps),
            multiplier_bps,
            result,
            outcome,
            is_demo,
            created_at: Utc::now(),
        }
    }

    pub fn net_amount(&self) -> i64 {
        self.win_amount - self.bet_amount
    }

    /// Recompute the payout from the stored bet and multiplier
    pub fn replayed_win(&self) -> i64 {
        apply_bps(self.bet_amount, self.multiplier_bps)
    }
}

/// Per-user aggregates over game history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_games: u64,
    pub real_games: u64,
    pub demo_games: u64,
    pub total_bet: i64,
    pub total_won: i64,
    pub wins: u64,
    pub favourite_game: Option<String>,
    pub last_win: Option<GameHistory>,
}

/// Per-user deposit and withdrawal summary. Totals cover completed
/// transactions only; pending ones are counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStats {
    pub total_deposits: i64,
    /// Positive: the sum of completed withdrawal amounts
    pub total_withdrawals: i64,
    pub pending_deposits: u64,
    pub pending_withdrawals: u64,
}

/// System-wide aggregates for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub accounts: u64,
    pub total_balance: i64,
    pub total_demo_balance: i64,
    pub games_played: u64,
    pub total_wagered: i64,
    pub total_paid: i64,
    pub transactions: u64,
    pub pending_transactions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_bps_truncates() {
        assert_eq!(apply_bps(10_000, 19_000), 19_000);
        assert_eq!(apply_bps(333, 15_000), 499);
        assert_eq!(apply_bps(9, 500), 0);
        assert_eq!(apply_bps(i64::MAX, 5_000), i64::MAX / 2);
    }

    #[test]
    fn test_cents_conversion() {
        assert_eq!(cents_from_units(100.0), Some(10_000));
        assert_eq!(cents_from_units(0.125), Some(13));
        assert_eq!(cents_from_units(f64::NAN), None);
        assert_eq!(cents_from_units(f64::INFINITY), None);
        assert_eq!(units_from_cents(19_000), 190.0);
    }

    #[test]
    fn test_transaction_kind_for_net() {
        assert_eq!(TransactionKind::for_net(90), TransactionKind::GameWin);
        assert_eq!(TransactionKind::for_net(-1), TransactionKind::GameLoss);
        assert_eq!(TransactionKind::for_net(0), TransactionKind::Push);
    }

    #[test]
    fn test_history_replays_exact_payout() {
        let row = GameHistory::new("u", "dice", 10_000, 19_000, "win".into(), serde_json::Value::Null, false);
        assert_eq!(row.win_amount, 19_000);
        assert_eq!(row.net_amount(), 9_000);
        assert_eq!(row.replayed_win(), row.win_amount);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&TransactionKind::ReferralEarn).unwrap();
        assert_eq!(json, "\"referral_earn\"");
    }
}
