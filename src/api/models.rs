//! API Request and Response Models
//!
//! Amounts cross the wire as currency units (`f64`) and are converted to
//! cents at the edge; field names are camelCase.

use crate::games::{GameOutcome, GameVariant, WagerReceipt};
use crate::ledger::types::{bps_to_multiplier, units_from_cents};
use crate::ledger::{
    Account, GameHistory, LedgerStats, SettlementOutcome, TransactionKind, TransactionRecord,
    TransactionStats, TransactionStatus, UserStats,
};
use crate::round::{CashOutReceipt, RoundBetReceipt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WagerBody {
    pub game_code: String,
    pub bet_amount: f64,
    #[serde(default)]
    pub is_demo: bool,
    #[serde(default)]
    pub choice: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundBetBody {
    pub bet_amount: f64,
    #[serde(default)]
    pub is_demo: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundCashoutBody {
    /// Client's view of the multiplier; informational only
    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default)]
    pub is_demo: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositBody {
    pub amount: f64,
    pub payment_method: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalBody {
    pub amount: f64,
    pub wallet_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub fn default_limit() -> usize {
    50
}

pub const MAX_PAGE: usize = 500;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserBody {
    pub display_name: String,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub demo_balance: Option<f64>,
    #[serde(default)]
    pub referred_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBalanceBody {
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub demo_balance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionStatusBody {
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameBody {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub min_bet: f64,
    pub max_bet: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusBody {
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub spectators: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WagerResponse {
    pub history_id: String,
    pub game_code: String,
    pub result: String,
    pub outcome: GameOutcome,
    pub multiplier: f64,
    pub bet_amount: f64,
    pub win_amount: f64,
    pub net_amount: f64,
    pub new_balance: f64,
    pub new_demo_balance: f64,
    pub detail: serde_json::Value,
}

impl From<WagerReceipt> for WagerResponse {
    fn from(r: WagerReceipt) -> Self {
        Self {
            history_id: r.history_id,
            game_code: r.game_code,
            result: r.result,
            outcome: r.outcome,
            multiplier: bps_to_multiplier(r.multiplier_bps),
            bet_amount: units_from_cents(r.bet_amount),
            win_amount: units_from_cents(r.win_amount),
            net_amount: units_from_cents(r.net_amount),
            new_balance: units_from_cents(r.new_balance),
            new_demo_balance: units_from_cents(r.new_demo_balance),
            detail: r.detail,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundBetResponse {
    pub round_id: u64,
    pub bet_amount: f64,
    pub new_balance: f64,
}

impl From<RoundBetReceipt> for RoundBetResponse {
    fn from(r: RoundBetReceipt) -> Self {
        Self {
            round_id: r.round_id,
            bet_amount: units_from_cents(r.amount),
            new_balance: units_from_cents(r.new_balance),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashoutResponse {
    pub round_id: u64,
    pub multiplier: f64,
    pub payout: f64,
    pub profit: f64,
    pub new_balance: f64,
}

impl From<CashOutReceipt> for CashoutResponse {
    fn from(r: CashOutReceipt) -> Self {
        Self {
            round_id: r.round_id,
            multiplier: bps_to_multiplier(r.multiplier_bps),
            payout: units_from_cents(r.payout),
            profit: units_from_cents(r.profit),
            new_balance: units_from_cents(r.new_balance),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: f64,
    pub demo_balance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub game_code: String,
    pub bet_amount: f64,
    pub win_amount: f64,
    pub net_amount: f64,
    pub multiplier: f64,
    pub result: String,
    pub outcome: serde_json::Value,
    pub is_demo: bool,
    pub created_at: DateTime<Utc>,
}

impl From<GameHistory> for HistoryEntry {
    fn from(h: GameHistory) -> Self {
        Self {
            net_amount: units_from_cents(h.net_amount()),
            id: h.id,
            game_code: h.game_code,
            bet_amount: units_from_cents(h.bet_amount),
            win_amount: units_from_cents(h.win_amount),
            multiplier: bps_to_multiplier(h.multiplier_bps),
            result: h.result,
            outcome: h.outcome,
            is_demo: h.is_demo,
            created_at: h.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub status: TransactionStatus,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl From<TransactionRecord> for TransactionView {
    fn from(t: TransactionRecord) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            kind: t.kind,
            amount: units_from_cents(t.amount),
            status: t.status,
            description: t.description,
            payment_method: t.payment_method,
            wallet_address: t.wallet_address,
            created_at: t.created_at,
            settled_at: t.settled_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsResponse {
    pub total_games: u64,
    pub real_games: u64,
    pub demo_games: u64,
    pub total_bet: f64,
    pub total_won: f64,
    pub wins: u64,
    pub win_rate: f64,
    pub favourite_game: Option<String>,
    pub last_win: Option<HistoryEntry>,
}

impl From<UserStats> for UserStatsResponse {
    fn from(s: UserStats) -> Self {
        let win_rate = if s.total_games == 0 {
            0.0
        } else {
            s.wins as f64 / s.total_games as f64
        };
        Self {
            total_games: s.total_games,
            real_games: s.real_games,
            demo_games: s.demo_games,
            total_bet: units_from_cents(s.total_bet),
            total_won: units_from_cents(s.total_won),
            wins: s.wins,
            win_rate,
            favourite_game: s.favourite_game,
            last_win: s.last_win.map(HistoryEntry::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatsResponse {
    pub total_deposits: f64,
    pub total_withdrawals: f64,
    pub pending_deposits: u64,
    pub pending_withdrawals: u64,
}

impl From<TransactionStats> for TransactionStatsResponse {
    fn from(s: TransactionStats) -> Self {
        Self {
            total_deposits: units_from_cents(s.total_deposits),
            total_withdrawals: units_from_cents(s.total_withdrawals),
            pending_deposits: s.pending_deposits,
            pending_withdrawals: s.pending_withdrawals,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub display_name: String,
    pub balance: f64,
    pub demo_balance: f64,
    pub referred_by: Option<String>,
    pub referral_earnings: f64,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            display_name: a.display_name,
            balance: units_from_cents(a.balance),
            demo_balance: units_from_cents(a.demo_balance),
            referred_by: a.referred_by,
            referral_earnings: units_from_cents(a.referral_earnings),
            created_at: a.created_at,
        }
    }
}

/// Returned once at account creation; the token is not recoverable later
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUserResponse {
    pub account: AccountView,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub transaction: TransactionView,
    pub already_settled: bool,
    pub new_balance: f64,
}

impl From<SettlementOutcome> for SettlementResponse {
    fn from(o: SettlementOutcome) -> Self {
        Self {
            transaction: o.transaction.into(),
            already_settled: o.already_settled,
            new_balance: units_from_cents(o.new_balance),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub code: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub min_bet: f64,
    pub max_bet: f64,
    pub is_active: bool,
}

impl From<GameVariant> for GameView {
    fn from(g: GameVariant) -> Self {
        Self {
            code: g.code,
            name: g.name,
            description: g.description,
            category: g.category,
            min_bet: units_from_cents(g.min_bet),
            max_bet: units_from_cents(g.max_bet),
            is_active: g.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStatsResponse {
    pub accounts: u64,
    pub total_balance: f64,
    pub total_demo_balance: f64,
    pub games_played: u64,
    pub total_wagered: f64,
    pub total_paid: f64,
    pub house_edge_realized: f64,
    pub transactions: u64,
    pub pending_transactions: u64,
}

impl From<LedgerStats> for LedgerStatsResponse {
    fn from(s: LedgerStats) -> Self {
        Self {
            accounts: s.accounts,
            total_balance: units_from_cents(s.total_balance),
            total_demo_balance: units_from_cents(s.total_demo_balance),
            games_played: s.games_played,
            total_wagered: units_from_cents(s.total_wagered),
            total_paid: units_from_cents(s.total_paid),
            house_edge_realized: units_from_cents(s.total_wagered - s.total_paid),
            transactions: s.transactions,
            pending_transactions: s.pending_transactions,
        }
    }
}
