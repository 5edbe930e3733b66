//! Wager Resolver: one discrete bet from validation to committed settlement.

use super::catalog::GameCatalog;
use super::outcome::OutcomeEngine;
use super::rng::RandomSource;
use super::types::GameOutcome;
use crate::errors::{WagerError, WagerResult};
use crate::ledger::{BalanceField, GameHistory, Ledger, TransactionKind, TransactionRecord};
use crate::metrics::Metrics;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct WagerRequest {
    pub user_id: String,
    pub game_code: String,
    /// Cents
    pub bet_amount: i64,
    pub is_demo: bool,
    pub choice: Option<String>,
}

/// Fully settled wager as committed to the ledger
#[derive(Debug, Clone)]
pub struct WagerReceipt {
    pub history_id: String,
    pub game_code: String,
    pub result: String,
    pub outcome: GameOutcome,
    pub multiplier_bps: u32,
    pub bet_amount: i64,
    pub win_amount: i64,
    pub net_amount: i64,
    pub new_balance: i64,
    pub new_demo_balance: i64,
    pub detail: serde_json::Value,
}

pub struct WagerResolver {
    ledger: Arc<Ledger>,
    catalog: Arc<GameCatalog>,
    engine: OutcomeEngine,
    random: Arc<dyn RandomSource>,
    metrics: Arc<Metrics>,
}

impl WagerResolver {
    pub fn new(
        ledger: Arc<Ledger>,
        catalog: Arc<GameCatalog>,
        random: Arc<dyn RandomSource>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            engine: OutcomeEngine::new(),
            random,
            metrics,
        }
    }

    /// Validate, draw and settle one wager. Either every record is written
    /// together with the balance change or nothing is.
    pub async fn place_wager(&self, request: &WagerRequest) -> WagerResult<WagerReceipt> {
        let variant = self.catalog.require_active(&request.game_code)?;

        let bet = request.bet_amount;
        if bet <= 0 {
            return Err(WagerError::InvalidInput("bet amount must be positive".to_string()));
        }
        if bet < variant.min_bet || bet > variant.max_bet {
            return Err(WagerError::InvalidInput(format!(
                "bet must be between {} and {} cents for {}",
                variant.min_bet, variant.max_bet, variant.code
            )));
        }

        let user_id = request.user_id.as_str();
        let field = BalanceField::from_demo_flag(request.is_demo);
        let mut txn = if request.is_demo {
            self.ledger.begin(&[user_id]).await?
        } else {
            self.ledger.begin_with_referrer(user_id).await?
        };

        // Balance check and debit happen under the user's lock
        txn.debit(user_id, field, bet)?;

        if !self.engine.has_dedicated_rule(&variant.code) {
            debug!(game = %variant.code, "no dedicated rule, resolving at even odds");
        }
        let resolution = {
            let mut rng = self.random.rng();
            self.engine.resolve(&variant.code, request.choice.as_deref(), &mut *rng)?
        };

        let row = GameHistory::new(
            user_id,
            &variant.code,
            bet,
            resolution.multiplier_bps,
            resolution.description.clone(),
            resolution.detail.clone(),
            request.is_demo,
        );
        txn.credit(user_id, field, row.win_amount)?;
        txn.record_history(&row)?;

        let net = row.net_amount();
        if !request.is_demo {
            txn.record_transaction(&TransactionRecord::completed(
                user_id,
                TransactionKind::for_net(net),
                net,
                format!("{} - {}", variant.name, row.result),
            ))?;
            if net < 0 {
                txn.credit_referral(user_id, -net)?;
            }
        }

        let account = txn.account(user_id)?.clone();
        txn.commit()?;

        let outcome = resolution.outcome();
        self.metrics.record_wager(&variant.code, &outcome.to_string());
        info!(
            user_id,
            game = %variant.code,
            bet,
            win = row.win_amount,
            net,
            demo = request.is_demo,
            "wager settled"
        );
        debug!(history_id = %row.id, detail = %row.outcome, "wager detail");

        Ok(WagerReceipt {
            history_id: row.id,
            game_code: variant.code,
            result: row.result,
            outcome,
            multiplier_bps: row.multiplier_bps,
            bet_amount: bet,
            win_amount: row.win_amount,
            net_amount: net,
            new_balance: account.balance,
            new_demo_balance: account.demo_balance,
            detail: row.outcome,
        })
    }
}
