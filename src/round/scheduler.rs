//! Round Scheduler: the single task driving the shared multiplier round.
//!
//! Lock order is always round state, then ledger accounts. Events for a
//! round are published while the state lock is held, so spectators see
//! ticks in increasing order and nothing after the crash.

use super::state::{RoundBet, RoundPhase, RoundSnapshot, RoundState, Step};
use crate::broadcast::{EventBroadcaster, RoundEvent};
use crate::config::RoundConfig;
use crate::errors::{WagerError, WagerResult};
use crate::games::RandomSource;
use crate::ledger::types::{bps_to_multiplier, units_from_cents};
use crate::ledger::{BalanceField, GameHistory, Ledger, OpenRoundBet, TransactionKind, TransactionRecord};
use crate::metrics::Metrics;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Game code recorded on history rows for the continuous round
pub const ROUND_GAME_CODE: &str = "crash_round";

/// What one call to [`RoundScheduler::advance`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    /// No round was running
    Idle,
    Ticked { multiplier_bps: u32 },
    Crashed { crash_point_bps: u32, forfeited: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundBetReceipt {
    pub round_id: u64,
    pub amount: i64,
    pub new_balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashOutReceipt {
    pub round_id: u64,
    pub multiplier_bps: u32,
    pub payout: i64,
    pub profit: i64,
    pub new_balance: i64,
}

pub struct RoundScheduler {
    state: Mutex<RoundState>,
    config: RoundConfig,
    ledger: Arc<Ledger>,
    broadcaster: EventBroadcaster,
    random: Arc<dyn RandomSource>,
    metrics: Arc<Metrics>,
}

impl RoundScheduler {
    pub fn new(
        config: RoundConfig,
        ledger: Arc<Ledger>,
        broadcaster: EventBroadcaster,
        random: Arc<dyn RandomSource>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            state: Mutex::new(RoundState::new()),
            config,
            ledger,
            broadcaster,
            random,
            metrics,
        }
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    pub async fn snapshot(&self) -> RoundSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Draw a crash point and announce a new round if none is running.
    /// Returns the new round id.
    pub async fn arm(&self) -> Option<u64> {
        let crash_point_bps = self
            .random
            .rng()
            .gen_range(self.config.crash_min_bps..self.config.crash_max_bps);

        let mut state = self.state.lock().await;
        if !state.arm(crash_point_bps) {
            return None;
        }
        let round_id = state.round_id();
        self.broadcaster.publish(RoundEvent::RoundStarted {
            round_id,
            multiplier: 1.0,
        });
        self.metrics.round_started();
        info!(round_id, "round armed");
        debug!(round_id, crash_point_bps, "crash point drawn");
        Some(round_id)
    }

    /// Advance the running round by one increment. On crash the forfeited
    /// bets are settled and the round returns to idle before this returns.
    pub async fn advance(&self) -> TickReport {
        let (round_id, step) = {
            let mut state = self.state.lock().await;
            let Some(step) = state.advance(self.config.increment_bps) else {
                return TickReport::Idle;
            };
            let round_id = state.round_id();
            match &step {
                Step::Tick { multiplier_bps } => {
                    self.broadcaster.publish(RoundEvent::MultiplierTick {
                        round_id,
                        multiplier: bps_to_multiplier(*multiplier_bps),
                    });
                }
                Step::Crash {
                    multiplier_bps,
                    crash_point_bps,
                    ..
                } => {
                    self.broadcaster.publish(RoundEvent::MultiplierTick {
                        round_id,
                        multiplier: bps_to_multiplier(*multiplier_bps),
                    });
                    self.broadcaster.publish(RoundEvent::RoundCrashed {
                        round_id,
                        crash_point: bps_to_multiplier(*crash_point_bps),
                    });
                }
            }
            (round_id, step)
        };

        match step {
            Step::Tick { multiplier_bps } => TickReport::Ticked { multiplier_bps },
            Step::Crash {
                crash_point_bps,
                forfeits,
                ..
            } => {
                self.metrics.round_crashed();
                let forfeited = forfeits.len();
                for bet in forfeits {
                    if let Err(e) = self.settle_forfeit(round_id, &bet, crash_point_bps).await {
                        error!(round_id, user_id = %bet.user_id, error = %e, "failed to record forfeited bet");
                    }
                }
                self.state.lock().await.finish();
                info!(round_id, crash_point_bps, forfeited, "round crashed");
                TickReport::Crashed {
                    crash_point_bps,
                    forfeited,
                }
            }
        }
    }

    /// Record a bet lost to the crash. The stake was debited at placement.
    async fn settle_forfeit(&self, round_id: u64, bet: &RoundBet, crash_point_bps: u32) -> WagerResult<()> {
        let user_id = bet.user_id.as_str();
        let mut txn = match bet.field {
            BalanceField::Real => self.ledger.begin_with_referrer(user_id).await?,
            BalanceField::Demo => self.ledger.begin(&[user_id]).await?,
        };

        let row = GameHistory::new(
            user_id,
            ROUND_GAME_CODE,
            bet.amount,
            0,
            format!("Crashed at {:.2}x", bps_to_multiplier(crash_point_bps)),
            serde_json::json!({ "crashPointBps": crash_point_bps }),
            bet.field.is_demo(),
        );
        txn.record_history(&row)?;
        txn.close_round_bet(round_id, user_id, bet.field);

        if bet.field == BalanceField::Real {
            txn.record_transaction(&TransactionRecord::completed(
                user_id,
                TransactionKind::GameLoss,
                -bet.amount,
                format!("Round bet lost at {:.2}x", bps_to_multiplier(crash_point_bps)),
            ))?;
            txn.credit_referral(user_id, bet.amount)?;
        }
        txn.commit()
    }

    /// Enter the current round; the stake is debited immediately
    pub async fn place_bet(&self, user_id: &str, amount: i64, is_demo: bool) -> WagerResult<RoundBetReceipt> {
        if amount < self.config.min_bet || amount > self.config.max_bet {
            return Err(WagerError::InvalidInput(format!(
                "round bet must be between {} and {} cents",
                self.config.min_bet, self.config.max_bet
            )));
        }
        let field = BalanceField::from_demo_flag(is_demo);

        let mut state = self.state.lock().await;
        state.check_new_bet(user_id, field)?;

        let round_id = state.round_id();
        let mut txn = self.ledger.begin(&[user_id]).await?;
        let new_balance = txn.debit(user_id, field, amount)?;
        txn.open_round_bet(&OpenRoundBet {
            round_id,
            user_id: user_id.to_string(),
            field,
            amount,
            placed_at: chrono::Utc::now(),
        })?;
        let display_name = txn.account(user_id)?.display_name.clone();
        txn.commit()?;

        state.add_bet(RoundBet {
            user_id: user_id.to_string(),
            display_name: display_name.clone(),
            field,
            amount,
            cashed_out_bps: None,
        })?;
        self.broadcaster.publish(RoundEvent::BetPlaced {
            round_id,
            user: display_name,
            amount: units_from_cents(amount),
            is_demo,
        });
        self.metrics.round_bet();
        info!(round_id, user_id, amount, demo = is_demo, "round bet placed");

        Ok(RoundBetReceipt {
            round_id,
            amount,
            new_balance,
        })
    }

    /// Settle the caller's open bet at the current multiplier.
    ///
    /// The multiplier is the server's; a client-reported value is only logged.
    pub async fn cash_out(
        &self,
        user_id: &str,
        is_demo: bool,
        reported_multiplier: Option<f64>,
    ) -> WagerResult<CashOutReceipt> {
        let field = BalanceField::from_demo_flag(is_demo);

        let mut state = self.state.lock().await;
        let (idx, stake) = state.cash_out_target(user_id, field)?;
        let multiplier_bps = state.multiplier_bps();
        let round_id = state.round_id();

        if let Some(reported) = reported_multiplier {
            if (reported - bps_to_multiplier(multiplier_bps)).abs() > f64::EPSILON {
                warn!(round_id, user_id, reported, actual_bps = multiplier_bps, "client multiplier differs from server");
            }
        }

        let row = GameHistory::new(
            user_id,
            ROUND_GAME_CODE,
            stake,
            multiplier_bps,
            format!("Cashed out at {:.2}x", bps_to_multiplier(multiplier_bps)),
            serde_json::json!({ "roundId": round_id, "cashOutBps": multiplier_bps }),
            is_demo,
        );
        let profit = row.net_amount();

        let mut txn = self.ledger.begin(&[user_id]).await?;
        let new_balance = txn.credit(user_id, field, row.win_amount)?;
        txn.record_history(&row)?;
        txn.close_round_bet(round_id, user_id, field);
        if !is_demo {
            txn.record_transaction(&TransactionRecord::completed(
                user_id,
                TransactionKind::for_net(profit),
                profit,
                format!("Round cash-out at {:.2}x", bps_to_multiplier(multiplier_bps)),
            ))?;
        }
        txn.commit()?;

        state.mark_cashed_out(idx, multiplier_bps);
        self.metrics.cashout();
        info!(round_id, user_id, multiplier_bps, payout = row.win_amount, "round cash-out");

        Ok(CashOutReceipt {
            round_id,
            multiplier_bps,
            payout: row.win_amount,
            profit,
            new_balance,
        })
    }

    /// Refund stakes left open by a previous process. Call before [`run`].
    ///
    /// [`run`]: RoundScheduler::run
    pub async fn recover(&self) -> WagerResult<usize> {
        let refunded = self.ledger.refund_open_round_bets().await?;
        if refunded > 0 {
            warn!(refunded, "returned stakes from an interrupted round");
        }
        Ok(refunded)
    }

    /// Drive rounds forever: try to arm on every arm interval, then tick the
    /// round to its crash before waiting for the next arm slot.
    pub async fn run(self: Arc<Self>, arm_every: Duration, tick_every: Duration) {
        let mut arm_timer = interval(arm_every);
        arm_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            arm_timer.tick().await;
            if self.arm().await.is_none() {
                continue;
            }

            let mut tick_timer = interval(tick_every);
            tick_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval completes immediately
            tick_timer.tick().await;
            loop {
                tick_timer.tick().await;
                match self.advance().await {
                    TickReport::Ticked { .. } => continue,
                    TickReport::Crashed { .. } | TickReport::Idle => break,
                }
            }
        }
    }

    pub async fn phase(&self) -> RoundPhase {
        self.state.lock().await.phase()
    }
}
