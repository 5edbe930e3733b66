//! Shared round state and its transitions.
//!
//! Owned by the scheduler behind a single mutex; handlers reach it only
//! through scheduler methods.

use crate::errors::{WagerError, WagerResult};
use crate::ledger::types::{bps_to_multiplier, units_from_cents};
use crate::ledger::BalanceField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    Idle,
    /// Announced, waiting for the first tick
    Arming,
    Ticking,
    Crashed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundBet {
    pub user_id: String,
    pub display_name: String,
    pub field: BalanceField,
    pub amount: i64,
    pub cashed_out_bps: Option<u32>,
}

/// Result of advancing the multiplier by one increment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Tick { multiplier_bps: u32 },
    /// The tick reached the crash point; uncashed bets are forfeited
    Crash {
        multiplier_bps: u32,
        crash_point_bps: u32,
        forfeits: Vec<RoundBet>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotBet {
    pub user: String,
    pub amount: f64,
    pub is_demo: bool,
    pub cashed_out_at: Option<f64>,
}

/// Point-in-time view for late joiners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    pub round_id: u64,
    pub phase: RoundPhase,
    pub multiplier: f64,
    pub participants: usize,
    pub bets: Vec<SnapshotBet>,
    /// Revealed only once the round has crashed
    pub crash_point: Option<f64>,
}

#[derive(Debug)]
pub struct RoundState {
    round_id: u64,
    phase: RoundPhase,
    multiplier_bps: u32,
    crash_point_bps: u32,
    bets: Vec<RoundBet>,
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundState {
    pub fn new() -> Self {
        Self {
            round_id: 0,
            phase: RoundPhase::Idle,
            multiplier_bps: 10_000,
            crash_point_bps: 0,
            bets: Vec::new(),
        }
    }

    pub fn round_id(&self) -> u64 {
        self.round_id
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn multiplier_bps(&self) -> u32 {
        self.multiplier_bps
    }

    /// Start a new round at 1.00x. Only an idle round can be armed.
    pub fn arm(&mut self, crash_point_bps: u32) -> bool {
        if self.phase != RoundPhase::Idle {
            return false;
        }
        self.round_id += 1;
        self.phase = RoundPhase::Arming;
        self.multiplier_bps = 10_000;
        self.crash_point_bps = crash_point_bps;
        self.bets.clear();
        true
    }

    /// Reject a bet before any money moves
    pub fn check_new_bet(&self, user_id: &str, field: BalanceField) -> WagerResult<()> {
        if !matches!(self.phase, RoundPhase::Arming | RoundPhase::Ticking) {
            return Err(WagerError::RoundClosed);
        }
        if self.bets.iter().any(|b| b.user_id == user_id && b.field == field) {
            return Err(WagerError::InvalidInput(
                "already holding a bet in this round".to_string(),
            ));
        }
        Ok(())
    }

    pub fn add_bet(&mut self, bet: RoundBet) -> WagerResult<()> {
        self.check_new_bet(&bet.user_id, bet.field)?;
        self.bets.push(bet);
        Ok(())
    }

    /// Locate the caller's open bet; returns its index and stake
    pub fn cash_out_target(&self, user_id: &str, field: BalanceField) -> WagerResult<(usize, i64)> {
        if self.phase != RoundPhase::Ticking {
            return Err(WagerError::RoundClosed);
        }
        self.bets
            .iter()
            .position(|b| b.user_id == user_id && b.field == field && b.cashed_out_bps.is_none())
            .map(|idx| (idx, self.bets[idx].amount))
            .ok_or(WagerError::NoActiveBet)
    }

    pub fn mark_cashed_out(&mut self, idx: usize, multiplier_bps: u32) {
        if let Some(bet) = self.bets.get_mut(idx) {
            bet.cashed_out_bps = Some(multiplier_bps);
        }
    }

    /// Raise the multiplier by one increment, crashing once it reaches the
    /// crash point. Returns `None` when no round is running.
    pub fn advance(&mut self, increment_bps: u32) -> Option<Step> {
        if !matches!(self.phase, RoundPhase::Arming | RoundPhase::Ticking) {
            return None;
        }
        self.phase = RoundPhase::Ticking;
        self.multiplier_bps = self.multiplier_bps.saturating_add(increment_bps);

        if self.multiplier_bps < self.crash_point_bps {
            return Some(Step::Tick {
                multiplier_bps: self.multiplier_bps,
            });
        }

        self.phase = RoundPhase::Crashed;
        let forfeits = self
            .bets
            .drain(..)
            .filter(|b| b.cashed_out_bps.is_none())
            .collect();
        Some(Step::Crash {
            multiplier_bps: self.multiplier_bps,
            crash_point_bps: self.crash_point_bps,
            forfeits,
        })
    }

    /// Crashed -> Idle once forfeits are settled
    pub fn finish(&mut self) {
        if self.phase == RoundPhase::Crashed {
            self.phase = RoundPhase::Idle;
        }
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            round_id: self.round_id,
            phase: self.phase,
            multiplier: bps_to_multiplier(self.multiplier_bps),
            participants: self.bets.len(),
            bets: self
                .bets
                .iter()
                .map(|b| SnapshotBet {
                    user: b.display_name.clone(),
                    amount: units_from_cents(b.amount),
                    is_demo: b.field.is_demo(),
                    cashed_out_at: b.cashed_out_bps.map(bps_to_multiplier),
                })
                .collect(),
            crash_point: match self.phase {
                RoundPhase::Crashed | RoundPhase::Idle if self.round_id > 0 => {
                    Some(bps_to_multiplier(self.crash_point_bps))
                }
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bet(user: &str, field: BalanceField, amount: i64) -> RoundBet {
        RoundBet {
            user_id: user.to_string(),
            display_name: user.to_string(),
            field,
            amount,
            cashed_out_bps: None,
        }
    }

    #[test]
    fn test_lifecycle_idle_arming_ticking_crashed_idle() {
        let mut state = RoundState::new();
        assert!(state.advance(1_000).is_none());

        assert!(state.arm(12_000));
        assert_eq!(state.phase(), RoundPhase::Arming);
        assert!(!state.arm(15_000));

        assert_eq!(state.advance(1_000), Some(Step::Tick { multiplier_bps: 11_000 }));
        assert_eq!(state.phase(), RoundPhase::Ticking);

        match state.advance(1_000) {
            Some(Step::Crash { multiplier_bps, crash_point_bps, .. }) => {
                assert_eq!(multiplier_bps, 12_000);
                assert_eq!(crash_point_bps, 12_000);
            }
            other => panic!("expected crash, got {:?}", other),
        }
        assert_eq!(state.phase(), RoundPhase::Crashed);
        assert!(state.advance(1_000).is_none());
        assert!(!state.arm(20_000));

        state.finish();
        assert_eq!(state.phase(), RoundPhase::Idle);
        assert!(state.arm(20_000));
        assert_eq!(state.round_id(), 2);
        assert_eq!(state.multiplier_bps(), 10_000);
    }

    #[test]
    fn test_one_bet_per_user_and_field() {
        let mut state = RoundState::new();
        assert_eq!(
            state.add_bet(bet("a", BalanceField::Real, 100)),
            Err(WagerError::RoundClosed)
        );

        state.arm(50_000);
        state.add_bet(bet("a", BalanceField::Real, 100)).unwrap();
        state.add_bet(bet("a", BalanceField::Demo, 100)).unwrap();
        assert!(matches!(
            state.add_bet(bet("a", BalanceField::Real, 100)),
            Err(WagerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_cash_out_rules() {
        let mut state = RoundState::new();
        state.arm(50_000);
        state.add_bet(bet("a", BalanceField::Real, 2_000)).unwrap();

        // Not before the first tick
        assert_eq!(state.cash_out_target("a", BalanceField::Real), Err(WagerError::RoundClosed));

        state.advance(5_000);
        assert_eq!(state.cash_out_target("b", BalanceField::Real), Err(WagerError::NoActiveBet));
        let (idx, amount) = state.cash_out_target("a", BalanceField::Real).unwrap();
        assert_eq!(amount, 2_000);

        state.mark_cashed_out(idx, state.multiplier_bps());
        assert_eq!(state.cash_out_target("a", BalanceField::Real), Err(WagerError::NoActiveBet));
    }

    #[test]
    fn test_crash_forfeits_only_open_bets() {
        let mut state = RoundState::new();
        state.arm(11_000);
        state.add_bet(bet("a", BalanceField::Real, 100)).unwrap();
        state.add_bet(bet("b", BalanceField::Real, 200)).unwrap();
        state.mark_cashed_out(0, 10_000);

        match state.advance(1_000) {
            Some(Step::Crash { forfeits, .. }) => {
                assert_eq!(forfeits.len(), 1);
                assert_eq!(forfeits[0].user_id, "b");
            }
            other => panic!("expected crash, got {:?}", other),
        }
        assert_eq!(state.snapshot().participants, 0);
        assert_eq!(state.cash_out_target("a", BalanceField::Real), Err(WagerError::RoundClosed));
    }

    #[test]
    fn test_snapshot_hides_crash_point_while_running() {
        let mut state = RoundState::new();
        state.arm(30_000);
        state.add_bet(bet("a", BalanceField::Demo, 150)).unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.crash_point, None);
        assert_eq!(snapshot.participants, 1);
        assert_eq!(snapshot.bets[0].amount, 1.5);
        assert!(snapshot.bets[0].is_demo);

        while let Some(Step::Tick { .. }) = state.advance(10_000) {}
        assert_eq!(state.snapshot().crash_point, Some(3.0));
    }
}
