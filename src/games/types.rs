use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::{apply_bps, BPS_SCALE};

/// Catalog entry describing one discrete game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameVariant {
    pub code: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Inclusive bet bounds in cents
    pub min_bet: i64,
    pub max_bet: i64,
    /// The only field that changes after creation
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Admin request to add a catalog entry
#[derive(Debug, Clone)]
pub struct NewGame {
    pub code: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub min_bet: i64,
    pub max_bet: i64,
}

/// Game outcome classified by net amount
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Loss,
    /// Stake returned, net zero
    Push,
}

impl GameOutcome {
    pub fn from_multiplier(multiplier_bps: u32) -> Self {
        match multiplier_bps.cmp(&BPS_SCALE) {
            std::cmp::Ordering::Greater => GameOutcome::Win,
            std::cmp::Ordering::Equal => GameOutcome::Push,
            std::cmp::Ordering::Less => GameOutcome::Loss,
        }
    }
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOutcome::Win => write!(f, "win"),
            GameOutcome::Loss => write!(f, "loss"),
            GameOutcome::Push => write!(f, "push"),
        }
    }
}

/// What the outcome engine drew for one wager
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub multiplier_bps: u32,
    pub description: String,
    /// Draw details kept on the history row
    pub detail: serde_json::Value,
}

impl Resolution {
    pub fn outcome(&self) -> GameOutcome {
        GameOutcome::from_multiplier(self.multiplier_bps)
    }

    pub fn win_amount(&self, bet_amount: i64) -> i64 {
        apply_bps(bet_amount, self.multiplier_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_multiplier() {
        assert_eq!(GameOutcome::from_multiplier(19_000), GameOutcome::Win);
        assert_eq!(GameOutcome::from_multiplier(10_000), GameOutcome::Push);
        assert_eq!(GameOutcome::from_multiplier(5_000), GameOutcome::Loss);
        assert_eq!(GameOutcome::from_multiplier(0), GameOutcome::Loss);
    }
}
