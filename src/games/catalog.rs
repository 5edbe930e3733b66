//! Game variant catalog persisted in RocksDB.

use super::types::{GameVariant, NewGame};
use crate::errors::{StorageError, WagerError, WagerResult};
use crate::storage::OptimizedStorage;
use chrono::Utc;
use tracing::info;

const GAME_PREFIX: &str = "game:variant:";

fn game_key(code: &str) -> Vec<u8> {
    format!("{}{}", GAME_PREFIX, code).into_bytes()
}

/// (code, name, description, category, min units, max units)
const DEFAULT_GAMES: &[(&str, &str, &str, &str, i64, i64)] = &[
    ("dice", "Dice Roll", "Roll the dice and win big!", "dice", 1, 1000),
    ("coin", "Coin Flip", "Heads or tails? Make your choice!", "coin", 1, 500),
    ("slots", "Slot Machine", "Spin the reels and win big!", "slots", 1, 1000),
    ("roulette", "Roulette", "Bet on red, black or green!", "table", 1, 500),
    ("cards", "Card Game", "Guess high or low card!", "cards", 1, 200),
    ("wheel", "Spin Wheel", "Spin to win multipliers!", "wheel", 1, 100),
    ("blackjack", "Blackjack", "Classic 21 card game!", "cards", 5, 500),
    ("poker", "Video Poker", "Poker hands payouts!", "poker", 1, 100),
    ("evenodd", "Even/Odd", "Guess if number is even or odd!", "number", 1, 500),
    ("overunder", "Over/Under", "Bet over or under 50!", "number", 1, 500),
    ("suit", "Suit Guess", "Guess the card suit!", "cards", 1, 300),
    ("redblack", "Red/Black", "Predict red or black card!", "cards", 1, 500),
    ("range", "Number Range", "Guess 1-5 or 6-10!", "number", 1, 400),
    ("colorwheel", "Color Wheel", "Spin the color wheel!", "wheel", 1, 500),
    ("crash", "Crash", "Cash out before crash!", "multiplier", 1, 200),
    ("mines", "Mines", "Avoid the mines!", "mines", 1, 300),
    ("plinko", "Plinko", "Drop the ball!", "plinko", 1, 400),
    ("keno", "Keno", "Pick your numbers!", "lottery", 1, 500),
    ("bingo", "Bingo", "Get bingo!", "lottery", 1, 200),
    ("lotto", "Lotto", "Match the lotto numbers!", "lottery", 5, 100),
    ("baccarat", "Baccarat", "Player, banker or tie!", "table", 1, 500),
    ("sicbo", "Sic Bo", "Big or small on three dice!", "dice", 1, 500),
];

#[derive(Clone)]
pub struct GameCatalog {
    storage: OptimizedStorage,
}

impl GameCatalog {
    pub fn new(storage: OptimizedStorage) -> Self {
        Self { storage }
    }

    /// Insert the built-in variants that are not stored yet. Existing
    /// entries, including their active flag, are left alone.
    pub fn seed_defaults(&self) -> WagerResult<usize> {
        let mut created = 0;
        for &(code, name, description, category, min_units, max_units) in DEFAULT_GAMES {
            if self.get(code)?.is_some() {
                continue;
            }
            self.put(&GameVariant {
                code: code.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                category: category.to_string(),
                min_bet: min_units * 100,
                max_bet: max_units * 100,
                is_active: true,
                created_at: Utc::now(),
            })?;
            created += 1;
        }
        if created > 0 {
            info!(created, "seeded game catalog");
        }
        Ok(created)
    }

    fn put(&self, variant: &GameVariant) -> WagerResult<()> {
        let bytes = serde_json::to_vec(variant)
            .map_err(|e| StorageError::WriteFailed(format!("Failed to encode game {}: {}", variant.code, e)))?;
        self.storage.put(&game_key(&variant.code), &bytes)?;
        Ok(())
    }

    pub fn get(&self, code: &str) -> WagerResult<Option<GameVariant>> {
        match self.storage.get(&game_key(code))? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                StorageError::CorruptedData(format!("Failed to decode game {}: {}", code, e)).into()
            }),
            None => Ok(None),
        }
    }

    /// Look up a variant that is open for wagering
    pub fn require_active(&self, code: &str) -> WagerResult<GameVariant> {
        let variant = self
            .get(code)?
            .ok_or_else(|| WagerError::UnknownGame(code.to_string()))?;
        if !variant.is_active {
            return Err(WagerError::GameInactive(code.to_string()));
        }
        Ok(variant)
    }

    pub fn list(&self, active_only: bool) -> WagerResult<Vec<GameVariant>> {
        let mut variants = Vec::new();
        for (_, value) in self.storage.scan_prefix(GAME_PREFIX.as_bytes(), None, usize::MAX)? {
            let variant: GameVariant = serde_json::from_slice(&value)
                .map_err(|e| StorageError::CorruptedData(format!("Failed to decode game: {}", e)))?;
            if !active_only || variant.is_active {
                variants.push(variant);
            }
        }
        Ok(variants)
    }

    pub fn create(&self, new_game: NewGame) -> WagerResult<GameVariant> {
        let code = new_game.code.trim().to_ascii_lowercase();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(WagerError::InvalidInput(
                "game code must be non-empty and alphanumeric".to_string(),
            ));
        }
        if new_game.name.trim().is_empty() {
            return Err(WagerError::InvalidInput("game name is required".to_string()));
        }
        if new_game.min_bet <= 0 || new_game.max_bet < new_game.min_bet {
            return Err(WagerError::InvalidInput(
                "bet bounds must satisfy 0 < min_bet <= max_bet".to_string(),
            ));
        }
        if self.get(&code)?.is_some() {
            return Err(WagerError::InvalidInput(format!("game code '{}' already exists", code)));
        }

        let variant = GameVariant {
            code,
            name: new_game.name.trim().to_string(),
            description: new_game.description,
            category: new_game.category,
            min_bet: new_game.min_bet,
            max_bet: new_game.max_bet,
            is_active: true,
            created_at: Utc::now(),
        };
        self.put(&variant)?;
        info!(code = %variant.code, "game created");
        Ok(variant)
    }

    pub fn set_active(&self, code: &str, is_active: bool) -> WagerResult<GameVariant> {
        let mut variant = self
            .get(code)?
            .ok_or_else(|| WagerError::NotFound(format!("game {}", code)))?;
        variant.is_active = is_active;
        self.put(&variant)?;
        info!(code, is_active, "game status changed");
        Ok(variant)
    }
}
