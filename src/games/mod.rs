//! Discrete games: catalog, outcome engine and wager resolution

pub mod catalog;
pub mod outcome;
pub mod resolver;
pub mod rng;
pub mod types;

pub use catalog::GameCatalog;
pub use outcome::OutcomeEngine;
pub use resolver::{WagerReceipt, WagerRequest, WagerResolver};
pub use rng::{EntropySource, RandomSource, SeededSource, StepSource};
pub use types::{GameOutcome, GameVariant, NewGame, Resolution};
