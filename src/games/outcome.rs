//! Outcome engine: game code -> randomized result and payout multiplier.
//!
//! Each variant is a plain function over the player's choice and a random
//! generator; nothing here touches stored state. Codes without an entry
//! resolve through the generic 50/50 rule.

use super::types::Resolution;
use crate::errors::{WagerError, WagerResult};
use rand::{Rng, RngCore};
use serde_json::json;

/// 1.90x, the standard discrete-game payout
pub const STANDARD_WIN_BPS: u32 = 19_000;
const PUSH_BPS: u32 = 10_000;
const LOSS_BPS: u32 = 0;

pub type ResolveFn = fn(Option<&str>, &mut dyn RngCore) -> WagerResult<Resolution>;

const VARIANTS: &[(&str, ResolveFn)] = &[
    ("dice", dice),
    ("coin", coin),
    ("evenodd", even_odd),
    ("overunder", over_under),
    ("suit", suit),
    ("redblack", red_black),
    ("range", number_range),
    ("colorwheel", color_wheel),
    ("crash", instant_crash),
    ("mines", mines),
    ("plinko", plinko),
    ("keno", keno),
    ("bingo", bingo),
    ("lotto", lotto),
    ("slots", slots),
    ("roulette", roulette),
    ("cards", cards),
    ("wheel", wheel),
    ("blackjack", blackjack),
    ("poker", poker),
    ("baccarat", baccarat),
    ("sicbo", sic_bo),
];

/// Dispatch table keyed by game code
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeEngine;

impl OutcomeEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn lookup(&self, code: &str) -> ResolveFn {
        VARIANTS
            .iter()
            .find(|(name, _)| *name == code)
            .map(|(_, resolve)| *resolve)
            .unwrap_or(generic)
    }

    pub fn has_dedicated_rule(&self, code: &str) -> bool {
        VARIANTS.iter().any(|(name, _)| *name == code)
    }

    pub fn resolve(&self, code: &str, choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
        (self.lookup(code))(choice, rng)
    }
}

/// Match a normalized choice against the accepted spellings
fn pick<T: Copy>(game: &str, raw: Option<&str>, options: &[(&str, T)]) -> WagerResult<T> {
    let normalized = raw.map(|c| c.trim().to_ascii_lowercase()).unwrap_or_default();
    options
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, value)| *value)
        .ok_or_else(|| {
            let accepted: Vec<&str> = options.iter().map(|(name, _)| *name).collect();
            WagerError::InvalidInput(format!(
                "invalid choice '{}' for {}; expected one of {}",
                normalized,
                game,
                accepted.join(", ")
            ))
        })
}

fn binary(won: bool, description: String, detail: serde_json::Value) -> Resolution {
    Resolution {
        multiplier_bps: if won { STANDARD_WIN_BPS } else { LOSS_BPS },
        description,
        detail,
    }
}

fn verdict(won: bool) -> &'static str {
    if won {
        "You won!"
    } else {
        "You lost."
    }
}

fn dice(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let high = pick("dice", choice, &[("low", false), ("1", false), ("high", true), ("2", true)])?;
    let roll: u32 = rng.gen_range(1..=6);
    let won = if high { roll >= 4 } else { roll <= 3 };
    Ok(binary(
        won,
        format!("Rolled {} - {}", roll, verdict(won)),
        json!({ "roll": roll, "choice": if high { "high" } else { "low" } }),
    ))
}

fn coin(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let heads = pick("coin", choice, &[("heads", true), ("tails", false)])?;
    let landed_heads = rng.gen_bool(0.5);
    let side = if landed_heads { "heads" } else { "tails" };
    let won = heads == landed_heads;
    Ok(binary(won, format!("Coin landed {} - {}", side, verdict(won)), json!({ "landed": side })))
}

fn even_odd(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let even = pick("evenodd", choice, &[("even", true), ("odd", false)])?;
    let number: u32 = rng.gen_range(1..=10);
    let won = (number % 2 == 0) == even;
    Ok(binary(won, format!("Number {} - {}", number, verdict(won)), json!({ "number": number })))
}

fn over_under(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let over = pick("overunder", choice, &[("over", true), ("under", false)])?;
    let number: u32 = rng.gen_range(1..=100);
    let won = if over { number > 50 } else { number <= 50 };
    Ok(binary(won, format!("Number {} - {}", number, verdict(won)), json!({ "number": number })))
}

const SUITS: [&str; 4] = ["hearts", "diamonds", "clubs", "spades"];

fn suit(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let wanted = pick("suit", choice, &[("hearts", 0), ("diamonds", 1), ("clubs", 2), ("spades", 3)])?;
    let drawn = rng.gen_range(0..SUITS.len());
    let won = drawn == wanted;
    Ok(binary(
        won,
        format!("Drew {} - {}", SUITS[drawn], verdict(won)),
        json!({ "suit": SUITS[drawn] }),
    ))
}

fn red_black(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let red = pick("redblack", choice, &[("red", true), ("black", false)])?;
    let drawn_red = rng.gen_bool(0.5);
    let colour = if drawn_red { "red" } else { "black" };
    let won = red == drawn_red;
    Ok(binary(won, format!("Card was {} - {}", colour, verdict(won)), json!({ "colour": colour })))
}

fn number_range(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let low = pick("range", choice, &[("low", true), ("high", false)])?;
    let number: u32 = rng.gen_range(1..=10);
    let won = if low { number <= 5 } else { number > 5 };
    Ok(binary(won, format!("Number {} - {}", number, verdict(won)), json!({ "number": number })))
}

const WHEEL_COLOURS: [&str; 3] = ["red", "blue", "green"];

fn color_wheel(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let wanted = pick("colorwheel", choice, &[("red", 0), ("blue", 1), ("green", 2)])?;
    let drawn = rng.gen_range(0..WHEEL_COLOURS.len());
    let won = drawn == wanted;
    Ok(binary(
        won,
        format!("Wheel stopped on {} - {}", WHEEL_COLOURS[drawn], verdict(won)),
        json!({ "colour": WHEEL_COLOURS[drawn] }),
    ))
}

/// Single-shot crash: the payout is the drawn multiplier in [0.10, 2.00)
fn instant_crash(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let bps: u32 = rng.gen_range(1_000..20_000);
    Ok(Resolution {
        multiplier_bps: bps,
        description: format!("Crashed at {:.2}x", bps as f64 / 10_000.0),
        detail: json!({ "crashPointBps": bps }),
    })
}

fn chance(game: &str, probability: f64, rng: &mut dyn RngCore) -> Resolution {
    let won = rng.gen_bool(probability);
    binary(won, format!("{} - {}", game, verdict(won)), json!({ "hit": won }))
}

fn mines(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    Ok(chance("Mines", 0.5, rng))
}

fn keno(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    Ok(chance("Keno", 0.1, rng))
}

fn bingo(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    Ok(chance("Bingo", 0.5, rng))
}

fn lotto(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    Ok(chance("Lotto", 0.2, rng))
}

fn generic(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    Ok(chance("Game", 0.5, rng))
}

const PLINKO_SLOTS: [u32; 5] = [0, 19_000, 0, 11_000, 0];

fn plinko(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let slot = rng.gen_range(0..PLINKO_SLOTS.len());
    let bps = PLINKO_SLOTS[slot];
    Ok(Resolution {
        multiplier_bps: bps,
        description: format!("Ball landed in slot {} ({:.1}x)", slot + 1, bps as f64 / 10_000.0),
        detail: json!({ "slot": slot }),
    })
}

const REEL_SYMBOLS: [&str; 6] = ["cherry", "lemon", "orange", "grape", "star", "seven"];

fn slots(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let reels: [usize; 3] = [
        rng.gen_range(0..REEL_SYMBOLS.len()),
        rng.gen_range(0..REEL_SYMBOLS.len()),
        rng.gen_range(0..REEL_SYMBOLS.len()),
    ];
    let symbols: Vec<&str> = reels.iter().map(|&r| REEL_SYMBOLS[r]).collect();

    let (bps, label) = if reels[0] == reels[1] && reels[1] == reels[2] {
        (STANDARD_WIN_BPS, "Triple")
    } else if reels[0] == reels[1] || reels[1] == reels[2] || reels[0] == reels[2] {
        (15_000, "Pair")
    } else {
        (LOSS_BPS, "No match")
    };

    Ok(Resolution {
        multiplier_bps: bps,
        description: format!("{} - {}", symbols.join(" "), label),
        detail: json!({ "reels": symbols }),
    })
}

const EUROPEAN_REDS: [u32; 18] = [1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36];

fn roulette_colour(number: u32) -> &'static str {
    if number == 0 {
        "green"
    } else if EUROPEAN_REDS.contains(&number) {
        "red"
    } else {
        "black"
    }
}

fn roulette(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let wanted = pick("roulette", choice, &[("red", "red"), ("black", "black"), ("green", "green")])?;
    let number: u32 = rng.gen_range(0..=36);
    let colour = roulette_colour(number);
    let won = colour == wanted;
    Ok(binary(
        won,
        format!("Ball landed on {} {} - {}", number, colour, verdict(won)),
        json!({ "number": number, "colour": colour }),
    ))
}

fn cards(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let high = pick("cards", choice, &[("high", true), ("low", false)])?;
    let drawn: Vec<u32> = (0..3).map(|_| rng.gen_range(2..=14)).collect();
    let sum: u32 = drawn.iter().sum();
    // Average above 7.5
    let is_high = sum * 2 > 45;
    let won = is_high == high;
    Ok(binary(
        won,
        format!("Cards {:?} - {}", drawn, verdict(won)),
        json!({ "cards": drawn, "high": is_high }),
    ))
}

fn wheel(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let lost = rng.gen_bool(0.52);
    Ok(binary(!lost, format!("Wheel - {}", verdict(!lost)), json!({ "hit": !lost })))
}

const RANK_LABELS: [&str; 13] = ["2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K", "A"];

/// Rank index 0..13 where 12 is the ace
fn card_points(rank: usize) -> u32 {
    match rank {
        12 => 11,
        9..=11 => 10,
        r => r as u32 + 2,
    }
}

fn hand_value(hand: &[usize]) -> u32 {
    let mut value: u32 = hand.iter().map(|&r| card_points(r)).sum();
    let mut soft_aces = hand.iter().filter(|&&r| r == 12).count();
    while value > 21 && soft_aces > 0 {
        value -= 10;
        soft_aces -= 1;
    }
    value
}

fn blackjack(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let mut deal = || -> [usize; 2] { [rng.gen_range(0..13), rng.gen_range(0..13)] };
    let player = deal();
    let dealer = deal();
    let player_value = hand_value(&player);
    let dealer_value = hand_value(&dealer);
    let player_blackjack = player_value == 21;
    let dealer_blackjack = dealer_value == 21;

    let (bps, verdict) = if player_blackjack && !dealer_blackjack {
        (STANDARD_WIN_BPS, "Blackjack! You won!")
    } else if dealer_blackjack {
        (LOSS_BPS, "Dealer blackjack. You lost.")
    } else if player_value > 21 {
        (LOSS_BPS, "Bust. You lost.")
    } else if dealer_value > 21 {
        (STANDARD_WIN_BPS, "Dealer bust! You won!")
    } else if player_value > dealer_value {
        (STANDARD_WIN_BPS, "You won!")
    } else if player_value < dealer_value {
        (LOSS_BPS, "Dealer wins. You lost.")
    } else {
        (PUSH_BPS, "Push. Bet returned.")
    };

    let labels = |hand: &[usize; 2]| -> Vec<&'static str> { hand.iter().map(|&r| RANK_LABELS[r]).collect() };
    Ok(Resolution {
        multiplier_bps: bps,
        description: format!(
            "Player {} ({}) vs Dealer {} ({}) - {}",
            labels(&player).join(" "),
            player_value,
            labels(&dealer).join(" "),
            dealer_value,
            verdict
        ),
        detail: json!({
            "player": labels(&player),
            "dealer": labels(&dealer),
            "playerValue": player_value,
            "dealerValue": dealer_value,
        }),
    })
}

/// Video poker hand rank and payout for five (rank, suit) cards
fn rank_poker_hand(hand: &[(usize, usize); 5]) -> (&'static str, u32) {
    let mut rank_counts = [0u8; 13];
    let mut suit_counts = [0u8; 4];
    for &(rank, suit) in hand {
        rank_counts[rank] += 1;
        suit_counts[suit] += 1;
    }

    let mut groups: Vec<u8> = rank_counts.iter().copied().filter(|&c| c > 0).collect();
    groups.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = suit_counts.iter().any(|&c| c == 5);
    let mut ranks: Vec<usize> = hand.iter().map(|&(r, _)| r).collect();
    ranks.sort_unstable();
    let is_straight = groups.len() == 5 && ranks[4] - ranks[0] == 4;

    if is_flush && is_straight {
        ("Straight Flush", STANDARD_WIN_BPS)
    } else if groups[0] == 4 {
        ("Four of a Kind", STANDARD_WIN_BPS)
    } else if groups[0] == 3 && groups.get(1) == Some(&2) {
        ("Full House", 15_000)
    } else if is_flush {
        ("Flush", 12_000)
    } else if is_straight {
        ("Straight", 11_000)
    } else if groups[0] == 3 {
        ("Three of a Kind", STANDARD_WIN_BPS)
    } else if groups[0] == 2 && groups.get(1) == Some(&2) {
        ("Two Pair", 11_000)
    } else if groups[0] == 2 && rank_counts[9..].iter().any(|&c| c == 2) {
        ("Jacks or Better", STANDARD_WIN_BPS)
    } else {
        ("No Win", LOSS_BPS)
    }
}

fn poker(_choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let mut hand = [(0usize, 0usize); 5];
    for card in hand.iter_mut() {
        *card = (rng.gen_range(0..13), rng.gen_range(0..4));
    }
    let (label, bps) = rank_poker_hand(&hand);
    let cards: Vec<String> = hand
        .iter()
        .map(|&(rank, suit)| format!("{} of {}", RANK_LABELS[rank], SUITS[suit]))
        .collect();

    Ok(Resolution {
        multiplier_bps: bps,
        description: format!("{} - {}", label, verdict(bps > 0)),
        detail: json!({ "hand": cards, "rank": label }),
    })
}

fn baccarat(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    #[derive(Clone, Copy, PartialEq)]
    enum Side {
        Player,
        Banker,
        Tie,
    }
    let side = pick(
        "baccarat",
        choice,
        &[("player", Side::Player), ("banker", Side::Banker), ("tie", Side::Tie)],
    )?;

    let mut hand = || -> u32 { (rng.gen_range(0..10u32) + rng.gen_range(0..10u32)) % 10 };
    let player = hand();
    let banker = hand();
    let won = match side {
        Side::Player => player > banker,
        Side::Banker => banker > player,
        Side::Tie => player == banker,
    };
    let bps = match (won, side) {
        (false, _) => LOSS_BPS,
        (true, Side::Tie) => 80_000,
        (true, _) => 19_500,
    };

    Ok(Resolution {
        multiplier_bps: bps,
        description: format!("Player {} vs Banker {} - {}", player, banker, verdict(won)),
        detail: json!({ "playerHand": player, "bankerHand": banker }),
    })
}

fn sic_bo(choice: Option<&str>, rng: &mut dyn RngCore) -> WagerResult<Resolution> {
    let big = pick("sicbo", choice, &[("big", true), ("small", false)])?;
    let dice: [u32; 3] = [rng.gen_range(1..=6), rng.gen_range(1..=6), rng.gen_range(1..=6)];
    let total: u32 = dice.iter().sum();
    let won = if big { (11..=17).contains(&total) } else { (4..=10).contains(&total) };

    Ok(Resolution {
        multiplier_bps: if won { 20_000 } else { LOSS_BPS },
        description: format!("Total {} - {}", total, verdict(won)),
        detail: json!({ "dice": dice, "total": total }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lowest() -> StepRng {
        StepRng::new(0, 0)
    }

    #[test]
    fn test_dice_low_wins_on_lowest_roll() {
        let engine = OutcomeEngine::new();
        let won = engine.resolve("dice", Some("low"), &mut lowest()).unwrap();
        assert_eq!(won.multiplier_bps, STANDARD_WIN_BPS);
        assert_eq!(won.detail["roll"], 1);

        let lost = engine.resolve("dice", Some("2"), &mut lowest()).unwrap();
        assert_eq!(lost.multiplier_bps, 0);
    }

    #[test]
    fn test_unknown_choice_is_invalid_input() {
        let engine = OutcomeEngine::new();
        let err = engine.resolve("coin", Some("edge"), &mut lowest()).unwrap_err();
        assert!(matches!(err, WagerError::InvalidInput(_)));
        assert!(engine.resolve("suit", None, &mut lowest()).is_err());
    }

    #[test]
    fn test_choice_is_case_insensitive() {
        let engine = OutcomeEngine::new();
        assert!(engine.resolve("coin", Some(" HEADS "), &mut lowest()).is_ok());
    }

    #[test]
    fn test_unknown_code_uses_generic_rule() {
        let engine = OutcomeEngine::new();
        assert!(!engine.has_dedicated_rule("mystery"));
        let resolution = engine.resolve("mystery", None, &mut lowest()).unwrap();
        assert!(resolution.multiplier_bps == 0 || resolution.multiplier_bps == STANDARD_WIN_BPS);
    }

    #[test]
    fn test_multipliers_stay_in_variant_tables() {
        let engine = OutcomeEngine::new();
        let mut rng = StdRng::seed_from_u64(7);
        let choices: &[(&str, Option<&str>)] = &[
            ("dice", Some("high")),
            ("slots", None),
            ("plinko", None),
            ("blackjack", None),
            ("poker", None),
            ("baccarat", Some("tie")),
            ("sicbo", Some("big")),
            ("crash", None),
        ];
        for _ in 0..500 {
            for (code, choice) in choices {
                let bps = engine.resolve(code, *choice, &mut rng).unwrap().multiplier_bps;
                let allowed = match *code {
                    "slots" => [0, 15_000, 19_000].contains(&bps),
                    "plinko" => PLINKO_SLOTS.contains(&bps),
                    "blackjack" => [0, 10_000, 19_000].contains(&bps),
                    "poker" => [0, 11_000, 12_000, 15_000, 19_000].contains(&bps),
                    "baccarat" => [0, 80_000].contains(&bps),
                    "sicbo" => [0, 20_000].contains(&bps),
                    "crash" => (1_000..20_000).contains(&bps),
                    _ => [0, STANDARD_WIN_BPS].contains(&bps),
                };
                assert!(allowed, "{} produced {}", code, bps);
            }
        }
    }

    #[test]
    fn test_blackjack_soft_aces() {
        assert_eq!(hand_value(&[12, 12]), 12);
        assert_eq!(hand_value(&[12, 11]), 21);
        assert_eq!(hand_value(&[0, 3]), 7);
    }

    #[test]
    fn test_blackjack_tie_is_push() {
        // Lowest draw deals 2-2 to both hands
        let resolution = blackjack(None, &mut lowest()).unwrap();
        assert_eq!(resolution.multiplier_bps, PUSH_BPS);
        assert_eq!(resolution.outcome(), crate::games::types::GameOutcome::Push);
    }

    #[test]
    fn test_poker_hand_ranks() {
        let quads = [(5, 0), (5, 1), (5, 2), (5, 3), (0, 0)];
        assert_eq!(rank_poker_hand(&quads).0, "Four of a Kind");

        let full_house = [(2, 0), (2, 1), (2, 2), (7, 3), (7, 0)];
        assert_eq!(rank_poker_hand(&full_house), ("Full House", 15_000));

        let straight = [(3, 0), (4, 1), (5, 2), (6, 3), (7, 0)];
        assert_eq!(rank_poker_hand(&straight), ("Straight", 11_000));

        let straight_flush = [(3, 1), (4, 1), (5, 1), (6, 1), (7, 1)];
        assert_eq!(rank_poker_hand(&straight_flush).0, "Straight Flush");

        let high_pair = [(10, 0), (10, 1), (2, 2), (4, 3), (6, 0)];
        assert_eq!(rank_poker_hand(&high_pair).0, "Jacks or Better");

        let low_pair = [(1, 0), (1, 1), (2, 2), (4, 3), (6, 0)];
        assert_eq!(rank_poker_hand(&low_pair), ("No Win", 0));
    }

    #[test]
    fn test_roulette_colours() {
        assert_eq!(roulette_colour(0), "green");
        assert_eq!(roulette_colour(1), "red");
        assert_eq!(roulette_colour(2), "black");
        assert_eq!(roulette_colour(36), "red");
    }

    #[test]
    fn test_instant_crash_lowest_draw() {
        let resolution = instant_crash(None, &mut lowest()).unwrap();
        assert_eq!(resolution.multiplier_bps, 1_000);
        assert_eq!(resolution.win_amount(10_000), 1_000);
    }
}
