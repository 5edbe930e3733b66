//! Prometheus metrics for wagers, rounds and spectators

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    wagers_total: IntCounterVec,
    rejections_total: IntCounterVec,
    rounds_started_total: IntCounter,
    rounds_crashed_total: IntCounter,
    round_bets_total: IntCounter,
    cashouts_total: IntCounter,
    spectators: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("luckybet".to_string()), None)?;

        let wagers_total = IntCounterVec::new(
            Opts::new("wagers_total", "Resolved discrete wagers"),
            &["game", "outcome"],
        )?;
        let rejections_total = IntCounterVec::new(
            Opts::new("rejections_total", "Rejected requests by error code"),
            &["code"],
        )?;
        let rounds_started_total = IntCounter::new("rounds_started_total", "Rounds armed")?;
        let rounds_crashed_total = IntCounter::new("rounds_crashed_total", "Rounds crashed")?;
        let round_bets_total = IntCounter::new("round_bets_total", "Bets placed on rounds")?;
        let cashouts_total = IntCounter::new("cashouts_total", "Successful round cash-outs")?;
        let spectators = IntGauge::new("spectators", "Connected round spectators")?;

        registry.register(Box::new(wagers_total.clone()))?;
        registry.register(Box::new(rejections_total.clone()))?;
        registry.register(Box::new(rounds_started_total.clone()))?;
        registry.register(Box::new(rounds_crashed_total.clone()))?;
        registry.register(Box::new(round_bets_total.clone()))?;
        registry.register(Box::new(cashouts_total.clone()))?;
        registry.register(Box::new(spectators.clone()))?;

        Ok(Self {
            registry,
            wagers_total,
            rejections_total,
            rounds_started_total,
            rounds_crashed_total,
            round_bets_total,
            cashouts_total,
            spectators,
        })
    }

    pub fn record_wager(&self, game: &str, outcome: &str) {
        self.wagers_total.with_label_values(&[game, outcome]).inc();
    }

    pub fn record_rejection(&self, code: &str) {
        self.rejections_total.with_label_values(&[code]).inc();
    }

    pub fn round_started(&self) {
        self.rounds_started_total.inc();
    }

    pub fn round_crashed(&self) {
        self.rounds_crashed_total.inc();
    }

    pub fn round_bet(&self) {
        self.round_bets_total.inc();
    }

    pub fn cashout(&self) {
        self.cashouts_total.inc();
    }

    pub fn spectator_joined(&self) {
        self.spectators.inc();
    }

    pub fn spectator_left(&self) {
        self.spectators.dec();
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
