//! The scheduler loop driving real rounds with short intervals

use luckybet::broadcast::{EventBroadcaster, RoundEvent};
use luckybet::config::{LedgerConfig, RoundConfig};
use luckybet::games::EntropySource;
use luckybet::ledger::{BalanceField, Ledger, TransactionKind};
use luckybet::metrics::Metrics;
use luckybet::round::{RoundPhase, RoundScheduler};
use luckybet::storage::OptimizedStorage;
use luckybet::WagerError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn scheduler(dir: &tempfile::TempDir, config: RoundConfig) -> (Arc<Ledger>, Arc<RoundScheduler>) {
    let storage = OptimizedStorage::new(dir.path()).unwrap();
    let ledger = Arc::new(Ledger::new(storage, LedgerConfig::default()));
    let scheduler = Arc::new(RoundScheduler::new(
        config,
        ledger.clone(),
        EventBroadcaster::new(1024),
        Arc::new(EntropySource),
        Arc::new(Metrics::new().unwrap()),
    ));
    (ledger, scheduler)
}

fn fast_rounds() -> RoundConfig {
    RoundConfig {
        crash_min_bps: 11_000,
        crash_max_bps: 15_000,
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spectator_sees_complete_ordered_rounds() {
    let dir = tempfile::tempdir().unwrap();
    let (_ledger, scheduler) = scheduler(&dir, fast_rounds());
    let mut rx = scheduler.broadcaster().subscribe();

    let runner = tokio::spawn(
        scheduler
            .clone()
            .run(Duration::from_millis(20), Duration::from_millis(2)),
    );

    let mut rounds_seen = 0;
    let mut current: Option<u64> = None;
    let mut last_multiplier = 0.0;

    while rounds_seen < 3 {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("round events stopped")
            .unwrap();
        match event {
            RoundEvent::RoundStarted { round_id, multiplier } => {
                assert!(current.is_none(), "round started before the previous crashed");
                assert_eq!(multiplier, 1.0);
                current = Some(round_id);
                last_multiplier = 1.0;
            }
            RoundEvent::MultiplierTick { round_id, multiplier } => {
                assert_eq!(Some(round_id), current);
                assert!(multiplier > last_multiplier);
                last_multiplier = multiplier;
            }
            RoundEvent::RoundCrashed { round_id, crash_point } => {
                assert_eq!(Some(round_id), current);
                assert!((1.1..1.5).contains(&crash_point));
                // The terminal tick reaches the crash point
                assert!(last_multiplier >= crash_point);
                current = None;
                rounds_seen += 1;
            }
            other => panic!("unexpected broadcast {:?}", other),
        }
    }

    runner.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bet_then_forfeit_through_live_loop() {
    let dir = tempfile::tempdir().unwrap();
    let config = RoundConfig {
        crash_min_bps: 10_500,
        crash_max_bps: 10_600,
        increment_bps: 1_000,
        ..Default::default()
    };
    let (ledger, scheduler) = scheduler(&dir, config);
    let user = ledger.create_account("late", Some(1_000), None, None).unwrap();

    // Idle: nothing to join yet
    assert_eq!(
        scheduler.place_bet(&user.id, 100, false).await.unwrap_err(),
        WagerError::RoundClosed
    );

    let round_id = scheduler.arm().await.unwrap();
    assert_eq!(scheduler.phase().await, RoundPhase::Arming);
    scheduler.place_bet(&user.id, 300, false).await.unwrap();

    // First tick overshoots the crash point: tick and crash in one step
    let mut rx = scheduler.broadcaster().subscribe();
    scheduler.advance().await;
    let tick = rx.recv().await.unwrap();
    assert!(matches!(tick, RoundEvent::MultiplierTick { round_id: id, .. } if id == round_id));
    assert!(matches!(rx.recv().await.unwrap(), RoundEvent::RoundCrashed { .. }));

    let account = ledger.account(&user.id).unwrap();
    assert_eq!(account.balance, 700);
    let snapshot = scheduler.snapshot().await;
    assert_eq!(snapshot.phase, RoundPhase::Idle);
    assert!(snapshot.crash_point.is_some());
}

#[tokio::test]
async fn test_stake_survives_restart_and_is_refunded() {
    let dir = tempfile::tempdir().unwrap();
    let user_id = {
        let (ledger, scheduler) = scheduler(&dir, fast_rounds());
        let user = ledger.create_account("restart", Some(5_000), None, None).unwrap();
        scheduler.arm().await.unwrap();
        scheduler.place_bet(&user.id, 5_000, false).await.unwrap();
        assert_eq!(ledger.account(&user.id).unwrap().balance, 0);
        user.id
        // Process goes away mid-round
    };

    let (ledger, scheduler) = scheduler(&dir, fast_rounds());
    assert_eq!(ledger.account(&user_id).unwrap().balance, 0);
    let open = ledger.open_round_bets().unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].user_id, user_id);
    assert_eq!(open[0].field, BalanceField::Real);
    assert_eq!(open[0].amount, 5_000);

    assert_eq!(scheduler.recover().await.unwrap(), 1);
    assert_eq!(ledger.account(&user_id).unwrap().balance, 5_000);
    assert!(ledger.open_round_bets().unwrap().is_empty());
    let txs = ledger.transactions_for(&user_id, 10).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].kind, TransactionKind::Push);

    // Nothing left to refund the second time
    assert_eq!(scheduler.recover().await.unwrap(), 0);
}
