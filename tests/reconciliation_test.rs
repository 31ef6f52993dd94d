use pointforge::domain::derive;
use pointforge::engine::UNITS_PER_WHOLE;
use pointforge::{
    DisplayState, ManualClock, MockLedger, Position, RefreshOutcome, SchedulerConfig, Session,
};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

const START: i64 = 1_700_000_000;

fn program_id() -> Pubkey {
    Pubkey::new_from_array([42u8; 32])
}

fn owner() -> Pubkey {
    Pubkey::new_from_array([1u8; 32])
}

fn locator() -> Pubkey {
    derive(&owner(), &program_id()).address
}

fn position(staked: u64, points: u64, updated: i64) -> Position {
    Position {
        owner: owner(),
        staked_principal: staked,
        total_points: points,
        last_updated_time: updated as u64,
        bump: derive(&owner(), &program_id()).bump,
    }
}

fn session(ledger: Arc<MockLedger>, clock: &ManualClock) -> Session {
    Session::new(
        ledger,
        owner(),
        program_id(),
        Arc::new(clock.clone()),
        SchedulerConfig {
            fast_tick: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(20),
        },
    )
}

async fn wait_for_display(
    rx: &mut watch::Receiver<DisplayState>,
    predicate: impl Fn(&DisplayState) -> bool,
) -> DisplayState {
    let wait = async {
        loop {
            {
                let state = rx.borrow_and_update();
                if predicate(&state) {
                    return state.clone();
                }
            }
            rx.changed().await.expect("display channel closed");
        }
    };
    tokio::time::timeout(Duration::from_secs(300), wait)
        .await
        .expect("display never reached the expected state")
}

async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn test_refresh_then_absent_clears_display() {
    let clock = ManualClock::new(START);
    let ledger = Arc::new(
        MockLedger::new(program_id(), Arc::new(clock.clone()))
            .with_position(locator(), position(2 * UNITS_PER_WHOLE, 0, START - 100)),
    );
    let session = session(ledger.clone(), &clock);

    assert_eq!(session.refresh_now().await, RefreshOutcome::Updated);
    assert_eq!(session.read().claimable_points, 200);

    ledger.remove_record(&locator());
    assert_eq!(session.refresh_now().await, RefreshOutcome::Absent);

    let display = session.read();
    assert!(!display.has_position);
    assert_eq!(display.claimable_points, 0);
    assert!(session.store().position().is_none());
}

#[tokio::test]
async fn test_failed_refresh_keeps_last_position() {
    let clock = ManualClock::new(START);
    let ledger = Arc::new(
        MockLedger::new(program_id(), Arc::new(clock.clone()))
            .with_position(locator(), position(UNITS_PER_WHOLE, 7_000_000, START)),
    );
    let session = session(ledger.clone(), &clock);
    session.refresh_now().await;

    ledger.fail_next_reads(1);
    assert!(matches!(
        session.refresh_now().await,
        RefreshOutcome::Failed(_)
    ));
    assert_eq!(session.read().claimable_points, 7);
    assert!(!session.store().is_synchronizing());

    // Retried on the next cycle.
    assert_eq!(session.refresh_now().await, RefreshOutcome::Updated);
}

#[tokio::test]
async fn test_malformed_record_clears_position() {
    let clock = ManualClock::new(START);
    let truncated = position(UNITS_PER_WHOLE, 0, START).encode()[..40].to_vec();
    let ledger = Arc::new(
        MockLedger::new(program_id(), Arc::new(clock.clone())).with_raw_record(locator(), truncated),
    );
    let session = session(ledger, &clock);
    session.store().replace(position(UNITS_PER_WHOLE, 0, START));
    assert!(session.read().has_position);

    assert!(matches!(
        session.refresh_now().await,
        RefreshOutcome::Malformed(_)
    ));
    assert!(!session.read().has_position);
}

#[tokio::test]
async fn test_record_for_other_owner_is_not_ours() {
    let clock = ManualClock::new(START);
    let mut foreign = position(UNITS_PER_WHOLE, 0, START);
    foreign.owner = Pubkey::new_from_array([99u8; 32]);
    let ledger = Arc::new(
        MockLedger::new(program_id(), Arc::new(clock.clone())).with_position(locator(), foreign),
    );
    let session = session(ledger, &clock);

    assert_eq!(
        session.refresh_now().await,
        RefreshOutcome::ForeignOwner(Pubkey::new_from_array([99u8; 32]))
    );
    assert!(!session.read().has_position);
}

#[tokio::test]
async fn test_stale_snapshot_does_not_move_time_backward() {
    let clock = ManualClock::new(START);
    let ledger = Arc::new(
        MockLedger::new(program_id(), Arc::new(clock.clone()))
            .with_position(locator(), position(UNITS_PER_WHOLE, 50_000_000, START)),
    );
    let session = session(ledger.clone(), &clock);
    session.refresh_now().await;

    ledger.set_position(locator(), position(UNITS_PER_WHOLE, 10_000_000, START - 10));
    assert_eq!(session.refresh_now().await, RefreshOutcome::Stale);
    assert_eq!(session.read().claimable_points, 50);
    assert_eq!(session.read().last_updated_time, Some(START as u64));
}

#[tokio::test]
async fn test_concurrent_refresh_is_noop_and_rereads() {
    let clock = ManualClock::new(START);
    let gate = Arc::new(Semaphore::new(0));
    let ledger = Arc::new(
        MockLedger::new(program_id(), Arc::new(clock.clone()))
            .with_position(locator(), position(UNITS_PER_WHOLE, 0, START))
            .with_read_gate(gate.clone()),
    );
    let session = Arc::new(session(ledger.clone(), &clock));

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.refresh_now().await })
    };
    let store = session.store().clone();
    wait_until(|| store.is_synchronizing()).await;

    assert_eq!(session.refresh_now().await, RefreshOutcome::Skipped);
    assert_eq!(ledger.read_calls(), 1);

    ledger.set_position(locator(), position(3 * UNITS_PER_WHOLE, 0, START + 5));
    gate.add_permits(2);

    assert_eq!(first.await.unwrap(), RefreshOutcome::Updated);
    assert_eq!(ledger.read_calls(), 2);
    assert!(!store.is_synchronizing());
    assert_eq!(session.read().staked_amount.to_string(), "3");
}

#[tokio::test(start_paused = true)]
async fn test_fast_tick_extrapolates_between_refreshes() {
    let clock = ManualClock::new(START);
    let ledger = Arc::new(
        MockLedger::new(program_id(), Arc::new(clock.clone()))
            .with_position(locator(), position(2 * UNITS_PER_WHOLE, 0, START)),
    );
    let mut session = session(ledger.clone(), &clock);
    let mut display = session.display();
    session.start();

    wait_for_display(&mut display, |d| d.has_position).await;
    let reads_after_start = ledger.read_calls();
    assert_eq!(reads_after_start, 1);

    clock.set(START + 100);
    let state = wait_for_display(&mut display, |d| d.claimable_points == 200).await;
    assert_eq!(state.claimable_points_raw, 200_000_000);
    // Extrapolation alone does not touch the ledger.
    assert_eq!(ledger.read_calls(), reads_after_start);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_authoritative_refresh_supersedes_extrapolation() {
    let clock = ManualClock::new(START);
    let ledger = Arc::new(
        MockLedger::new(program_id(), Arc::new(clock.clone()))
            .with_position(locator(), position(2 * UNITS_PER_WHOLE, 0, START)),
    );
    let mut session = session(ledger.clone(), &clock);
    let mut display = session.display();
    session.start();
    wait_for_display(&mut display, |d| d.has_position).await;

    // The program settles at START + 100 and the user unstakes half.
    ledger.set_position(locator(), position(UNITS_PER_WHOLE, 200_000_000, START + 100));
    clock.set(START + 110);

    // Before the next refresh: 2 SOL extrapolated over 110s.
    wait_for_display(&mut display, |d| d.claimable_points == 220).await;

    // After it: 200 settled + 1 SOL over 10s, no double counting.
    let state = wait_for_display(&mut display, |d| d.claimable_points == 210).await;
    assert_eq!(state.staked_amount.to_string(), "1");
    assert_eq!(state.last_updated_time, Some((START + 100) as u64));
    assert!(ledger.read_calls() >= 2);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_requested_refresh_runs_before_interval() {
    let clock = ManualClock::new(START);
    let ledger = Arc::new(MockLedger::new(program_id(), Arc::new(clock.clone())));
    let mut session = session(ledger.clone(), &clock);
    let mut display = session.display();
    session.start();
    wait_until(|| ledger.read_calls() == 1).await;

    ledger.set_position(locator(), position(UNITS_PER_WHOLE, 0, START));
    session.request_refresh();

    let started = tokio::time::Instant::now();
    wait_for_display(&mut display, |d| d.has_position).await;
    assert!(started.elapsed() < Duration::from_secs(20));

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_in_flight_refresh() {
    let clock = ManualClock::new(START);
    let gate = Arc::new(Semaphore::new(0));
    let ledger = Arc::new(
        MockLedger::new(program_id(), Arc::new(clock.clone()))
            .with_position(locator(), position(UNITS_PER_WHOLE, 0, START))
            .with_read_gate(gate.clone()),
    );
    let mut session = session(ledger.clone(), &clock);
    let store = session.store().clone();
    session.start();
    wait_until(|| store.is_synchronizing()).await;

    session.stop().await;
    assert!(store.is_disposed());

    gate.add_permits(10);
    wait_until(|| !store.is_synchronizing()).await;

    assert!(store.position().is_none());
    assert_eq!(ledger.read_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_reads_after_stop() {
    let clock = ManualClock::new(START);
    let ledger = Arc::new(
        MockLedger::new(program_id(), Arc::new(clock.clone()))
            .with_position(locator(), position(UNITS_PER_WHOLE, 0, START)),
    );
    let mut session = session(ledger.clone(), &clock);
    let mut display = session.display();
    let store = session.store().clone();
    session.start();
    wait_for_display(&mut display, |d| d.has_position).await;

    // Let a few slow refreshes run.
    tokio::time::sleep(Duration::from_secs(45)).await;
    let reads_before_stop = ledger.read_calls();
    assert!(reads_before_stop >= 3);

    session.stop().await;
    clock.advance(120);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(ledger.read_calls(), reads_before_stop);
    assert!(store.position().is_none());
    assert!(!store.is_synchronizing());
}
