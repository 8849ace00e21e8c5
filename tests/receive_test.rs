//! ReceiveReconciler and StatusPoller tests
//!
//! All tests run on a paused clock, so the 2000ms discovery deadline and the
//! drain interval elapse instantly and deterministically.
//!
//! Run with: cargo test --test receive_test

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::*;
use vite_wallet::block::Hash32;
use vite_wallet::ledger::drain::RECEIVE_SUCCESS;
use vite_wallet::ledger::DrainMessage;
use vite_wallet::{
    LedgerError, ReceiveOptions, ReceiveOutcome, ReceiveReconciler, ReceiveState, StatusPoller,
    WalletError,
};
use vite_wallet::receive::ReceiveResult;

const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

fn options() -> ReceiveOptions {
    ReceiveOptions {
        connect_timeout: Duration::from_millis(1000),
        discovery_timeout: Duration::from_millis(2000),
        drain_interval: DRAIN_INTERVAL,
    }
}

fn reconciler(ledger: &Arc<MockLedger>) -> ReceiveReconciler {
    ReceiveReconciler::new(MockConnector::new(ledger.clone()), options())
}

#[tokio::test(start_paused = true)]
async fn test_discovery_timeout_fails_without_draining() {
    init_logger();
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(3)),
        account_delay: Some(Duration::from_secs(30)),
        ..Default::default()
    });
    let start = tokio::time::Instant::now();

    let handle = reconciler(&ledger).run(&test_wallet(), 0).expect("run");
    let status = handle.finished().await;

    assert_eq!(status.state, ReceiveState::Failed);
    assert_eq!(status.error_code, 1);
    assert_eq!(status.message, "connection timeout");
    assert!(start.elapsed() >= Duration::from_millis(2000));
    assert!(start.elapsed() < Duration::from_millis(2100));
    assert_eq!(ledger.drains_started(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_account_state_failure_is_reported_as_connection_timeout() {
    init_logger();
    let ledger = MockLedger::new(Script {
        account_state: Err(LedgerError::Transport("connection reset".into())),
        ..Default::default()
    });

    let handle = reconciler(&ledger).run(&test_wallet(), 0).expect("run");
    let status = handle.finished().await;

    assert_eq!(status.state, ReceiveState::Failed);
    assert_eq!(status.error_code, 1);
    assert_eq!(status.message, "connection timeout");
    assert_eq!(
        status.outcome(),
        ReceiveOutcome::Failed("connection timeout".to_string())
    );
    assert_eq!(ledger.drains_started(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_balance_is_reported_as_connection_timeout() {
    let mut state = account_with_backlog(2);
    state.balance = None;
    let ledger = MockLedger::new(Script {
        account_state: Ok(state),
        ..Default::default()
    });

    let status = reconciler(&ledger)
        .run(&test_wallet(), 0)
        .expect("run")
        .finished()
        .await;

    assert_eq!(status.state, ReceiveState::Failed);
    assert_eq!(status.message, "connection timeout");
    assert_eq!(ledger.drains_started(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_node_is_reported_as_connection_timeout() {
    let connector = MockConnector::failing(LedgerError::Transport("dns failure".into()));
    let reconciler = ReceiveReconciler::new(connector, options());

    let status = reconciler
        .run(&test_wallet(), 0)
        .expect("run")
        .finished()
        .await;

    assert_eq!(status.state, ReceiveState::Failed);
    assert_eq!(status.message, "connection timeout");
}

#[tokio::test(start_paused = true)]
async fn test_empty_backlog_succeeds_with_error_code() {
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(0)),
        ..Default::default()
    });

    let status = reconciler(&ledger)
        .run(&test_wallet(), 0)
        .expect("run")
        .finished()
        .await;

    assert_eq!(status.state, ReceiveState::Success);
    assert_eq!(status.error_code, 1);
    assert_eq!(status.message, "no pending transactions");
    assert_eq!(status.result, None);
    assert_eq!(status.outcome(), ReceiveOutcome::EmptyBacklog);
    assert_eq!(ledger.drains_started(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_results_are_collected_in_order_until_the_sentinel() {
    init_logger();
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(3)),
        drain: vec![received("A"), received("B"), received("C"), exhausted()],
        ..Default::default()
    });

    let handle = reconciler(&ledger).run(&test_wallet(), 0).expect("run");

    // drain ticks land at 0, 100, 200 and 300ms; sample between them
    tokio::time::sleep(Duration::from_millis(50)).await;
    let status = handle.snapshot();
    assert_eq!(status.state, ReceiveState::Working);
    assert_eq!(status.unreceived_count, 3);
    assert_eq!(status.message, "1/3 A");

    tokio::time::sleep(DRAIN_INTERVAL).await;
    assert_eq!(handle.snapshot().message, "2/3 B");

    tokio::time::sleep(DRAIN_INTERVAL).await;
    let status = handle.snapshot();
    assert_eq!(status.message, "3/3 C");
    assert_eq!(status.state, ReceiveState::Working);

    tokio::time::sleep(DRAIN_INTERVAL).await;
    let status = handle.snapshot();
    assert_eq!(status.state, ReceiveState::Success);
    assert_eq!(status.error_code, 0);
    assert_eq!(status.message, "3 blocks received success");
    assert_eq!(
        status.result.map(|r| r.success),
        Some(vec!["A".to_string(), "B".to_string(), "C".to_string()])
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejections_do_not_stop_the_run() {
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(2)),
        drain: vec![rejected("insufficient quota"), received("A"), exhausted()],
        ..Default::default()
    });

    let status = reconciler(&ledger)
        .run(&test_wallet(), 0)
        .expect("run")
        .finished()
        .await;

    assert_eq!(status.state, ReceiveState::Success);
    let result = status.result.expect("result");
    assert_eq!(result.error, vec!["insufficient quota".to_string()]);
    assert_eq!(result.success, vec!["A".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_two_blocks_then_sentinel() {
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(2)),
        drain: vec![
            received("A"),
            received("B"),
            received("Don't have unreceivedAccountBlocks. C"),
        ],
        ..Default::default()
    });

    let status = reconciler(&ledger)
        .run(&test_wallet(), 0)
        .expect("run")
        .finished()
        .await;

    assert_eq!(status.state, ReceiveState::Success);
    assert_eq!(status.message, "2 blocks received success");
    let expected = ReceiveResult {
        unreceived: 2,
        success: vec!["A".to_string(), "B".to_string()],
        error: vec![],
    };
    assert_eq!(status.result, Some(expected.clone()));
    assert_eq!(status.outcome(), ReceiveOutcome::Drained(expected));
}

#[tokio::test(start_paused = true)]
async fn test_received_blocks_are_referenced_by_hash() {
    let hash = Hash32([0x42; 32]);
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(1)),
        drain: vec![
            DrainMessage::Result {
                message: RECEIVE_SUCCESS.to_string(),
                block: Some(hash),
            },
            exhausted(),
        ],
        ..Default::default()
    });

    let status = reconciler(&ledger)
        .run(&test_wallet(), 0)
        .expect("run")
        .finished()
        .await;

    assert_eq!(
        status.result.map(|r| r.success),
        Some(vec![hash.to_string()])
    );
}

#[tokio::test(start_paused = true)]
async fn test_drain_is_stopped_after_the_sentinel() {
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(1)),
        drain: vec![received("A"), exhausted()],
        ..Default::default()
    });

    let handle = reconciler(&ledger).run(&test_wallet(), 0).expect("run");
    assert_eq!(handle.finished().await.state, ReceiveState::Success);
    assert!(!ledger.drain_stopped());

    tokio::time::sleep(DRAIN_INTERVAL * 2).await;
    assert!(ledger.drain_stopped());
    assert_eq!(ledger.drains_started(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_drain_fails_the_run() {
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(3)),
        drain: vec![received("A")],
        close_after_script: true,
        ..Default::default()
    });

    let status = reconciler(&ledger)
        .run(&test_wallet(), 0)
        .expect("run")
        .finished()
        .await;

    assert_eq!(status.state, ReceiveState::Failed);
    assert_eq!(status.error_code, 1);
    assert_eq!(status.message, "receive task stopped unexpectedly");
}

#[tokio::test(start_paused = true)]
async fn test_lost_connection_mid_drain_fails_the_run() {
    init_logger();
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(2)),
        drain: vec![received("A"), connection_lost("connection reset by peer")],
        ..Default::default()
    });

    let handle = reconciler(&ledger).run(&test_wallet(), 0).expect("run");
    let status = tokio::time::timeout(Duration::from_secs(600), handle.finished())
        .await
        .expect("run settles");

    assert_eq!(status.state, ReceiveState::Failed);
    assert_eq!(status.error_code, 1);
    assert_eq!(status.message, "Connection error: connection reset by peer");

    tokio::time::sleep(DRAIN_INTERVAL * 2).await;
    assert!(ledger.drain_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_rejection_after_progress_keeps_draining() {
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(2)),
        drain: vec![received("A"), rejected("block already received"), exhausted()],
        ..Default::default()
    });

    let status = reconciler(&ledger)
        .run(&test_wallet(), 0)
        .expect("run")
        .finished()
        .await;

    assert_eq!(status.state, ReceiveState::Success);
    assert_eq!(status.error_code, 0);
    let result = status.result.expect("result");
    assert_eq!(result.error, vec!["block already received".to_string()]);
}

#[tokio::test]
async fn test_out_of_range_index_is_reported_synchronously() {
    let ledger = MockLedger::new(Script::default());
    let result = reconciler(&ledger).run(&test_wallet(), 0x8000_0000);
    assert!(matches!(result, Err(WalletError::Derivation(_))));
}

#[tokio::test(start_paused = true)]
async fn test_poller_returns_on_success() {
    init_logger();
    let ledger = MockLedger::new(Script {
        account_state: Ok(account_with_backlog(1)),
        drain: vec![received("A"), exhausted()],
        ..Default::default()
    });
    let reconciler = ReceiveReconciler::new(
        MockConnector::new(ledger.clone()),
        ReceiveOptions {
            drain_interval: Duration::from_millis(2545),
            ..options()
        },
    );

    let handle = reconciler.run(&test_wallet(), 0).expect("run");
    let mut progress = Vec::new();
    let status = StatusPoller::new(Duration::from_millis(1000))
        .wait_for_success(&handle, |status| progress.push(status.message.clone()))
        .await;

    assert_eq!(status.state, ReceiveState::Success);
    assert_eq!(status.message, "1 blocks received success");
    assert_eq!(progress.first().map(String::as_str), Some("checking balance..."));
    assert!(progress.iter().any(|m| m == "1/1 A"));
}

#[tokio::test(start_paused = true)]
async fn test_poller_never_returns_on_failure() {
    let ledger = MockLedger::new(Script {
        account_state: Err(LedgerError::Transport("connection reset".into())),
        ..Default::default()
    });
    let handle = reconciler(&ledger).run(&test_wallet(), 0).expect("run");

    let samples = Arc::new(Mutex::new(0usize));
    let counter = samples.clone();
    let poller = StatusPoller::new(Duration::from_millis(1000));
    let waited = tokio::time::timeout(
        Duration::from_secs(10),
        poller.wait_for_success(&handle, move |_| *counter.lock().expect("counter") += 1),
    )
    .await;

    assert!(waited.is_err());
    assert!(*samples.lock().expect("samples") >= 10);
    assert_eq!(handle.failed().await.message, "connection timeout");
}
