use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use tokio::time::Instant;

use pmt::{
    spend_with_auto_approve, AutoApproveConfig, AutoApprover, ChainConfig, Confirmation,
    PmtError, SequencePhase, WalletBridge, SEPOLIA_CHAIN_ID,
};

const SPENDER: Address = Address::repeat_byte(0xe5);
const OWNER: Address = Address::repeat_byte(0x0a);
const APPROVAL_TX: TxHash = TxHash::repeat_byte(0xaa);
const INTENT_TX: TxHash = TxHash::repeat_byte(0xbb);

/// In-memory token allowance with a configurable approval latency.
struct MockBridge {
    account: Option<Address>,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    chain_id: u64,
    balance: U256,
    allowance: U256,
    approvals: Vec<(Address, U256)>,
    reads: usize,
    reject_approval: bool,
    /// Allowance reads after an approval before it takes effect; `None`
    /// means the approval never lands.
    lands_after_reads: Option<usize>,
    pending: Option<U256>,
    reads_since_approval: usize,
    /// Number of allowance reads after an approval that fail.
    failing_reads: usize,
    confirmed: Vec<TxHash>,
}

impl MockBridge {
    fn new(allowance: u64) -> Self {
        Self {
            account: Some(OWNER),
            state: Mutex::new(MockState {
                chain_id: SEPOLIA_CHAIN_ID,
                balance: U256::from(1_000_000u64),
                allowance: U256::from(allowance),
                lands_after_reads: Some(1),
                ..MockState::default()
            }),
        }
    }

    fn disconnected() -> Self {
        Self {
            account: None,
            ..Self::new(0)
        }
    }

    fn configure(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    fn current(&self) -> U256 {
        self.state.lock().unwrap().allowance
    }

    fn approvals(&self) -> Vec<(Address, U256)> {
        self.state.lock().unwrap().approvals.clone()
    }

    fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    fn confirmed(&self) -> Vec<TxHash> {
        self.state.lock().unwrap().confirmed.clone()
    }
}

impl WalletBridge for MockBridge {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn chain_id(&self) -> Result<u64, PmtError> {
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, PmtError> {
        assert_eq!(owner, OWNER);
        Ok(self.state.lock().unwrap().balance)
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, PmtError> {
        assert_eq!(owner, OWNER);
        assert_eq!(spender, SPENDER);
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        if let Some(amount) = state.pending {
            state.reads_since_approval += 1;
            if state.failing_reads > 0 {
                state.failing_reads -= 1;
                return Err(PmtError::ChainError("rpc unavailable".to_string()));
            }
            if state
                .lands_after_reads
                .is_some_and(|n| state.reads_since_approval >= n)
            {
                state.allowance = amount;
                state.pending = None;
            }
        }
        Ok(state.allowance)
    }

    async fn approve(&self, spender: Address, amount: U256) -> Result<TxHash, PmtError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_approval {
            return Err(PmtError::ApprovalSubmissionFailed(
                "user rejected the request".to_string(),
            ));
        }
        state.approvals.push((spender, amount));
        state.pending = Some(amount);
        state.reads_since_approval = 0;
        Ok(APPROVAL_TX)
    }

    async fn wait_for_confirmation(&self, tx: TxHash) -> Result<Confirmation, PmtError> {
        self.state.lock().unwrap().confirmed.push(tx);
        Ok(Confirmation {
            tx_hash: tx,
            block_number: Some(1),
        })
    }
}

fn approver(bridge: &Arc<MockBridge>) -> AutoApprover<MockBridge> {
    AutoApprover::new(bridge.clone(), SPENDER, AutoApproveConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_sufficient_allowance_takes_fast_path() {
    let bridge = Arc::new(MockBridge::new(150));
    let approver = approver(&bridge);
    let intents = AtomicUsize::new(0);
    let counter = &intents;

    let started = Instant::now();
    let tx = approver
        .execute_with_auto_approve(U256::from(100u64), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(INTENT_TX)
        })
        .await
        .unwrap();

    assert_eq!(tx, INTENT_TX);
    assert_eq!(intents.load(Ordering::SeqCst), 1);
    assert!(bridge.approvals().is_empty());
    assert_eq!(bridge.reads(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(approver.phase(), SequencePhase::Done);
}

#[tokio::test(start_paused = true)]
async fn test_exact_allowance_is_sufficient() {
    let bridge = Arc::new(MockBridge::new(100));
    let approver = approver(&bridge);

    approver
        .execute_with_auto_approve(U256::from(100u64), || async { Ok(INTENT_TX) })
        .await
        .unwrap();

    assert!(bridge.approvals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_zero_amount_never_approves() {
    let bridge = Arc::new(MockBridge::new(0));
    let approver = approver(&bridge);

    approver
        .execute_with_auto_approve(U256::ZERO, || async { Ok(INTENT_TX) })
        .await
        .unwrap();

    assert!(bridge.approvals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_short_allowance_approves_with_headroom_then_runs_intent() {
    let bridge = Arc::new(MockBridge::new(0));
    let approver = approver(&bridge);
    let required = U256::from(100u64);
    let observed_at_intent = Mutex::new(None);
    let (bridge_ref, observed) = (&bridge, &observed_at_intent);

    let tx = approver
        .execute_with_auto_approve(required, move || async move {
            *observed.lock().unwrap() = Some(bridge_ref.current());
            Ok(INTENT_TX)
        })
        .await
        .unwrap();

    assert_eq!(tx, INTENT_TX);
    assert_eq!(bridge.approvals(), vec![(SPENDER, U256::from(120u64))]);
    let seen = observed_at_intent.lock().unwrap().unwrap();
    assert!(seen >= required, "intent ran before the allowance landed");
}

#[tokio::test(start_paused = true)]
async fn test_polls_on_interval_until_allowance_lands() {
    let bridge = Arc::new(MockBridge::new(0).configure(|s| s.lands_after_reads = Some(3)));
    let approver = approver(&bridge);

    let started = Instant::now();
    approver
        .execute_with_auto_approve(U256::from(100u64), || async { Ok(INTENT_TX) })
        .await
        .unwrap();

    // Initial read plus three polls, two seconds apart.
    assert_eq!(bridge.reads(), 4);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_approval_that_never_lands_times_out() {
    let bridge = Arc::new(MockBridge::new(50).configure(|s| s.lands_after_reads = None));
    let approver = approver(&bridge);
    let intents = AtomicUsize::new(0);
    let counter = &intents;

    let started = Instant::now();
    let err = approver
        .execute_with_auto_approve(U256::from(100u64), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(INTENT_TX)
        })
        .await
        .unwrap_err();

    match err {
        PmtError::ApprovalTimeout {
            required,
            observed,
            waited_secs,
        } => {
            assert_eq!(required, U256::from(100u64));
            assert_eq!(observed, U256::from(50u64));
            assert_eq!(waited_secs, 30);
        }
        other => panic!("expected ApprovalTimeout, got {other:?}"),
    }
    assert_eq!(intents.load(Ordering::SeqCst), 0);
    assert_eq!(bridge.approvals(), vec![(SPENDER, U256::from(120u64))]);
    // One initial read, then at most 15 polls.
    assert_eq!(bridge.reads(), 16);
    assert!(started.elapsed() < Duration::from_secs(31));
    assert_eq!(approver.phase(), SequencePhase::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_approval_never_runs_intent() {
    let bridge = Arc::new(MockBridge::new(0).configure(|s| s.reject_approval = true));
    let approver = approver(&bridge);
    let intents = AtomicUsize::new(0);
    let counter = &intents;

    let err = approver
        .execute_with_auto_approve(U256::from(100u64), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(INTENT_TX)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PmtError::ApprovalSubmissionFailed(_)));
    assert_eq!(intents.load(Ordering::SeqCst), 0);
    assert_eq!(bridge.reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_account_fails_before_any_chain_access() {
    let bridge = Arc::new(MockBridge::disconnected());
    let approver = approver(&bridge);

    let err = approver
        .execute_with_auto_approve(U256::from(100u64), || async { Ok(INTENT_TX) })
        .await
        .unwrap_err();

    assert!(matches!(err, PmtError::NoAccountConnected));
    assert_eq!(bridge.reads(), 0);
    assert!(bridge.approvals().is_empty());
    assert!(matches!(
        approver.current_allowance().await,
        Err(PmtError::NoAccountConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_intent_error_is_surfaced_unchanged() {
    let bridge = Arc::new(MockBridge::new(0));
    let approver = approver(&bridge);

    let err = approver
        .execute_with_auto_approve(U256::from(100u64), || async {
            Err(PmtError::ChainError("processPayment reverted".to_string()))
        })
        .await
        .unwrap_err();

    match err {
        PmtError::ChainError(msg) => assert_eq!(msg, "processPayment reverted"),
        other => panic!("expected the intent's own error, got {other:?}"),
    }
    assert_eq!(bridge.approvals().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_call_reuses_headroom() {
    let bridge = Arc::new(MockBridge::new(0));
    let approver = approver(&bridge);
    let required = U256::from(100u64);

    approver
        .execute_with_auto_approve(required, || async { Ok(INTENT_TX) })
        .await
        .unwrap();
    approver
        .execute_with_auto_approve(required, || async { Ok(INTENT_TX) })
        .await
        .unwrap();

    assert_eq!(bridge.approvals().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_failures_are_tolerated() {
    let bridge = Arc::new(MockBridge::new(0).configure(|s| {
        s.failing_reads = 2;
        s.lands_after_reads = Some(3);
    }));
    let approver = approver(&bridge);

    let tx = approver
        .execute_with_auto_approve(U256::from(100u64), || async { Ok(INTENT_TX) })
        .await
        .unwrap();

    assert_eq!(tx, INTENT_TX);
    assert_eq!(bridge.approvals().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_race_harmlessly() {
    let bridge = Arc::new(MockBridge::new(0));
    let approver = approver(&bridge);
    let intents = AtomicUsize::new(0);
    let counter = &intents;
    let required = U256::from(100u64);

    let (a, b) = tokio::join!(
        approver.execute_with_auto_approve(required, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(INTENT_TX)
        }),
        approver.execute_with_auto_approve(required, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(INTENT_TX)
        }),
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(intents.load(Ordering::SeqCst), 2);
    // Each call may have approved on its own; approve overwrites, so the
    // final allowance is the same either way.
    let approvals = bridge.approvals();
    assert!((1..=2).contains(&approvals.len()));
    assert!(approvals
        .iter()
        .all(|(spender, amount)| *spender == SPENDER && *amount == U256::from(120u64)));
    assert_eq!(bridge.current(), U256::from(120u64));
    // Both calls share one phase channel; the last writer wins.
    assert_eq!(approver.phase(), SequencePhase::Done);
    assert!(!approver.is_approving());
}

#[tokio::test(start_paused = true)]
async fn test_custom_buffer_and_timing() {
    let bridge = Arc::new(MockBridge::new(0).configure(|s| s.lands_after_reads = None));
    let config = AutoApproveConfig {
        buffer_percent: 50,
        poll_interval: Duration::from_millis(500),
        timeout: Duration::from_secs(5),
    };
    let approver = AutoApprover::new(bridge.clone(), SPENDER, config);

    let err = approver
        .execute_with_auto_approve(U256::from(1000u64), || async { Ok(INTENT_TX) })
        .await
        .unwrap_err();

    assert!(matches!(err, PmtError::ApprovalTimeout { .. }));
    assert_eq!(bridge.approvals(), vec![(SPENDER, U256::from(1500u64))]);
    assert_eq!(bridge.reads(), 1 + 10);
}

#[tokio::test(start_paused = true)]
async fn test_phase_updates_are_observable() {
    let bridge = Arc::new(MockBridge::new(0).configure(|s| s.lands_after_reads = Some(2)));
    let approver = approver(&bridge);
    let mut phases = approver.subscribe();
    assert_eq!(*phases.borrow(), SequencePhase::Idle);
    assert!(!approver.is_approving());

    let approver_ref = &approver;
    let (result, approving_seen) = tokio::join!(
        approver.execute_with_auto_approve(U256::from(100u64), || async { Ok(INTENT_TX) }),
        async move {
            let mut seen = false;
            while phases.changed().await.is_ok() {
                let phase = *phases.borrow_and_update();
                if phase == SequencePhase::WaitingConfirmation {
                    seen = approver_ref.is_approving();
                }
                if phase.is_terminal() {
                    break;
                }
            }
            seen
        }
    );

    assert!(result.is_ok());
    assert!(approving_seen);
    assert_eq!(approver.phase(), SequencePhase::Done);
    assert!(!approver.is_approving());
}

#[tokio::test(start_paused = true)]
async fn test_allowance_landing_on_last_poll_still_runs_intent() {
    // Fifteenth poll happens exactly at the 30 s deadline.
    let bridge = Arc::new(MockBridge::new(0).configure(|s| s.lands_after_reads = Some(15)));
    let approver = approver(&bridge);

    let started = Instant::now();
    let tx = approver
        .execute_with_auto_approve(U256::from(100u64), || async { Ok(INTENT_TX) })
        .await
        .unwrap();

    assert_eq!(tx, INTENT_TX);
    assert_eq!(bridge.reads(), 16);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_zero_poll_interval_still_times_out() {
    let bridge = Arc::new(MockBridge::new(0).configure(|s| s.lands_after_reads = None));
    let config = AutoApproveConfig {
        poll_interval: Duration::ZERO,
        timeout: Duration::from_millis(200),
        ..AutoApproveConfig::default()
    };
    let approver = AutoApprover::new(bridge.clone(), SPENDER, config);
    assert_eq!(approver.config().poll_interval, pmt::auto_approve::MIN_POLL_INTERVAL);

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        approver.execute_with_auto_approve(U256::from(100u64), || async { Ok(INTENT_TX) }),
    )
    .await
    .expect("sequencer must honour its own timeout");

    assert!(matches!(result, Err(PmtError::ApprovalTimeout { .. })));
    // One initial read plus one poll per millisecond.
    assert!(bridge.reads() <= 1 + 200, "reads = {}", bridge.reads());
}

#[tokio::test(start_paused = true)]
async fn test_spend_approves_runs_intent_and_confirms() {
    let bridge = Arc::new(MockBridge::new(0));
    let approver = approver(&bridge);

    let confirmation = spend_with_auto_approve(
        &approver,
        &ChainConfig::default(),
        U256::from(100u64),
        || async { Ok(INTENT_TX) },
    )
    .await
    .unwrap();

    assert_eq!(confirmation.tx_hash, INTENT_TX);
    assert_eq!(bridge.approvals(), vec![(SPENDER, U256::from(120u64))]);
    // Only the spend itself is confirmed; the approval is tracked by allowance.
    assert_eq!(bridge.confirmed(), vec![INTENT_TX]);
}

#[tokio::test(start_paused = true)]
async fn test_spend_checks_balance_before_approving() {
    let bridge = Arc::new(MockBridge::new(0).configure(|s| s.balance = U256::from(50u64)));
    let approver = approver(&bridge);

    let err = spend_with_auto_approve(
        &approver,
        &ChainConfig::default(),
        U256::from(100u64),
        || async { Ok(INTENT_TX) },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PmtError::InvalidAmount(_)), "got {err:?}");
    assert_eq!(bridge.reads(), 0);
    assert!(bridge.approvals().is_empty());
    assert!(bridge.confirmed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_spend_on_wrong_network_signs_nothing() {
    let bridge = Arc::new(MockBridge::new(0).configure(|s| s.chain_id = 1));
    let approver = approver(&bridge);

    let err = spend_with_auto_approve(
        &approver,
        &ChainConfig::default(),
        U256::from(100u64),
        || async { Ok(INTENT_TX) },
    )
    .await
    .unwrap_err();

    match err {
        PmtError::WrongNetwork { expected, actual } => {
            assert_eq!(expected, SEPOLIA_CHAIN_ID);
            assert_eq!(actual, 1);
        }
        other => panic!("expected WrongNetwork, got {other:?}"),
    }
    assert!(bridge.approvals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_spend_without_account() {
    let bridge = Arc::new(MockBridge::disconnected());
    let approver = approver(&bridge);

    let err = spend_with_auto_approve(
        &approver,
        &ChainConfig::default(),
        U256::from(100u64),
        || async { Ok(INTENT_TX) },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PmtError::NoAccountConnected));
    assert!(bridge.approvals().is_empty());
}
