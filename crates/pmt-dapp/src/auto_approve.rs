//! Auto-approval sequencing for spending transactions.
//!
//! A spending call (escrow order, cashback payment, royalty distribution)
//! pulls tokens from the caller through `transferFrom`, so the spender
//! contract needs a sufficient allowance first. [`AutoApprover`] decides
//! whether an approval is needed, submits it, waits until the new allowance
//! is observable on chain, and only then runs the caller's transaction.
//!
//! Every decision re-reads the allowance from the chain. Concurrent
//! invocations do not coordinate: two racing calls may each submit an
//! approval, which is harmless because `approve` overwrites rather than adds.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::bridge::WalletBridge;
use crate::config::AutoApproveConfig;
use crate::PmtError;

/// Shortest allowance poll interval the sequencer will use.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Where an invocation currently is.
///
/// `Idle -> CheckingAllowance -> InvokingIntent` on the fast path,
/// `Idle -> CheckingAllowance -> Approving -> WaitingConfirmation -> InvokingIntent`
/// otherwise, ending in `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePhase {
    Idle,
    CheckingAllowance,
    Approving,
    WaitingConfirmation,
    InvokingIntent,
    Done,
    Failed,
}

impl SequencePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// An approval submitted by the sequencer and not yet observed on chain.
/// Lives only for the duration of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub spender: Address,
    /// Allowance the intent needs.
    pub required: U256,
    /// Allowance requested by the approval (required plus headroom).
    pub amount: U256,
    pub tx_hash: TxHash,
    pub granted: bool,
}

/// Allowance to request for `required`: `floor(required * (100 + buffer_percent) / 100)`,
/// saturating at `U256::MAX`.
pub fn approval_amount(required: U256, buffer_percent: u64) -> U256 {
    let hundred = U256::from(100u64);
    let factor = U256::from(100u64) + U256::from(buffer_percent);
    let (whole, rest) = (required / hundred, required % hundred);
    whole
        .checked_mul(factor)
        .and_then(|scaled| scaled.checked_add(rest * factor / hundred))
        .unwrap_or(U256::MAX)
}

/// Runs transactions against one spender, approving the payment token first
/// when the current allowance is short.
pub struct AutoApprover<B> {
    bridge: Arc<B>,
    spender: Address,
    config: AutoApproveConfig,
    phase: watch::Sender<SequencePhase>,
}

impl<B: WalletBridge> AutoApprover<B> {
    /// A `poll_interval` below [`MIN_POLL_INTERVAL`] is raised to it.
    pub fn new(bridge: Arc<B>, spender: Address, mut config: AutoApproveConfig) -> Self {
        if config.poll_interval < MIN_POLL_INTERVAL {
            tracing::warn!(
                poll_interval_ms = config.poll_interval.as_millis() as u64,
                "auto-approve poll interval too short, using 1ms"
            );
            config.poll_interval = MIN_POLL_INTERVAL;
        }
        let (phase, _) = watch::channel(SequencePhase::Idle);
        Self {
            bridge,
            spender,
            config,
            phase,
        }
    }

    pub fn spender(&self) -> Address {
        self.spender
    }

    pub fn config(&self) -> &AutoApproveConfig {
        &self.config
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Follow the phase of this approver.
    ///
    /// All invocations share one channel, so with concurrent calls the
    /// receiver sees whichever invocation changed phase last. A call that is
    /// still waiting for its approval can be hidden behind another call that
    /// already reached `Done`.
    pub fn subscribe(&self) -> watch::Receiver<SequencePhase> {
        self.phase.subscribe()
    }

    /// Last phase written by any invocation; see [`Self::subscribe`].
    pub fn phase(&self) -> SequencePhase {
        *self.phase.borrow()
    }

    /// True while the most recently updated invocation is submitting or
    /// awaiting an approval. Not a lock: concurrent calls do not consult it.
    pub fn is_approving(&self) -> bool {
        matches!(
            self.phase(),
            SequencePhase::Approving | SequencePhase::WaitingConfirmation
        )
    }

    /// Current allowance of the connected account for this spender.
    pub async fn current_allowance(&self) -> Result<U256, PmtError> {
        let owner = self.bridge.account().ok_or(PmtError::NoAccountConnected)?;
        self.bridge.allowance(owner, self.spender).await
    }

    /// Run `intent` once the spender's allowance covers `required`.
    ///
    /// Submits at most one approval, for `required` plus the configured
    /// headroom, and invokes `intent` at most once, strictly after an
    /// allowance read has shown it to be sufficient. Errors returned by
    /// `intent` are passed through untouched; nothing is retried.
    pub async fn execute_with_auto_approve<F, Fut>(
        &self,
        required: U256,
        intent: F,
    ) -> Result<TxHash, PmtError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TxHash, PmtError>>,
    {
        let result = self.sequence(required, intent).await;
        match &result {
            Ok(_) => self.set_phase(SequencePhase::Done),
            Err(e) => {
                tracing::warn!(spender = %self.spender, %required, error = %e, "auto-approve sequence failed");
                self.set_phase(SequencePhase::Failed);
            }
        }
        result
    }

    async fn sequence<F, Fut>(&self, required: U256, intent: F) -> Result<TxHash, PmtError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TxHash, PmtError>>,
    {
        self.set_phase(SequencePhase::CheckingAllowance);
        let owner = self.bridge.account().ok_or(PmtError::NoAccountConnected)?;
        let current = self.bridge.allowance(owner, self.spender).await?;

        if current >= required {
            tracing::debug!(spender = %self.spender, %current, %required, "allowance sufficient");
            return self.invoke(intent).await;
        }

        let amount = approval_amount(required, self.config.buffer_percent);
        self.set_phase(SequencePhase::Approving);
        tracing::info!(spender = %self.spender, %current, %required, %amount, "approving spender");

        let tx_hash = self
            .bridge
            .approve(self.spender, amount)
            .await
            .map_err(|e| match e {
                PmtError::ApprovalSubmissionFailed(_) | PmtError::NoAccountConnected => e,
                other => PmtError::ApprovalSubmissionFailed(other.to_string()),
            })?;

        let mut pending = PendingApproval {
            spender: self.spender,
            required,
            amount,
            tx_hash,
            granted: false,
        };
        tracing::info!(tx = %pending.tx_hash, "approval submitted");

        self.set_phase(SequencePhase::WaitingConfirmation);
        self.await_allowance(owner, current, &mut pending).await?;

        self.invoke(intent).await
    }

    /// Re-read the allowance every poll interval until it covers
    /// `pending.required` or the timeout elapses.
    async fn await_allowance(
        &self,
        owner: Address,
        initial: U256,
        pending: &mut PendingApproval,
    ) -> Result<(), PmtError> {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut observed = initial;
        let mut next = started;
        let mut polls = 0u64;

        loop {
            next += self.config.poll_interval;
            if next > deadline || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep_until(next).await;
            polls += 1;

            match self.bridge.allowance(owner, pending.spender).await {
                Ok(allowance) => {
                    observed = allowance;
                    if allowance >= pending.required {
                        pending.granted = true;
                        tracing::info!(
                            tx = %pending.tx_hash,
                            %allowance,
                            polls,
                            "approval confirmed"
                        );
                        return Ok(());
                    }
                    tracing::debug!(tx = %pending.tx_hash, %allowance, polls, "approval pending");
                }
                Err(e) => {
                    tracing::warn!(tx = %pending.tx_hash, error = %e, polls, "allowance poll failed")
                }
            }
        }

        tracing::warn!(
            tx = %pending.tx_hash,
            %observed,
            required = %pending.required,
            polls,
            "approval not observed before timeout"
        );
        Err(PmtError::ApprovalTimeout {
            required: pending.required,
            observed,
            waited_secs: started.elapsed().as_secs(),
        })
    }

    async fn invoke<F, Fut>(&self, intent: F) -> Result<TxHash, PmtError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TxHash, PmtError>>,
    {
        self.set_phase(SequencePhase::InvokingIntent);
        let tx = intent().await?;
        tracing::info!(spender = %self.spender, %tx, "transaction submitted");
        Ok(tx)
    }

    fn set_phase(&self, phase: SequencePhase) {
        self.phase.send_replace(phase);
    }
}
