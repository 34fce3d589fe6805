//! The wallet/provider seam.
//!
//! - [`WalletBridge`]: the primitives the auto-approval sequencer needs:
//!   connected account, chain id, balance and allowance reads, approval
//!   submission and receipt confirmation
//! - [`ProviderBridge`]: the alloy implementation over any signing
//!   [`Provider`] and the payment token contract

use std::future::Future;
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use serde::Serialize;

use crate::constants::{RECEIPT_POLL_INTERVAL_MS, RECEIPT_TIMEOUT_SECS};
use crate::{receipt, token, PmtError};

/// A transaction that reached at least one confirmation and did not revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

/// Access to the connected wallet and the payment token it approves.
pub trait WalletBridge: Send + Sync {
    /// The connected account, if any.
    fn account(&self) -> Option<Address>;

    /// Chain id the wallet is currently connected to.
    fn chain_id(&self) -> impl Future<Output = Result<u64, PmtError>> + Send;

    /// Token balance of `owner`.
    fn balance_of(&self, owner: Address) -> impl Future<Output = Result<U256, PmtError>> + Send;

    /// Read the token allowance `owner` has granted `spender`.
    fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> impl Future<Output = Result<U256, PmtError>> + Send;

    /// Sign and submit `approve(spender, amount)` on the token. Resolves once
    /// the transaction is submitted, not once it is mined.
    fn approve(
        &self,
        spender: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxHash, PmtError>> + Send;

    /// Wait for a submitted transaction to be confirmed.
    fn wait_for_confirmation(
        &self,
        tx: TxHash,
    ) -> impl Future<Output = Result<Confirmation, PmtError>> + Send;
}

/// [`WalletBridge`] backed by an alloy provider with a wallet attached.
pub struct ProviderBridge<P> {
    provider: P,
    token: Address,
    account: Option<Address>,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl<P> ProviderBridge<P> {
    /// `account` is the address the provider's wallet signs for; `None`
    /// models a disconnected wallet.
    pub fn new(provider: P, token: Address, account: Option<Address>) -> Self {
        Self {
            provider,
            token,
            account,
            receipt_poll: Duration::from_millis(RECEIPT_POLL_INTERVAL_MS),
            receipt_timeout: Duration::from_secs(RECEIPT_TIMEOUT_SECS),
        }
    }

    /// Override how receipts are polled.
    pub fn with_receipt_timing(mut self, poll: Duration, timeout: Duration) -> Self {
        self.receipt_poll = poll;
        self.receipt_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn token(&self) -> Address {
        self.token
    }
}

impl<P: Provider> WalletBridge for ProviderBridge<P> {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn chain_id(&self) -> Result<u64, PmtError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| PmtError::ChainError(format!("eth_chainId failed: {e}")))
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, PmtError> {
        token::balance_of(&self.provider, self.token, owner).await
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, PmtError> {
        token::allowance(&self.provider, self.token, owner, spender).await
    }

    async fn approve(&self, spender: Address, amount: U256) -> Result<TxHash, PmtError> {
        if self.account.is_none() {
            return Err(PmtError::NoAccountConnected);
        }
        token::approve(&self.provider, self.token, spender, amount).await
    }

    async fn wait_for_confirmation(&self, tx: TxHash) -> Result<Confirmation, PmtError> {
        receipt::wait_for_confirmation(&self.provider, tx, self.receipt_poll, self.receipt_timeout)
            .await
    }
}
