//! One handle for every contract flow of the PMT dApp.
//!
//! [`Dapp`] holds the wallet bridge, the chain configuration and one
//! [`AutoApprover`] per spender contract. Spending flows go through
//! [`spend_with_auto_approve`]; every write checks the network first and
//! waits for its receipt.

use std::future::Future;
use std::sync::Arc;

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;

use crate::bridge::{Confirmation, ProviderBridge, WalletBridge};
use crate::cashback::RewardConfig;
use crate::escrow::Order;
use crate::network::{ensure_expected_network, network_status, NetworkStatus};
use crate::royalty::{Beneficiary, Payout};
use crate::token::TokenMetadata;
use crate::{cashback, escrow, royalty, token};
use crate::{AutoApproveConfig, AutoApprover, ChainConfig, PmtError};

/// Run one spend end to end.
///
/// Checks that an account is connected, that the wallet is on
/// `chain.chain_id` and that the balance covers `amount`. Then runs `intent`
/// through `approver` and waits for the intent's receipt. Nothing is signed
/// unless every check passes.
pub async fn spend_with_auto_approve<B, F, Fut>(
    approver: &AutoApprover<B>,
    chain: &ChainConfig,
    amount: U256,
    intent: F,
) -> Result<Confirmation, PmtError>
where
    B: WalletBridge,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<TxHash, PmtError>>,
{
    let bridge = approver.bridge();
    let owner = bridge.account().ok_or(PmtError::NoAccountConnected)?;
    ensure_expected_network(bridge, chain.chain_id).await?;
    ensure_balance(bridge, chain, owner, amount).await?;

    let tx = approver.execute_with_auto_approve(amount, intent).await?;
    tracing::info!(%tx, url = %chain.tx_url(&tx), "waiting for confirmation");
    bridge.wait_for_confirmation(tx).await
}

/// Reject spends larger than the account balance before asking for an
/// approval that could never be used.
async fn ensure_balance<B: WalletBridge>(
    bridge: &B,
    chain: &ChainConfig,
    owner: Address,
    amount: U256,
) -> Result<(), PmtError> {
    let balance = bridge.balance_of(owner).await?;
    if amount > balance {
        return Err(PmtError::InvalidAmount(format!(
            "insufficient balance: have {}, need {}",
            token::format_amount(balance, chain.token_decimals),
            token::format_amount(amount, chain.token_decimals),
        )));
    }
    Ok(())
}

fn require_nonzero(address: Address, what: &str) -> Result<(), PmtError> {
    if address == Address::ZERO {
        return Err(PmtError::InvalidInput(format!("{what} cannot be zero")));
    }
    Ok(())
}

pub struct Dapp<P> {
    bridge: Arc<ProviderBridge<P>>,
    chain: ChainConfig,
    escrow: AutoApprover<ProviderBridge<P>>,
    cashback: Option<AutoApprover<ProviderBridge<P>>>,
    royalty: Option<AutoApprover<ProviderBridge<P>>>,
}

impl<P: Provider> Dapp<P> {
    pub fn new(
        provider: P,
        account: Option<Address>,
        chain: ChainConfig,
        auto_approve: AutoApproveConfig,
    ) -> Self {
        let bridge = Arc::new(ProviderBridge::new(provider, chain.token, account));
        Self::with_bridge(bridge, chain, auto_approve)
    }

    pub fn with_bridge(
        bridge: Arc<ProviderBridge<P>>,
        chain: ChainConfig,
        auto_approve: AutoApproveConfig,
    ) -> Self {
        let approver =
            |spender: Address| AutoApprover::new(bridge.clone(), spender, auto_approve.clone());
        Self {
            escrow: approver(chain.escrow),
            cashback: chain.cashback.map(approver),
            royalty: chain.royalty.map(approver),
            bridge: bridge.clone(),
            chain,
        }
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub fn bridge(&self) -> &ProviderBridge<P> {
        &self.bridge
    }

    pub fn account(&self) -> Option<Address> {
        self.bridge.account()
    }

    /// Sequencer bound to the escrow contract.
    pub fn escrow_approver(&self) -> &AutoApprover<ProviderBridge<P>> {
        &self.escrow
    }

    pub fn tx_url(&self, tx: &TxHash) -> String {
        self.chain.tx_url(tx)
    }

    fn require_account(&self) -> Result<Address, PmtError> {
        self.bridge.account().ok_or(PmtError::NoAccountConnected)
    }

    fn cashback_approver(&self) -> Result<&AutoApprover<ProviderBridge<P>>, PmtError> {
        self.cashback.as_ref().ok_or_else(|| {
            PmtError::ConfigError("CASHBACK_REWARDS_ADDRESS is not configured".to_string())
        })
    }

    fn royalty_approver(&self) -> Result<&AutoApprover<ProviderBridge<P>>, PmtError> {
        self.royalty.as_ref().ok_or_else(|| {
            PmtError::ConfigError("ROYALTY_DISTRIBUTOR_ADDRESS is not configured".to_string())
        })
    }

    /// Checks run before any write: account connected, right network.
    async fn preflight(&self) -> Result<Address, PmtError> {
        let account = self.require_account()?;
        ensure_expected_network(self.bridge.as_ref(), self.chain.chain_id).await?;
        Ok(account)
    }

    async fn confirm(&self, tx: TxHash) -> Result<Confirmation, PmtError> {
        tracing::info!(%tx, url = %self.chain.tx_url(&tx), "waiting for confirmation");
        self.bridge.wait_for_confirmation(tx).await
    }

    pub async fn network_status(&self) -> Result<NetworkStatus, PmtError> {
        network_status(self.bridge.as_ref(), self.chain.chain_id).await
    }

    // --- Token ---

    pub async fn token_metadata(&self) -> Result<TokenMetadata, PmtError> {
        token::metadata(self.bridge.provider(), self.chain.token).await
    }

    pub async fn balance(&self) -> Result<U256, PmtError> {
        let owner = self.require_account()?;
        token::balance_of(self.bridge.provider(), self.chain.token, owner).await
    }

    pub async fn allowance(&self, spender: Address) -> Result<U256, PmtError> {
        let owner = self.require_account()?;
        self.bridge.allowance(owner, spender).await
    }

    pub async fn faucet(&self) -> Result<Confirmation, PmtError> {
        self.preflight().await?;
        let tx = token::faucet(self.bridge.provider(), self.chain.token).await?;
        self.confirm(tx).await
    }

    pub async fn transfer(&self, to: Address, amount: U256) -> Result<Confirmation, PmtError> {
        require_nonzero(to, "transfer recipient")?;
        let owner = self.preflight().await?;
        ensure_balance(self.bridge.as_ref(), &self.chain, owner, amount).await?;
        let tx = token::transfer(self.bridge.provider(), self.chain.token, to, amount).await?;
        self.confirm(tx).await
    }

    /// Manual approval of an exact amount, outside the sequencer.
    pub async fn approve(&self, spender: Address, amount: U256) -> Result<Confirmation, PmtError> {
        self.preflight().await?;
        let tx = self.bridge.approve(spender, amount).await?;
        self.confirm(tx).await
    }

    // --- Escrow ---

    /// Lock `amount` in a new escrow order for `seller`, approving first if needed.
    pub async fn create_order(
        &self,
        seller: Address,
        amount: U256,
    ) -> Result<Confirmation, PmtError> {
        require_nonzero(seller, "provider address")?;
        let contract = self.chain.escrow;
        spend_with_auto_approve(&self.escrow, &self.chain, amount, || {
            escrow::create_order(self.bridge.provider(), contract, seller, amount)
        })
        .await
    }

    pub async fn mark_as_shipped(&self, order_id: U256) -> Result<Confirmation, PmtError> {
        self.preflight().await?;
        let tx = escrow::mark_as_shipped(self.bridge.provider(), self.chain.escrow, order_id).await?;
        self.confirm(tx).await
    }

    pub async fn confirm_delivery(&self, order_id: U256) -> Result<Confirmation, PmtError> {
        self.preflight().await?;
        let tx =
            escrow::confirm_delivery(self.bridge.provider(), self.chain.escrow, order_id).await?;
        self.confirm(tx).await
    }

    pub async fn request_refund(&self, order_id: U256) -> Result<Confirmation, PmtError> {
        self.preflight().await?;
        let tx = escrow::request_refund(self.bridge.provider(), self.chain.escrow, order_id).await?;
        self.confirm(tx).await
    }

    pub async fn dispute_order(&self, order_id: U256) -> Result<Confirmation, PmtError> {
        self.preflight().await?;
        let tx = escrow::dispute_order(self.bridge.provider(), self.chain.escrow, order_id).await?;
        self.confirm(tx).await
    }

    pub async fn order(&self, order_id: U256) -> Result<Order, PmtError> {
        escrow::get_order(self.bridge.provider(), self.chain.escrow, order_id).await
    }

    pub async fn order_counter(&self) -> Result<U256, PmtError> {
        escrow::order_counter(self.bridge.provider(), self.chain.escrow).await
    }

    // --- Cashback ---

    /// Pay `recipient` through the cashback contract, earning points.
    pub async fn pay_with_cashback(
        &self,
        amount: U256,
        recipient: Address,
    ) -> Result<Confirmation, PmtError> {
        let approver = self.cashback_approver()?;
        require_nonzero(recipient, "payment recipient")?;
        let contract = approver.spender();
        spend_with_auto_approve(approver, &self.chain, amount, || {
            cashback::process_payment(self.bridge.provider(), contract, amount, recipient)
        })
        .await
    }

    pub async fn redeem_points(&self, points: U256) -> Result<Confirmation, PmtError> {
        let contract = self.cashback_approver()?.spender();
        self.preflight().await?;
        let tx = cashback::redeem_points(self.bridge.provider(), contract, points).await?;
        self.confirm(tx).await
    }

    pub async fn points(&self) -> Result<U256, PmtError> {
        let contract = self.cashback_approver()?.spender();
        let owner = self.require_account()?;
        cashback::user_points(self.bridge.provider(), contract, owner).await
    }

    pub async fn reward_config(&self) -> Result<RewardConfig, PmtError> {
        let contract = self.cashback_approver()?.spender();
        cashback::reward_config(self.bridge.provider(), contract).await
    }

    // --- Royalties ---

    pub async fn set_beneficiaries(
        &self,
        work_id: &str,
        beneficiaries: &[Beneficiary],
    ) -> Result<Confirmation, PmtError> {
        let contract = self.royalty_approver()?.spender();
        royalty::validate_beneficiaries(work_id, beneficiaries)?;
        self.preflight().await?;
        let tx =
            royalty::set_beneficiaries(self.bridge.provider(), contract, work_id, beneficiaries)
                .await?;
        self.confirm(tx).await
    }

    /// Distribute `amount` of the payment token among the beneficiaries of
    /// `work_id`, approving the distributor first if needed.
    pub async fn distribute_royalties(
        &self,
        work_id: &str,
        amount: U256,
    ) -> Result<Confirmation, PmtError> {
        let approver = self.royalty_approver()?;
        royalty::validate_work_id(work_id)?;
        let contract = approver.spender();
        let token = self.chain.token;
        spend_with_auto_approve(approver, &self.chain, amount, || {
            royalty::distribute_royalties(self.bridge.provider(), contract, work_id, token, amount)
        })
        .await
    }

    pub async fn preview_distribution(
        &self,
        work_id: &str,
        amount: U256,
    ) -> Result<Vec<Payout>, PmtError> {
        let contract = self.royalty_approver()?.spender();
        royalty::preview_distribution(self.bridge.provider(), contract, work_id, amount).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::network::EthereumWallet;
    use alloy::providers::ProviderBuilder;
    use alloy::signers::local::PrivateKeySigner;

    fn offline_dapp(chain: ChainConfig, account: Option<Address>) -> Dapp<impl Provider> {
        let signer = PrivateKeySigner::random();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http("http://localhost:1".parse().unwrap());
        Dapp::new(provider, account, chain, AutoApproveConfig::default())
    }

    #[tokio::test]
    async fn test_unconfigured_cashback_is_config_error() {
        let dapp = offline_dapp(ChainConfig::default(), Some(Address::repeat_byte(1)));
        let err = dapp
            .pay_with_cashback(U256::from(1u64), Address::repeat_byte(2))
            .await
            .unwrap_err();
        assert!(matches!(err, PmtError::ConfigError(_)));

        let err = dapp.preview_distribution("default", U256::from(1u64)).await.unwrap_err();
        assert!(matches!(err, PmtError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_writes_require_account() {
        let dapp = offline_dapp(ChainConfig::default(), None);
        let err = dapp
            .create_order(Address::repeat_byte(2), U256::from(1u64))
            .await
            .unwrap_err();
        assert!(matches!(err, PmtError::NoAccountConnected));
        assert!(matches!(dapp.balance().await, Err(PmtError::NoAccountConnected)));
    }

    #[tokio::test]
    async fn test_invalid_spend_arguments_fail_before_any_rpc() {
        // The provider is unreachable: reaching the network check or the
        // sequencer would surface as ChainError instead.
        let chain = ChainConfig {
            cashback: Some(Address::repeat_byte(0xcb)),
            royalty: Some(Address::repeat_byte(0x7a)),
            ..ChainConfig::default()
        };
        let dapp = offline_dapp(chain, Some(Address::repeat_byte(1)));
        let amount = U256::from(100u64);

        let err = dapp.create_order(Address::ZERO, amount).await.unwrap_err();
        assert!(matches!(err, PmtError::InvalidInput(_)), "got {err:?}");

        let err = dapp.pay_with_cashback(amount, Address::ZERO).await.unwrap_err();
        assert!(matches!(err, PmtError::InvalidInput(_)), "got {err:?}");

        let err = dapp.distribute_royalties(" ", amount).await.unwrap_err();
        assert!(matches!(err, PmtError::InvalidInput(_)), "got {err:?}");

        let err = dapp.transfer(Address::ZERO, amount).await.unwrap_err();
        assert!(matches!(err, PmtError::InvalidInput(_)), "got {err:?}");
    }

    #[test]
    fn test_approvers_bound_to_configured_spenders() {
        let chain = ChainConfig {
            cashback: Some(Address::repeat_byte(0xcb)),
            ..ChainConfig::default()
        };
        let dapp = offline_dapp(chain, None);
        assert_eq!(dapp.escrow_approver().spender(), crate::ESCROW_PAYMENT_ADDRESS);
        assert_eq!(
            dapp.cashback_approver().unwrap().spender(),
            Address::repeat_byte(0xcb)
        );
        assert!(dapp.royalty_approver().is_err());
    }
}
