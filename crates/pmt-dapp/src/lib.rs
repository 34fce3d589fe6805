//! Client for the PMT payment token and the escrow, cashback and royalty
//! contracts deployed on Sepolia.
//!
//! The contracts hold all business rules. This crate reads their state,
//! submits signed transactions through an alloy provider, and sequences the
//! token approval that spending calls depend on.
//!
//! # Auto-approval
//!
//! [`AutoApprover`] wraps a spending transaction (the *intent*). It reads the
//! on-chain allowance for the bound spender and, only when it is short,
//! submits one `approve` for the required amount plus 20% headroom, waits
//! until the new allowance is observable, and then runs the intent.
//!
//! ```no_run
//! use std::sync::Arc;
//! use alloy::network::EthereumWallet;
//! use alloy::primitives::U256;
//! use alloy::providers::ProviderBuilder;
//! use alloy::signers::local::PrivateKeySigner;
//! use pmt::{AutoApproveConfig, AutoApprover, ChainConfig, ProviderBridge};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), pmt::PmtError> {
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse().unwrap();
//! let account = signer.address();
//! let chain = ChainConfig::default();
//! let provider = ProviderBuilder::new()
//!     .wallet(EthereumWallet::from(signer))
//!     .connect_http(chain.rpc_url.parse().unwrap());
//!
//! let bridge = Arc::new(ProviderBridge::new(provider, chain.token, Some(account)));
//! let approver = AutoApprover::new(bridge.clone(), chain.escrow, AutoApproveConfig::default());
//!
//! let amount = U256::from(10u64).pow(U256::from(18u64));
//! let tx = approver
//!     .execute_with_auto_approve(amount, || {
//!         pmt::escrow::create_order(bridge.provider(), chain.escrow, account, amount)
//!     })
//!     .await?;
//! println!("{}", chain.tx_url(&tx));
//! # Ok(())
//! # }
//! ```

pub mod auto_approve;
pub mod bridge;
pub mod cashback;
pub mod config;
pub mod constants;
pub mod dapp;
pub mod error;
pub mod escrow;
pub mod network;
pub mod receipt;
pub mod royalty;
pub mod token;

use alloy::sol;

// PaymentToken (ERC-20 compatible, with a test faucet).
sol! {
    #[sol(rpc)]
    interface PaymentToken {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function faucet() external;
        function FAUCET_AMOUNT() external view returns (uint256);

        event FaucetUsed(address indexed recipient, uint256 amount);
    }
}

// Staged-payment escrow between a customer and a provider.
sol! {
    #[sol(rpc)]
    interface OrderEscrow {
        #[derive(Debug)]
        struct Order {
            uint256 orderId;
            address customer;
            address provider;
            uint256 totalAmount;
            uint256 firstPayment;
            uint256 secondPayment;
            uint8 status;
            uint256 createdAt;
            uint256 shippedAt;
            uint256 deadline;
            bool firstPaymentReleased;
            bool secondPaymentReleased;
        }

        function createOrder(address provider, uint256 amount) external returns (uint256 orderId);
        function markAsShipped(uint256 orderId) external;
        function confirmDelivery(uint256 orderId) external;
        function requestRefund(uint256 orderId) external;
        function disputeOrder(uint256 orderId) external;
        function getOrder(uint256 orderId) external view returns (Order memory order);
        function orderCounter() external view returns (uint256);
    }
}

// Points-and-cashback rewards on token payments.
sol! {
    #[sol(rpc)]
    interface CashbackRewards {
        function processPayment(uint256 amount, address recipient) external;
        function redeemPoints(uint256 points) external;
        function userPoints(address user) external view returns (uint256);
        function rewardConfig() external view returns (bool active, uint256 cashbackRate, uint256 pointsRate);
    }
}

// Splits a royalty payment among the beneficiaries registered for a work.
sol! {
    #[sol(rpc)]
    interface RoyaltyDistributor {
        function setBeneficiaries(string workId, address[] beneficiaries, uint256[] shares) external;
        function distributeRoyalties(string workId, address token, uint256 amount) external;
        function previewDistribution(string workId, uint256 amount)
            external
            view
            returns (address[] recipients, uint256[] amounts);

        event BeneficiariesUpdated(string workId, address[] beneficiaries, uint256[] shares);
        event RoyaltiesDistributed(string workId, address token, uint256 amount);
    }
}

// Re-exports
pub use auto_approve::{approval_amount, AutoApprover, PendingApproval, SequencePhase};
pub use bridge::{Confirmation, ProviderBridge, WalletBridge};
pub use config::{AppConfig, AutoApproveConfig};
pub use constants::ChainConfig;
pub use constants::*;
pub use dapp::{spend_with_auto_approve, Dapp};
pub use error::PmtError;
pub use network::NetworkStatus;
