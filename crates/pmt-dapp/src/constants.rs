use alloy::primitives::{address, Address, TxHash};

/// Sepolia chain ID.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// PaymentToken (PMT) address on Sepolia.
pub const PAYMENT_TOKEN_ADDRESS: Address = address!("0xf00ebca89a14c4c9f5176a46394d965ee838e326");

/// OrderEscrow address on Sepolia.
pub const ESCROW_PAYMENT_ADDRESS: Address = address!("0x52315181b261c4bf92f46c6b5b62f911e95a9db1");

/// PMT has 18 decimal places.
pub const TOKEN_DECIMALS: u8 = 18;

/// Default public RPC endpoint for Sepolia.
pub const RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";

/// Block explorer base URL.
pub const EXPLORER_BASE: &str = "https://sepolia.etherscan.io";

/// Headroom added on top of the required amount when auto-approving.
pub const APPROVAL_BUFFER_PERCENT: u64 = 20;

/// Interval between allowance re-reads while an approval is pending.
pub const APPROVAL_POLL_INTERVAL_MS: u64 = 2_000;

/// Ceiling on how long to wait for an approval to show up on chain.
pub const APPROVAL_TIMEOUT_SECS: u64 = 30;

/// Ceiling on how long to wait for a transaction receipt.
pub const RECEIPT_TIMEOUT_SECS: u64 = 60;

/// Interval between receipt lookups.
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 2_000;

/// Royalty shares are expressed in basis points; 10000 is the whole amount.
pub const BASIS_POINTS_TOTAL: u64 = 10_000;

/// Fixed gas budgets per contract call.
pub mod gas {
    pub const APPROVE: u64 = 100_000;
    pub const TRANSFER: u64 = 100_000;
    pub const FAUCET: u64 = 100_000;
    pub const CREATE_ORDER: u64 = 200_000;
    pub const MARK_AS_SHIPPED: u64 = 100_000;
    pub const CONFIRM_DELIVERY: u64 = 150_000;
    pub const DISPUTE_ORDER: u64 = 100_000;
    pub const REQUEST_REFUND: u64 = 100_000;
    pub const PROCESS_PAYMENT: u64 = 200_000;
    pub const REDEEM_POINTS: u64 = 150_000;
}

/// Runtime chain configuration: which network and which contract deployments
/// the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_base: String,
    pub token: Address,
    pub token_decimals: u8,
    pub escrow: Address,
    /// The cashback and royalty deployments have no canonical address and
    /// must be supplied by configuration.
    pub cashback: Option<Address>,
    pub royalty: Option<Address>,
}

impl ChainConfig {
    /// Explorer link for a transaction.
    pub fn tx_url(&self, tx: &TxHash) -> String {
        format!("{}/tx/{tx}", self.explorer_base.trim_end_matches('/'))
    }

    /// Explorer link for an address.
    pub fn address_url(&self, addr: &Address) -> String {
        format!("{}/address/{addr}", self.explorer_base.trim_end_matches('/'))
    }
}

impl Default for ChainConfig {
    /// Defaults to the Sepolia deployments.
    fn default() -> Self {
        Self {
            chain_id: SEPOLIA_CHAIN_ID,
            rpc_url: RPC_URL.to_string(),
            explorer_base: EXPLORER_BASE.to_string(),
            token: PAYMENT_TOKEN_ADDRESS,
            token_decimals: TOKEN_DECIMALS,
            escrow: ESCROW_PAYMENT_ADDRESS,
            cashback: None,
            royalty: None,
        }
    }
}
