use alloy::primitives::U256;
use thiserror::Error;

/// Errors returned by PMT client operations.
///
/// Each failure path of a contract interaction maps to its own variant so a
/// front end can render a specific message and let the user retry from scratch.
#[derive(Debug, Error)]
pub enum PmtError {
    #[error("no wallet account connected")]
    NoAccountConnected,

    #[error("approval submission failed: {0}")]
    ApprovalSubmissionFailed(String),

    #[error("timed out after {waited_secs}s waiting for allowance {observed} to reach {required}")]
    ApprovalTimeout {
        required: U256,
        observed: U256,
        waited_secs: u64,
    },

    #[error("chain error: {0}")]
    ChainError(String),

    #[error("transaction {0} reverted")]
    TransactionReverted(String),

    #[error("transaction {tx} not confirmed after {waited_secs}s")]
    ConfirmationTimeout { tx: String, waited_secs: u64 },

    #[error("wrong network: connected to chain {actual}, expected {expected}")]
    WrongNetwork { expected: u64, actual: u64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
