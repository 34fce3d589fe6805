use std::time::Duration;

use alloy::primitives::Address;

use crate::constants::{APPROVAL_BUFFER_PERCENT, APPROVAL_POLL_INTERVAL_MS, APPROVAL_TIMEOUT_SECS};
use crate::{ChainConfig, PmtError};

/// Tuning for the auto-approval sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoApproveConfig {
    /// Headroom, in percent, approved on top of the required amount.
    pub buffer_percent: u64,
    /// How often the allowance is re-read after an approval is submitted.
    pub poll_interval: Duration,
    /// How long to wait for the allowance to reach the required amount.
    pub timeout: Duration,
}

impl Default for AutoApproveConfig {
    fn default() -> Self {
        Self {
            buffer_percent: APPROVAL_BUFFER_PERCENT,
            poll_interval: Duration::from_millis(APPROVAL_POLL_INTERVAL_MS),
            timeout: Duration::from_secs(APPROVAL_TIMEOUT_SECS),
        }
    }
}

impl AutoApproveConfig {
    /// Load from `AUTO_APPROVE_BUFFER_PERCENT`, `AUTO_APPROVE_POLL_MS` and
    /// `AUTO_APPROVE_TIMEOUT_SECS`, falling back to the defaults.
    pub fn from_env() -> Result<Self, PmtError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, PmtError> {
        let defaults = Self::default();

        let buffer_percent =
            parse_var(&var, "AUTO_APPROVE_BUFFER_PERCENT")?.unwrap_or(defaults.buffer_percent);
        let poll_interval = parse_var(&var, "AUTO_APPROVE_POLL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);
        let timeout = parse_var(&var, "AUTO_APPROVE_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        if poll_interval.is_zero() {
            return Err(PmtError::ConfigError(
                "AUTO_APPROVE_POLL_MS must be greater than zero".to_string(),
            ));
        }
        if timeout < poll_interval {
            return Err(PmtError::ConfigError(format!(
                "AUTO_APPROVE_TIMEOUT_SECS ({}s) is shorter than the poll interval ({}ms)",
                timeout.as_secs(),
                poll_interval.as_millis()
            )));
        }

        Ok(Self {
            buffer_percent,
            poll_interval,
            timeout,
        })
    }

    /// Upper bound on allowance re-reads per invocation.
    pub fn max_polls(&self) -> u64 {
        (self.timeout.as_millis() / self.poll_interval.as_millis().max(1)) as u64
    }
}

/// Everything the `pmt` binary needs: signer, chain and sequencer settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub private_key: Option<String>,
    pub chain: ChainConfig,
    pub auto_approve: AutoApproveConfig,
}

impl AppConfig {
    /// Load from the process environment. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> Result<Self, PmtError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, PmtError> {
        let defaults = ChainConfig::default();

        let private_key = var("PRIVATE_KEY").filter(|s| !s.trim().is_empty());

        let chain = ChainConfig {
            chain_id: parse_var(&var, "CHAIN_ID")?.unwrap_or(defaults.chain_id),
            rpc_url: var("RPC_URL")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.rpc_url),
            explorer_base: var("EXPLORER_BASE")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.explorer_base),
            token: parse_var::<Address>(&var, "PAYMENT_TOKEN_ADDRESS")?.unwrap_or(defaults.token),
            token_decimals: parse_var(&var, "TOKEN_DECIMALS")?.unwrap_or(defaults.token_decimals),
            escrow: parse_var::<Address>(&var, "ESCROW_PAYMENT_ADDRESS")?
                .unwrap_or(defaults.escrow),
            cashback: parse_var::<Address>(&var, "CASHBACK_REWARDS_ADDRESS")?,
            royalty: parse_var::<Address>(&var, "ROYALTY_DISTRIBUTOR_ADDRESS")?,
        };

        Ok(Self {
            private_key,
            chain,
            auto_approve: AutoApproveConfig::from_vars(&var)?,
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, PmtError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| PmtError::ConfigError(format!("invalid {key}: {e}"))),
        _ => Ok(None),
    }
}
