//! Expected-network checks.
//!
//! Writes are only meaningful on the network the contracts are deployed to.
//! The sequencer assumes the wallet is already there; callers check it with
//! [`ensure_expected_network`] before submitting anything.

use serde::Serialize;

use crate::bridge::WalletBridge;
use crate::PmtError;

/// Connected vs. expected chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub current_chain_id: u64,
    pub expected_chain_id: u64,
}

impl NetworkStatus {
    pub fn is_correct(&self) -> bool {
        self.current_chain_id == self.expected_chain_id
    }

    /// True when a wallet is connected to some other chain.
    pub fn is_wrong(&self, connected: bool) -> bool {
        connected && !self.is_correct()
    }
}

/// Read the wallet's chain id and compare it with `expected`.
pub async fn network_status<B: WalletBridge>(
    bridge: &B,
    expected: u64,
) -> Result<NetworkStatus, PmtError> {
    let current = bridge.chain_id().await?;
    Ok(NetworkStatus {
        current_chain_id: current,
        expected_chain_id: expected,
    })
}

/// Fail with [`PmtError::WrongNetwork`] unless the wallet is on `expected`.
pub async fn ensure_expected_network<B: WalletBridge>(
    bridge: &B,
    expected: u64,
) -> Result<NetworkStatus, PmtError> {
    let status = network_status(bridge, expected).await?;
    if !status.is_correct() {
        tracing::warn!(
            current = status.current_chain_id,
            expected,
            "wallet connected to the wrong network"
        );
        return Err(PmtError::WrongNetwork {
            expected,
            actual: status.current_chain_id,
        });
    }
    Ok(status)
}
