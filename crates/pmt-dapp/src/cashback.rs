use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use serde::Serialize;

use crate::constants::gas;
use crate::{CashbackRewards, PmtError};

/// Reward parameters published by the cashback contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardConfig {
    pub active: bool,
    /// Cashback, in percent of the payment.
    pub cashback_rate: U256,
    /// Points credited per whole token paid.
    pub points_rate: U256,
}

/// Submit `processPayment(amount, recipient)`. The contract pulls `amount`
/// from the sender, so the allowance must already cover it.
pub async fn process_payment<P: Provider>(
    provider: &P,
    cashback: Address,
    amount: U256,
    recipient: Address,
) -> Result<TxHash, PmtError> {
    if recipient == Address::ZERO {
        return Err(PmtError::InvalidInput(
            "payment recipient cannot be zero".to_string(),
        ));
    }
    let contract = CashbackRewards::new(cashback, provider);
    let pending = contract
        .processPayment(amount, recipient)
        .gas(gas::PROCESS_PAYMENT)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("processPayment send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

/// Submit `redeemPoints(points)`. Points carry no decimals.
pub async fn redeem_points<P: Provider>(
    provider: &P,
    cashback: Address,
    points: U256,
) -> Result<TxHash, PmtError> {
    if points.is_zero() {
        return Err(PmtError::InvalidAmount("points must be greater than zero".to_string()));
    }
    let contract = CashbackRewards::new(cashback, provider);
    let pending = contract
        .redeemPoints(points)
        .gas(gas::REDEEM_POINTS)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("redeemPoints send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

pub async fn user_points<P: Provider>(
    provider: &P,
    cashback: Address,
    user: Address,
) -> Result<U256, PmtError> {
    let contract = CashbackRewards::new(cashback, provider);
    contract
        .userPoints(user)
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("userPoints failed: {e}")))
}

pub async fn reward_config<P: Provider>(
    provider: &P,
    cashback: Address,
) -> Result<RewardConfig, PmtError> {
    let contract = CashbackRewards::new(cashback, provider);
    let raw = contract
        .rewardConfig()
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("rewardConfig failed: {e}")))?;
    Ok(RewardConfig {
        active: raw.active,
        cashback_rate: raw.cashbackRate,
        points_rate: raw.pointsRate,
    })
}
