//! RoyaltyDistributor: per-work beneficiary lists and proportional payouts.
//!
//! Shares are basis points and must add up to exactly 10000. The contract
//! performs the split.

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use serde::Serialize;

use crate::constants::BASIS_POINTS_TOTAL;
use crate::{PmtError, RoyaltyDistributor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Beneficiary {
    pub address: Address,
    pub share_bps: u64,
}

/// One line of a distribution preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Payout {
    pub recipient: Address,
    pub amount: U256,
}

pub fn validate_work_id(work_id: &str) -> Result<(), PmtError> {
    if work_id.trim().is_empty() {
        return Err(PmtError::InvalidInput("work id is empty".to_string()));
    }
    Ok(())
}

pub fn validate_beneficiaries(work_id: &str, beneficiaries: &[Beneficiary]) -> Result<(), PmtError> {
    validate_work_id(work_id)?;
    if beneficiaries.is_empty() {
        return Err(PmtError::InvalidInput(
            "at least one beneficiary is required".to_string(),
        ));
    }
    let mut total = 0u64;
    for b in beneficiaries {
        if b.address == Address::ZERO {
            return Err(PmtError::InvalidInput(
                "beneficiary address cannot be zero".to_string(),
            ));
        }
        if b.share_bps == 0 {
            return Err(PmtError::InvalidInput(format!(
                "beneficiary {} has a zero share",
                b.address
            )));
        }
        total = total.saturating_add(b.share_bps);
    }
    if total != BASIS_POINTS_TOTAL {
        return Err(PmtError::InvalidInput(format!(
            "shares add up to {total} bps, expected exactly {BASIS_POINTS_TOTAL}"
        )));
    }
    Ok(())
}

/// Submit `setBeneficiaries(workId, addresses, shares)`.
pub async fn set_beneficiaries<P: Provider>(
    provider: &P,
    distributor: Address,
    work_id: &str,
    beneficiaries: &[Beneficiary],
) -> Result<TxHash, PmtError> {
    validate_beneficiaries(work_id, beneficiaries)?;
    let addresses: Vec<Address> = beneficiaries.iter().map(|b| b.address).collect();
    let shares: Vec<U256> = beneficiaries.iter().map(|b| U256::from(b.share_bps)).collect();

    let contract = RoyaltyDistributor::new(distributor, provider);
    let pending = contract
        .setBeneficiaries(work_id.to_string(), addresses, shares)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("setBeneficiaries send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

/// Submit `distributeRoyalties(workId, token, amount)`. The distributor pulls
/// `amount` of `token` from the sender, so the allowance must already cover it.
pub async fn distribute_royalties<P: Provider>(
    provider: &P,
    distributor: Address,
    work_id: &str,
    token: Address,
    amount: U256,
) -> Result<TxHash, PmtError> {
    validate_work_id(work_id)?;
    let contract = RoyaltyDistributor::new(distributor, provider);
    let pending = contract
        .distributeRoyalties(work_id.to_string(), token, amount)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("distributeRoyalties send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

/// How `amount` would be split for `work_id`.
pub async fn preview_distribution<P: Provider>(
    provider: &P,
    distributor: Address,
    work_id: &str,
    amount: U256,
) -> Result<Vec<Payout>, PmtError> {
    let contract = RoyaltyDistributor::new(distributor, provider);
    let raw = contract
        .previewDistribution(work_id.to_string(), amount)
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("previewDistribution failed: {e}")))?;
    zip_payouts(raw.recipients, raw.amounts)
}

fn zip_payouts(recipients: Vec<Address>, amounts: Vec<U256>) -> Result<Vec<Payout>, PmtError> {
    if recipients.len() != amounts.len() {
        return Err(PmtError::ChainError(format!(
            "previewDistribution returned {} recipients but {} amounts",
            recipients.len(),
            amounts.len()
        )));
    }
    Ok(recipients
        .into_iter()
        .zip(amounts)
        .map(|(recipient, amount)| Payout { recipient, amount })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(byte: u8, share_bps: u64) -> Beneficiary {
        Beneficiary {
            address: Address::repeat_byte(byte),
            share_bps,
        }
    }

    #[test]
    fn test_valid_split() {
        assert!(validate_beneficiaries("default", &[b(1, 10_000)]).is_ok());
        assert!(validate_beneficiaries("song-1", &[b(1, 6_000), b(2, 4_000)]).is_ok());
    }

    #[test]
    fn test_rejects_bad_splits() {
        assert!(validate_beneficiaries("", &[b(1, 10_000)]).is_err());
        assert!(validate_beneficiaries("w", &[]).is_err());
        assert!(validate_beneficiaries("w", &[b(0, 10_000)]).is_err());
        assert!(validate_beneficiaries("w", &[b(1, 0)]).is_err());
        assert!(validate_beneficiaries("w", &[b(1, 6_000), b(2, 5_000)]).is_err());
    }

    #[test]
    fn test_rejects_under_allocated_split() {
        let err = validate_beneficiaries("w", &[b(1, 6_000)]).unwrap_err();
        assert!(matches!(err, PmtError::InvalidInput(msg) if msg.contains("6000")));
        assert!(validate_beneficiaries("w", &[b(1, 3_333), b(2, 3_333), b(3, 3_333)]).is_err());
        assert!(validate_beneficiaries("w", &[b(1, 3_334), b(2, 3_333), b(3, 3_333)]).is_ok());
    }

    #[test]
    fn test_work_id_must_not_be_blank() {
        assert!(validate_work_id("song-1").is_ok());
        assert!(matches!(validate_work_id("  "), Err(PmtError::InvalidInput(_))));
    }

    #[test]
    fn test_zip_payouts_length_mismatch() {
        let err = zip_payouts(vec![Address::ZERO], vec![]).unwrap_err();
        assert!(matches!(err, PmtError::ChainError(_)));

        let payouts = zip_payouts(
            vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            vec![U256::from(60u64), U256::from(40u64)],
        )
        .unwrap();
        assert_eq!(payouts.len(), 2);
        assert_eq!(payouts[1].amount, U256::from(40u64));
    }
}
