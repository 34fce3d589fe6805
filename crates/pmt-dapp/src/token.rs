use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;

use crate::constants::gas;
use crate::PaymentToken;
use crate::PmtError;

/// Name, symbol and decimals of the payment token.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Balance of `owner`, in minor units.
pub async fn balance_of<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
) -> Result<U256, PmtError> {
    PaymentToken::new(token, provider)
        .balanceOf(owner)
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("balanceOf({owner}) failed: {e}")))
}

/// How much of `owner`'s balance `spender` may still pull with `transferFrom`.
pub async fn allowance<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256, PmtError> {
    PaymentToken::new(token, provider)
        .allowance(owner, spender)
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("allowance({owner}, {spender}) failed: {e}")))
}

/// Submit `approve(spender, amount)` and return the transaction hash without
/// waiting for a receipt.
///
/// A rejected signature or a failed submission is reported as
/// [`PmtError::ApprovalSubmissionFailed`].
pub async fn approve<P: Provider>(
    provider: &P,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<TxHash, PmtError> {
    let contract = PaymentToken::new(token, provider);
    let pending = contract
        .approve(spender, amount)
        .gas(gas::APPROVE)
        .send()
        .await
        .map_err(|e| PmtError::ApprovalSubmissionFailed(e.to_string()))?;
    Ok(*pending.tx_hash())
}

/// Submit `transfer(to, amount)`.
pub async fn transfer<P: Provider>(
    provider: &P,
    token: Address,
    to: Address,
    amount: U256,
) -> Result<TxHash, PmtError> {
    if to == Address::ZERO {
        return Err(PmtError::InvalidInput(
            "transfer recipient cannot be the zero address".to_string(),
        ));
    }
    let contract = PaymentToken::new(token, provider);
    let pending = contract
        .transfer(to, amount)
        .gas(gas::TRANSFER)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("transfer send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

/// Submit `faucet()`, minting test tokens to the sender.
pub async fn faucet<P: Provider>(provider: &P, token: Address) -> Result<TxHash, PmtError> {
    let contract = PaymentToken::new(token, provider);
    let pending = contract
        .faucet()
        .gas(gas::FAUCET)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("faucet send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

/// Amount minted per faucet call.
pub async fn faucet_amount<P: Provider>(provider: &P, token: Address) -> Result<U256, PmtError> {
    let contract = PaymentToken::new(token, provider);
    contract
        .FAUCET_AMOUNT()
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("FAUCET_AMOUNT failed: {e}")))
}

pub async fn metadata<P: Provider>(
    provider: &P,
    token: Address,
) -> Result<TokenMetadata, PmtError> {
    let contract = PaymentToken::new(token, provider);
    let name = contract
        .name()
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("name failed: {e}")))?;
    let symbol = contract
        .symbol()
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("symbol failed: {e}")))?;
    let decimals = contract
        .decimals()
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("decimals failed: {e}")))?;
    Ok(TokenMetadata {
        name,
        symbol,
        decimals,
    })
}

/// Parse a human-readable token amount (e.g. `"12.5"`) into minor units.
///
/// Zero, negative and malformed amounts are rejected.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, PmtError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(PmtError::InvalidAmount("amount is empty".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(PmtError::InvalidAmount(format!(
            "amount must be positive: {trimmed}"
        )));
    }
    let value = parse_units(trimmed, decimals)
        .map_err(|e| PmtError::InvalidAmount(format!("{trimmed}: {e}")))?
        .get_absolute();
    if value.is_zero() {
        return Err(PmtError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

/// Format minor units as a decimal string.
pub fn format_amount(value: U256, decimals: u8) -> String {
    format_units(value, decimals).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_scales_to_minor_units() {
        let one = U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(parse_amount("1", 18).unwrap(), one);
        assert_eq!(
            parse_amount("0.5", 18).unwrap(),
            one / U256::from(2u64)
        );
        assert_eq!(parse_amount(" 100 ", 6).unwrap(), U256::from(100_000_000u64));
    }

    #[test]
    fn test_parse_amount_rejects_zero_and_garbage() {
        assert!(matches!(parse_amount("0", 18), Err(PmtError::InvalidAmount(_))));
        assert!(matches!(parse_amount("", 18), Err(PmtError::InvalidAmount(_))));
        assert!(matches!(parse_amount("-1", 18), Err(PmtError::InvalidAmount(_))));
        assert!(matches!(parse_amount("abc", 18), Err(PmtError::InvalidAmount(_))));
    }

    #[test]
    fn test_format_amount() {
        let value = U256::from(1_500_000_000_000_000_000u64);
        assert_eq!(format_amount(value, 18), "1.500000000000000000");
    }
}
