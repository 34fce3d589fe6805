//! OrderEscrow: staged payments between a customer and a provider.
//!
//! The customer locks the order amount (which requires a token allowance for
//! the escrow), the provider marks it shipped, and the customer confirms
//! delivery, disputes, or requests a refund. State transitions are enforced
//! by the contract; these helpers only submit and read.

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use serde::Serialize;

use crate::constants::gas;
use crate::{OrderEscrow, PmtError};

/// Order status as reported by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderStatus {
    Created,
    Shipped,
    Delivered,
    Disputed,
    Refunded,
    Unknown(u8),
}

impl From<u8> for OrderStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Created,
            1 => Self::Shipped,
            2 => Self::Delivered,
            3 => Self::Disputed,
            4 => Self::Refunded,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: U256,
    pub customer: Address,
    pub provider: Address,
    pub total_amount: U256,
    pub first_payment: U256,
    pub second_payment: U256,
    pub status: OrderStatus,
    pub created_at: U256,
    pub shipped_at: U256,
    pub deadline: U256,
    pub first_payment_released: bool,
    pub second_payment_released: bool,
}

impl Order {
    /// The contract returns a zeroed struct for ids it does not know.
    pub fn exists(&self) -> bool {
        self.customer != Address::ZERO
    }
}

impl From<OrderEscrow::Order> for Order {
    fn from(raw: OrderEscrow::Order) -> Self {
        Self {
            order_id: raw.orderId,
            customer: raw.customer,
            provider: raw.provider,
            total_amount: raw.totalAmount,
            first_payment: raw.firstPayment,
            second_payment: raw.secondPayment,
            status: OrderStatus::from(raw.status),
            created_at: raw.createdAt,
            shipped_at: raw.shippedAt,
            deadline: raw.deadline,
            first_payment_released: raw.firstPaymentReleased,
            second_payment_released: raw.secondPaymentReleased,
        }
    }
}

/// Submit `createOrder(provider, amount)`. The escrow pulls `amount` from the
/// sender, so the allowance must already cover it.
pub async fn create_order<P: Provider>(
    provider: &P,
    escrow: Address,
    seller: Address,
    amount: U256,
) -> Result<TxHash, PmtError> {
    if seller == Address::ZERO {
        return Err(PmtError::InvalidInput(
            "provider address cannot be zero".to_string(),
        ));
    }
    let contract = OrderEscrow::new(escrow, provider);
    let pending = contract
        .createOrder(seller, amount)
        .gas(gas::CREATE_ORDER)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("createOrder send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

pub async fn mark_as_shipped<P: Provider>(
    provider: &P,
    escrow: Address,
    order_id: U256,
) -> Result<TxHash, PmtError> {
    let contract = OrderEscrow::new(escrow, provider);
    let pending = contract
        .markAsShipped(order_id)
        .gas(gas::MARK_AS_SHIPPED)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("markAsShipped send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

pub async fn confirm_delivery<P: Provider>(
    provider: &P,
    escrow: Address,
    order_id: U256,
) -> Result<TxHash, PmtError> {
    let contract = OrderEscrow::new(escrow, provider);
    let pending = contract
        .confirmDelivery(order_id)
        .gas(gas::CONFIRM_DELIVERY)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("confirmDelivery send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

pub async fn request_refund<P: Provider>(
    provider: &P,
    escrow: Address,
    order_id: U256,
) -> Result<TxHash, PmtError> {
    let contract = OrderEscrow::new(escrow, provider);
    let pending = contract
        .requestRefund(order_id)
        .gas(gas::REQUEST_REFUND)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("requestRefund send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

pub async fn dispute_order<P: Provider>(
    provider: &P,
    escrow: Address,
    order_id: U256,
) -> Result<TxHash, PmtError> {
    let contract = OrderEscrow::new(escrow, provider);
    let pending = contract
        .disputeOrder(order_id)
        .gas(gas::DISPUTE_ORDER)
        .send()
        .await
        .map_err(|e| PmtError::ChainError(format!("disputeOrder send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

pub async fn get_order<P: Provider>(
    provider: &P,
    escrow: Address,
    order_id: U256,
) -> Result<Order, PmtError> {
    let contract = OrderEscrow::new(escrow, provider);
    let raw = contract
        .getOrder(order_id)
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("getOrder failed: {e}")))?;
    Ok(Order::from(raw))
}

/// Number of orders created so far; the latest order id.
pub async fn order_counter<P: Provider>(provider: &P, escrow: Address) -> Result<U256, PmtError> {
    let contract = OrderEscrow::new(escrow, provider);
    contract
        .orderCounter()
        .call()
        .await
        .map_err(|e| PmtError::ChainError(format!("orderCounter failed: {e}")))
}
