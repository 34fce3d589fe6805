//! Receipt confirmation by polling `eth_getTransactionReceipt`.

use std::time::Duration;

use alloy::network::ReceiptResponse;
use alloy::primitives::TxHash;
use alloy::providers::Provider;
use tokio::time::Instant;

use crate::bridge::Confirmation;
use crate::PmtError;

/// Wait until `tx` has a receipt (one confirmation), polling every `poll`.
///
/// A reverted receipt is [`PmtError::TransactionReverted`]; no receipt within
/// `timeout` is [`PmtError::ConfirmationTimeout`]. The transaction itself is
/// not affected by the timeout and may still land later.
pub async fn wait_for_confirmation<P: Provider>(
    provider: &P,
    tx: TxHash,
    poll: Duration,
    timeout: Duration,
) -> Result<Confirmation, PmtError> {
    let started = Instant::now();
    let deadline = started + timeout;

    loop {
        match provider.get_transaction_receipt(tx).await {
            Ok(Some(receipt)) => {
                if !receipt.status() {
                    tracing::warn!(%tx, "transaction reverted");
                    return Err(PmtError::TransactionReverted(tx.to_string()));
                }
                let block_number = receipt.block_number();
                tracing::debug!(%tx, ?block_number, "transaction confirmed");
                return Ok(Confirmation {
                    tx_hash: tx,
                    block_number,
                });
            }
            Ok(None) => {}
            // Lookup failures are transient from our point of view; the
            // deadline bounds how long we keep trying.
            Err(e) => tracing::warn!(%tx, error = %e, "receipt lookup failed"),
        }

        if Instant::now() + poll > deadline {
            return Err(PmtError::ConfirmationTimeout {
                tx: tx.to_string(),
                waited_secs: started.elapsed().as_secs(),
            });
        }
        tokio::time::sleep(poll).await;
    }
}
