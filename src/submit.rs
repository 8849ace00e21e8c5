//! Outgoing transfers
//!
//! A send runs open -> derive -> build -> anchor -> quota/PoW -> sign ->
//! broadcast, stopping at the first failure. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use crate::block::{Amount, TransferIntent};
use crate::error::WalletError;
use crate::keys::{Address, TokenId, Wallet};
use crate::ledger::{LedgerConnector, TransferReceipt};
use crate::pow;

pub struct SubmissionPipeline {
    connector: Arc<dyn LedgerConnector>,
}

impl SubmissionPipeline {
    pub fn new(connector: Arc<dyn LedgerConnector>) -> Self {
        Self { connector }
    }

    /// Send `amount` of `token_id` from account `index` of `wallet` to
    /// `to_address`.
    ///
    /// `amount` is a decimal integer string in the token's smallest unit.
    /// Every node request made by this send is bounded by `timeout`.
    pub async fn send(
        &self,
        wallet: &Wallet,
        index: u32,
        to_address: &str,
        token_id: &str,
        amount: &str,
        timeout: Duration,
    ) -> Result<TransferReceipt, WalletError> {
        let ledger = self
            .connector
            .open(timeout)
            .await
            .map_err(|e| WalletError::ConnectionError(e.detail()))?;

        let account = wallet.derive(index)?;

        let to_address: Address = to_address.parse()?;
        let token_id: TokenId = token_id.parse()?;
        let amount: Amount = amount.parse()?;
        let mut intent = TransferIntent::send(account.address, to_address, token_id, amount);

        let head = ledger
            .get_latest_account_block(&account.address)
            .await
            .map_err(|e| WalletError::ChainStateError(e.detail()))?;
        log::debug!(
            "Next block for {} at height {} after {}",
            account.address,
            head.height,
            head.previous_hash
        );
        intent.set_head(head);

        let with_pow = pow::attach_pow_if_required(ledger.as_ref(), &mut intent).await?;

        let block = intent.sign(&account)?;
        log::info!(
            "Sending {} {} from {} to {} (block {}, pow: {})",
            amount,
            token_id,
            account.address,
            to_address,
            block.hash,
            with_pow
        );

        let receipt = ledger
            .submit_signed_block(block)
            .await
            .map_err(|e| WalletError::SubmitRejected(e.into_rpc_error()))?;

        log::info!("Transaction {} accepted", receipt.block.hash);
        Ok(receipt)
    }
}
