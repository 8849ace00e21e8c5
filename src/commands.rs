//! Command handlers behind the `vite-wallet` binary
//!
//! Every handler answers with a [`CommandOutput`] envelope. Failures are
//! reported inside the envelope (`error = 1`) rather than as a process exit
//! code, which is what scripts driving the binary expect.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::WalletError;
use crate::keys::{Address, Wallet};
use crate::ledger::{AccountState, HttpConnector, LedgerConnector, TransactionRecord, TransferReceipt};
use crate::receive::{ReceiveOptions, ReceiveReconciler, ReceiveStatus, StatusPoller};
use crate::submit::SubmissionPipeline;
use crate::timed;

/// The `{error, msg, data}` envelope printed for every command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub error: u8,
    pub msg: String,
    pub data: Value,
}

impl CommandOutput {
    pub fn success(msg: impl Into<String>, data: Value) -> Self {
        Self {
            error: 0,
            msg: msg.into(),
            data,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            error: 1,
            msg: msg.into(),
            data: Value::Null,
        }
    }

    fn from_result<T: Serialize>(msg: &str, result: Result<T, WalletError>) -> Self {
        match result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(data) => Self::success(msg, data),
                Err(e) => Self::failure(format!("Could not encode response: {}", e)),
            },
            Err(e) => {
                log::error!("{}", e);
                Self::failure(e.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedWallet {
    pub mnemonics: String,
    pub address: Address,
}

pub struct Commands {
    config: ClientConfig,
    connector: Arc<dyn LedgerConnector>,
}

impl Commands {
    /// Handlers talking to the node at `config.node_url`
    pub fn new(config: ClientConfig) -> Self {
        let connector = Arc::new(HttpConnector::new(config.node_url.clone()));
        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: ClientConfig, connector: Arc<dyn LedgerConnector>) -> Self {
        Self { config, connector }
    }

    /// Generate a fresh wallet and report its first address
    pub fn create(&self) -> CommandOutput {
        CommandOutput::from_result("create success", create_wallet())
    }

    /// Balance of `address`, or of account `index` of `mnemonic` when no
    /// address is given
    pub async fn balance(
        &self,
        address: Option<&str>,
        mnemonic: Option<&str>,
        index: u32,
    ) -> CommandOutput {
        CommandOutput::from_result("balance success", self.fetch_balance(address, mnemonic, index).await)
    }

    pub async fn transactions(&self, address: &str, page_index: u32, page_size: u32) -> CommandOutput {
        CommandOutput::from_result(
            "txs success",
            self.fetch_transactions(address, page_index, page_size).await,
        )
    }

    pub async fn send(
        &self,
        mnemonic: &str,
        index: u32,
        to_address: &str,
        token_id: &str,
        amount: &str,
    ) -> CommandOutput {
        let result = self
            .submit(mnemonic, index, to_address, token_id, amount)
            .await;
        if let Ok(receipt) = &result {
            log::info!("Sent {} to {}", amount, to_address);
            log::debug!("Broadcast block {}", receipt.block.hash);
        }
        CommandOutput::from_result("transaction success", result)
    }

    /// Receive every pending transfer of account `index`.
    ///
    /// `on_progress` sees each sampled status until the run settles. The
    /// run settles on success or failure; with a watchdog configured it is
    /// also abandoned once the watchdog expires.
    pub async fn update<F>(&self, mnemonic: &str, index: u32, on_progress: F) -> CommandOutput
    where
        F: FnMut(&ReceiveStatus) + Send + 'static,
    {
        let handle = match Wallet::from_mnemonic(mnemonic).and_then(|wallet| {
            ReceiveReconciler::new(self.connector.clone(), ReceiveOptions::from(&self.config))
                .run(&wallet, index)
        }) {
            Ok(handle) => handle,
            Err(e) => return CommandOutput::failure(e.to_string()),
        };

        let poller = StatusPoller::new(self.config.status_poll_interval);
        let watched = handle.clone();
        let settled = async move {
            tokio::select! {
                status = poller.wait_for_success(&watched, on_progress) => status,
                status = watched.failed() => status,
            }
        };

        let status = match self.config.receive_watchdog {
            Some(limit) => match timed::race(settled, limit).await {
                Ok(status) => status,
                Err(e) => {
                    let last = handle.snapshot();
                    log::warn!("Receive for {} abandoned: {}", handle.address(), e);
                    return CommandOutput {
                        error: 1,
                        msg: format!("receive watchdog expired ({})", last.message),
                        data: Value::Null,
                    };
                }
            },
            None => settled.await,
        };

        let data = match &status.result {
            Some(result) => json!(result),
            None => Value::Null,
        };
        CommandOutput {
            error: status.error_code,
            msg: status.message,
            data,
        }
    }

    async fn submit(
        &self,
        mnemonic: &str,
        index: u32,
        to_address: &str,
        token_id: &str,
        amount: &str,
    ) -> Result<TransferReceipt, WalletError> {
        let wallet = Wallet::from_mnemonic(mnemonic)?;
        SubmissionPipeline::new(self.connector.clone())
            .send(&wallet, index, to_address, token_id, amount, self.config.rpc_timeout)
            .await
    }

    async fn fetch_balance(
        &self,
        address: Option<&str>,
        mnemonic: Option<&str>,
        index: u32,
    ) -> Result<AccountState, WalletError> {
        let address: Address = match (address, mnemonic) {
            (Some(address), _) => address.parse()?,
            (None, Some(mnemonic)) => Wallet::from_mnemonic(mnemonic)?.derive(index)?.address,
            (None, None) => {
                return Err(WalletError::InvalidAddress(
                    "either an address or a mnemonic is required".to_string(),
                ))
            }
        };

        let ledger = self
            .connector
            .open(self.config.balance_timeout)
            .await
            .map_err(|e| WalletError::ConnectionError(e.detail()))?;
        Ok(ledger.get_account_state(&address).await?)
    }

    async fn fetch_transactions(
        &self,
        address: &str,
        page_index: u32,
        page_size: u32,
    ) -> Result<Vec<TransactionRecord>, WalletError> {
        let address: Address = address.parse()?;
        log::info!("Listing transactions of {} (page {}, size {})", address, page_index, page_size);

        let ledger = self
            .connector
            .open(self.config.rpc_timeout)
            .await
            .map_err(|e| WalletError::ConnectionError(e.detail()))?;
        Ok(ledger.get_transaction_list(&address, page_index, page_size).await?)
    }
}

fn create_wallet() -> Result<CreatedWallet, WalletError> {
    let wallet = Wallet::generate()?;
    let address = wallet.derive(0)?.address;
    Ok(CreatedWallet {
        mnemonics: wallet.mnemonic(),
        address,
    })
}
