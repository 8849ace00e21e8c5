//! JSON-RPC 2.0 client for a Vite node over HTTP

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::drain::{self, DrainOptions, DrainSubscription};
use super::types::{
    AccountInfo, AccountState, DifficultyResponse, LatestBlock, TransactionRecord,
    TransferReceipt, UnreceivedBlock, UnreceivedSummary,
};
use super::{LedgerConnection, LedgerConnector};
use crate::block::{ChainHead, DifficultyQuery, Hash32, SignedBlock};
use crate::error::{LedgerError, RpcError};
use crate::keys::{Address, DerivedAccount};

/// HTTP JSON-RPC connection to a Vite node
///
/// Cheap to clone: clones share the underlying connection pool.
#[derive(Clone)]
pub struct HttpLedgerConnection {
    client: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl HttpLedgerConnection {
    /// Create a connection whose requests time out after `timeout`
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        log::debug!("Vite node connection to {} (timeout {}ms)", url, timeout.as_millis());

        Ok(Self {
            client,
            url: url.to_string(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Send one JSON-RPC request and decode its `result`
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        log::debug!("-> {} #{}", method, id);

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Transport(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let mut envelope: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{}: {}", method, e)))?;

        if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
            let rpc: RpcError = serde_json::from_value(error.clone()).unwrap_or_else(|_| RpcError {
                code: -1,
                message: error.to_string(),
            });
            log::debug!("<- {} #{} error: {}", method, id, rpc);
            return Err(LedgerError::Rpc(rpc));
        }

        let result = envelope
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null);
        log::debug!("<- {} #{}", method, id);

        serde_json::from_value(result)
            .map_err(|e| LedgerError::InvalidResponse(format!("{}: {}", method, e)))
    }
}

#[async_trait]
impl LedgerConnection for HttpLedgerConnection {
    async fn get_account_state(&self, address: &Address) -> Result<AccountState, LedgerError> {
        let (balance, unreceived) = tokio::try_join!(
            self.request::<Option<AccountInfo>>(
                "ledger_getAccountInfoByAddress",
                json!([address])
            ),
            self.request::<Option<UnreceivedSummary>>(
                "ledger_getUnreceivedTransactionSummaryByAddress",
                json!([address])
            ),
        )?;

        Ok(AccountState {
            balance,
            unreceived: unreceived.unwrap_or_default(),
        })
    }

    async fn get_transaction_list(
        &self,
        address: &Address,
        page_index: u32,
        page_size: u32,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let records: Option<Vec<TransactionRecord>> = self
            .request(
                "ledger_getAccountBlocksByAddress",
                json!([address, page_index, page_size]),
            )
            .await?;
        Ok(records.unwrap_or_default())
    }

    async fn get_latest_account_block(&self, address: &Address) -> Result<ChainHead, LedgerError> {
        let latest: Option<LatestBlock> = self
            .request("ledger_getLatestAccountBlock", json!([address]))
            .await?;

        Ok(match latest {
            Some(block) => ChainHead {
                previous_hash: block.hash,
                height: block.height + 1,
            },
            None => ChainHead::genesis(),
        })
    }

    async fn get_pow_difficulty(
        &self,
        query: &DifficultyQuery,
    ) -> Result<Option<String>, LedgerError> {
        let response: Option<DifficultyResponse> = self
            .request("ledger_getPoWDifficulty", json!([query]))
            .await?;
        let response = response.unwrap_or_default();

        log::debug!(
            "Quota for {}: required {:?}, congestion {:?}",
            query.address,
            response.required_quota,
            response.is_congestion
        );

        Ok(response.difficulty.filter(|d| !d.is_empty()))
    }

    async fn get_pow_nonce(&self, difficulty: &str, hash: &Hash32) -> Result<[u8; 8], LedgerError> {
        let encoded: String = self
            .request("util_getPoWNonce", json!([difficulty, hash]))
            .await?;
        decode_nonce(&encoded)
    }

    async fn submit_signed_block(
        &self,
        block: SignedBlock,
    ) -> Result<TransferReceipt, LedgerError> {
        let node_response: Value = self
            .request("ledger_sendRawTransaction", json!([block]))
            .await?;
        Ok(TransferReceipt {
            block,
            node_response,
        })
    }

    async fn get_unreceived_blocks(
        &self,
        address: &Address,
        page_index: u32,
        page_size: u32,
    ) -> Result<Vec<UnreceivedBlock>, LedgerError> {
        let blocks: Option<Vec<UnreceivedBlock>> = self
            .request(
                "ledger_getUnreceivedBlocksByAddress",
                json!([address, page_index, page_size]),
            )
            .await?;
        Ok(blocks.unwrap_or_default())
    }

    fn start_receive_drain(
        &self,
        account: DerivedAccount,
        options: DrainOptions,
    ) -> DrainSubscription {
        let (sender, subscription) = DrainSubscription::channel();
        tokio::spawn(drain::run_drain(
            Arc::new(self.clone()),
            account,
            options,
            sender,
        ));
        subscription
    }
}

/// Nonces come back base64 encoded and may be shorter than 8 bytes
fn decode_nonce(encoded: &str) -> Result<[u8; 8], LedgerError> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| LedgerError::InvalidResponse(format!("nonce {:?}: {}", encoded, e)))?;
    if raw.len() > 8 {
        return Err(LedgerError::InvalidResponse(format!(
            "nonce is {} bytes, expected at most 8",
            raw.len()
        )));
    }
    let mut nonce = [0u8; 8];
    nonce[8 - raw.len()..].copy_from_slice(&raw);
    Ok(nonce)
}

/// Opens [`HttpLedgerConnection`]s to a fixed node URL
#[derive(Clone, Debug)]
pub struct HttpConnector {
    node_url: String,
}

impl HttpConnector {
    pub fn new(node_url: impl Into<String>) -> Self {
        Self {
            node_url: node_url.into(),
        }
    }
}

#[async_trait]
impl LedgerConnector for HttpConnector {
    async fn open(&self, timeout: Duration) -> Result<Arc<dyn LedgerConnection>, LedgerError> {
        let connection = HttpLedgerConnection::connect(&self.node_url, timeout)?;
        Ok(Arc::new(connection))
    }
}
