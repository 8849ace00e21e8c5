//! Connection to a Vite node
//!
//! `LedgerConnection` is the seam between the wallet logic and the network:
//! the submission pipeline and the receive reconciler only ever talk to the
//! node through it, so tests can substitute a scripted ledger.

pub mod drain;
pub mod rpc;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::block::{ChainHead, DifficultyQuery, Hash32, SignedBlock};
use crate::error::LedgerError;
use crate::keys::{Address, DerivedAccount};

pub use drain::{DrainEvent, DrainMessage, DrainOptions, DrainSender, DrainSubscription};
pub use rpc::{HttpConnector, HttpLedgerConnection};
pub use types::{
    AccountInfo, AccountState, TokenBalance, TransactionRecord, TransferReceipt, UnreceivedBlock,
    UnreceivedSummary,
};

/// An opened channel to a ledger node
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    /// Confirmed balance and unreceived block count of `address`
    async fn get_account_state(&self, address: &Address) -> Result<AccountState, LedgerError>;

    async fn get_transaction_list(
        &self,
        address: &Address,
        page_index: u32,
        page_size: u32,
    ) -> Result<Vec<TransactionRecord>, LedgerError>;

    /// Previous hash and height for the next block of `address`
    async fn get_latest_account_block(&self, address: &Address) -> Result<ChainHead, LedgerError>;

    /// `None` when the account has enough quota and needs no PoW
    async fn get_pow_difficulty(
        &self,
        query: &DifficultyQuery,
    ) -> Result<Option<String>, LedgerError>;

    async fn get_pow_nonce(&self, difficulty: &str, hash: &Hash32) -> Result<[u8; 8], LedgerError>;

    async fn submit_signed_block(&self, block: SignedBlock)
        -> Result<TransferReceipt, LedgerError>;

    async fn get_unreceived_blocks(
        &self,
        address: &Address,
        page_index: u32,
        page_size: u32,
    ) -> Result<Vec<UnreceivedBlock>, LedgerError>;

    /// Start pulling in the unreceived blocks of `account` in the background.
    ///
    /// Must be called from within a Tokio runtime.
    fn start_receive_drain(&self, account: DerivedAccount, options: DrainOptions)
        -> DrainSubscription;
}

/// Opens ledger connections bound to a request timeout
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn open(&self, timeout: Duration) -> Result<Arc<dyn LedgerConnection>, LedgerError>;
}
