//! Vite wallet: key derivation, transfers and receive reconciliation
//!
//! The crate talks to a Vite node over JSON-RPC and never stores keys: every
//! operation derives the account it needs from a BIP39 mnemonic and an index.
//!
//! # Architecture
//!
//! - **Submission pipeline** ([`SubmissionPipeline`]): builds, anchors,
//!   optionally proves, signs and broadcasts a send block
//! - **Receive reconciler** ([`ReceiveReconciler`]): drains the unreceived
//!   backlog of an account in the background and publishes its progress
//! - **Ledger connection** ([`LedgerConnection`]): the only path to the node,
//!   with an HTTP implementation in [`ledger::rpc`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vite_wallet::{ClientConfig, HttpConnector, SubmissionPipeline, Wallet};
//!
//! let config = ClientConfig::from_env();
//! let wallet = Wallet::from_mnemonic(&words)?;
//! let pipeline = SubmissionPipeline::new(Arc::new(HttpConnector::new(config.node_url.clone())));
//!
//! let receipt = pipeline
//!     .send(&wallet, 0, &to_address, "tti_5649544520544f4b454e6e40", "1000000000000000000", config.rpc_timeout)
//!     .await?;
//! println!("sent {}", receipt.block.hash);
//! ```

pub mod block;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod pow;
pub mod receive;
pub mod submit;
pub mod timed;

pub use block::{Amount, BlockType, ChainHead, Hash32, ProofOfWork, SignedBlock, TransferIntent};
pub use commands::{CommandOutput, Commands};
pub use config::ClientConfig;
pub use error::{LedgerError, RpcError, TimedOut, WalletError};
pub use keys::{Address, DerivedAccount, TokenId, Wallet};
pub use ledger::{
    AccountState, HttpConnector, HttpLedgerConnection, LedgerConnection, LedgerConnector,
    TransferReceipt,
};
pub use receive::{
    ReceiveHandle, ReceiveOptions, ReceiveOutcome, ReceiveReconciler, ReceiveState, ReceiveStatus,
    StatusPoller,
};
pub use submit::SubmissionPipeline;

pub type Result<T> = std::result::Result<T, WalletError>;
