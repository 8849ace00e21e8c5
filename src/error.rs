//! Error types for wallet operations
//!
//! `LedgerError` is what a node connection reports. `WalletError` is the single
//! error type callers see; the submission pipeline maps every ledger failure into
//! the variant naming the step that failed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Structured rejection detail returned by a node (JSON-RPC error object)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Failure reported by a ledger connection
#[derive(Error, Clone, Debug)]
pub enum LedgerError {
    #[error("Node unavailable: {0}")]
    Transport(String),

    #[error("Node error: {0}")]
    Rpc(RpcError),

    #[error("Invalid response from node: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    /// Human-readable detail without the variant prefix
    pub fn detail(&self) -> String {
        match self {
            Self::Transport(msg) | Self::InvalidResponse(msg) => msg.clone(),
            Self::Rpc(rpc) => rpc.message.clone(),
        }
    }

    /// True when the node could not be reached at all
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Rejection detail to surface verbatim to the caller
    pub fn into_rpc_error(self) -> RpcError {
        match self {
            Self::Rpc(rpc) => rpc,
            other => RpcError {
                code: -1,
                message: other.detail(),
            },
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

/// An advisory timeout: the raced operation may still be running
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("operation timed out after {}ms", .0.as_millis())]
pub struct TimedOut(pub Duration);

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timed out: {0}")]
    TimedOut(#[from] TimedOut),

    #[error("Could not fetch account chain state: {0}")]
    ChainStateError(String),

    #[error("Could not query PoW difficulty: {0}")]
    QuotaQueryError(String),

    #[error("Could not compute PoW nonce: {0}")]
    NonceComputationError(String),

    #[error("Transaction rejected: {0}")]
    SubmitRejected(RpcError),

    #[error("connection timeout")]
    DiscoveryTimeout,

    #[error("no pending transactions")]
    EmptyBacklog,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid token id: {0}")]
    InvalidTokenId(String),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl WalletError {
    /// True when the failed operation may still be running in the background.
    ///
    /// Every other error means the operation is known to have stopped.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}
