//! Vite node request/response types

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::block::{Hash32, SignedBlock};

/// Confirmed balance and unreceived backlog of one account
#[derive(Clone, Debug, Default, Serialize)]
pub struct AccountState {
    /// `None` when the node returned no account info
    pub balance: Option<AccountInfo>,
    pub unreceived: UnreceivedSummary,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub address: String,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    pub block_count: u64,
    #[serde(default)]
    pub balance_info_map: Option<BTreeMap<String, TokenBalance>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreceivedSummary {
    #[serde(default)]
    pub address: String,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    pub block_count: u64,
    #[serde(default)]
    pub balance_info_map: Option<BTreeMap<String, TokenBalance>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    #[serde(default)]
    pub token_info: Option<TokenInfo>,
    pub balance: String,
    #[serde(default)]
    pub transaction_count: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    #[serde(default)]
    pub token_name: String,
    #[serde(default)]
    pub token_symbol: String,
    #[serde(default)]
    pub decimals: u8,
    #[serde(default)]
    pub token_id: String,
}

/// One account block as listed by `ledger_getAccountBlocksByAddress`
///
/// Only the commonly used fields are typed; everything else the node sends
/// is carried through untouched.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub block_type: u8,
    pub hash: String,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_address: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A send block waiting to be received by its destination
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreceivedBlock {
    pub hash: Hash32,
    /// Sender of the transfer
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub token_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LatestBlock {
    pub hash: Hash32,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub height: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DifficultyResponse {
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub required_quota: Option<String>,
    #[serde(default)]
    pub is_congestion: Option<bool>,
}

/// Confirmation of a broadcast block
#[derive(Clone, Debug, Serialize)]
pub struct TransferReceipt {
    pub block: SignedBlock,
    /// Whatever the node answered to the broadcast (usually `null`)
    pub node_response: serde_json::Value,
}

/// Vite encodes most counters as decimal strings
fn u64_from_str_or_num<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) if s.is_empty() => Ok(0),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
