//! Account blocks: the transfer intent, its hash and its signed wire form
//!
//! A `TransferIntent` is built incrementally (addresses and amount first, then
//! the previous block, then optional proof-of-work) and consumed by `sign`,
//! which produces the immutable `SignedBlock` that is broadcast to the node.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::blake2b_256;
use crate::error::WalletError;
use crate::keys::{Address, DerivedAccount, TokenId};

/// A 32-byte block hash
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Hash32 {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| WalletError::InvalidHash(format!("{}: {}", s, e)))?;
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|_| WalletError::InvalidHash(format!("expected 32 bytes: {}", s)))?;
        Ok(Self(raw))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", self)
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Token amount in the smallest unit
///
/// Parsed from a decimal string into a 256-bit integer, so any amount the
/// ledger can hold survives the round trip. Leading zeros are rejected, so
/// the decimal string always reads back exactly as it was given.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Amount(U256);

impl Amount {
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.0.to_big_endian(&mut out);
        out
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WalletError::InvalidAmount(format!(
                "{:?} is not a non-negative integer",
                s
            )));
        }
        if s.len() > 1 && s.starts_with('0') {
            return Err(WalletError::InvalidAmount(format!(
                "{:?} has leading zeros",
                s
            )));
        }
        U256::from_dec_str(s)
            .map(Self)
            .map_err(|e| WalletError::InvalidAmount(format!("{:?}: {:?}", s, e)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockType {
    /// Transfer request (`createAccountBlock('send', ..)`)
    Send,
    /// Response pocketing an incoming transfer
    Receive,
}

impl BlockType {
    pub fn code(&self) -> u8 {
        match self {
            Self::Send => 2,
            Self::Receive => 4,
        }
    }
}

/// Where the next block of an account attaches to its chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainHead {
    pub previous_hash: Hash32,
    /// Height the next block will take
    pub height: u64,
}

impl ChainHead {
    /// Head of an account that has no blocks yet
    pub fn genesis() -> Self {
        Self {
            previous_hash: Hash32::ZERO,
            height: 1,
        }
    }
}

/// Proof-of-work attached when the account lacks quota
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    pub difficulty: String,
    pub nonce: [u8; 8],
}

/// Parameters of `ledger_getPoWDifficulty`
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyQuery {
    pub address: Address,
    pub previous_hash: Hash32,
    pub block_type: u8,
    pub to_address: Option<Address>,
    pub data: Option<String>,
}

/// An account block under construction
#[derive(Clone, Debug)]
pub struct TransferIntent {
    pub block_type: BlockType,
    pub address: Address,
    pub to_address: Option<Address>,
    pub token_id: Option<TokenId>,
    pub amount: Option<Amount>,
    pub send_block_hash: Option<Hash32>,
    pub data: Option<Vec<u8>>,
    head: Option<ChainHead>,
    pow: Option<ProofOfWork>,
}

impl TransferIntent {
    pub fn send(address: Address, to_address: Address, token_id: TokenId, amount: Amount) -> Self {
        Self {
            block_type: BlockType::Send,
            address,
            to_address: Some(to_address),
            token_id: Some(token_id),
            amount: Some(amount),
            send_block_hash: None,
            data: None,
            head: None,
            pow: None,
        }
    }

    pub fn receive(address: Address, send_block_hash: Hash32) -> Self {
        Self {
            block_type: BlockType::Receive,
            address,
            to_address: None,
            token_id: None,
            amount: None,
            send_block_hash: Some(send_block_hash),
            data: None,
            head: None,
            pow: None,
        }
    }

    /// Attach the intent to the account chain.
    ///
    /// A proof-of-work is only valid for the previous hash it was computed
    /// from, so moving the intent to a different head drops it.
    pub fn set_head(&mut self, head: ChainHead) {
        if self.head.map(|h| h.previous_hash) != Some(head.previous_hash) {
            self.pow = None;
        }
        self.head = Some(head);
    }

    pub fn set_pow(&mut self, pow: ProofOfWork) {
        self.pow = Some(pow);
    }

    pub fn pow(&self) -> Option<&ProofOfWork> {
        self.pow.as_ref()
    }

    fn require_head(&self) -> Result<ChainHead, WalletError> {
        self.head.ok_or_else(|| {
            WalletError::ChainStateError("previous block has not been set".to_string())
        })
    }

    /// Descriptor the node needs to decide whether PoW is required
    pub fn difficulty_query(&self) -> Result<DifficultyQuery, WalletError> {
        let head = self.require_head()?;
        Ok(DifficultyQuery {
            address: self.address,
            previous_hash: head.previous_hash,
            block_type: self.block_type.code(),
            to_address: self.to_address,
            data: self.data.as_ref().map(|d| BASE64.encode(d)),
        })
    }

    /// Account block hash, as the node computes it
    pub fn hash(&self) -> Result<Hash32, WalletError> {
        let head = self.require_head()?;
        let mut source: Vec<u8> = Vec::with_capacity(256);

        source.push(self.block_type.code());
        source.extend_from_slice(head.previous_hash.as_bytes());
        source.extend_from_slice(&head.height.to_be_bytes());
        source.extend_from_slice(&self.address.original());

        match self.block_type {
            BlockType::Send => {
                let to = self.to_address.ok_or_else(|| missing("to address"))?;
                let amount = self.amount.ok_or_else(|| missing("amount"))?;
                let token = self.token_id.ok_or_else(|| missing("token id"))?;
                source.extend_from_slice(&to.original());
                source.extend_from_slice(&amount.to_be_bytes());
                source.extend_from_slice(&token.original());
            }
            BlockType::Receive => {
                let send_hash = self.send_block_hash.ok_or_else(|| missing("send block hash"))?;
                source.extend_from_slice(send_hash.as_bytes());
            }
        }

        if let Some(data) = &self.data {
            source.extend_from_slice(&blake2b_256(&[data.as_slice()]));
        }

        // fee is always zero for plain transfers
        source.extend_from_slice(&[0u8; 32]);

        let nonce = self.pow.as_ref().map(|p| p.nonce).unwrap_or([0u8; 8]);
        source.extend_from_slice(&nonce);

        Ok(Hash32(blake2b_256(&[source.as_slice()])))
    }

    /// Sign the finished intent with the account's key
    pub fn sign(self, account: &DerivedAccount) -> Result<SignedBlock, WalletError> {
        if account.address != self.address {
            return Err(WalletError::Derivation(format!(
                "signing key belongs to {}, block to {}",
                account.address, self.address
            )));
        }

        let head = self.require_head()?;
        let hash = self.hash()?;
        let signature = account.sign(hash.as_bytes());

        Ok(SignedBlock {
            block_type: self.block_type.code(),
            height: head.height.to_string(),
            hash,
            previous_hash: head.previous_hash,
            address: self.address,
            public_key: BASE64.encode(account.public_key()),
            to_address: self.to_address,
            token_id: self.token_id,
            amount: self.amount,
            send_block_hash: self.send_block_hash,
            data: self.data.as_ref().map(|d| BASE64.encode(d)),
            fee: "0".to_string(),
            difficulty: self.pow.as_ref().map(|p| p.difficulty.clone()),
            nonce: self.pow.as_ref().map(|p| BASE64.encode(p.nonce)),
            signature: BASE64.encode(signature.to_bytes()),
        })
    }
}

fn missing(field: &str) -> WalletError {
    WalletError::InvalidHash(format!("cannot hash block without {}", field))
}

/// A signed account block in the node's `ledger_sendRawTransaction` format
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedBlock {
    pub block_type: u8,
    pub height: String,
    pub hash: Hash32,
    pub previous_hash: Hash32,
    pub address: Address,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_block_hash: Option<Hash32>,
    pub data: Option<String>,
    pub fee: String,
    pub difficulty: Option<String>,
    pub nonce: Option<String>,
    pub signature: String,
}
