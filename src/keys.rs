use bip39::Mnemonic;
use ed25519_dalek::{Signature, Signer, SigningKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::{blake2b_16, blake2b_160, blake2b_40, derive_ed25519_key};
use crate::error::WalletError;

const ADDRESS_PREFIX: &str = "vite_";
const TOKEN_ID_PREFIX: &str = "tti_";

/// Account type byte appended to the 20-byte address hash
const USER_ACCOUNT: u8 = 0;
const CONTRACT_ACCOUNT: u8 = 1;

/// A wallet seeded by a BIP39 mnemonic
///
/// Holds only the mnemonic; keys are derived on demand per index and never
/// persisted.
#[derive(Clone)]
pub struct Wallet {
    mnemonic: Mnemonic,
}

impl Wallet {
    /// Generate a new random 24-word wallet
    pub fn generate() -> Result<Self, WalletError> {
        let entropy = rand::random::<[u8; 32]>();
        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        Ok(Self { mnemonic })
    }

    /// Import a wallet from an existing mnemonic phrase
    pub fn from_mnemonic(words: &str) -> Result<Self, WalletError> {
        let mnemonic = Mnemonic::parse(words.trim())
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        Ok(Self { mnemonic })
    }

    pub fn mnemonic(&self) -> String {
        self.mnemonic.to_string()
    }

    /// Derive the keypair and address at `index`
    pub fn derive(&self, index: u32) -> Result<DerivedAccount, WalletError> {
        let seed = self.mnemonic.to_seed("");
        let secret = derive_ed25519_key(&seed, index)?;
        let signing_key = SigningKey::from_bytes(&secret);
        let address = Address::from_public_key(&signing_key.verifying_key().to_bytes());

        log::debug!("Derived address {} at index {}", address, index);

        Ok(DerivedAccount {
            index,
            address,
            signing_key,
        })
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Wallet(..)")
    }
}

/// An (address, private key) pair derived from a wallet
#[derive(Clone)]
pub struct DerivedAccount {
    pub index: u32,
    pub address: Address,
    signing_key: SigningKey,
}

impl DerivedAccount {
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for DerivedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedAccount")
            .field("index", &self.index)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// A Vite account address
///
/// The textual form is `vite_` + hex(20-byte hash) + hex(5-byte checksum).
/// The raw form ("original address") is the hash followed by the account
/// type byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    hash: [u8; 20],
    kind: u8,
}

impl Address {
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self {
            hash: blake2b_160(public_key),
            kind: USER_ACCOUNT,
        }
    }

    /// 21 raw bytes used in block hashing and the PoW nonce hash
    pub fn original(&self) -> [u8; 21] {
        let mut raw = [0u8; 21];
        raw[..20].copy_from_slice(&self.hash);
        raw[20] = self.kind;
        raw
    }

    pub fn is_contract(&self) -> bool {
        self.kind == CONTRACT_ACCOUNT
    }

    fn checksum(hash: &[u8; 20], kind: u8) -> [u8; 5] {
        let mut checksum = blake2b_40(hash);
        if kind == CONTRACT_ACCOUNT {
            for byte in checksum.iter_mut() {
                *byte ^= 0xff;
            }
        }
        checksum
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or_else(|| WalletError::InvalidAddress(format!("missing prefix: {}", s)))?;
        if body.len() != 50 {
            return Err(WalletError::InvalidAddress(format!("bad length: {}", s)));
        }
        let bytes = hex::decode(body).map_err(|e| WalletError::InvalidAddress(e.to_string()))?;

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&bytes[..20]);
        let checksum = &bytes[20..];

        for kind in [USER_ACCOUNT, CONTRACT_ACCOUNT] {
            if Self::checksum(&hash, kind) == checksum {
                return Ok(Self { hash, kind });
            }
        }
        Err(WalletError::InvalidAddress(format!("bad checksum: {}", s)))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            ADDRESS_PREFIX,
            hex::encode(self.hash),
            hex::encode(Self::checksum(&self.hash, self.kind))
        )
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A token type identifier, `tti_` + hex(10 bytes) + hex(2-byte checksum)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId([u8; 10]);

impl TokenId {
    pub fn original(&self) -> [u8; 10] {
        self.0
    }
}

impl FromStr for TokenId {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(TOKEN_ID_PREFIX)
            .ok_or_else(|| WalletError::InvalidTokenId(format!("missing prefix: {}", s)))?;
        if body.len() != 24 {
            return Err(WalletError::InvalidTokenId(format!("bad length: {}", s)));
        }
        let bytes = hex::decode(body).map_err(|e| WalletError::InvalidTokenId(e.to_string()))?;

        let mut raw = [0u8; 10];
        raw.copy_from_slice(&bytes[..10]);
        if blake2b_16(&raw) != bytes[10..] {
            return Err(WalletError::InvalidTokenId(format!("bad checksum: {}", s)));
        }
        Ok(Self(raw))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            TOKEN_ID_PREFIX,
            hex::encode(self.0),
            hex::encode(blake2b_16(&self.0))
        )
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
