//! Hashing and key derivation primitives
//!
//! Vite hashes everything with Blake2b at several output sizes (the output
//! size is part of the Blake2b parameter block, so these are not truncations
//! of one digest) and derives ed25519 keys with SLIP-0010.

use blake2::digest::consts::{U2, U20, U32, U5};
use blake2::{Blake2b, Digest};
use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::error::WalletError;

type HmacSha512 = Hmac<Sha512>;

/// Vite's registered BIP44 coin type
pub const VITE_COIN_TYPE: u32 = 666666;

const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Computes a Blake2b 256-bit hash over the concatenation of `parts`
pub fn blake2b_256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

pub(crate) fn blake2b_160(data: &[u8]) -> [u8; 20] {
    let digest = Blake2b::<U20>::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

pub(crate) fn blake2b_40(data: &[u8]) -> [u8; 5] {
    let digest = Blake2b::<U5>::digest(data);
    let mut out = [0u8; 5];
    out.copy_from_slice(&digest);
    out
}

pub(crate) fn blake2b_16(data: &[u8]) -> [u8; 2] {
    let digest = Blake2b::<U2>::digest(data);
    let mut out = [0u8; 2];
    out.copy_from_slice(&digest);
    out
}

/// SLIP-0010 ed25519 derivation of `m/44'/666666'/index'` from a BIP39 seed.
///
/// Returns the 32-byte ed25519 secret key. Every level is hardened, which is
/// the only mode ed25519 supports.
pub fn derive_ed25519_key(seed: &[u8], index: u32) -> Result<[u8; 32], WalletError> {
    if index >= HARDENED_OFFSET {
        return Err(WalletError::Derivation(format!(
            "derivation index {} out of range",
            index
        )));
    }

    let (mut key, mut chain_code) = hmac_split(b"ed25519 seed", &[seed])?;

    for level in [44, VITE_COIN_TYPE, index] {
        let hardened = (level | HARDENED_OFFSET).to_be_bytes();
        (key, chain_code) = hmac_split(&chain_code, &[&[0u8][..], &key[..], &hardened[..]])?;
    }

    Ok(key)
}

fn hmac_split(key: &[u8], parts: &[&[u8]]) -> Result<([u8; 32], [u8; 32]), WalletError> {
    let mut mac =
        HmacSha512::new_from_slice(key).map_err(|e| WalletError::Derivation(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let output = mac.finalize().into_bytes();

    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);
    Ok((left, right))
}
