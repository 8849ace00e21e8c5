//! Quota check and proof-of-work for account blocks
//!
//! The node decides whether an account still has fee-free quota. When it
//! does not, it reports a difficulty and the block must carry a nonce the
//! node computes for `blake2b-256(raw address || previous hash)`.

use crate::block::{DifficultyQuery, Hash32, ProofOfWork, TransferIntent};
use crate::crypto::blake2b_256;
use crate::error::{LedgerError, WalletError};
use crate::keys::Address;
use crate::ledger::LedgerConnection;

/// Hash the PoW nonce is computed against
pub fn nonce_hash(address: &Address, previous_hash: &Hash32) -> Hash32 {
    Hash32(blake2b_256(&[&address.original()[..], &previous_hash.as_bytes()[..]]))
}

/// A failed quota or nonce request, with the ledger error that caused it
#[derive(Debug)]
pub enum PowFailure {
    Difficulty(LedgerError),
    Nonce(LedgerError),
}

impl PowFailure {
    pub fn ledger_error(&self) -> &LedgerError {
        match self {
            Self::Difficulty(e) | Self::Nonce(e) => e,
        }
    }
}

impl From<PowFailure> for WalletError {
    fn from(failure: PowFailure) -> Self {
        match failure {
            PowFailure::Difficulty(e) => WalletError::QuotaQueryError(e.detail()),
            PowFailure::Nonce(e) => WalletError::NonceComputationError(e.detail()),
        }
    }
}

/// Ask the node whether `intent` needs proof-of-work and attach it if so.
///
/// Returns whether a proof-of-work was attached. The intent must already be
/// anchored to its chain head.
pub async fn attach_pow_if_required<L>(
    ledger: &L,
    intent: &mut TransferIntent,
) -> Result<bool, WalletError>
where
    L: LedgerConnection + ?Sized,
{
    let query = intent.difficulty_query()?;
    match request_pow(ledger, &query).await? {
        Some(pow) => {
            intent.set_pow(pow);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Quota check and nonce request for `query`, keeping the failing step
pub async fn request_pow<L>(
    ledger: &L,
    query: &DifficultyQuery,
) -> Result<Option<ProofOfWork>, PowFailure>
where
    L: LedgerConnection + ?Sized,
{
    let difficulty = ledger
        .get_pow_difficulty(query)
        .await
        .map_err(PowFailure::Difficulty)?;

    let Some(difficulty) = difficulty else {
        log::debug!("Account {} has enough quota, skipping PoW", query.address);
        return Ok(None);
    };

    let hash = nonce_hash(&query.address, &query.previous_hash);
    log::info!(
        "Quota exhausted for {}, requesting PoW nonce (difficulty {})",
        query.address,
        difficulty
    );
    let nonce = ledger
        .get_pow_nonce(&difficulty, &hash)
        .await
        .map_err(PowFailure::Nonce)?;

    Ok(Some(ProofOfWork { difficulty, nonce }))
}
