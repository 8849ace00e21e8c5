//! Background receive drain
//!
//! A drain repeatedly receives the oldest unreceived block of an account and
//! reports each attempt. The node has no "backlog empty" flag: an attempt that
//! finds nothing to receive reports a message, and only the wording of that
//! message tells the consumer the backlog is exhausted. That match lives in
//! [`classify`] and nowhere else.
//!
//! A failed attempt is either a rejection, which the drain reports and moves
//! past, or a lost connection, which ends the run for the consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::block::{Hash32, TransferIntent};
use crate::error::{LedgerError, WalletError};
use crate::keys::DerivedAccount;
use crate::ledger::LedgerConnection;
use crate::pow;

/// Substring of the result message that marks an exhausted backlog
const EXHAUSTED_MARKER: &str = "Don't have";

pub const NOTHING_TO_RECEIVE: &str = "Don't have unreceivedAccountBlocks.";
pub const RECEIVE_SUCCESS: &str = "Receive accountBlock success";

#[derive(Clone, Copy, Debug)]
pub struct DrainOptions {
    pub poll_interval: Duration,
    /// Backlog size known when the drain was started (informational)
    pub expected_count: u64,
}

/// Raw output of one drain tick, as the node-facing side reports it
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrainMessage {
    Result {
        message: String,
        block: Option<Hash32>,
    },
    Error(String),
    /// The node could not be reached
    ConnectionLost(String),
}

/// One drain tick after classification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrainEvent {
    /// A block was received; carries a reference to it
    Received(String),
    /// Nothing left to receive
    Exhausted,
    /// The tick failed; carries the node's detail
    Rejected(String),
    /// The node went away; no further tick will succeed
    ConnectionLost(String),
}

/// Translate a raw drain message into a tagged event
pub fn classify(message: DrainMessage) -> DrainEvent {
    match message {
        DrainMessage::Result { message, .. } if message.contains(EXHAUSTED_MARKER) => {
            DrainEvent::Exhausted
        }
        DrainMessage::Result {
            block: Some(hash), ..
        } => DrainEvent::Received(hash.to_string()),
        DrainMessage::Result {
            message,
            block: None,
        } => DrainEvent::Received(message),
        DrainMessage::Error(detail) => DrainEvent::Rejected(detail),
        DrainMessage::ConnectionLost(detail) => DrainEvent::ConnectionLost(detail),
    }
}

/// Consumer side of a running drain
pub struct DrainSubscription {
    events: mpsc::UnboundedReceiver<DrainMessage>,
    stopped: Arc<AtomicBool>,
}

/// Producer side of a running drain
#[derive(Clone)]
pub struct DrainSender {
    events: mpsc::UnboundedSender<DrainMessage>,
    stopped: Arc<AtomicBool>,
}

impl DrainSubscription {
    pub fn channel() -> (DrainSender, DrainSubscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));
        (
            DrainSender {
                events: tx,
                stopped: stopped.clone(),
            },
            DrainSubscription {
                events: rx,
                stopped,
            },
        )
    }

    /// Next classified event, or `None` once the producer has gone away
    pub async fn next(&mut self) -> Option<DrainEvent> {
        self.events.recv().await.map(classify)
    }

    /// Ask the producer to stop; takes effect at its next tick
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl DrainSender {
    /// Returns false when the subscription has been dropped
    pub fn emit(&self, message: DrainMessage) -> bool {
        self.events.send(message).is_ok()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst) || self.events.is_closed()
    }
}

/// Drain loop run by connections that receive blocks through the regular
/// ledger calls. The first attempt happens immediately.
pub async fn run_drain<L>(
    ledger: Arc<L>,
    account: DerivedAccount,
    options: DrainOptions,
    sender: DrainSender,
) where
    L: LedgerConnection + ?Sized,
{
    log::info!(
        "Receive drain started for {} ({} expected, every {}ms)",
        account.address,
        options.expected_count,
        options.poll_interval.as_millis()
    );

    let mut ticker = tokio::time::interval(options.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if sender.is_stopped() {
            break;
        }

        let message = match receive_next(ledger.as_ref(), &account).await {
            Ok(Some(hash)) => DrainMessage::Result {
                message: RECEIVE_SUCCESS.to_string(),
                block: Some(hash),
            },
            Ok(None) => DrainMessage::Result {
                message: NOTHING_TO_RECEIVE.to_string(),
                block: None,
            },
            Err(TickError::Failed(detail)) => {
                log::debug!("Receive attempt failed: {}", detail);
                DrainMessage::Error(detail)
            }
            Err(TickError::ConnectionLost(detail)) => {
                log::warn!("Receive drain lost the node: {}", detail);
                DrainMessage::ConnectionLost(detail)
            }
        };

        if !sender.emit(message) {
            break;
        }
    }

    log::info!("Receive drain stopped for {}", account.address);
}

/// Why a single receive attempt did not go through
#[derive(Debug)]
enum TickError {
    ConnectionLost(String),
    Failed(String),
}

impl TickError {
    /// Transport failures end the run; anything else the node said is a
    /// rejection described by `reject`
    fn from_ledger(e: LedgerError, reject: impl FnOnce(LedgerError) -> String) -> Self {
        if e.is_transport() {
            Self::ConnectionLost(e.detail())
        } else {
            Self::Failed(reject(e))
        }
    }
}

impl From<WalletError> for TickError {
    fn from(e: WalletError) -> Self {
        Self::Failed(e.to_string())
    }
}

/// Receive the oldest unreceived block, if there is one
async fn receive_next<L>(ledger: &L, account: &DerivedAccount) -> Result<Option<Hash32>, TickError>
where
    L: LedgerConnection + ?Sized,
{
    let pending = ledger
        .get_unreceived_blocks(&account.address, 0, 1)
        .await
        .map_err(|e| TickError::from_ledger(e, |e| e.detail()))?;
    let Some(send_block) = pending.into_iter().next() else {
        return Ok(None);
    };

    let mut intent = TransferIntent::receive(account.address, send_block.hash);
    let head = ledger
        .get_latest_account_block(&account.address)
        .await
        .map_err(|e| {
            TickError::from_ledger(e, |e| WalletError::ChainStateError(e.detail()).to_string())
        })?;
    intent.set_head(head);

    let query = intent.difficulty_query()?;
    let pow = pow::request_pow(ledger, &query).await.map_err(|failure| {
        if failure.ledger_error().is_transport() {
            TickError::ConnectionLost(failure.ledger_error().detail())
        } else {
            TickError::from(WalletError::from(failure))
        }
    })?;
    if let Some(pow) = pow {
        intent.set_pow(pow);
    }

    let block = intent.sign(account)?;
    let receipt = ledger
        .submit_signed_block(block)
        .await
        .map_err(|e| TickError::from_ledger(e, |e| e.into_rpc_error().message))?;

    log::debug!(
        "Received {} as block {}",
        send_block.hash,
        receipt.block.hash
    );
    Ok(Some(receipt.block.hash))
}
