//! Receiving pending transfers
//!
//! [`ReceiveReconciler`] drives a run in the background and publishes its
//! progress as [`ReceiveStatus`] snapshots; [`StatusPoller`] is the
//! caller-side loop that waits for the run to succeed.

pub mod poller;
pub mod reconciler;
pub mod status;

pub use poller::StatusPoller;
pub use reconciler::{ReceiveOptions, ReceiveReconciler};
pub use status::{ReceiveHandle, ReceiveOutcome, ReceiveResult, ReceiveState, ReceiveStatus};
