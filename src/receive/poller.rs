//! Caller-side observation of a receive run

use std::time::Duration;

use super::status::{ReceiveHandle, ReceiveState, ReceiveStatus};

/// Samples a [`ReceiveHandle`] at a fixed interval until the run succeeds.
///
/// A run that ends in `failed` never satisfies the poller, so
/// [`wait_for_success`](StatusPoller::wait_for_success) keeps sampling it
/// forever. Bound it with [`crate::timed::race`] or select against
/// [`ReceiveHandle::failed`] when that matters.
#[derive(Clone, Copy, Debug)]
pub struct StatusPoller {
    interval: Duration,
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Return the first sampled snapshot whose state is `success`.
    ///
    /// Every other sample is passed to `on_progress` before sleeping.
    pub async fn wait_for_success<F>(&self, handle: &ReceiveHandle, mut on_progress: F) -> ReceiveStatus
    where
        F: FnMut(&ReceiveStatus),
    {
        loop {
            let status = handle.snapshot();
            if status.state == ReceiveState::Success {
                return status;
            }
            on_progress(&status);
            tokio::time::sleep(self.interval).await;
        }
    }
}
