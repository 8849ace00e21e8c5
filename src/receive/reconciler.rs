//! Receive reconciliation: pull unreceived transfers into an account
//!
//! A run first checks how many blocks are waiting (bounded by the discovery
//! timeout), then starts a background drain and folds its events into the
//! shared status until the drain reports that nothing is left. Rejected
//! blocks are recorded and the run carries on. Only the exhausted backlog or
//! a lost connection ends the run.

use std::sync::Arc;
use std::time::Duration;

use super::status::{self, ReceiveHandle, ReceiveResult, StatusWriter};
use crate::config::ClientConfig;
use crate::error::{LedgerError, WalletError};
use crate::keys::{DerivedAccount, Wallet};
use crate::ledger::{DrainEvent, DrainOptions, LedgerConnector};
use crate::timed;

const DRAIN_LOST: &str = "receive task stopped unexpectedly";

#[derive(Clone, Debug)]
pub struct ReceiveOptions {
    /// Request timeout of the connection used by the run
    pub connect_timeout: Duration,
    /// Deadline for the opening balance check
    pub discovery_timeout: Duration,
    /// Interval between drain attempts
    pub drain_interval: Duration,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(1000),
            discovery_timeout: Duration::from_millis(2000),
            drain_interval: Duration::from_millis(2545),
        }
    }
}

impl From<&ClientConfig> for ReceiveOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.rpc_timeout,
            discovery_timeout: config.discovery_timeout,
            drain_interval: config.drain_interval,
        }
    }
}

pub struct ReceiveReconciler {
    connector: Arc<dyn LedgerConnector>,
    options: ReceiveOptions,
}

impl ReceiveReconciler {
    pub fn new(connector: Arc<dyn LedgerConnector>, options: ReceiveOptions) -> Self {
        Self { connector, options }
    }

    /// Start reconciling the account at `index` and return its live status.
    ///
    /// Returns as soon as the account is derived; the run continues on a
    /// background task. Must be called from within a Tokio runtime.
    pub fn run(&self, wallet: &Wallet, index: u32) -> Result<ReceiveHandle, WalletError> {
        let account = wallet.derive(index)?;
        let (writer, handle) = status::channel(account.address);

        tokio::spawn(reconcile(
            self.connector.clone(),
            account,
            self.options.clone(),
            writer,
        ));

        Ok(handle)
    }
}

async fn reconcile(
    connector: Arc<dyn LedgerConnector>,
    account: DerivedAccount,
    options: ReceiveOptions,
    status: StatusWriter,
) {
    let address = account.address;
    log::info!("Checking balance for {}", address);

    let connect_timeout = options.connect_timeout;
    let discovery = async move {
        let ledger = connector.open(connect_timeout).await?;
        let state = ledger.get_account_state(&address).await?;
        Ok::<_, LedgerError>((ledger, state))
    };

    let (ledger, state) = match timed::race(discovery, options.discovery_timeout).await {
        Ok(Ok((ledger, state))) if state.balance.is_some() => (ledger, state),
        Ok(Ok(_)) => {
            log::warn!("Node returned no balance for {}", address);
            status.fail(WalletError::DiscoveryTimeout.to_string());
            return;
        }
        Ok(Err(e)) => {
            log::warn!("Balance check for {} failed: {}", address, e);
            status.fail(WalletError::DiscoveryTimeout.to_string());
            return;
        }
        Err(e) => {
            log::warn!("Balance check for {}: {}", address, e);
            status.fail(WalletError::DiscoveryTimeout.to_string());
            return;
        }
    };

    let unreceived = state.unreceived.block_count;
    status.set_unreceived(unreceived);

    if unreceived == 0 {
        log::info!("No pending transactions for {}", address);
        status.succeed_empty(WalletError::EmptyBacklog.to_string());
        return;
    }

    log::info!("Start receiving {} transactions for {}", unreceived, address);
    status.set_message("start receiving task...");

    let mut drain = ledger.start_receive_drain(
        account,
        DrainOptions {
            poll_interval: options.drain_interval,
            expected_count: unreceived,
        },
    );

    let mut success = Vec::new();
    let mut error = Vec::new();

    while let Some(event) = drain.next().await {
        log::debug!(
            "Drain event for {} (success: {}, error: {}): {:?}",
            address,
            success.len(),
            error.len(),
            event
        );

        match event {
            DrainEvent::Exhausted => {
                drain.stop();
                log::info!(
                    "Receive finished for {}: {} received, {} rejected",
                    address,
                    success.len(),
                    error.len()
                );
                status.succeed(
                    format!("{} blocks received success", unreceived),
                    ReceiveResult {
                        unreceived,
                        success,
                        error,
                    },
                );
                return;
            }
            DrainEvent::Received(block_ref) => {
                status.set_message(format!(
                    "{}/{} {}",
                    success.len() + 1,
                    unreceived,
                    block_ref
                ));
                success.push(block_ref);
            }
            DrainEvent::Rejected(detail) => {
                log::warn!("Receive attempt for {} rejected: {}", address, detail);
                error.push(detail);
            }
            DrainEvent::ConnectionLost(detail) => {
                drain.stop();
                log::error!(
                    "Receive for {} lost the node after {} received: {}",
                    address,
                    success.len(),
                    detail
                );
                status.fail(WalletError::ConnectionError(detail).to_string());
                return;
            }
        }
    }

    log::error!("Receive drain for {} ended without finishing", address);
    status.fail(DRAIN_LOST);
}
