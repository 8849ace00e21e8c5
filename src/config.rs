/// Client configuration from environment variables
///
/// Controls which Vite node is used and the timing of the receive
/// reconciliation. Defaults match the public Vite mainnet node.

use std::env;
use std::time::Duration;

pub const DEFAULT_NODE_URL: &str = "https://node.vite.net/gvite/";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// JSON-RPC endpoint of the Vite node
    pub node_url: String,
    /// Request timeout for submissions and general RPC calls
    pub rpc_timeout: Duration,
    /// Request timeout for balance lookups
    pub balance_timeout: Duration,
    /// Deadline for the balance check that opens a receive run
    pub discovery_timeout: Duration,
    /// Interval between receive attempts while draining
    pub drain_interval: Duration,
    /// Interval at which the CLI polls the receive status
    pub status_poll_interval: Duration,
    /// Optional deadline around the CLI's status polling loop
    pub receive_watchdog: Option<Duration>,
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `VITE_NODE_URL`: node endpoint (default: public mainnet node)
    /// - `VITE_RPC_TIMEOUT_MS`: default 5000
    /// - `VITE_BALANCE_TIMEOUT_MS`: default 800
    /// - `VITE_DISCOVERY_TIMEOUT_MS`: default 2000
    /// - `VITE_DRAIN_INTERVAL_MS`: default 2545
    /// - `VITE_STATUS_POLL_MS`: default 1000
    /// - `VITE_RECEIVE_WATCHDOG_MS`: unset by default (poll forever)
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Use a local node
    /// VITE_NODE_URL=http://127.0.0.1:48132 vite-wallet balance -a vite_...
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let node_url = env::var("VITE_NODE_URL").unwrap_or(defaults.node_url);
        log::debug!("Vite node URL: {}", node_url);

        let receive_watchdog = env::var("VITE_RECEIVE_WATCHDOG_MS")
            .ok()
            .and_then(|raw| parse_millis("VITE_RECEIVE_WATCHDOG_MS", &raw));
        if let Some(watchdog) = receive_watchdog {
            log::debug!("Receive watchdog: {}ms", watchdog.as_millis());
        }

        Self {
            node_url,
            rpc_timeout: millis_from_env("VITE_RPC_TIMEOUT_MS", defaults.rpc_timeout),
            balance_timeout: millis_from_env("VITE_BALANCE_TIMEOUT_MS", defaults.balance_timeout),
            discovery_timeout: millis_from_env(
                "VITE_DISCOVERY_TIMEOUT_MS",
                defaults.discovery_timeout,
            ),
            drain_interval: millis_from_env("VITE_DRAIN_INTERVAL_MS", defaults.drain_interval),
            status_poll_interval: millis_from_env(
                "VITE_STATUS_POLL_MS",
                defaults.status_poll_interval,
            ),
            receive_watchdog,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            rpc_timeout: Duration::from_millis(5000),
            balance_timeout: Duration::from_millis(800),
            discovery_timeout: Duration::from_millis(2000),
            drain_interval: Duration::from_millis(2545),
            status_poll_interval: Duration::from_millis(1000),
            receive_watchdog: None,
        }
    }
}

fn millis_from_env(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|raw| parse_millis(key, &raw))
        .unwrap_or(default)
}

fn parse_millis(key: &str, raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            log::warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}
