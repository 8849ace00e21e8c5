//! Scripted in-process ledger shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vite_wallet::block::{ChainHead, DifficultyQuery, Hash32, SignedBlock};
use vite_wallet::ledger::drain::NOTHING_TO_RECEIVE;
use vite_wallet::ledger::{
    AccountInfo, AccountState, DrainMessage, DrainOptions, DrainSubscription, LedgerConnection,
    LedgerConnector, TransactionRecord, TransferReceipt, UnreceivedBlock, UnreceivedSummary,
};
use vite_wallet::{DerivedAccount, LedgerError, RpcError, Wallet};

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const VITE_TOKEN: &str = "tti_5649544520544f4b454e6e40";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_wallet() -> Wallet {
    Wallet::from_mnemonic(TEST_MNEMONIC).expect("test mnemonic")
}

/// Account state with a known balance and `unreceived` pending blocks
pub fn account_with_backlog(unreceived: u64) -> AccountState {
    AccountState {
        balance: Some(AccountInfo::default()),
        unreceived: UnreceivedSummary {
            block_count: unreceived,
            ..Default::default()
        },
    }
}

pub fn received(message: &str) -> DrainMessage {
    DrainMessage::Result {
        message: message.to_string(),
        block: None,
    }
}

pub fn exhausted() -> DrainMessage {
    DrainMessage::Result {
        message: NOTHING_TO_RECEIVE.to_string(),
        block: None,
    }
}

pub fn rejected(detail: &str) -> DrainMessage {
    DrainMessage::Error(detail.to_string())
}

pub fn connection_lost(detail: &str) -> DrainMessage {
    DrainMessage::ConnectionLost(detail.to_string())
}

/// Responses the mock hands out, and what it has been asked
pub struct Script {
    pub account_state: Result<AccountState, LedgerError>,
    /// Delay before `get_account_state` answers
    pub account_delay: Option<Duration>,
    pub head: Result<ChainHead, LedgerError>,
    pub difficulty: Result<Option<String>, LedgerError>,
    pub nonce: Result<[u8; 8], LedgerError>,
    pub submit_error: Option<LedgerError>,
    pub transactions: Vec<TransactionRecord>,
    /// Messages emitted by a drain, one per tick
    pub drain: Vec<DrainMessage>,
    /// Close the drain stream once the script runs out instead of idling
    pub close_after_script: bool,

    pub calls: Vec<&'static str>,
    pub difficulty_queries: Vec<DifficultyQuery>,
    pub nonce_requests: Vec<(String, Hash32)>,
    pub submitted: Vec<SignedBlock>,
    pub drains_started: usize,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            account_state: Ok(account_with_backlog(0)),
            account_delay: None,
            head: Ok(ChainHead::genesis()),
            difficulty: Ok(None),
            nonce: Ok([0u8; 8]),
            submit_error: None,
            transactions: Vec::new(),
            drain: Vec::new(),
            close_after_script: false,
            calls: Vec::new(),
            difficulty_queries: Vec::new(),
            nonce_requests: Vec::new(),
            submitted: Vec::new(),
            drains_started: 0,
        }
    }
}

#[derive(Default)]
pub struct MockLedger {
    script: Mutex<Script>,
    drain_stopped: Arc<AtomicBool>,
}

impl MockLedger {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            drain_stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Inspect or adjust the script
    pub fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().expect("script lock");
        f(&mut script)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.with(|s| s.calls.clone())
    }

    pub fn drains_started(&self) -> usize {
        self.with(|s| s.drains_started)
    }

    /// True once a drain observed `stop()` (or a dropped subscription)
    pub fn drain_stopped(&self) -> bool {
        self.drain_stopped.load(Ordering::SeqCst)
    }

    fn record(&self, call: &'static str) {
        self.with(|s| s.calls.push(call));
    }
}

#[async_trait]
impl LedgerConnection for MockLedger {
    async fn get_account_state(&self, _address: &vite_wallet::Address) -> Result<AccountState, LedgerError> {
        self.record("get_account_state");
        if let Some(delay) = self.with(|s| s.account_delay) {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| s.account_state.clone())
    }

    async fn get_transaction_list(
        &self,
        _address: &vite_wallet::Address,
        page_index: u32,
        page_size: u32,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.record("get_transaction_list");
        Ok(self.with(|s| {
            s.transactions
                .iter()
                .skip((page_index * page_size) as usize)
                .take(page_size as usize)
                .cloned()
                .collect()
        }))
    }

    async fn get_latest_account_block(
        &self,
        _address: &vite_wallet::Address,
    ) -> Result<ChainHead, LedgerError> {
        self.record("get_latest_account_block");
        self.with(|s| s.head.clone())
    }

    async fn get_pow_difficulty(
        &self,
        query: &DifficultyQuery,
    ) -> Result<Option<String>, LedgerError> {
        self.record("get_pow_difficulty");
        self.with(|s| {
            s.difficulty_queries.push(query.clone());
            s.difficulty.clone()
        })
    }

    async fn get_pow_nonce(&self, difficulty: &str, hash: &Hash32) -> Result<[u8; 8], LedgerError> {
        self.record("get_pow_nonce");
        self.with(|s| {
            s.nonce_requests.push((difficulty.to_string(), *hash));
            s.nonce.clone()
        })
    }

    async fn submit_signed_block(&self, block: SignedBlock) -> Result<TransferReceipt, LedgerError> {
        self.record("submit_signed_block");
        self.with(|s| {
            if let Some(e) = s.submit_error.clone() {
                return Err(e);
            }
            s.submitted.push(block.clone());
            Ok(TransferReceipt {
                block,
                node_response: serde_json::Value::Null,
            })
        })
    }

    async fn get_unreceived_blocks(
        &self,
        _address: &vite_wallet::Address,
        _page_index: u32,
        _page_size: u32,
    ) -> Result<Vec<UnreceivedBlock>, LedgerError> {
        self.record("get_unreceived_blocks");
        Ok(Vec::new())
    }

    fn start_receive_drain(&self, _account: DerivedAccount, options: DrainOptions) -> DrainSubscription {
        let (messages, close_after_script) = self.with(|s| {
            s.drains_started += 1;
            (s.drain.clone(), s.close_after_script)
        });
        let stopped = self.drain_stopped.clone();
        let (sender, subscription) = DrainSubscription::channel();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(options.poll_interval);
            for message in messages {
                ticker.tick().await;
                if sender.is_stopped() {
                    stopped.store(true, Ordering::SeqCst);
                    return;
                }
                sender.emit(message);
            }
            if close_after_script {
                return;
            }
            loop {
                ticker.tick().await;
                if sender.is_stopped() {
                    stopped.store(true, Ordering::SeqCst);
                    return;
                }
            }
        });

        subscription
    }
}

/// Connector that hands out one shared [`MockLedger`]
pub struct MockConnector {
    ledger: Arc<MockLedger>,
    open_error: Option<LedgerError>,
    timeouts: Mutex<Vec<Duration>>,
}

impl MockConnector {
    pub fn new(ledger: Arc<MockLedger>) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            open_error: None,
            timeouts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: LedgerError) -> Arc<Self> {
        Arc::new(Self {
            ledger: MockLedger::new(Script::default()),
            open_error: Some(error),
            timeouts: Mutex::new(Vec::new()),
        })
    }

    /// Timeouts passed to `open`, in call order
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().expect("timeouts lock").clone()
    }
}

#[async_trait]
impl LedgerConnector for MockConnector {
    async fn open(&self, timeout: Duration) -> Result<Arc<dyn LedgerConnection>, LedgerError> {
        self.timeouts.lock().expect("timeouts lock").push(timeout);
        if let Some(e) = &self.open_error {
            return Err(e.clone());
        }
        Ok(self.ledger.clone())
    }
}

pub fn rpc_rejection(code: i64, message: &str) -> LedgerError {
    LedgerError::Rpc(RpcError {
        code,
        message: message.to_string(),
    })
}
