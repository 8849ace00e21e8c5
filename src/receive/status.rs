//! Live status of a receive run
//!
//! The reconciler is the only writer; any number of handles read it. Each
//! write publishes a complete new snapshot through a watch channel, so a
//! reader never sees a half-updated status even when writer and readers run
//! on different threads.

use serde::Serialize;
use tokio::sync::watch;

use crate::keys::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiveState {
    Working,
    Success,
    Failed,
}

/// Terminal payload of a drained backlog
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReceiveResult {
    /// Backlog size at discovery time
    pub unreceived: u64,
    /// Received block references, in arrival order
    pub success: Vec<String>,
    /// Rejection details, in arrival order
    pub error: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReceiveStatus {
    pub state: ReceiveState,
    /// 1 for a failed run and, as existing callers expect, for an empty backlog
    pub error_code: u8,
    pub message: String,
    pub unreceived_count: u64,
    pub result: Option<ReceiveResult>,
}

/// Tagged reading of a status, without the overloaded `error_code`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Pending,
    Drained(ReceiveResult),
    EmptyBacklog,
    Failed(String),
}

impl ReceiveStatus {
    fn starting() -> Self {
        Self {
            state: ReceiveState::Working,
            error_code: 0,
            message: "checking balance...".to_string(),
            unreceived_count: 0,
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state != ReceiveState::Working
    }

    pub fn outcome(&self) -> ReceiveOutcome {
        match (self.state, &self.result) {
            (ReceiveState::Working, _) => ReceiveOutcome::Pending,
            (ReceiveState::Success, Some(result)) => ReceiveOutcome::Drained(result.clone()),
            (ReceiveState::Success, None) => ReceiveOutcome::EmptyBacklog,
            (ReceiveState::Failed, _) => ReceiveOutcome::Failed(self.message.clone()),
        }
    }
}

/// Create the writer/reader pair for one run
pub(crate) fn channel(address: Address) -> (StatusWriter, ReceiveHandle) {
    let (tx, rx) = watch::channel(ReceiveStatus::starting());
    (StatusWriter { tx }, ReceiveHandle { address, rx })
}

/// Writer side, owned by the reconciler task
pub(crate) struct StatusWriter {
    tx: watch::Sender<ReceiveStatus>,
}

impl StatusWriter {
    /// Apply `change` unless the status is already terminal
    fn update(&self, change: impl FnOnce(&mut ReceiveStatus)) {
        self.tx.send_if_modified(|status| {
            if status.is_terminal() {
                log::warn!("Ignoring update to terminal receive status: {}", status.message);
                return false;
            }
            change(status);
            true
        });
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|status| status.message = message);
    }

    pub fn set_unreceived(&self, count: u64) {
        self.update(|status| status.unreceived_count = count);
    }

    pub fn succeed(&self, message: impl Into<String>, result: ReceiveResult) {
        let message = message.into();
        self.update(|status| {
            status.state = ReceiveState::Success;
            status.message = message;
            status.result = Some(result);
        });
    }

    pub fn succeed_empty(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|status| {
            status.state = ReceiveState::Success;
            status.error_code = 1;
            status.message = message;
        });
    }

    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|status| {
            status.state = ReceiveState::Failed;
            status.error_code = 1;
            status.message = message;
        });
    }
}

/// Reader side returned to the caller of a receive run
#[derive(Clone)]
pub struct ReceiveHandle {
    address: Address,
    rx: watch::Receiver<ReceiveStatus>,
}

impl ReceiveHandle {
    /// Account being reconciled
    pub fn address(&self) -> Address {
        self.address
    }

    /// Latest published status
    pub fn snapshot(&self) -> ReceiveStatus {
        self.rx.borrow().clone()
    }

    /// Wait until the run reaches `success` or `failed`
    pub async fn finished(&self) -> ReceiveStatus {
        self.wait_for(|status| status.is_terminal()).await
    }

    /// Wait until the run reaches `failed`; never resolves for a run that succeeds
    pub async fn failed(&self) -> ReceiveStatus {
        self.wait_for(|status| status.state == ReceiveState::Failed)
            .await
    }

    async fn wait_for(&self, done: impl FnMut(&ReceiveStatus) -> bool) -> ReceiveStatus {
        let mut rx = self.rx.clone();
        let reached = rx.wait_for(done).await.map(|status| status.clone()).ok();
        match reached {
            Some(status) => status,
            // the writer is gone and the status will never change again
            None => std::future::pending().await,
        }
    }
}
