//! Scripted terminal host
//!
//! Stands in for the embedded terminal during development and tests. Each
//! submission plays a [`Script`] of status events back through the bridge.
//! Which script answers which submission is decided by the caller; the order
//! contents never influence it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{HostBridge, HostRequest, StatusKind};

/// One scripted status event, `after` measured from the submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    pub after: Duration,
    pub kind: StatusKind,
    pub code: String,
    pub detail: String,
}

/// Sequence of status events answering one submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn step(
        mut self,
        after: Duration,
        kind: StatusKind,
        code: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        self.steps.push(ScriptStep {
            after,
            kind,
            code: code.into(),
            detail: detail.into(),
        });
        self
    }

    /// Approved card payment: pending, connecting, printing, success
    pub fn approve(interval: Duration) -> Self {
        Self::new()
            .step(Duration::ZERO, StatusKind::PaymentPending, "101", "Payment pending...")
            .step(interval, StatusKind::PaymentConnecting, "100", "Connecting to terminal...")
            .step(interval * 2, StatusKind::PaymentPrinting, "102", "Printing receipt...")
            .step(interval * 3, StatusKind::PaymentSuccess, "200", "Payment completed successfully")
    }

    /// Every error kind in turn, one per interval
    pub fn decline_all(interval: Duration) -> Self {
        Self::new()
            .step(
                Duration::ZERO,
                StatusKind::ValidationError,
                "400",
                "Validation error: Amount exceeds limit",
            )
            .step(interval, StatusKind::PaymentError, "500", "Payment processing failed")
            .step(interval * 2, StatusKind::OrderSaveError, "501", "Order could not be saved")
            .step(interval * 3, StatusKind::EcrError, "502", "ECR communication error")
            .step(interval * 4, StatusKind::ActionResponse, "503", "Action failed to complete")
    }

    /// Single event right after the submission
    pub fn single(kind: StatusKind, code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new().step(Duration::ZERO, kind, code, detail)
    }

    /// No answer at all
    pub fn silent() -> Self {
        Self::new()
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }
}

/// Submissions received by a [`SimulatedTerminal`]
#[derive(Debug, Clone, Default)]
pub struct SubmissionLog {
    requests: Arc<Mutex<Vec<HostRequest>>>,
}

impl SubmissionLog {
    pub fn requests(&self) -> Vec<HostRequest> {
        self.requests.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }

    fn push(&self, request: HostRequest) {
        self.requests.lock().push(request);
    }
}

/// Scripted terminal host attached to a [`HostBridge`]
///
/// Submission N (1-based) is answered by `scripts[N - 1]`; the last script
/// answers every later submission. Earlier playbacks are not cancelled by a
/// new submission, like a real terminal that keeps answering late.
pub struct SimulatedTerminal {
    bridge: HostBridge,
    requests: mpsc::UnboundedReceiver<HostRequest>,
    scripts: Vec<Script>,
    echo_submission: bool,
    log: SubmissionLog,
}

impl SimulatedTerminal {
    /// Attach to the bridge as its terminal host
    pub fn attach(bridge: &HostBridge, scripts: Vec<Script>) -> Self {
        Self {
            bridge: bridge.clone(),
            requests: bridge.attach_host(),
            scripts,
            echo_submission: true,
            log: SubmissionLog::default(),
        }
    }

    /// Echo the submission number on events (default true)
    ///
    /// Turning it off mimics a host that does not tag its answers.
    pub fn with_echo_submission(mut self, echo: bool) -> Self {
        self.echo_submission = echo;
        self
    }

    /// Handle to the received submissions
    pub fn log(&self) -> SubmissionLog {
        self.log.clone()
    }

    /// Run until cancelled or the bridge drops the host
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(mut self, shutdown: CancellationToken) {
        info!("Simulated terminal started");
        let mut received = 0usize;

        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        info!("Simulated terminal detached");
                        return;
                    };
                    received += 1;
                    let script = self.script_for(received);
                    debug!(submission = request.submission(), steps = script.steps.len(), "Playing script");

                    let submission = self.echo_submission.then(|| request.submission());
                    self.log.push(request);
                    tokio::spawn(play(
                        self.bridge.clone(),
                        script,
                        submission,
                        shutdown.child_token(),
                    ));
                }
                _ = shutdown.cancelled() => {
                    info!("Simulated terminal received shutdown signal");
                    return;
                }
            }
        }
    }

    fn script_for(&self, nth: usize) -> Script {
        self.scripts
            .get(nth - 1)
            .or_else(|| self.scripts.last())
            .cloned()
            .unwrap_or_default()
    }
}

async fn play(
    bridge: HostBridge,
    script: Script,
    submission: Option<u64>,
    cancel: CancellationToken,
) {
    let start = tokio::time::Instant::now();
    for step in script.steps {
        tokio::select! {
            _ = tokio::time::sleep_until(start + step.after) => {
                bridge.dispatch(step.kind, step.code, step.detail, submission);
            }
            _ = cancel.cancelled() => return,
        }
    }
}
