//! Transaction screen driver
//!
//! One task per screen. Terminal events, user actions, the retry settle
//! timer and the response deadline are handled one at a time from a single
//! `select!` loop, so the state machine never sees concurrent input.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::TransactionError;
use super::machine::{
    EventOutcome, LocalFault, RetryOutcome, TransactionMachine, TransactionState, UserAction,
};
use crate::config::KioskConfig;
use crate::draft::DraftStore;
use crate::i18n::Translations;
use crate::terminal::{ChannelError, TerminalChannel};

/// Why the transaction screen closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenExit {
    /// Back to menu browsing; the draft has been cleared
    ReturnToMenu,
    /// Back to step 3 of the payment flow; notes and device number kept
    ChangePaymentMethod,
    /// Every handle was dropped
    Closed,
}

#[derive(Debug)]
struct ActionRequest {
    action: UserAction,
    reply: oneshot::Sender<Result<(), TransactionError>>,
}

/// UI-side handle to a running transaction screen
#[derive(Debug, Clone)]
pub struct ScreenHandle {
    actions: mpsc::Sender<ActionRequest>,
    states: watch::Receiver<TransactionState>,
}

impl ScreenHandle {
    pub async fn retry(&self) -> Result<(), TransactionError> {
        self.send(UserAction::Retry).await
    }

    pub async fn return_to_menu(&self) -> Result<(), TransactionError> {
        self.send(UserAction::ReturnToMenu).await
    }

    pub async fn change_payment_method(&self) -> Result<(), TransactionError> {
        self.send(UserAction::ChangePaymentMethod).await
    }

    /// Send an action and wait until the screen has handled it
    pub async fn send(&self, action: UserAction) -> Result<(), TransactionError> {
        let (reply, rx) = oneshot::channel();
        self.actions
            .send(ActionRequest { action, reply })
            .await
            .map_err(|_| TransactionError::ScreenClosed)?;
        rx.await.map_err(|_| TransactionError::ScreenClosed)?
    }

    /// Current state
    pub fn state(&self) -> TransactionState {
        self.states.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn states(&self) -> watch::Receiver<TransactionState> {
        self.states.clone()
    }

    /// Wait until the state satisfies `f`
    pub async fn wait_for(
        &mut self,
        f: impl FnMut(&TransactionState) -> bool,
    ) -> Result<TransactionState, TransactionError> {
        self.states
            .wait_for(f)
            .await
            .map(|state| (*state).clone())
            .map_err(|_| TransactionError::ScreenClosed)
    }
}

/// Transaction status screen
pub struct TransactionScreen {
    channel: Arc<dyn TerminalChannel>,
    store: Arc<dyn DraftStore>,
    machine: TransactionMachine,
    retry_settle_delay: Duration,
    response_timeout: Option<Duration>,
}

impl TransactionScreen {
    pub fn new(
        channel: Arc<dyn TerminalChannel>,
        store: Arc<dyn DraftStore>,
        translations: Arc<Translations>,
        config: &KioskConfig,
    ) -> Self {
        Self {
            channel,
            store,
            machine: TransactionMachine::new(translations, config.latch_success),
            retry_settle_delay: config.retry_settle_delay,
            response_timeout: config.response_timeout,
        }
    }

    /// Start the screen task
    ///
    /// The draft is submitted once as soon as the task starts. The task ends
    /// with the [`ScreenExit`] chosen by the user.
    pub fn spawn(self) -> (ScreenHandle, JoinHandle<Result<ScreenExit, TransactionError>>) {
        let (action_tx, action_rx) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(self.machine.state());

        let task = tokio::spawn(self.run(action_rx, state_tx));
        let handle = ScreenHandle {
            actions: action_tx,
            states: state_rx,
        };
        (handle, task)
    }

    #[instrument(name = "transaction_screen", skip_all, fields(session_id = %self.store.get().session_id))]
    async fn run(
        mut self,
        mut actions: mpsc::Receiver<ActionRequest>,
        states: watch::Sender<TransactionState>,
    ) -> Result<ScreenExit, TransactionError> {
        // Dropped on every return path, which restores the no-op handler
        let mut subscription = self.channel.subscribe()?;

        let submission = self.machine.begin_submission();
        let mut deadline = match self.submit(submission) {
            Ok(deadline) => deadline,
            Err(e) => {
                warn!("Initial submission failed: {}", e);
                self.machine
                    .on_fault(LocalFault::ChannelUnavailable(e.to_string()));
                None
            }
        };
        let mut resubmit_at: Option<Instant> = None;
        self.publish(&states);

        loop {
            tokio::select! {
                event = subscription.recv() => {
                    let Some(event) = event else {
                        warn!("Status subscription closed");
                        return Err(TransactionError::SubscriptionLost);
                    };
                    let kind = event.kind;
                    match self.machine.on_event(event) {
                        EventOutcome::Applied => {
                            deadline = if self.machine.state().is_in_progress() {
                                self.deadline_from_now()
                            } else {
                                None
                            };
                        }
                        EventOutcome::Stale => debug!(%kind, "Dropping event for an older submission"),
                        EventOutcome::Unrecognized => debug!(%kind, "Ignoring unrecognized terminal status"),
                        EventOutcome::Latched => debug!(%kind, "Payment already completed, ignoring event"),
                    }
                }
                request = actions.recv() => {
                    let Some(ActionRequest { action, reply }) = request else {
                        info!("Screen handle dropped, closing");
                        return Ok(ScreenExit::Closed);
                    };
                    let result = self.handle_action(action, &mut resubmit_at, &mut deadline);
                    // Publish first so the caller sees the new state once answered
                    self.publish(&states);
                    match result {
                        Ok(exit) => {
                            let _ = reply.send(Ok(()));
                            if let Some(exit) = exit {
                                info!(?exit, "Leaving transaction screen");
                                return Ok(exit);
                            }
                        }
                        Err(e) => {
                            warn!(%action, "Rejected action: {}", e);
                            let _ = reply.send(Err(e));
                        }
                    }
                }
                _ = sleep_until_opt(resubmit_at) => {
                    resubmit_at = None;
                    deadline = self.resubmit();
                }
                _ = sleep_until_opt(deadline) => {
                    deadline = None;
                    let state = self.machine.state();
                    if state.is_in_progress() {
                        warn!(state = state.name(), "Terminal did not respond in time");
                        self.machine.on_fault(LocalFault::ResponseTimeout);
                    }
                }
            }
            self.publish(&states);
        }
    }

    fn handle_action(
        &mut self,
        action: UserAction,
        resubmit_at: &mut Option<Instant>,
        deadline: &mut Option<Instant>,
    ) -> Result<Option<ScreenExit>, TransactionError> {
        match action {
            UserAction::Retry => {
                match self.machine.retry()? {
                    RetryOutcome::Scheduled { submission } => {
                        info!(submission, "Retry scheduled");
                        *resubmit_at = Some(Instant::now() + self.retry_settle_delay);
                        *deadline = None;
                    }
                    RetryOutcome::AlreadyPending => debug!("Retry already pending"),
                }
                Ok(None)
            }
            UserAction::ReturnToMenu => {
                self.machine.return_to_menu()?;
                self.store.clear();
                Ok(Some(ScreenExit::ReturnToMenu))
            }
            UserAction::ChangePaymentMethod => {
                self.machine.change_payment_method()?;
                Ok(Some(ScreenExit::ChangePaymentMethod))
            }
        }
    }

    /// Hand the current draft to the terminal and arm the response deadline
    fn submit(&self, submission: u64) -> Result<Option<Instant>, ChannelError> {
        if !self.channel.is_available() {
            warn!(submission, "Terminal host not available, not submitting");
            return Err(ChannelError::Unavailable);
        }
        let draft = self.store.get();
        self.channel.submit(&draft, submission)?;
        debug!(submission, "Draft submitted");
        Ok(self.deadline_from_now())
    }

    fn resubmit(&mut self) -> Option<Instant> {
        let submission = self.machine.submission();
        match self.submit(submission) {
            Ok(deadline) => {
                self.machine.resubmitted();
                deadline
            }
            Err(e) => {
                warn!(submission, "Resubmission failed: {}", e);
                self.machine.resubmit_failed();
                None
            }
        }
    }

    fn deadline_from_now(&self) -> Option<Instant> {
        self.response_timeout.map(|timeout| Instant::now() + timeout)
    }

    fn publish(&self, states: &watch::Sender<TransactionState>) {
        let state = self.machine.state();
        states.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            info!(from = current.name(), to = %state, "Transaction state changed");
            *current = state;
            true
        });
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
