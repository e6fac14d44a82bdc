use std::sync::Arc;
use std::time::Duration;

use kiosk_core::terminal::SubmissionLog;
use kiosk_core::{
    CheckoutDraft, DraftStore, FailureSource, FlowOutcome, HostBridge, InMemoryDraftStore,
    KeypadKey, KioskConfig, PaymentFlow, PaymentMethodOption, PaymentStep, ScreenExit,
    ScreenHandle, Script, SimulatedTerminal, StatusKind, TransactionError, TransactionScreen,
    TransactionState, Translations,
};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_millis(500);

struct Kiosk {
    bridge: HostBridge,
    store: Arc<InMemoryDraftStore>,
    config: KioskConfig,
    translations: Arc<Translations>,
    log: SubmissionLog,
    shutdown: CancellationToken,
}

impl Kiosk {
    fn new(scripts: Vec<Script>) -> Self {
        Self::with_config(scripts, KioskConfig::default())
    }

    fn with_config(scripts: Vec<Script>, config: KioskConfig) -> Self {
        let bridge = HostBridge::new();
        let terminal = SimulatedTerminal::attach(&bridge, scripts);
        let log = terminal.log();
        let shutdown = CancellationToken::new();
        terminal.spawn(shutdown.clone());

        Self {
            bridge,
            store: InMemoryDraftStore::shared(CheckoutDraft::new(Decimal::new(3890, 2))),
            config,
            translations: Arc::new(Translations::bundled()),
            log,
            shutdown,
        }
    }

    /// Walk steps 1 to 3 and pick a credit card
    fn checkout(&self) {
        let mut flow = PaymentFlow::new(self.store.clone(), &self.config);
        flow.submit_notes("no onions").unwrap();
        flow.press_key(KeypadKey::Digit(4)).unwrap();
        flow.press_key(KeypadKey::Digit(2)).unwrap();
        flow.submit_device_number().unwrap();
        assert_eq!(flow.select_method(&visa()).unwrap(), FlowOutcome::StartTransaction);
    }

    fn open_screen(&self) -> (ScreenHandle, JoinHandle<Result<ScreenExit, TransactionError>>) {
        TransactionScreen::new(
            Arc::new(self.bridge.clone()),
            self.store.clone(),
            self.translations.clone(),
            &self.config,
        )
        .spawn()
    }
}

impl Drop for Kiosk {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn visa() -> PaymentMethodOption {
    PaymentMethodOption {
        key: "visa".to_string(),
        id: 3,
        display_name: "Visa".to_string(),
        short_name: "Kapital Bank".to_string(),
        kind: "CREDIT_CARD".to_string(),
    }
}

async fn wait_error(handle: &mut ScreenHandle) -> TransactionState {
    handle
        .wait_for(|s| matches!(s, TransactionState::Error(_)))
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_approved_payment_returns_to_menu() {
    let kiosk = Kiosk::new(vec![Script::approve(INTERVAL)]);
    kiosk.checkout();
    let session = kiosk.store.get().session_id;

    let (mut handle, task) = kiosk.open_screen();
    handle.wait_for(|s| s.is_success()).await.unwrap();

    handle.return_to_menu().await.unwrap();
    assert_eq!(task.await.unwrap().unwrap(), ScreenExit::ReturnToMenu);

    assert_eq!(kiosk.log.len(), 1);
    let draft = kiosk.store.get();
    assert_ne!(draft.session_id, session);
    assert!(draft.device_number.is_empty());
    assert!(!kiosk.bridge.has_handler());
}

#[tokio::test(start_paused = true)]
async fn test_submitted_draft_carries_flow_values() {
    let kiosk = Kiosk::new(vec![Script::approve(INTERVAL)]);
    kiosk.checkout();

    let (mut handle, _task) = kiosk.open_screen();
    handle.wait_for(|s| s.is_success()).await.unwrap();

    let requests = kiosk.log.requests();
    let kiosk_core::HostRequest::SaveOrder { draft, submission } = &requests[0];
    assert_eq!(*submission, 1);
    assert_eq!(draft.notes, "no onions");
    assert_eq!(draft.device_number, "42");
    assert_eq!(draft.amount_due, Decimal::new(3890, 2));
    assert_eq!(draft.payment_method.as_ref().unwrap().key, "visa");
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_validation_error() {
    let kiosk = Kiosk::new(vec![
        Script::single(
            StatusKind::ValidationError,
            "400",
            "Validation error: Amount exceeds limit",
        ),
        Script::approve(INTERVAL),
    ]);
    kiosk.checkout();

    let (mut handle, _task) = kiosk.open_screen();
    let state = wait_error(&mut handle).await;
    let failure = state.failure().unwrap();
    assert_eq!(
        failure.source,
        FailureSource::Terminal(StatusKind::ValidationError)
    );
    assert_eq!(failure.message, "Validation error: Amount exceeds limit");

    handle.retry().await.unwrap();
    // Old message hidden before the terminal answers again
    assert_eq!(handle.state(), TransactionState::Connecting);
    assert_eq!(kiosk.log.len(), 1);

    handle.wait_for(|s| s.is_success()).await.unwrap();
    assert_eq!(kiosk.log.len(), 2);
    assert_eq!(kiosk.log.requests()[1].submission(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_double_retry_submits_once() {
    let kiosk = Kiosk::new(vec![
        Script::single(StatusKind::PaymentError, "500", "Payment processing failed"),
        Script::approve(INTERVAL),
    ]);
    kiosk.checkout();

    let (mut handle, _task) = kiosk.open_screen();
    wait_error(&mut handle).await;

    handle.retry().await.unwrap();
    handle.retry().await.unwrap();

    handle.wait_for(|s| s.is_success()).await.unwrap();
    let requests = kiosk.log.requests();
    assert_eq!(requests.len(), 2);

    let kiosk_core::HostRequest::SaveOrder { draft: first, .. } = &requests[0];
    let kiosk_core::HostRequest::SaveOrder { draft: second, .. } = &requests[1];
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_late_answers_to_old_submission_ignored() {
    // First submission fails at once, then keeps reporting errors until 12s.
    // Latch off so only the submission number keeps them out.
    let config = KioskConfig::default().with_latch_success(false);
    let kiosk = Kiosk::with_config(
        vec![
            Script::decline_all(Duration::from_secs(3)),
            Script::approve(Duration::from_secs(1)),
        ],
        config,
    );
    kiosk.checkout();

    let (mut handle, _task) = kiosk.open_screen();
    wait_error(&mut handle).await;
    handle.retry().await.unwrap();

    let mut states = handle.states();
    let mut seen = Vec::new();
    while !seen.last().is_some_and(TransactionState::is_success) {
        states.changed().await.unwrap();
        seen.push(states.borrow_and_update().clone());
    }
    assert!(
        seen.iter().all(|s| s.failure().is_none()),
        "error shown after retry: {:?}",
        seen
    );

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(handle.state().is_success());
}

#[tokio::test(start_paused = true)]
async fn test_localised_terminal_error() {
    let kiosk = Kiosk::new(vec![Script::single(StatusKind::EcrError, "ERROR_32", "paper out")]);
    kiosk.checkout();

    let (mut handle, _task) = kiosk.open_screen();
    let state = wait_error(&mut handle).await;
    assert_eq!(state.failure().unwrap().message, "Kağız bitdi");
}

#[tokio::test(start_paused = true)]
async fn test_missing_host_is_channel_error() {
    let bridge = HostBridge::new();
    let store = InMemoryDraftStore::shared(CheckoutDraft::new(Decimal::from(10)));
    let (mut handle, _task) = TransactionScreen::new(
        Arc::new(bridge),
        store,
        Arc::new(Translations::bundled()),
        &KioskConfig::default(),
    )
    .spawn();

    let state = wait_error(&mut handle).await;
    let failure = state.failure().unwrap();
    assert_eq!(failure.source, FailureSource::Channel);
    assert_eq!(
        failure.message,
        "Kassa qoşulmayıb, xahiş edirik restoran işçilərinə bildirin"
    );
}

#[tokio::test(start_paused = true)]
async fn test_silent_terminal_times_out() {
    let config = KioskConfig::default().with_response_timeout(Some(Duration::from_secs(60)));
    let kiosk = Kiosk::with_config(vec![Script::silent()], config);
    kiosk.checkout();

    let (mut handle, _task) = kiosk.open_screen();
    let state = wait_error(&mut handle).await;
    assert_eq!(state.failure().unwrap().source, FailureSource::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_change_payment_method_keeps_notes_and_device() {
    let kiosk = Kiosk::new(vec![Script::single(
        StatusKind::OrderSaveError,
        "501",
        "Order could not be saved",
    )]);
    kiosk.checkout();

    let (mut handle, task) = kiosk.open_screen();
    wait_error(&mut handle).await;
    handle.change_payment_method().await.unwrap();
    assert_eq!(task.await.unwrap().unwrap(), ScreenExit::ChangePaymentMethod);

    let flow = PaymentFlow::at_step(kiosk.store.clone(), &kiosk.config, PaymentStep::PaymentMethod);
    let draft = flow.draft();
    assert_eq!(draft.notes, "no onions");
    assert_eq!(draft.device_number, "42");
    assert!(!kiosk.bridge.has_handler());
}

#[tokio::test(start_paused = true)]
async fn test_actions_after_exit_fail() {
    let kiosk = Kiosk::new(vec![Script::approve(INTERVAL)]);
    kiosk.checkout();

    let (mut handle, task) = kiosk.open_screen();
    handle.wait_for(|s| s.is_success()).await.unwrap();
    handle.return_to_menu().await.unwrap();
    task.await.unwrap().unwrap();

    assert!(matches!(
        handle.retry().await,
        Err(TransactionError::ScreenClosed)
    ));
}
