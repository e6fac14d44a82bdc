//! Kiosk payment simulator
//!
//! Runs one checkout end to end against the scripted terminal:
//! notes, device number, payment method, then the transaction screen.

mod logger;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kiosk_core::{
    CheckoutDraft, DraftStore, HostBridge, InMemoryDraftStore, KeypadKey, KioskConfig,
    MethodGroups, PaymentFlow, ScreenExit, ScreenHandle, Script, SimulatedTerminal, StatusKind,
    TransactionScreen, TransactionState, Translations,
};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Branch payment methods offered at step 3
const BRANCH_METHODS: &str = r#"[
    {"PaymentMethodKey": "visa", "PaymentMethodID": 1, "PaymentName": "Visa / Mastercard", "Name": "Kapital Bank", "Type": "CREDIT_CARD"},
    {"PaymentMethodKey": "sodexo", "PaymentMethodID": 2, "PaymentName": "Sodexo", "Name": "Pluxee", "Type": "MEAL_CARD"},
    {"PaymentMethodKey": "setcard", "PaymentMethodID": 3, "PaymentName": "Setcard", "Name": "Setcard", "Type": "MEAL_CARD"}
]"#;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodChoice {
    CreditCard,
    MealCard,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScriptChoice {
    /// Pending, connecting, printing, success
    Approve,
    /// Every error kind in turn
    Decline,
    /// Terminal error first, approval on retry
    DeclineThenApprove,
    /// Paper-out error from the ECR
    PaperOut,
    /// Terminal never answers
    Silent,
}

impl ScriptChoice {
    fn scripts(self, interval: Duration) -> Vec<Script> {
        match self {
            Self::Approve => vec![Script::approve(interval)],
            Self::Decline => vec![Script::decline_all(interval)],
            Self::DeclineThenApprove => vec![
                Script::single(StatusKind::PaymentError, "PAYMENT_ERROR", "Limit exceeded"),
                Script::approve(interval),
            ],
            Self::PaperOut => vec![Script::single(StatusKind::EcrError, "ERROR_32", "Paper out")],
            Self::Silent => vec![Script::silent()],
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "kiosk-sim", version, about = "Kiosk payment simulator")]
struct Args {
    /// Order total
    #[arg(long, default_value = "25.50")]
    amount: Decimal,

    /// Order notes (step 1)
    #[arg(long, default_value = "")]
    notes: String,

    /// Keys typed on the device number keypad (step 2), e.g. "012" or "4delete2"
    #[arg(long, default_value = "12")]
    device: String,

    /// Payment method group (step 3)
    #[arg(long, value_enum, default_value_t = MethodChoice::CreditCard)]
    method: MethodChoice,

    /// How the simulated terminal answers
    #[arg(long, value_enum, default_value_t = ScriptChoice::Approve)]
    script: ScriptChoice,

    /// Delay between scripted terminal events
    #[arg(long, env = "KIOSK_SIM_INTERVAL_MS", default_value_t = 1000)]
    interval_ms: u64,

    /// Times to press retry before giving up
    #[arg(long, default_value_t = 1)]
    retries: u32,

    /// Run without a terminal host attached
    #[arg(long)]
    no_host: bool,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logger::init_logger(&args.log_level, args.log_json, args.log_dir.as_deref());

    let config = KioskConfig::from_env().context("invalid kiosk configuration")?;
    info!(?config, "Kiosk simulator starting");

    let shutdown = CancellationToken::new();
    let result = tokio::select! {
        result = run(&args, &config, shutdown.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };
    shutdown.cancel();

    if let Err(e) = &result {
        error!("Simulation failed: {:#}", e);
    }
    result
}

async fn run(args: &Args, config: &KioskConfig, shutdown: CancellationToken) -> Result<()> {
    let translations = Arc::new(Translations::for_config(config));
    let bridge = HostBridge::new();

    if args.no_host {
        warn!("No terminal host attached");
    } else {
        let interval = Duration::from_millis(args.interval_ms);
        SimulatedTerminal::attach(&bridge, args.script.scripts(interval)).spawn(shutdown);
    }

    let store = InMemoryDraftStore::shared(CheckoutDraft::new(args.amount));
    checkout(args, config, store.clone())?;

    let screen = TransactionScreen::new(
        Arc::new(bridge.clone()),
        store.clone(),
        translations.clone(),
        config,
    );
    let (handle, task) = screen.spawn();
    watch_screen(handle, args.retries, &translations).await?;

    let exit = task.await??;
    info!(?exit, session_id = %store.get().session_id, "Transaction screen closed");
    if exit == ScreenExit::ChangePaymentMethod {
        info!("Customer went back to payment method selection");
    }
    Ok(())
}

/// Steps 1 to 3 of the payment flow
fn checkout(args: &Args, config: &KioskConfig, store: Arc<dyn DraftStore>) -> Result<()> {
    let mut flow = PaymentFlow::new(store, config);
    flow.submit_notes(args.notes.as_str())?;

    for key in keypad_keys(&args.device) {
        match key.parse::<KeypadKey>() {
            Ok(key) => {
                if let Err(e) = flow.press_key(key) {
                    warn!(key = %key_name(key), "Keypad: {}", e);
                }
            }
            Err(e) => warn!(key = %key, "Keypad: {}", e),
        }
    }
    flow.submit_device_number()?;

    let groups = MethodGroups::from_json(BRANCH_METHODS)?;
    let method = match args.method {
        MethodChoice::CreditCard => groups.credit_card.first(),
        MethodChoice::MealCard => groups.meal_card.first(),
    }
    .context("no payment method configured for the chosen group")?;
    flow.select_method(method)?;

    let draft = flow.draft();
    info!(
        notes = %draft.notes,
        device_number = %draft.device_number,
        amount = %draft.amount_due,
        "Checkout ready"
    );
    Ok(())
}

/// React to the transaction screen like a customer would
async fn watch_screen(handle: ScreenHandle, mut retries: u32, translations: &Translations) -> Result<()> {
    let mut states = handle.states();

    loop {
        let state = states.borrow_and_update().clone();
        info!(state = %state, "{}", translations.label(state.label_key()));

        match &state {
            TransactionState::Success => {
                handle.return_to_menu().await?;
                return Ok(());
            }
            TransactionState::Error(failure) => {
                warn!(code = %failure.code, "{}", failure.message);
                if retries > 0 {
                    retries -= 1;
                    handle.retry().await?;
                } else {
                    handle.return_to_menu().await?;
                    return Ok(());
                }
            }
            _ => {}
        }

        if states.changed().await.is_err() {
            return Ok(());
        }
    }
}

/// Split "4delete2" into "4", "delete", "2"
fn keypad_keys(input: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut rest = input;
    while let Some(c) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("delete") {
            keys.push("delete".to_string());
            rest = tail;
        } else {
            keys.push(c.to_string());
            rest = &rest[c.len_utf8()..];
        }
    }
    keys
}

fn key_name(key: KeypadKey) -> String {
    match key {
        KeypadKey::Digit(d) => d.to_string(),
        KeypadKey::Delete => "delete".to_string(),
    }
}
