//! # kiosk-core
//!
//! Payment core of the self-service kiosk.
//!
//! ## Scope
//!
//! This crate handles the customer-facing checkout logic:
//! - Three-step payment flow (notes → device number → payment method)
//! - Keypad validation for the device number
//! - Transaction status state machine driven by the embedded terminal
//! - Localised terminal error messages
//!
//! Rendering stays in the UI shell. The real terminal protocol stays in the
//! embedded host; this crate only speaks the [`TerminalChannel`] contract.
//!
//! ## Example
//!
//! ```ignore
//! use kiosk_core::{HostBridge, InMemoryDraftStore, KioskConfig, TransactionScreen, Translations};
//!
//! let bridge = HostBridge::new();
//! let store = InMemoryDraftStore::shared(draft);
//! let translations = Arc::new(Translations::for_config(&config));
//! let screen = TransactionScreen::new(Arc::new(bridge.clone()), store, translations, &config);
//!
//! let (handle, task) = screen.spawn();
//! handle.retry().await?;
//! let exit = task.await??;
//! ```

pub mod config;
pub mod device_number;
pub mod draft;
pub mod error;
pub mod i18n;
pub mod payment;
pub mod terminal;
pub mod transaction;

// Re-exports
pub use config::KioskConfig;
pub use device_number::{DeviceNumberError, KeypadKey};
pub use draft::{
    CheckoutDraft, DraftPatch, DraftStore, InMemoryDraftStore, PaymentType, SelectedPaymentMethod,
};
pub use error::{KioskError, KioskResult};
pub use i18n::{Translations, resolve};
pub use payment::{FlowError, FlowOutcome, MethodGroups, PaymentFlow, PaymentMethodOption, PaymentStep};
pub use terminal::{
    ChannelError, HostBridge, HostRequest, Script, SimulatedTerminal, StatusKind,
    StatusSubscription, TerminalChannel, TerminalEvent,
};
pub use transaction::{
    FailureSource, PaymentFailure, ScreenExit, ScreenHandle, TransactionError, TransactionMachine,
    TransactionScreen, TransactionState, UserAction,
};
