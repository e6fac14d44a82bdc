//! In-process bridge to the embedded terminal host
//!
//! The kiosk shell hosts the payment terminal integration in the same
//! process. The host side takes the outbound request receiver with
//! [`HostBridge::attach_host`] and reports status through
//! [`HostBridge::dispatch`] / [`HostBridge::dispatch_json`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::{ChannelError, StatusKind, StatusSubscription, TerminalChannel, TerminalEvent};
use crate::draft::CheckoutDraft;

/// Request posted to the terminal host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostRequest {
    /// Save the order and start the card payment
    SaveOrder {
        #[serde(rename = "saveOrder")]
        draft: CheckoutDraft,
        submission: u64,
    },
}

impl HostRequest {
    pub fn submission(&self) -> u64 {
        match self {
            Self::SaveOrder { submission, .. } => *submission,
        }
    }

    pub fn to_json(&self) -> Result<String, ChannelError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Status message as posted by the host
#[derive(Debug, Deserialize)]
struct HostStatusMessage {
    #[serde(rename = "Type")]
    kind: WireKind,
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Arg", default)]
    arg: String,
    #[serde(rename = "Submission", default)]
    submission: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireKind {
    Code(u16),
    Name(String),
}

impl From<WireKind> for StatusKind {
    fn from(kind: WireKind) -> Self {
        match kind {
            WireKind::Code(code) => StatusKind::from(code),
            WireKind::Name(name) => StatusKind::from_name(&name).unwrap_or_else(|| {
                debug!(name = %name, "Unknown status kind name");
                StatusKind::Other(0)
            }),
        }
    }
}

struct Handler {
    id: u64,
    tx: mpsc::UnboundedSender<TerminalEvent>,
}

struct BridgeInner {
    handler: Mutex<Option<Handler>>,
    next_handler_id: AtomicU64,
    host: Mutex<Option<mpsc::UnboundedSender<HostRequest>>>,
}

/// Terminal channel backed by an in-process host
#[derive(Clone)]
pub struct HostBridge {
    inner: Arc<BridgeInner>,
}

impl HostBridge {
    /// Create a bridge with no host attached
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                handler: Mutex::new(None),
                next_handler_id: AtomicU64::new(1),
                host: Mutex::new(None),
            }),
        }
    }

    /// Attach the terminal host; returns the receiver for outbound requests
    ///
    /// A previously attached host is replaced.
    pub fn attach_host(&self) -> mpsc::UnboundedReceiver<HostRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.inner.host.lock().replace(tx).is_some() {
            warn!("Replacing attached terminal host");
        }
        info!("Terminal host attached");
        rx
    }

    /// Detach the terminal host
    pub fn detach_host(&self) {
        if self.inner.host.lock().take().is_some() {
            info!("Terminal host detached");
        }
    }

    /// Check whether a status handler is installed
    pub fn has_handler(&self) -> bool {
        self.inner.handler.lock().is_some()
    }

    /// Host callback: deliver one status notification
    ///
    /// Returns `false` when no handler is installed (the no-op handler).
    pub fn dispatch(
        &self,
        kind: impl Into<StatusKind>,
        code: impl Into<String>,
        detail: impl Into<String>,
        submission: Option<u64>,
    ) -> bool {
        let event = TerminalEvent {
            kind: kind.into(),
            code: code.into(),
            detail: detail.into(),
            submission,
        };
        self.deliver(event)
    }

    /// Host callback with a JSON payload `{"Type", "Code", "Arg", "Submission"}`
    pub fn dispatch_json(&self, json: &str) -> Result<bool, ChannelError> {
        let msg: HostStatusMessage = serde_json::from_str(json)?;
        Ok(self.dispatch(StatusKind::from(msg.kind), msg.code, msg.arg, msg.submission))
    }

    fn deliver(&self, event: TerminalEvent) -> bool {
        let mut slot = self.inner.handler.lock();
        let Some(handler) = slot.as_ref() else {
            debug!(kind = %event.kind, code = %event.code, "No status handler installed, dropping event");
            return false;
        };

        debug!(kind = %event.kind, code = %event.code, submission = ?event.submission, "Terminal status");
        if handler.tx.send(event).is_err() {
            // Screen task is gone without releasing; reset to the no-op handler
            *slot = None;
            return false;
        }
        true
    }
}

impl Default for HostBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("host_attached", &self.inner.host.lock().is_some())
            .field("has_handler", &self.has_handler())
            .finish()
    }
}

impl TerminalChannel for HostBridge {
    fn is_available(&self) -> bool {
        self.inner
            .host
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    #[instrument(skip(self, draft), fields(session_id = %draft.session_id))]
    fn submit(&self, draft: &CheckoutDraft, submission: u64) -> Result<(), ChannelError> {
        let host = self.inner.host.lock();
        let Some(tx) = host.as_ref() else {
            warn!("Terminal host not found - may be running outside the kiosk shell");
            return Err(ChannelError::Unavailable);
        };

        tx.send(HostRequest::SaveOrder {
            draft: draft.clone(),
            submission,
        })
        .map_err(|_| {
            warn!("Terminal host disconnected");
            ChannelError::Closed
        })?;

        info!("Order submitted to terminal");
        Ok(())
    }

    fn subscribe(&self) -> Result<StatusSubscription, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);

        if self
            .inner
            .handler
            .lock()
            .replace(Handler { id, tx })
            .is_some()
        {
            warn!("Replacing a live status handler");
        }
        debug!(handler_id = id, "Status handler installed");

        let inner = Arc::downgrade(&self.inner);
        Ok(StatusSubscription::new(rx, move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut slot = inner.handler.lock();
            // A newer screen may own the slot by now
            if slot.as_ref().is_some_and(|h| h.id == id) {
                *slot = None;
                debug!(handler_id = id, "Status handler released");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_unavailable_without_host() {
        let bridge = HostBridge::new();
        assert!(!bridge.is_available());

        let draft = CheckoutDraft::new(Decimal::from(10));
        assert!(matches!(
            bridge.submit(&draft, 1),
            Err(ChannelError::Unavailable)
        ));
    }

    #[test]
    fn test_submit_reaches_host() {
        let bridge = HostBridge::new();
        let mut host = bridge.attach_host();
        assert!(bridge.is_available());

        let draft = CheckoutDraft::new(Decimal::from(10));
        bridge.submit(&draft, 3).unwrap();

        let request = host.try_recv().unwrap();
        assert_eq!(request.submission(), 3);
        let HostRequest::SaveOrder { draft: sent, .. } = request;
        assert_eq!(sent.session_id, draft.session_id);
    }

    #[test]
    fn test_submit_after_host_dropped() {
        let bridge = HostBridge::new();
        drop(bridge.attach_host());

        assert!(!bridge.is_available());
        let draft = CheckoutDraft::new(Decimal::from(10));
        assert!(matches!(bridge.submit(&draft, 1), Err(ChannelError::Closed)));
    }

    #[test]
    fn test_detach_host() {
        let bridge = HostBridge::new();
        let _host = bridge.attach_host();
        bridge.detach_host();

        assert!(!bridge.is_available());
        let draft = CheckoutDraft::new(Decimal::from(10));
        assert!(matches!(
            bridge.submit(&draft, 1),
            Err(ChannelError::Unavailable)
        ));
    }

    #[test]
    fn test_request_json_shape() {
        let draft = CheckoutDraft::new(Decimal::from(12));
        let json = HostRequest::SaveOrder { draft, submission: 2 }.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["submission"], 2);
        assert_eq!(value["saveOrder"]["AmountDue"], 12.0);
    }

    #[test]
    fn test_dispatch_without_handler_is_noop() {
        let bridge = HostBridge::new();
        assert!(!bridge.dispatch(StatusKind::PaymentSuccess, "200", "ok", None));
    }

    #[test]
    fn test_dispatch_to_handler() {
        let bridge = HostBridge::new();
        let mut sub = bridge.subscribe().unwrap();

        assert!(bridge.dispatch(502u16, "502", "ECR communication error", Some(1)));
        let event = sub.events.try_recv().unwrap();
        assert_eq!(event.kind, StatusKind::EcrError);
        assert_eq!(event.detail, "ECR communication error");
        assert_eq!(event.submission, Some(1));
    }

    #[test]
    fn test_drop_restores_noop_handler() {
        let bridge = HostBridge::new();
        let sub = bridge.subscribe().unwrap();
        assert!(bridge.has_handler());

        drop(sub);
        assert!(!bridge.has_handler());
        assert!(!bridge.dispatch(StatusKind::PaymentPending, "101", "", None));
    }

    #[test]
    fn test_stale_release_keeps_newer_handler() {
        let bridge = HostBridge::new();
        let old = bridge.subscribe().unwrap();
        let _new = bridge.subscribe().unwrap();

        drop(old);
        assert!(bridge.has_handler());
    }

    #[test]
    fn test_dispatch_json() {
        let bridge = HostBridge::new();
        let mut sub = bridge.subscribe().unwrap();

        assert!(
            bridge
                .dispatch_json(r#"{"Type": 101, "Code": "101", "Arg": "Payment pending..."}"#)
                .unwrap()
        );
        assert!(
            bridge
                .dispatch_json(r#"{"Type": "ECR_ERROR", "Code": "ERROR_32", "Arg": "paper", "Submission": 4}"#)
                .unwrap()
        );

        let first = sub.events.try_recv().unwrap();
        assert_eq!(first.kind, StatusKind::PaymentPending);
        assert_eq!(first.submission, None);

        let second = sub.events.try_recv().unwrap();
        assert_eq!(second.kind, StatusKind::EcrError);
        assert_eq!(second.code, "ERROR_32");
        assert_eq!(second.submission, Some(4));

        assert!(bridge.dispatch_json("not json").is_err());
    }
}
