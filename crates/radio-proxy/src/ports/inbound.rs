//! # Driving Ports (Inbound API)
//!
//! Entry points into the proxy: callbacks from the transport runtime and the
//! API exposed to higher-level callers.

use async_trait::async_trait;
use std::sync::Weak;
use tokio::sync::mpsc;

use crate::domain::{
    CommandResult, Epoch, Indication, IndicationKind, Payload, RequestKind, ResultTarget, Serial,
    WorkSource,
};

/// Callbacks invoked by the transport runtime, possibly concurrently from
/// several dispatch threads.
pub trait RadioResponseHandler: Send + Sync {
    /// A reply directly answering `serial`.
    fn on_solicited_reply(&self, serial: Serial, error_code: i32, payload: Payload, ack_required: bool);

    /// Ack-only frame: the remote has the command, the payload follows later.
    fn on_ack(&self, serial: Serial);

    /// Server-initiated event.
    fn on_unsolicited(&self, kind: IndicationKind, payload: Payload, ack_required: bool);

    /// The handle bound with `cookie` has died.
    fn on_endpoint_died(&self, cookie: Epoch);
}

/// Reply/indication receiver installed on every bound handle.
///
/// Holds only a weak reference, so a transport that outlives the proxy
/// drops its callbacks instead of keeping the proxy alive.
#[derive(Clone)]
pub struct ResponseSink {
    handler: Weak<dyn RadioResponseHandler>,
}

impl ResponseSink {
    pub fn new(handler: Weak<dyn RadioResponseHandler>) -> Self {
        Self { handler }
    }

    pub fn is_attached(&self) -> bool {
        self.handler.strong_count() > 0
    }

    pub fn on_solicited_reply(
        &self,
        serial: Serial,
        error_code: i32,
        payload: Payload,
        ack_required: bool,
    ) -> bool {
        self.with_handler(|h| h.on_solicited_reply(serial, error_code, payload, ack_required))
    }

    pub fn on_ack(&self, serial: Serial) -> bool {
        self.with_handler(|h| h.on_ack(serial))
    }

    pub fn on_unsolicited(&self, kind: IndicationKind, payload: Payload, ack_required: bool) -> bool {
        self.with_handler(|h| h.on_unsolicited(kind, payload, ack_required))
    }

    pub fn on_endpoint_died(&self, cookie: Epoch) -> bool {
        self.with_handler(|h| h.on_endpoint_died(cookie))
    }

    fn with_handler<F>(&self, f: F) -> bool
    where
        F: FnOnce(&dyn RadioResponseHandler),
    {
        match self.handler.upgrade() {
            Some(handler) => {
                f(handler.as_ref());
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for ResponseSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSink")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// API exposed to higher-level callers (the per-command wrappers).
///
/// # Example
///
/// ```rust,ignore
/// use radio_proxy::{RadioApi, RequestKind, Payload};
///
/// async fn activity<T: RadioApi>(api: &T) -> Payload {
///     api.request(RequestKind::GetActivityInfo, Payload::None, None)
///         .await
///         .unwrap_or_default()
/// }
/// ```
#[async_trait]
pub trait RadioApi: Send + Sync {
    /// Submit a command. Always admits; the result target receives exactly
    /// one outcome.
    fn submit(
        &self,
        kind: RequestKind,
        payload: Payload,
        target: ResultTarget,
        work_source: Option<WorkSource>,
    ) -> Serial;

    /// Submit and await the outcome.
    async fn request(
        &self,
        kind: RequestKind,
        payload: Payload,
        work_source: Option<WorkSource>,
    ) -> CommandResult;

    /// Receive every future indication of `kind`.
    fn subscribe(&self, kind: IndicationKind) -> mpsc::UnboundedReceiver<Indication>;

    /// Textual snapshot of pending requests and wakelock state.
    fn dump(&self) -> String;
}
