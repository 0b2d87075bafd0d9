//! Acknowledgment Protocol - classifies and routes every frame from the
//! remote endpoint.
//!
//! # Reply Shapes
//!
//! | Frame | Effect |
//! |---|---|
//! | ack-only | entry → `Acked`, its "request" unit released, entry stays pending |
//! | solicited | entry completed, unit released if still held, result delivered |
//! | solicited + ack required | as above, then a local ack under the "ack" guard |
//! | unsolicited | handed to subscribers; never touches the ledger |
//! | unsolicited + ack required | as above, then a local ack under the "ack" guard |
//!
//! A frame naming an unknown serial is a protocol violation: logged and
//! dropped, never surfaced to a caller.

pub mod indications;

use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::completion::Completion;
use crate::domain::{
    Indication, IndicationKind, Payload, RadioError, Serial, TransportError, WakelockKind,
    WorkSource,
};
use crate::ledger::{AckOutcome, RequestLedger};
use crate::metrics::MetricsRecorder;
use crate::ports::RadioTransport;
use crate::wakelock::WakelockGovernor;

pub use indications::IndicationRegistry;

/// A frame received from the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioMessage {
    Ack {
        serial: Serial,
    },
    Solicited {
        serial: Serial,
        error_code: i32,
        payload: Payload,
        ack_required: bool,
    },
    Unsolicited {
        kind: IndicationKind,
        payload: Payload,
        ack_required: bool,
    },
}

/// The five shapes a frame can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    AckOnly,
    Solicited,
    SolicitedWithAck,
    Unsolicited,
    UnsolicitedWithAck,
}

impl RadioMessage {
    pub fn shape(&self) -> ReplyShape {
        match self {
            RadioMessage::Ack { .. } => ReplyShape::AckOnly,
            RadioMessage::Solicited {
                ack_required: false,
                ..
            } => ReplyShape::Solicited,
            RadioMessage::Solicited { .. } => ReplyShape::SolicitedWithAck,
            RadioMessage::Unsolicited {
                ack_required: false,
                ..
            } => ReplyShape::Unsolicited,
            RadioMessage::Unsolicited { .. } => ReplyShape::UnsolicitedWithAck,
        }
    }

    pub fn requires_local_ack(&self) -> bool {
        matches!(
            self.shape(),
            ReplyShape::SolicitedWithAck | ReplyShape::UnsolicitedWithAck
        )
    }
}

/// What dispatching a frame did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// First ack for a pending request.
    Acked { serial: Serial, released: bool },
    /// Repeated ack, no effect.
    DuplicateAck { serial: Serial },
    /// Entry completed; `delivered` is false if the caller went away.
    Completed { serial: Serial, delivered: bool },
    /// Indication handed to `subscribers` receivers.
    Dispatched { kind: IndicationKind, subscribers: usize },
    /// Frame referenced an unknown serial and was dropped.
    Violation(RadioError),
}

/// Routes frames to the ledger, the wakelock governor and subscribers.
pub struct AckProtocol {
    ledger: Arc<RequestLedger>,
    wakelocks: Arc<WakelockGovernor>,
    completion: Arc<Completion>,
    indications: IndicationRegistry,
    metrics: Arc<dyn MetricsRecorder>,
    ack_work_source: WorkSource,
}

impl AckProtocol {
    pub fn new(
        ledger: Arc<RequestLedger>,
        wakelocks: Arc<WakelockGovernor>,
        completion: Arc<Completion>,
        metrics: Arc<dyn MetricsRecorder>,
        ack_work_source: WorkSource,
    ) -> Self {
        Self {
            ledger,
            wakelocks,
            completion,
            indications: IndicationRegistry::new(),
            metrics,
            ack_work_source,
        }
    }

    pub fn indications(&self) -> &IndicationRegistry {
        &self.indications
    }

    /// Handle one frame.
    ///
    /// Delivery happens before the local ack. The only error is a failed
    /// local ack send, which the caller treats as the handle's death.
    pub fn dispatch(
        &self,
        message: RadioMessage,
        transport: Option<&dyn RadioTransport>,
    ) -> Result<Disposition, TransportError> {
        let shape = message.shape();
        let needs_ack = message.requires_local_ack();
        trace!(shape = ?shape, "Dispatching frame");

        let disposition = match message {
            RadioMessage::Ack { serial } => self.on_ack(serial),
            RadioMessage::Solicited {
                serial,
                error_code,
                payload,
                ..
            } => self.on_solicited(serial, error_code, payload),
            RadioMessage::Unsolicited { kind, payload, .. } => self.on_unsolicited(kind, payload),
        };

        if needs_ack {
            self.send_local_ack(transport)?;
        }
        Ok(disposition)
    }

    fn on_ack(&self, serial: Serial) -> Disposition {
        match self.ledger.mark_acked(serial) {
            AckOutcome::Acked(ticket) => {
                self.metrics.record_ack_received();
                let released = ticket
                    .map(|ticket| self.wakelocks.release(&ticket))
                    .unwrap_or(false);
                debug!(serial = %serial, released, "Request acked");
                Disposition::Acked { serial, released }
            }
            AckOutcome::Duplicate => {
                debug!(serial = %serial, "Duplicate ack ignored");
                Disposition::DuplicateAck { serial }
            }
            AckOutcome::Unknown => self.violation(serial, "ack"),
        }
    }

    fn on_solicited(&self, serial: Serial, error_code: i32, payload: Payload) -> Disposition {
        let Some(request) = self.ledger.complete(serial) else {
            return self.violation(serial, "reply");
        };

        let result = match RadioError::from_remote_code(error_code) {
            None => Ok(payload),
            Some(error) => Err(error),
        };
        let delivered = self.completion.finish(request, result);
        Disposition::Completed { serial, delivered }
    }

    fn on_unsolicited(&self, kind: IndicationKind, payload: Payload) -> Disposition {
        let subscribers = self.indications.dispatch(Indication { kind, payload });
        self.metrics.record_indication(kind, subscribers);
        trace!(kind = %kind, subscribers, "Indication dispatched");
        Disposition::Dispatched { kind, subscribers }
    }

    fn send_local_ack(&self, transport: Option<&dyn RadioTransport>) -> Result<(), TransportError> {
        let Some(transport) = transport else {
            warn!("Local ack required but no live handle");
            return Ok(());
        };

        // Released by its own timeout, never explicitly.
        self.wakelocks
            .acquire(WakelockKind::Ack, &self.ack_work_source);
        transport.send_ack()?;
        self.metrics.record_local_ack_sent();
        trace!("Local ack sent");
        Ok(())
    }

    fn violation(&self, serial: Serial, frame: &'static str) -> Disposition {
        let error = RadioError::ProtocolViolation { serial };
        self.metrics.record_protocol_violation();
        warn!(serial = %serial, frame, error = %error, "Dropping frame for unknown serial");
        Disposition::Violation(error)
    }
}
