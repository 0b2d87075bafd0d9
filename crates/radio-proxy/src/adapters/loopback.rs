//! In-process fake radio endpoint.
//!
//! [`LoopbackRadio`] plays the remote side: it accepts binds, records the
//! commands it receives, and lets a test inject replies, acks, indications
//! and deaths. Every injection is delivered on the calling thread with no
//! internal lock held.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::{Epoch, IndicationKind, Payload, RequestKind, Serial, TransportError};
use crate::ports::{RadioConnector, RadioTransport, ResponseSink};

/// A command as received by the loopback endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    pub serial: Serial,
    pub kind: RequestKind,
    pub payload: Payload,
    /// Bind cookie of the handle that carried it.
    pub epoch: Epoch,
}

#[derive(Default)]
struct LoopbackState {
    sink: Option<ResponseSink>,
    cookie: Option<Epoch>,
    sent: Vec<SentCommand>,
    local_acks: usize,
    binds: usize,
    bind_attempts: usize,
    fail_binds: usize,
    fail_sends: bool,
    dead: HashSet<Epoch>,
}

/// Fake endpoint implementing [`RadioConnector`].
#[derive(Clone, Default)]
pub struct LoopbackRadio {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` bind attempts.
    pub fn fail_next_binds(&self, count: usize) {
        self.state.lock().fail_binds = count;
    }

    /// Make every send on every handle fail until cleared.
    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Reply to `serial`.
    pub fn reply(&self, serial: Serial, error_code: i32, payload: Payload, ack_required: bool) -> bool {
        self.sink()
            .is_some_and(|sink| sink.on_solicited_reply(serial, error_code, payload, ack_required))
    }

    /// Send an ack-only frame for `serial`.
    pub fn ack(&self, serial: Serial) -> bool {
        self.sink().is_some_and(|sink| sink.on_ack(serial))
    }

    /// Raise an unsolicited indication.
    pub fn indicate(&self, kind: IndicationKind, payload: Payload, ack_required: bool) -> bool {
        self.sink()
            .is_some_and(|sink| sink.on_unsolicited(kind, payload, ack_required))
    }

    /// Kill the current handle and report its death.
    ///
    /// Returns the cookie reported, or `None` if nothing was bound.
    pub fn kill(&self) -> Option<Epoch> {
        let (sink, cookie) = {
            let mut state = self.state.lock();
            let cookie = state.cookie.take()?;
            state.dead.insert(cookie);
            (state.sink.take(), cookie)
        };
        if let Some(sink) = sink {
            sink.on_endpoint_died(cookie);
        }
        Some(cookie)
    }

    /// Deliver a death notification with an arbitrary cookie, leaving the
    /// current handle alive.
    pub fn report_death(&self, cookie: Epoch) -> bool {
        self.sink()
            .is_some_and(|sink| sink.on_endpoint_died(cookie))
    }

    pub fn sent(&self) -> Vec<SentCommand> {
        self.state.lock().sent.clone()
    }

    /// Serial of the most recently received command.
    pub fn last_serial(&self) -> Option<Serial> {
        self.state.lock().sent.last().map(|command| command.serial)
    }

    /// Serials received for `kind`, in arrival order.
    pub fn serials_for(&self, kind: RequestKind) -> Vec<Serial> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|command| command.kind == kind)
            .map(|command| command.serial)
            .collect()
    }

    pub fn local_acks(&self) -> usize {
        self.state.lock().local_acks
    }

    /// Successful binds.
    pub fn binds(&self) -> usize {
        self.state.lock().binds
    }

    /// Bind attempts, successful or not.
    pub fn bind_attempts(&self) -> usize {
        self.state.lock().bind_attempts
    }

    /// Cookie of the live handle.
    pub fn cookie(&self) -> Option<Epoch> {
        self.state.lock().cookie
    }

    fn sink(&self) -> Option<ResponseSink> {
        self.state.lock().sink.clone()
    }
}

impl RadioConnector for LoopbackRadio {
    fn connect(
        &self,
        sink: ResponseSink,
        cookie: Epoch,
    ) -> Result<Arc<dyn RadioTransport>, TransportError> {
        let mut state = self.state.lock();
        state.bind_attempts += 1;
        if state.fail_binds > 0 {
            state.fail_binds -= 1;
            return Err(TransportError::BindFailed("loopback refused bind".to_string()));
        }

        state.sink = Some(sink);
        state.cookie = Some(cookie);
        state.binds += 1;
        Ok(Arc::new(LoopbackHandle {
            state: self.state.clone(),
            cookie,
        }))
    }
}

struct LoopbackHandle {
    state: Arc<Mutex<LoopbackState>>,
    cookie: Epoch,
}

impl LoopbackHandle {
    fn check(&self, state: &LoopbackState) -> Result<(), TransportError> {
        if state.dead.contains(&self.cookie) {
            return Err(TransportError::Disconnected);
        }
        if state.fail_sends {
            return Err(TransportError::SendFailed("loopback send failure".to_string()));
        }
        Ok(())
    }
}

impl RadioTransport for LoopbackHandle {
    fn send_command(
        &self,
        serial: Serial,
        kind: RequestKind,
        payload: &Payload,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        self.check(&state)?;
        state.sent.push(SentCommand {
            serial,
            kind,
            payload: payload.clone(),
            epoch: self.cookie,
        });
        Ok(())
    }

    fn send_ack(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        self.check(&state)?;
        state.local_acks += 1;
        Ok(())
    }
}
