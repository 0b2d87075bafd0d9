//! Radio proxy service - wires the ledger, protocol, wakelock governor,
//! lifecycle manager and timeout synthesizer into one owning instance.
//!
//! # Request Flow
//!
//! ```text
//! submit ─► acquire "request" unit ─► ledger.admit ─► get_handle ─► send
//!                                                        │
//!                                      unavailable ──────┴─► RemoteUnavailable
//!
//! transport callbacks ─► AckProtocol ─► ledger.complete ─► release ─► deliver
//! death(cookie)       ─► confirm ─► reseed ─► drain ─► release ─► deliver ─► reconnect
//! ```
//!
//! All shared state is owned by the [`RadioProxy`] instance; nothing is
//! process-wide. Results are always delivered with no internal lock held.

use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::adapters::{NoopPowerGuard, TokioScheduler};
use crate::blocking::BlockingTimeouts;
use crate::completion::Completion;
use crate::domain::{
    CommandResult, ConfigError, Epoch, Indication, IndicationKind, Payload, PendingSnapshot,
    ProxyConfig, RadioError, RequestKind, ResultTarget, Serial, TransportError, WakelockKind,
    WorkSource,
};
use crate::ledger::{RequestLedger, SerialAllocator};
use crate::lifecycle::{LinkPhase, ProxyLifecycle};
use crate::metrics::{LatencyStats, Metrics, MetricsRecorder, MetricsSnapshot, MetricsTee, NoOpMetrics};
use crate::ports::{
    PowerGuard, RadioApi, RadioConnector, RadioResponseHandler, ResponseSink, Scheduler,
};
use crate::protocol::{AckProtocol, RadioMessage};
use crate::wakelock::{WakelockGovernor, WakelockSnapshot};

/// Builder for [`RadioProxy`].
pub struct RadioProxyBuilder {
    connector: Arc<dyn RadioConnector>,
    config: ProxyConfig,
    power: Arc<dyn PowerGuard>,
    scheduler: Option<Arc<dyn Scheduler>>,
    recorder: Arc<dyn MetricsRecorder>,
    serial_seed: Option<i32>,
}

impl RadioProxyBuilder {
    pub fn new(connector: Arc<dyn RadioConnector>) -> Self {
        Self {
            connector,
            config: ProxyConfig::default(),
            power: Arc::new(NoopPowerGuard),
            scheduler: None,
            recorder: Arc::new(NoOpMetrics),
            serial_seed: None,
        }
    }

    pub fn config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn power_guard(mut self, power: Arc<dyn PowerGuard>) -> Self {
        self.power = power;
        self
    }

    /// Timer source. Defaults to the current tokio runtime.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn metrics_recorder(mut self, recorder: Arc<dyn MetricsRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Fixed first serial instead of a random one.
    pub fn serial_seed(mut self, seed: i32) -> Self {
        self.serial_seed = Some(seed);
        self
    }

    /// Validate the configuration and assemble the proxy.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid, or if no scheduler was
    /// given and no tokio runtime is running.
    pub fn build(self) -> Result<Arc<RadioProxy>, ConfigError> {
        self.config.validate()?;
        let scheduler: Arc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::current().ok_or_else(|| {
                ConfigError::Invalid("no scheduler given and no tokio runtime running".to_string())
            })?),
        };

        let config = self.config;
        let metrics = Arc::new(Metrics::new());
        let recorder: Arc<dyn MetricsRecorder> =
            Arc::new(MetricsTee::new(metrics.clone(), self.recorder));

        let serials = match self.serial_seed {
            Some(seed) => SerialAllocator::with_seed(seed),
            None => SerialAllocator::new(),
        };
        let ledger = Arc::new(RequestLedger::with_allocator(config.free_list_capacity, serials));

        let wakelocks = WakelockGovernor::new(
            self.power,
            scheduler.clone(),
            recorder.clone(),
            config.wakelock_timeout(),
            config.ack_wakelock_timeout(),
        );
        let diagnostics = ledger.clone();
        wakelocks.set_diagnostics(Box::new(move || diagnostics.peek_for_diagnostics()));

        let completion = Arc::new(Completion::new(wakelocks.clone(), recorder.clone()));
        let protocol = AckProtocol::new(
            ledger.clone(),
            wakelocks.clone(),
            completion.clone(),
            recorder.clone(),
            config.default_work_source.clone(),
        );
        let connector = self.connector;

        let proxy = Arc::new_cyclic(|weak: &Weak<RadioProxy>| {
            let handler: Weak<dyn RadioResponseHandler> = weak.clone();
            let lifecycle = ProxyLifecycle::new(
                connector,
                ResponseSink::new(handler),
                scheduler.clone(),
                recorder.clone(),
                config.reconnect_delay(),
            );
            let blocking = BlockingTimeouts::new(
                config.blocking_kinds.iter().copied(),
                config.blocking_response_timeout(),
                scheduler,
                ledger.clone(),
                completion.clone(),
                lifecycle.epoch_watch(),
            );

            RadioProxy {
                config,
                ledger,
                wakelocks,
                completion,
                protocol,
                lifecycle,
                blocking,
                metrics,
                recorder,
            }
        });

        info!(instance = %proxy.config.instance_name, "Radio proxy created");
        Ok(proxy)
    }
}

/// The correlation-and-recovery engine for one radio instance.
pub struct RadioProxy {
    config: ProxyConfig,
    ledger: Arc<RequestLedger>,
    wakelocks: Arc<WakelockGovernor>,
    completion: Arc<Completion>,
    protocol: AckProtocol,
    lifecycle: Arc<ProxyLifecycle>,
    blocking: BlockingTimeouts,
    metrics: Arc<Metrics>,
    recorder: Arc<dyn MetricsRecorder>,
}

impl RadioProxy {
    pub fn builder(connector: Arc<dyn RadioConnector>) -> RadioProxyBuilder {
        RadioProxyBuilder::new(connector)
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Bind the remote endpoint now instead of on first submission.
    pub fn connect(&self) -> Result<Epoch, TransportError> {
        self.lifecycle.get_handle().map(|live| live.epoch)
    }

    /// Submit a command.
    ///
    /// Always admits the request and returns its serial; `target` receives
    /// exactly one outcome. If no handle can be obtained, the outcome is an
    /// immediate `RemoteUnavailable`.
    pub fn submit(
        &self,
        kind: RequestKind,
        payload: Payload,
        target: ResultTarget,
        work_source: Option<WorkSource>,
    ) -> Serial {
        let work_source =
            work_source.unwrap_or_else(|| self.config.default_work_source.clone());
        self.recorder.record_submitted(kind);

        // The unit is counted before the entry becomes visible to any
        // completion path.
        let ticket = self.wakelocks.acquire(WakelockKind::Request, &work_source);
        let serial = self.ledger.admit(kind, target, work_source, ticket);

        let live = match self.lifecycle.get_handle() {
            Ok(live) => live,
            Err(error) => {
                warn!(serial = %serial, kind = %kind, error = %error, "Remote endpoint unavailable");
                self.fail(serial, RadioError::RemoteUnavailable);
                return serial;
            }
        };

        self.blocking.arm(serial, kind, live.epoch);
        match live.transport.send_command(serial, kind, &payload) {
            Ok(()) => trace!(serial = %serial, kind = %kind, epoch = %live.epoch, "Command sent"),
            Err(error) => {
                warn!(serial = %serial, kind = %kind, epoch = %live.epoch, error = %error, "Send failed");
                self.handle_death(live.epoch);
            }
        }
        serial
    }

    /// Submit and await the outcome.
    pub async fn request(
        &self,
        kind: RequestKind,
        payload: Payload,
        work_source: Option<WorkSource>,
    ) -> CommandResult {
        let (target, rx) = ResultTarget::channel();
        self.submit(kind, payload, target, work_source);
        rx.await.unwrap_or(Err(RadioError::RemoteUnavailable))
    }

    pub fn subscribe(&self, kind: IndicationKind) -> mpsc::UnboundedReceiver<Indication> {
        self.protocol.indications().subscribe(kind)
    }

    fn fail(&self, serial: Serial, error: RadioError) {
        if let Some(request) = self.ledger.complete(serial) {
            self.completion.finish(request, Err(error));
        }
    }

    fn dispatch(&self, message: RadioMessage) {
        let live = if message.requires_local_ack() {
            self.lifecycle.current()
        } else {
            None
        };

        if let Err(error) = self
            .protocol
            .dispatch(message, live.as_ref().map(|live| live.transport.as_ref()))
        {
            warn!(error = %error, "Local ack failed");
            if let Some(live) = live {
                self.handle_death(live.epoch);
            }
        }
    }

    fn handle_death(&self, cookie: Epoch) {
        let Some(epoch) = self.lifecycle.confirm_death(cookie) else {
            return;
        };

        self.ledger.reseed();
        let drained = self.ledger.drain_all();
        self.recorder.record_endpoint_death(drained.len());
        warn!(epoch = %epoch, drained = drained.len(), "Failing pending requests");

        for request in drained {
            self.completion.finish(request, Err(RadioError::RemoteUnavailable));
        }
        self.lifecycle.schedule_reconnect();
    }

    pub fn epoch(&self) -> Epoch {
        self.lifecycle.epoch()
    }

    pub fn phase(&self) -> LinkPhase {
        self.lifecycle.phase()
    }

    pub fn pending_count(&self) -> usize {
        self.ledger.len()
    }

    pub fn pending(&self) -> Vec<PendingSnapshot> {
        self.ledger.peek_for_diagnostics()
    }

    pub fn wakelock_count(&self, kind: WakelockKind) -> usize {
        self.wakelocks.count(kind)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Structured diagnostics; `dump()` renders it as text.
    pub fn status(&self) -> ProxyStatus {
        ProxyStatus {
            instance: self.config.instance_name.clone(),
            epoch: self.lifecycle.epoch(),
            phase: self.lifecycle.phase(),
            retry_armed: self.lifecycle.retry_armed(),
            pending: self.ledger.peek_for_diagnostics(),
            request_wakelock: self.wakelocks.snapshot(WakelockKind::Request),
            ack_wakelock: self.wakelocks.snapshot(WakelockKind::Ack),
            metrics: self.metrics.snapshot(),
            latency: self.metrics.latency(),
        }
    }

    /// Textual snapshot of pending requests and wakelock state.
    pub fn dump(&self) -> String {
        self.status().to_string()
    }
}

impl RadioResponseHandler for RadioProxy {
    fn on_solicited_reply(&self, serial: Serial, error_code: i32, payload: Payload, ack_required: bool) {
        self.dispatch(RadioMessage::Solicited {
            serial,
            error_code,
            payload,
            ack_required,
        });
    }

    fn on_ack(&self, serial: Serial) {
        self.dispatch(RadioMessage::Ack { serial });
    }

    fn on_unsolicited(&self, kind: IndicationKind, payload: Payload, ack_required: bool) {
        self.dispatch(RadioMessage::Unsolicited {
            kind,
            payload,
            ack_required,
        });
    }

    fn on_endpoint_died(&self, cookie: Epoch) {
        debug!(cookie = %cookie, "Death notification");
        self.handle_death(cookie);
    }
}

#[async_trait]
impl RadioApi for RadioProxy {
    fn submit(
        &self,
        kind: RequestKind,
        payload: Payload,
        target: ResultTarget,
        work_source: Option<WorkSource>,
    ) -> Serial {
        RadioProxy::submit(self, kind, payload, target, work_source)
    }

    async fn request(
        &self,
        kind: RequestKind,
        payload: Payload,
        work_source: Option<WorkSource>,
    ) -> CommandResult {
        RadioProxy::request(self, kind, payload, work_source).await
    }

    fn subscribe(&self, kind: IndicationKind) -> mpsc::UnboundedReceiver<Indication> {
        RadioProxy::subscribe(self, kind)
    }

    fn dump(&self) -> String {
        RadioProxy::dump(self)
    }
}

/// Point-in-time diagnostics for one proxy instance.
#[derive(Debug, Clone)]
pub struct ProxyStatus {
    pub instance: String,
    pub epoch: Epoch,
    pub phase: LinkPhase,
    pub retry_armed: bool,
    pub pending: Vec<PendingSnapshot>,
    pub request_wakelock: WakelockSnapshot,
    pub ack_wakelock: WakelockSnapshot,
    pub metrics: MetricsSnapshot,
    pub latency: Vec<(RequestKind, LatencyStats)>,
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "RadioProxy[{}] epoch={} phase={} reconnect_armed={}",
            self.instance, self.epoch, self.phase, self.retry_armed
        )?;

        writeln!(f, "Pending requests: {}", self.pending.len())?;
        for request in &self.pending {
            writeln!(
                f,
                "  [{}] {} state={} age={}ms wakelock={} source={}",
                request.serial,
                request.kind,
                request.state,
                millis(request.age),
                request.wakelock,
                request.work_source
            )?;
        }

        for lock in [&self.request_wakelock, &self.ack_wakelock] {
            write!(
                f,
                "Wakelock {}: count={} held={} sequence={} generation={} held_total={}ms timeouts={} sources=[",
                lock.kind,
                lock.count,
                lock.held,
                lock.sequence,
                lock.generation,
                millis(lock.held_total),
                lock.expirations
            )?;
            for (i, (source, refs)) in lock.sources.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} x{}", source, refs)?;
            }
            writeln!(f, "]")?;
        }

        let m = &self.metrics;
        writeln!(
            f,
            "Requests: submitted={} success={} rejected={} unavailable={} timed_out={} violations={}",
            m.submitted,
            m.completed_success,
            m.completed_rejected,
            m.completed_unavailable,
            m.completed_timed_out,
            m.protocol_violations
        )?;
        writeln!(
            f,
            "Link: binds={} bind_failures={} deaths={} drained={} acks_received={} local_acks={} indications={}",
            m.binds_succeeded,
            m.binds_failed,
            m.endpoint_deaths,
            m.drained_requests,
            m.acks_received,
            m.local_acks_sent,
            m.indications_dispatched
        )?;

        if !self.latency.is_empty() {
            writeln!(f, "Latency:")?;
            for (kind, stats) in &self.latency {
                writeln!(
                    f,
                    "  {} count={} avg={}ms max={}ms",
                    kind,
                    stats.count,
                    millis(stats.average()),
                    millis(stats.max)
                )?;
            }
        }
        Ok(())
    }
}
