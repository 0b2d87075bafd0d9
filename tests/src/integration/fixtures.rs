//! Shared harness for integration tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use radio_proxy::adapters::{LoopbackRadio, ManualScheduler, RecordingPowerGuard};
use radio_proxy::{CommandResult, MetricsRecorder, ProxyConfig, RadioProxy, ResultTarget};

pub const SEED: i32 = 100;

pub struct Harness {
    pub proxy: Arc<RadioProxy>,
    pub radio: LoopbackRadio,
    pub scheduler: Arc<ManualScheduler>,
    pub power: Arc<RecordingPowerGuard>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(ProxyConfig::default(), None)
    }

    pub fn with_config(config: ProxyConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_recorder(recorder: Arc<dyn MetricsRecorder>) -> Self {
        Self::build(ProxyConfig::default(), Some(recorder))
    }

    fn build(config: ProxyConfig, recorder: Option<Arc<dyn MetricsRecorder>>) -> Self {
        let radio = LoopbackRadio::new();
        let scheduler = Arc::new(ManualScheduler::new());
        let power = Arc::new(RecordingPowerGuard::new());

        let mut builder = RadioProxy::builder(Arc::new(radio.clone()))
            .config(config)
            .scheduler(scheduler.clone())
            .power_guard(power.clone())
            .serial_seed(SEED);
        if let Some(recorder) = recorder {
            builder = builder.metrics_recorder(recorder);
        }

        Harness {
            proxy: builder.build().unwrap(),
            radio,
            scheduler,
            power,
        }
    }

    pub fn advance_ms(&self, ms: u64) -> usize {
        self.scheduler.advance(Duration::from_millis(ms))
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.proxy.config().reconnect_delay()
    }
}

/// Captures every result delivered to one request's target.
#[derive(Clone, Default)]
pub struct Probe(Arc<Mutex<Vec<CommandResult>>>);

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> ResultTarget {
        let results = self.0.clone();
        ResultTarget::callback(move |result| results.lock().push(result))
    }

    pub fn count(&self) -> usize {
        self.0.lock().len()
    }

    /// The result, if exactly one was delivered.
    pub fn single(&self) -> Option<CommandResult> {
        let results = self.0.lock();
        match results.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }
}
