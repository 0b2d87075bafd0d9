//! Subscriber registry for unsolicited indications.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::domain::{Indication, IndicationKind};

/// Maps indication kinds to subscriber channels.
#[derive(Default)]
pub struct IndicationRegistry {
    subscribers: Mutex<HashMap<IndicationKind, Vec<mpsc::UnboundedSender<Indication>>>>,
}

impl IndicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: IndicationKind) -> mpsc::UnboundedReceiver<Indication> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().entry(kind).or_default().push(tx);
        rx
    }

    /// Hand `indication` to every live subscriber of its kind, pruning closed
    /// ones. Returns the number of subscribers reached.
    pub fn dispatch(&self, indication: Indication) -> usize {
        let mut subscribers = self.subscribers.lock();
        let Some(senders) = subscribers.get_mut(&indication.kind) else {
            return 0;
        };

        senders.retain(|tx| tx.send(indication.clone()).is_ok());
        let reached = senders.len();
        if reached == 0 {
            subscribers.remove(&indication.kind);
            trace!(kind = %indication.kind, "Last subscriber gone");
        }
        reached
    }

    /// Live subscribers for `kind`.
    pub fn subscriber_count(&self, kind: IndicationKind) -> usize {
        self.subscribers
            .lock()
            .get(&kind)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }
}
