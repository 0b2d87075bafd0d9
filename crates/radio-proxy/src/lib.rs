//! Radio proxy - correlation and recovery engine for a remote modem service.
//!
//! Turns a single asynchronous command channel to the radio endpoint into
//! independently completable requests for many concurrent callers.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                            RadioProxy                              │
//! ├────────────────────────────────────────────────────────────────────┤
//! │   submit()                                transport callbacks      │
//! │      │                                            │                │
//! │      ▼                                            ▼                │
//! │  ┌──────────────┐   acquire/release   ┌──────────────────────┐    │
//! │  │   Wakelock   │ ◄────────────────── │ Acknowledgment       │    │
//! │  │   Governor   │                     │ Protocol             │    │
//! │  └──────┬───────┘                     └──────────┬───────────┘    │
//! │         │ unit                                   │ complete       │
//! │         ▼                                        ▼                │
//! │  ┌──────────────────────────────────────────────────────────┐     │
//! │  │                 Request Ledger (serial → entry)           │     │
//! │  └──────────────────────────────────────────────────────────┘     │
//! │         ▲ drain                                  ▲ complete       │
//! │  ┌──────┴───────┐                     ┌──────────┴───────────┐    │
//! │  │  Lifecycle   │                     │ Blocking Timeouts    │    │
//! │  │  (epochs)    │                     │ (neutral defaults)   │    │
//! │  └──────────────┘                     └──────────────────────┘    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - Every submitted request completes exactly once: real reply, death-drain
//!   failure, or neutral default.
//! - Serials are unique among outstanding requests.
//! - The "request" wakelock count equals the number of unacknowledged
//!   outstanding requests and returns to zero when they complete.
//! - Death notifications and timers from a superseded epoch have no effect.
//!
//! # Usage
//!
//! ```ignore
//! use radio_proxy::{RadioProxy, RequestKind, Payload};
//!
//! let proxy = RadioProxy::builder(connector).config(config).build()?;
//! proxy.connect()?;
//! let activity = proxy.request(RequestKind::GetActivityInfo, Payload::None, None).await;
//! println!("{}", proxy.dump());
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod blocking;
pub mod completion;
pub mod domain;
pub mod ledger;
pub mod lifecycle;
pub mod metrics;
pub mod ports;
pub mod protocol;
pub mod service;
pub mod wakelock;

pub use domain::*;
pub use ledger::{RequestLedger, SerialAllocator};
pub use lifecycle::{LinkPhase, ProxyLifecycle};
pub use metrics::{Metrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics, Outcome};
pub use ports::{
    PowerGuard, RadioApi, RadioConnector, RadioResponseHandler, RadioTransport, ResponseSink,
    ScheduledTask, Scheduler,
};
pub use protocol::{RadioMessage, ReplyShape};
pub use service::{ProxyStatus, RadioProxy, RadioProxyBuilder};
pub use wakelock::{WakelockGovernor, WakelockSnapshot};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
