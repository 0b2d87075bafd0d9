//! # Radio Proxy Test Suite
//!
//! Cross-component tests driving a full `RadioProxy` against the in-process
//! `LoopbackRadio` endpoint.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── ledger_benchmarks.rs   # submit/complete throughput
//! └── src/integration/
//!     ├── fixtures.rs            # harness and result probes
//!     ├── scenarios.rs           # end-to-end request lifecycles
//!     ├── concurrency.rs         # multi-threaded submit/reply/death
//!     └── telemetry.rs           # Prometheus recorder wiring
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p radio-tests
//! cargo test -p radio-tests integration::scenarios::
//! cargo bench -p radio-tests
//! ```

pub mod integration;
