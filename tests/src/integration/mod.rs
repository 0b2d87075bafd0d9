//! End-to-end tests of the proxy against a loopback endpoint.
//!
//! Timers run on `ManualScheduler`, so every timeout in these tests is
//! virtual time moved forward explicitly.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod concurrency;
#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod telemetry;
