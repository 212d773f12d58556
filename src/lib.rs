//! pulsemon: background-sampled system telemetry for terminal UIs
//!
//! A [`core::MonitorViewModel`] owns a worker task that samples a metrics
//! source on a fixed period and pushes [`core::Snapshot`]s into a lock-free
//! channel. The UI side drains the channel on its own cadence with a
//! [`core::Poller`] and renders ready-made frames.

pub mod core;
pub mod utils;
