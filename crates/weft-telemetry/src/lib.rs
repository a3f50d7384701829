//! # weft-telemetry
//!
//! Event bus for simulation telemetry. The step pipeline and the
//! checkpoint controller emit structured events (steps, regime changes,
//! frames, checkpoints, obstacle releases) that pluggable sinks consume.

pub mod bus;
pub mod events;
pub mod sinks;

pub use bus::EventBus;
pub use events::{EventKind, SimulationEvent};
pub use sinks::{EventSink, TracingSink, VecSink};
