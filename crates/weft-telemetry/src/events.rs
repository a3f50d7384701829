//! Simulation event types.
//!
//! Events are lightweight value types tagged with the step counter at
//! which they were emitted.

use serde::{Deserialize, Serialize};

/// A simulation event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    /// Step counter when the event was emitted (0 before the first step).
    pub step: u64,
    /// Event payload.
    pub kind: EventKind,
}

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// A step finished.
    StepCompleted {
        /// Simulated time after the step (seconds).
        time: f64,
        /// Step size used (seconds).
        step_time: f64,
        /// Wall-clock time for the step (seconds).
        wall_time: f64,
    },

    /// Ramp-up finished; the nominal step size is now in effect.
    RegimeTransition {
        /// Nominal step size installed at the transition.
        step_time: f64,
    },

    /// The output frame counter advanced.
    FrameAdvanced {
        frame: u32,
        time: f64,
    },

    /// A frame boundary passed while waiting for the initial frames.
    WaitFrameConsumed {
        /// Wait frames still outstanding.
        remaining: u32,
    },

    /// A frame was written to the output directory.
    CheckpointSaved {
        frame: u32,
    },

    /// An obstacle left its activity window and dropped its geometry.
    ObstacleReleased {
        obstacle: u32,
        time: f64,
    },
}

impl SimulationEvent {
    /// Creates a new event stamped with `step`.
    pub fn new(step: u64, kind: EventKind) -> Self {
        Self { step, kind }
    }
}
