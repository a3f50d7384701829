//! Simulation defaults and fixed limits.

/// Gravitational acceleration (m/s²).
pub const GRAVITY: f64 = 9.8;

/// Default duration of one output frame (seconds).
pub const DEFAULT_FRAME_TIME: f64 = 0.04;

/// Default number of steps per frame.
pub const DEFAULT_FRAME_STEPS: u32 = 8;

/// Default frame budget for batch runs when none is given on the command line.
pub const DEFAULT_NUM_FRAMES: u32 = 1000;

/// Decay time (seconds) used to smooth rigid obstacle motion between steps.
pub const OBSTACLE_DECAY_TIME: f64 = 0.1;

/// Frames at or beyond this index are never written to disk
/// (file names carry four frame digits).
pub const MAX_SAVED_FRAME: u32 = 10_000;

/// Default cloth area density (kg/m²).
pub const DEFAULT_DENSITY: f64 = 0.15;
