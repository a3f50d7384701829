//! Simulation clock and stepping regimes.
//!
//! The clock starts in `RampUp` when the configuration asks for a ramp-up
//! phase and in `Steady` otherwise. `RampUp` runs fixed sub-steps of
//! `frame_time / init_frame_steps`; the step numbered `init_frame_steps + 1`
//! is the single transition into `Steady`, which installs the nominal step
//! size `frame_time / frame_steps`.
//!
//! Frame boundaries are counted relative to the start of the current
//! regime: in `Steady` a boundary falls on every step whose distance from
//! `origin_step` is a multiple of `frame_steps`. In `RampUp` the only
//! boundary is the transition itself.
//!
//! A step drives the clock in three calls:
//!
//! ```text
//! clock.begin_step();                 // time += step_time, step += 1
//! let boundary = clock.open_boundary();
//! /* remesh when boundary != Boundary::None */
//! clock.close_boundary(boundary);     // wait frames, frame counter
//! ```
//!
//! The same calls without any physics in between make up
//! [`Clock::advance_counters`], which resume uses to fast-forward.

use crate::config::SimConfig;

/// Stepping regime, carrying its own parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    RampUp {
        init_frame_steps: u32,
        wait_frames: u32,
    },
    Steady {
        /// Step counter value at which this regime began.
        origin_step: u64,
        wait_frames: u32,
    },
}

/// What kind of frame boundary the current step sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    None,
    /// The one step that ends ramp-up.
    RampUpComplete,
    /// A regular steady-regime frame boundary.
    Frame,
}

impl Boundary {
    pub fn is_boundary(self) -> bool {
        self != Boundary::None
    }
}

/// Effect of closing a frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundaryOutcome {
    /// A wait frame was used up by this boundary.
    pub wait_consumed: bool,
    /// The frame counter advanced.
    pub frame_advanced: bool,
}

/// Time, step and frame counters plus the active regime.
#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    pub time: f64,
    pub step: u64,
    pub frame: u32,
    pub step_time: f64,
    frame_time: f64,
    frame_steps: u32,
    regime: Regime,
}

impl Clock {
    /// A clock at time zero, configured from `config`.
    pub fn new(config: &SimConfig) -> Self {
        let (regime, step_time) = if config.init_frame_steps > 0 {
            (
                Regime::RampUp {
                    init_frame_steps: config.init_frame_steps,
                    wait_frames: config.init_wait_frames,
                },
                config.ramp_up_step_time(),
            )
        } else {
            (
                Regime::Steady {
                    origin_step: 0,
                    wait_frames: config.init_wait_frames,
                },
                config.nominal_step_time(),
            )
        };
        Self {
            time: 0.0,
            step: 0,
            frame: 0,
            step_time,
            frame_time: config.frame_time,
            frame_steps: config.frame_steps,
            regime,
        }
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn is_ramping_up(&self) -> bool {
        matches!(self.regime, Regime::RampUp { .. })
    }

    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }

    pub fn nominal_step_time(&self) -> f64 {
        self.frame_time / self.frame_steps as f64
    }

    /// Steps per frame in the current regime.
    pub fn frame_steps(&self) -> u32 {
        match self.regime {
            Regime::RampUp {
                init_frame_steps, ..
            } => init_frame_steps,
            Regime::Steady { .. } => self.frame_steps,
        }
    }

    /// Wait frames still outstanding.
    pub fn wait_frames(&self) -> u32 {
        match self.regime {
            Regime::RampUp { wait_frames, .. } | Regime::Steady { wait_frames, .. } => {
                wait_frames
            }
        }
    }

    /// Whether keyframed obstacles move on the current step.
    ///
    /// Once the wait budget is exhausted they always do; before that only
    /// during the ramp-up sub-steps.
    pub fn advances_keyframes(&self) -> bool {
        match self.regime {
            Regime::RampUp {
                init_frame_steps,
                wait_frames,
            } => wait_frames == 0 || self.step <= init_frame_steps as u64,
            Regime::Steady { wait_frames, .. } => wait_frames == 0,
        }
    }

    /// Advances time by the current step size and bumps the step counter.
    pub fn begin_step(&mut self) {
        self.time += self.step_time;
        self.step += 1;
    }

    /// The boundary the current step sits on, without side effects.
    pub fn boundary(&self) -> Boundary {
        match self.regime {
            Regime::RampUp {
                init_frame_steps, ..
            } if self.step == init_frame_steps as u64 + 1 => Boundary::RampUpComplete,
            Regime::RampUp { .. } => Boundary::None,
            Regime::Steady { origin_step, .. } => {
                let since = self.step.saturating_sub(origin_step);
                if since > 0 && since % self.frame_steps as u64 == 0 {
                    Boundary::Frame
                } else {
                    Boundary::None
                }
            }
        }
    }

    /// Detects the boundary of the current step.
    ///
    /// On the ramp-up transition this switches to `Steady` and installs
    /// the nominal step size, so the remeshing that follows already sees
    /// the steady regime.
    pub fn open_boundary(&mut self) -> Boundary {
        let boundary = self.boundary();
        if boundary == Boundary::RampUpComplete {
            self.regime = Regime::Steady {
                origin_step: self.step,
                wait_frames: self.wait_frames(),
            };
            self.step_time = self.nominal_step_time();
        }
        boundary
    }

    /// Applies the wait/frame bookkeeping of a boundary opened by
    /// [`Clock::open_boundary`].
    ///
    /// A steady boundary uses up one wait frame, then advances the frame
    /// once none remain. The ramp-up transition advances the frame only if
    /// no wait frames were requested at all.
    pub fn close_boundary(&mut self, boundary: Boundary) -> BoundaryOutcome {
        let mut outcome = BoundaryOutcome::default();
        match boundary {
            Boundary::None => return outcome,
            Boundary::RampUpComplete => {}
            Boundary::Frame => {
                if let Regime::Steady { wait_frames, .. } = &mut self.regime {
                    outcome.wait_consumed = *wait_frames > 0;
                    *wait_frames = wait_frames.saturating_sub(1);
                }
            }
        }
        if self.wait_frames() == 0 {
            self.frame += 1;
            outcome.frame_advanced = true;
        }
        outcome
    }

    /// One step of counter arithmetic with no physics.
    pub fn advance_counters(&mut self) -> BoundaryOutcome {
        self.begin_step();
        let boundary = self.open_boundary();
        self.close_boundary(boundary)
    }

    /// Replays counter arithmetic from the current state until `frame` is
    /// reached. Returns the number of steps replayed.
    pub fn fast_forward_to_frame(&mut self, frame: u32) -> u64 {
        let start = self.step;
        while self.frame < frame {
            self.advance_counters();
        }
        self.step - start
    }

    /// Whether the run has reached `end_time` or `end_frame`.
    pub fn reached_end(&self, end_time: f64, end_frame: u32) -> bool {
        self.time >= end_time || self.frame >= end_frame
    }
}
