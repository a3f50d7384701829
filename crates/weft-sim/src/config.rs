//! Simulation configuration.
//!
//! Time discretization, regime parameters, environment constants and
//! stage switches. Deserialized from the scene file's top level.

use serde::{Deserialize, Serialize};
use weft_math::DVec3;
use weft_types::{constants, WeftError, WeftResult};

use crate::stage::Stage;

/// How obstacles move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleMode {
    /// Obstacles follow motion curves; positions are rolled back each step
    /// and advanced by the physics stage from the derived velocity.
    #[default]
    Rigid,
    /// Obstacles blend between per-frame geometry files.
    Keyframed,
}

/// Initial settling sequence run before time-stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxMode {
    /// Pop filter and collision response around one remesh.
    #[default]
    Equilibrate,
    /// Remesh and strain-limit to unit strain, twice.
    StrainZeroing,
}

/// Configuration for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated duration of one output frame (seconds).
    pub frame_time: f64,

    /// Steps per frame in the steady regime.
    pub frame_steps: u32,

    /// Steps in the ramp-up regime. Zero starts directly in steady stepping.
    pub init_frame_steps: u32,

    /// Frame boundaries to let pass before frame 0 is considered reached.
    pub init_wait_frames: u32,

    /// Simulated time at which the run ends. Omitted from JSON when
    /// unbounded.
    #[serde(skip_serializing_if = "is_unbounded")]
    pub end_time: f64,

    /// Frame at which the run ends.
    pub end_frame: u32,

    /// Gravitational acceleration (m/s²).
    pub gravity: DVec3,

    /// Cloth-cloth friction coefficient.
    pub friction: f64,

    /// Cloth-obstacle friction coefficient.
    pub obs_friction: f64,

    pub obstacle_mode: ObstacleMode,

    /// Keep the initial resolution: remesh statically while relaxing, then
    /// never again.
    pub fixed_high_res_mesh: bool,

    /// Reset plastic state around relaxation so authored creases survive.
    pub preserve_creases: bool,

    pub relax: RelaxMode,

    /// Stages switched off for this run.
    pub disable: Vec<Stage>,
}

fn is_unbounded(time: &f64) -> bool {
    *time == f64::INFINITY
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            frame_time: constants::DEFAULT_FRAME_TIME,
            frame_steps: constants::DEFAULT_FRAME_STEPS,
            init_frame_steps: 0,
            init_wait_frames: 0,
            end_time: f64::INFINITY,
            end_frame: u32::MAX,
            gravity: DVec3::new(0.0, -constants::GRAVITY, 0.0),
            friction: 0.6,
            obs_friction: 0.3,
            obstacle_mode: ObstacleMode::Rigid,
            fixed_high_res_mesh: false,
            preserve_creases: false,
            relax: RelaxMode::Equilibrate,
            disable: Vec::new(),
        }
    }
}

impl SimConfig {
    /// Step size once ramp-up has completed.
    pub fn nominal_step_time(&self) -> f64 {
        self.frame_time / self.frame_steps as f64
    }

    /// Step size while ramping up.
    pub fn ramp_up_step_time(&self) -> f64 {
        self.frame_time / self.init_frame_steps as f64
    }

    /// Config with only the given stages enabled.
    pub fn only(mut self, stages: &[Stage]) -> Self {
        self.disable = Stage::ALL
            .into_iter()
            .filter(|s| !stages.contains(s))
            .collect();
        self
    }
}

impl SimConfig {
    /// Rejects parameters the clock cannot run with.
    pub fn validate(&self) -> WeftResult<()> {
        if !(self.frame_time.is_finite() && self.frame_time > 0.0) {
            return Err(WeftError::InvalidConfig(format!(
                "frame_time must be positive, got {}",
                self.frame_time
            )));
        }
        if self.frame_steps == 0 {
            return Err(WeftError::InvalidConfig("frame_steps must be at least 1".into()));
        }
        if self.end_time.is_nan() {
            return Err(WeftError::InvalidConfig("end_time is NaN".into()));
        }
        if !self.gravity.is_finite() {
            return Err(WeftError::InvalidConfig("gravity must be finite".into()));
        }
        if self.friction < 0.0 || self.obs_friction < 0.0 {
            return Err(WeftError::InvalidConfig(
                "friction coefficients must be non-negative".into(),
            ));
        }
        Ok(())
    }
}
