//! Obstacle state machine.
//!
//! An obstacle is `Inactive` until first queried inside its activity
//! window. Activation materializes a fresh copy of the base mesh; leaving
//! the window drops every per-activation buffer, so a later activation
//! starts from the base mesh again.
//!
//! ```text
//!             mesh_at(t)                 mesh_at_frame(t, f)
//! Inactive ──────────────> RigidActive   Inactive ──────────────> KeyframedActive
//!    ^                          │           ^                          │
//!    └────── t outside window ──┘           └── t outside window ──────┘
//!                                               or missing keyframe
//! ```

use serde::{Deserialize, Serialize};
use weft_math::{MotionCurve, Transform};
use weft_mesh::Mesh;
use weft_types::{WeftError, WeftResult};

use crate::keyframes::KeyframeSource;

/// Closed time interval during which an obstacle exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityWindow {
    #[serde(default)]
    pub start_time: f64,
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub end_time: f64,
}

fn unbounded() -> f64 {
    f64::INFINITY
}

fn is_unbounded(time: &f64) -> bool {
    *time == f64::INFINITY
}

impl Default for ActivityWindow {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: f64::INFINITY,
        }
    }
}

impl ActivityWindow {
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    #[inline]
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time <= self.end_time
    }
}

/// The two keyframe buffers used while blending toward the next frame.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframePair {
    /// Snapshot of the current mesh taken when `next` was loaded.
    pub cache: Mesh,
    /// Geometry of the upcoming keyframe.
    pub next: Mesh,
}

/// Per-activation buffers. Slot presence is tied to the variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ObstacleState {
    #[default]
    Inactive,
    RigidActive {
        current: Mesh,
    },
    KeyframedActive {
        current: Mesh,
        /// Present once the first keyframe has been loaded.
        keyframes: Option<KeyframePair>,
        /// Last keyframe index loaded; `None` means before frame 0.
        loaded_frame: Option<u32>,
    },
}

/// One obstacle and the motion that drives it.
#[derive(Debug)]
pub struct Obstacle {
    base: Mesh,
    window: ActivityWindow,
    curve: Option<MotionCurve>,
    keyframes: Option<Box<dyn KeyframeSource>>,
    state: ObstacleState,
}

impl Obstacle {
    /// An obstacle moved by an optional motion curve.
    pub fn rigid(base: Mesh, curve: Option<MotionCurve>, window: ActivityWindow) -> Self {
        Self {
            base,
            window,
            curve,
            keyframes: None,
            state: ObstacleState::Inactive,
        }
    }

    /// An obstacle whose shape follows a keyframe sequence.
    pub fn keyframed(
        base: Mesh,
        source: Box<dyn KeyframeSource>,
        window: ActivityWindow,
    ) -> Self {
        Self {
            base,
            window,
            curve: None,
            keyframes: Some(source),
            state: ObstacleState::Inactive,
        }
    }

    pub fn base(&self) -> &Mesh {
        &self.base
    }

    pub fn window(&self) -> ActivityWindow {
        self.window
    }

    pub fn curve(&self) -> Option<&MotionCurve> {
        self.curve.as_ref()
    }

    pub fn state(&self) -> &ObstacleState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, ObstacleState::Inactive)
    }

    /// The mesh exposed to the rest of the simulation, if active.
    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.state {
            ObstacleState::Inactive => None,
            ObstacleState::RigidActive { current }
            | ObstacleState::KeyframedActive { current, .. } => Some(current),
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.state {
            ObstacleState::Inactive => None,
            ObstacleState::RigidActive { current }
            | ObstacleState::KeyframedActive { current, .. } => Some(current),
        }
    }

    /// Last keyframe index loaded, if any.
    pub fn loaded_frame(&self) -> Option<u32> {
        match &self.state {
            ObstacleState::KeyframedActive { loaded_frame, .. } => *loaded_frame,
            _ => None,
        }
    }

    /// Drops every per-activation buffer. The base mesh is kept.
    pub fn release(&mut self) {
        if self.is_active() {
            tracing::debug!("releasing obstacle geometry");
        }
        self.state = ObstacleState::Inactive;
    }

    /// Absolute rigid transform at `time` (identity without a curve).
    pub fn transform_at(&self, time: f64) -> Transform {
        self.curve
            .as_ref()
            .map_or(Transform::IDENTITY, |curve| curve.transform_at(time))
    }

    /// Resolves a curve-driven obstacle at `time`.
    ///
    /// Outside the activity window the obstacle is released and `None` is
    /// returned. The first call inside the window copies the base mesh and,
    /// after posing it, records the rest baseline.
    pub fn mesh_at(&mut self, time: f64) -> Option<&Mesh> {
        if !self.window.contains(time) {
            self.release();
            return None;
        }

        let activating = !matches!(self.state, ObstacleState::RigidActive { .. });
        if activating {
            self.state = ObstacleState::RigidActive {
                current: self.base.clone(),
            };
        }

        if let ObstacleState::RigidActive { current } = &mut self.state {
            if let Some(curve) = &self.curve {
                let dtrans = curve.evaluate(time);
                for (n, base_x) in self.base.x.iter().enumerate() {
                    let (x, v) = dtrans.apply(*base_x);
                    current.x[n] = x;
                    current.v[n] = v;
                }
                current.compute_ws_data();
            }
            if activating {
                current.update_x0();
                tracing::debug!(time, "rigid obstacle activated");
            }
        }
        self.mesh()
    }

    /// Resolves a keyframed obstacle at `time` for output frame `frame`.
    ///
    /// The first call inside the window only materializes the base mesh.
    /// Later calls with a frame beyond the last loaded one snapshot the
    /// current mesh as the blend anchor and load that frame as the target.
    /// A missing keyframe releases the obstacle and is returned as
    /// [`WeftError::MissingKeyframe`].
    pub fn mesh_at_frame(&mut self, time: f64, frame: u32) -> WeftResult<Option<&Mesh>> {
        if !self.window.contains(time) {
            self.release();
            return Ok(None);
        }

        if !matches!(self.state, ObstacleState::KeyframedActive { .. }) {
            let mut current = self.base.clone();
            current.update_x0();
            self.state = ObstacleState::KeyframedActive {
                current,
                keyframes: None,
                loaded_frame: None,
            };
            tracing::debug!(time, "keyframed obstacle activated");
            return Ok(self.mesh());
        }

        if self.loaded_frame().is_some_and(|loaded| frame <= loaded) {
            return Ok(self.mesh());
        }

        let next = match self.load_keyframe(frame) {
            Ok(next) => next,
            Err(e) => {
                self.release();
                return Err(e);
            }
        };
        if let ObstacleState::KeyframedActive {
            current,
            keyframes,
            loaded_frame,
        } = &mut self.state
        {
            *keyframes = Some(KeyframePair {
                cache: current.clone(),
                next,
            });
            *loaded_frame = Some(frame);
        }
        tracing::debug!(frame, "loaded obstacle keyframe");
        Ok(self.mesh())
    }

    fn load_keyframe(&self, frame: u32) -> WeftResult<Mesh> {
        let source = self.keyframes.as_ref().ok_or_else(|| {
            WeftError::InvalidConfig("obstacle has no keyframe source".into())
        })?;
        let next = source.load(frame)?;
        if next.node_count() != self.base.node_count() {
            return Err(WeftError::InvalidMesh(format!(
                "keyframe {frame} has {} nodes, obstacle has {}",
                next.node_count(),
                self.base.node_count()
            )));
        }
        Ok(next)
    }

    /// Moves every node toward its baseline carried over the last `dt`.
    ///
    /// The target of node `n` is `x0[n]` mapped by the curve's motion from
    /// `t - dt` to `t` (identity without a curve). `blend = 1` snaps to the
    /// target, `blend = 0` leaves positions unchanged.
    pub fn blend_with_previous(&mut self, t: f64, dt: f64, blend: f64) {
        let trans = self
            .curve
            .as_ref()
            .map_or(Transform::IDENTITY, |curve| curve.relative(t - dt, t));
        let Some(mesh) = self.mesh_mut() else { return };
        for (x, x0) in mesh.x.iter_mut().zip(&mesh.x0) {
            let target = trans.apply(*x0);
            *x += blend * (target - *x);
        }
        mesh.compute_ws_data();
    }

    /// Advances every node by `blend` of the cache-to-next displacement.
    ///
    /// Successive calls accumulate, so factors summing to one over a
    /// keyframe interval land on the next keyframe. No-op until a keyframe
    /// has been loaded.
    pub fn blend_with_next(&mut self, blend: f64) {
        let ObstacleState::KeyframedActive {
            current,
            keyframes: Some(pair),
            ..
        } = &mut self.state
        else {
            return;
        };
        for ((x, next), cache) in current.x.iter_mut().zip(&pair.next.x).zip(&pair.cache.x) {
            *x += blend * (*next - *cache);
        }
        current.compute_ws_data();
    }
}
