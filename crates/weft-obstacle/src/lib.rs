//! # weft-obstacle
//!
//! Obstacle motion resolution. An [`Obstacle`] owns its base shape and
//! produces the mesh the rest of the simulation collides against, either
//! from a continuous motion curve (rigid obstacles) or by blending between
//! externally supplied per-frame geometry (keyframed obstacles).
//!
//! ```text
//! rigid:      mesh_at(t)            -> blend_with_previous(t, dt, blend)
//! keyframed:  mesh_at_frame(t, f)   -> blend_with_next(blend)
//! ```

pub mod keyframes;
pub mod obstacle;

pub use keyframes::{KeyframeSource, ObjSequence};
pub use obstacle::{ActivityWindow, KeyframePair, Obstacle, ObstacleState};
