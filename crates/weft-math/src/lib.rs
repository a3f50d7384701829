//! # weft-math
//!
//! Geometry primitives for the weft cloth simulator.
//!
//! Provides:
//! - Re-exports of double-precision `glam` types (`DVec3`, `DQuat`)
//! - Similarity transforms (rotation, uniform scale, translation)
//! - Keyed motion curves that drive rigid obstacles and handles

pub mod motion;
pub mod transform;

pub use motion::{MotionCurve, MotionKey};
pub use transform::{DTransform, Transform};

// Simulation geometry is double precision throughout.
pub use glam::{DQuat, DVec3};
