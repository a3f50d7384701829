//! Keyed motion curves.
//!
//! A curve is a time-sorted list of transforms. Between keys the
//! transform is interpolated per [`Transform::interpolate`]; before the
//! first and after the last key it holds still.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::transform::{DTransform, Transform};

/// One sample of a motion curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionKey {
    pub time: f64,
    #[serde(flatten)]
    pub transform: Transform,
}

/// Piecewise motion through a sequence of keyed transforms.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<MotionKey>", into = "Vec<MotionKey>")]
pub struct MotionCurve {
    keys: Vec<MotionKey>,
}

impl From<Vec<MotionKey>> for MotionCurve {
    fn from(keys: Vec<MotionKey>) -> Self {
        Self::new(keys)
    }
}

impl From<MotionCurve> for Vec<MotionKey> {
    fn from(curve: MotionCurve) -> Self {
        curve.keys
    }
}

impl MotionCurve {
    /// Builds a curve, sorting the keys by time.
    pub fn new(mut keys: Vec<MotionKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn keys(&self) -> &[MotionKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns true if key times are strictly increasing.
    pub fn is_well_ordered(&self) -> bool {
        self.keys.windows(2).all(|w| w[0].time < w[1].time)
    }

    /// Absolute transform at `time`.
    pub fn transform_at(&self, time: f64) -> Transform {
        self.evaluate(time).transform
    }

    /// Absolute transform at `time` and its derivative.
    pub fn evaluate(&self, time: f64) -> DTransform {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return DTransform::at_rest(Transform::IDENTITY),
        };
        if time <= first.time {
            return DTransform::at_rest(first.transform);
        }
        if time >= last.time {
            return DTransform::at_rest(last.transform);
        }

        // First key strictly after `time`; the clamps above guarantee 1..len.
        let i = self.keys.partition_point(|k| k.time <= time);
        let (k0, k1) = (&self.keys[i - 1], &self.keys[i]);
        let span = k1.time - k0.time;
        let s = (time - k0.time) / span;

        let transform = k0.transform.interpolate(&k1.transform, s);

        let mut q1 = k1.transform.rotation;
        if k0.transform.rotation.dot(q1) < 0.0 {
            q1 = -q1;
        }
        let (axis, angle) = (k0.transform.rotation.inverse() * q1).to_axis_angle();
        let body_rate = if angle.abs() > 0.0 {
            axis * (angle / span)
        } else {
            DVec3::ZERO
        };

        DTransform {
            transform,
            linear_velocity: (k1.transform.translation - k0.transform.translation) / span,
            angular_velocity: transform.rotation * body_rate,
            scale_rate: (k1.transform.scale - k0.transform.scale) / span,
        }
    }

    /// The transform carrying the pose at `t0` to the pose at `t1`.
    pub fn relative(&self, t0: f64, t1: f64) -> Transform {
        self.transform_at(t1) * self.transform_at(t0).inverse()
    }
}
