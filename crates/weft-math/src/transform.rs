//! Similarity transforms and their time derivatives.
//!
//! A [`Transform`] maps a point `p` to `s·R·p + t`. Obstacles and handles
//! move by composing transforms sampled from a [`MotionCurve`](crate::MotionCurve).

use std::ops::Mul;

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Rotation, uniform scale and translation, applied in that order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation applied last.
    #[serde(default)]
    pub translation: DVec3,
    /// Unit rotation quaternion.
    #[serde(default = "identity_rotation")]
    pub rotation: DQuat,
    /// Uniform scale factor.
    #[serde(default = "unit_scale")]
    pub scale: f64,
}

fn identity_rotation() -> DQuat {
    DQuat::IDENTITY
}

fn unit_scale() -> f64 {
    1.0
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// The transform that leaves every point in place.
    pub const IDENTITY: Self = Self {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: 1.0,
    };

    pub fn new(translation: DVec3, rotation: DQuat, scale: f64) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Maps a point.
    #[inline]
    pub fn apply(&self, p: DVec3) -> DVec3 {
        self.rotation * (p * self.scale) + self.translation
    }

    /// Returns `self ∘ other`: `other` is applied first.
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform {
            translation: self.apply(other.translation),
            rotation: (self.rotation * other.rotation).normalize(),
            scale: self.scale * other.scale,
        }
    }

    /// Inverse mapping. Scale must be non-zero.
    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.inverse();
        let scale = 1.0 / self.scale;
        Transform {
            translation: -(rotation * self.translation) * scale,
            rotation,
            scale,
        }
    }

    /// Interpolates translation and scale linearly and rotation spherically.
    pub fn interpolate(&self, other: &Transform, s: f64) -> Transform {
        Transform {
            translation: self.translation.lerp(other.translation, s),
            rotation: self.rotation.slerp(other.rotation, s),
            scale: self.scale + (other.scale - self.scale) * s,
        }
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.compose(&rhs)
    }
}

/// A transform together with its rate of change at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DTransform {
    pub transform: Transform,
    /// d(translation)/dt.
    pub linear_velocity: DVec3,
    /// World-space angular velocity of the rotation.
    pub angular_velocity: DVec3,
    /// d(scale)/dt.
    pub scale_rate: f64,
}

impl DTransform {
    /// A motionless transform.
    pub fn at_rest(transform: Transform) -> Self {
        Self {
            transform,
            linear_velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            scale_rate: 0.0,
        }
    }

    /// Maps a point and returns its velocity under the moving transform.
    pub fn apply(&self, p: DVec3) -> (DVec3, DVec3) {
        let t = &self.transform;
        let rotated = t.rotation * p;
        let x = rotated * t.scale + t.translation;
        let v = self.angular_velocity.cross(rotated * t.scale)
            + rotated * self.scale_rate
            + self.linear_velocity;
        (x, v)
    }
}
