//! Per-step constraints and their lifecycle.
//!
//! Constraints are plain values. Every step collects a fresh
//! [`ConstraintSet`] from the handles (and optionally a proximity pass),
//! hands it to the solvers by reference, and releases it at the end of the
//! step. Sets are stamped with the step that built them and counted by a
//! shared [`ConstraintTracker`], so a set that outlives its step shows up
//! as a non-zero live count.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use weft_math::{DVec3, MotionCurve};
use weft_obstacle::ActivityWindow;
use weft_types::{ClothId, NodeId};

/// A node of a specific cloth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub cloth: ClothId,
    pub node: NodeId,
}

impl NodeRef {
    pub fn new(cloth: u32, node: u32) -> Self {
        Self {
            cloth: ClothId(cloth),
            node: NodeId(node),
        }
    }
}

/// A constraint acting on one cloth node for one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Pull the node to `target`.
    Equality {
        node: NodeRef,
        target: DVec3,
        stiffness: f64,
    },
    /// Keep the node on the positive side of the plane through `point`.
    Contact {
        node: NodeRef,
        point: DVec3,
        normal: DVec3,
        friction: f64,
    },
}

impl Constraint {
    pub fn node(&self) -> NodeRef {
        match self {
            Constraint::Equality { node, .. } | Constraint::Contact { node, .. } => *node,
        }
    }

    /// Signed violation at position `x`.
    pub fn violation(&self, x: DVec3) -> f64 {
        match self {
            Constraint::Equality { target, .. } => (x - *target).length(),
            Constraint::Contact { point, normal, .. } => (x - *point).dot(*normal),
        }
    }
}

/// Counts constraint sets that are still alive.
#[derive(Debug, Clone, Default)]
pub struct ConstraintTracker {
    live: Arc<AtomicUsize>,
}

impl ConstraintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `constraints` in a set owned by `step`.
    pub fn issue(&self, step: u64, constraints: Vec<Constraint>) -> ConstraintSet {
        self.live.fetch_add(1, Ordering::SeqCst);
        ConstraintSet {
            step,
            constraints,
            live: Arc::clone(&self.live),
        }
    }

    /// Sets issued and not yet released.
    pub fn live_sets(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// The constraints of one step. Releasing (or dropping) the set ends its
/// lifetime.
#[derive(Debug)]
pub struct ConstraintSet {
    step: u64,
    constraints: Vec<Constraint>,
    live: Arc<AtomicUsize>,
}

impl ConstraintSet {
    /// Step counter value at which the set was collected.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Ends the set's lifetime.
    pub fn release(self) {}
}

impl Deref for ConstraintSet {
    type Target = [Constraint];

    fn deref(&self) -> &[Constraint] {
        &self.constraints
    }
}

impl Drop for ConstraintSet {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A persistent source of constraints.
pub trait Handle: Send + std::fmt::Debug {
    /// Cloth nodes this handle constrains.
    fn nodes(&self) -> Vec<NodeRef>;

    /// Constraints in effect at `time`.
    fn constraints(&self, time: f64) -> Vec<Constraint>;
}

/// Pins one cloth node to an anchor, optionally carried by a motion curve.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    pub node: NodeRef,
    /// Anchor position at rest.
    pub anchor: DVec3,
    pub motion: Option<MotionCurve>,
    pub window: ActivityWindow,
    pub stiffness: f64,
}

impl NodeHandle {
    pub fn new(node: NodeRef, anchor: DVec3) -> Self {
        Self {
            node,
            anchor,
            motion: None,
            window: ActivityWindow::default(),
            stiffness: 1.0,
        }
    }

    /// Anchor position at `time`.
    pub fn target(&self, time: f64) -> DVec3 {
        self.motion
            .as_ref()
            .map_or(self.anchor, |curve| curve.transform_at(time).apply(self.anchor))
    }
}

impl Handle for NodeHandle {
    fn nodes(&self) -> Vec<NodeRef> {
        vec![self.node]
    }

    fn constraints(&self, time: f64) -> Vec<Constraint> {
        if !self.window.contains(time) {
            return Vec::new();
        }
        vec![Constraint::Equality {
            node: self.node,
            target: self.target(time),
            stiffness: self.stiffness,
        }]
    }
}
