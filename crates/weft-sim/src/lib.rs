//! # weft-sim
//!
//! Time-stepping core: the simulation aggregate, its clock and regimes,
//! per-stage flags and timers, the constraint lifecycle, solver seams and
//! the step pipeline that ties them together.
//!
//! ## Key Types
//!
//! - [`Simulation`]: cloths, obstacles, handles and clock state
//! - [`StepPipeline`]: runs one step (or frame) in fixed stage order
//! - [`Clock`]: time/step/frame counters with the ramp-up and steady regimes
//! - [`Solvers`]: one boxed implementation per numerical stage
//! - [`ConstraintSet`]: constraints owned by a single step

pub mod cloth;
pub mod clock;
pub mod config;
pub mod constraint;
pub mod pipeline;
pub mod simulation;
pub mod solvers;
pub mod stage;
pub mod velocity;

pub use cloth::Cloth;
pub use clock::{Boundary, Clock, Regime};
pub use config::{ObstacleMode, RelaxMode, SimConfig};
pub use constraint::{Constraint, ConstraintSet, ConstraintTracker, Handle, NodeHandle, NodeRef};
pub use pipeline::{StepPipeline, StepReport};
pub use simulation::Simulation;
pub use solvers::Solvers;
pub use stage::{Stage, StageFlags, StageTimers, Timer};
