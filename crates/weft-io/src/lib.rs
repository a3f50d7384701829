//! # weft-io
//!
//! Everything between the simulation core and the file system: scene
//! configuration and its validation, building a [`Simulation`] from a
//! scene, frame checkpoints with resume, and the batch [`Runner`].
//!
//! [`Simulation`]: weft_sim::Simulation

pub mod checkpoint;
pub mod config;
pub mod runner;
pub mod scene;
pub mod validator;

pub use checkpoint::{resume, Checkpointer};
pub use config::{ClothConfig, HandleConfig, MeshSource, ObstacleConfig, SceneConfig};
pub use runner::{RunSummary, Runner, StopReason};
pub use scene::build_simulation;
pub use validator::validate_scene;
