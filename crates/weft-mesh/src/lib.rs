//! # weft-mesh
//!
//! Mesh representation shared by cloths and obstacles, with
//! Structure-of-Arrays node storage.
//!
//! ## Key Types
//!
//! - [`Mesh`]: node positions, rest baselines, velocities, preservation
//!   flags and triangle faces, plus derived world-space normals.
//! - [`obj`]: Wavefront OBJ load/save, including numbered frame sequences.
//! - Procedural generators for test scenes (planar grids).

pub mod generators;
pub mod mesh;
pub mod normals;
pub mod obj;

pub use mesh::Mesh;
