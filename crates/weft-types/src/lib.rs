//! # weft-types
//!
//! Shared identifiers, error types, and simulation defaults
//! for the weft cloth simulator.
//!
//! This crate has no domain logic. It defines the vocabulary
//! that the other weft crates share.

pub mod constants;
pub mod error;
pub mod ids;

pub use error::{WeftError, WeftResult};
pub use ids::{ClothId, NodeId};
