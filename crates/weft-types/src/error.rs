//! Error types for the weft simulator.
//!
//! All crates return `WeftResult<T>` from fallible operations.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the weft simulator.
#[derive(Debug, Error)]
pub enum WeftError {
    /// Scene file or command arguments are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Mesh data is malformed or inconsistent.
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// A constrained node is not protected from remeshing.
    #[error("Constrained node {node} of cloth {cloth} will not be preserved by remeshing")]
    UnpreservedHandleNode {
        cloth: u32,
        node: u32,
    },

    /// A keyframe geometry file expected for the current frame does not exist.
    #[error("Missing keyframe for frame {frame}: {}", path.display())]
    MissingKeyframe {
        frame: u32,
        path: PathBuf,
    },

    /// Checkpoint data needed to resume is absent or inconsistent.
    #[error("Cannot resume: {0}")]
    Resume(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl WeftError {
    /// True for conditions after which the physical state is undefined.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WeftError::UnpreservedHandleNode { .. } | WeftError::MissingKeyframe { .. }
        )
    }
}

/// Convenience alias for `Result<T, WeftError>`.
pub type WeftResult<T> = Result<T, WeftError>;
