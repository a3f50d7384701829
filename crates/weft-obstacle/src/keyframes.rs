//! Sources of per-frame obstacle geometry.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use weft_mesh::obj::load_obj;
use weft_mesh::Mesh;
use weft_types::{WeftError, WeftResult};

/// Supplies the obstacle shape for a given frame index.
pub trait KeyframeSource: Send + Debug {
    /// Loads the keyframe for `frame`.
    ///
    /// Must return [`WeftError::MissingKeyframe`] when the frame does not exist.
    fn load(&self, frame: u32) -> WeftResult<Mesh>;
}

/// Numbered OBJ files `body0000.obj`, `body0001.obj`, ... in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjSequence {
    dir: PathBuf,
}

impl ObjSequence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds `frame`.
    pub fn path(&self, frame: u32) -> PathBuf {
        self.dir.join(format!("body{frame:04}.obj"))
    }
}

impl KeyframeSource for ObjSequence {
    fn load(&self, frame: u32) -> WeftResult<Mesh> {
        let path = self.path(frame);
        if !path.is_file() {
            return Err(WeftError::MissingKeyframe { frame, path });
        }
        load_obj(&path)
    }
}
