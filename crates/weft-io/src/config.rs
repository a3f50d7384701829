//! Scene configuration.
//!
//! A scene is one JSON document: the simulation parameters at the top
//! level plus lists of cloths, obstacles and handles. Relative paths are
//! resolved against the directory holding the scene file, so a loaded
//! [`SceneConfig`] only carries absolute paths and can be written into an
//! output directory as-is.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use weft_math::{MotionCurve, Transform};
use weft_obstacle::ActivityWindow;
use weft_sim::SimConfig;
use weft_types::{constants, WeftError, WeftResult};

/// Where a mesh comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshSource {
    /// An OBJ file.
    Obj(PathBuf),
    /// A flat grid in the XZ plane.
    Grid {
        cols: usize,
        rows: usize,
        width: f64,
        depth: f64,
        #[serde(default)]
        height: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClothConfig {
    pub mesh: MeshSource,
    /// Placement applied to the mesh at load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default = "default_density")]
    pub density: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strain_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strain_max: Option<f64>,
}

fn default_density() -> f64 {
    constants::DEFAULT_DENSITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleConfig {
    /// Base shape.
    pub mesh: MeshSource,
    /// Placement applied to the base mesh at load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(flatten)]
    pub window: ActivityWindow,
    /// Rigid motion over time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<MotionCurve>,
    /// Directory of `bodyNNNN.obj` keyframes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyframes: Option<PathBuf>,
}

/// Pins nodes of one cloth to their initial positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleConfig {
    #[serde(default)]
    pub cloth: u32,
    pub nodes: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<MotionCurve>,
    #[serde(flatten)]
    pub window: ActivityWindow,
    #[serde(default = "default_stiffness")]
    pub stiffness: f64,
}

fn default_stiffness() -> f64 {
    1.0
}

/// A complete scene description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(flatten)]
    pub sim: SimConfig,
    #[serde(default)]
    pub cloths: Vec<ClothConfig>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
    #[serde(default)]
    pub handles: Vec<HandleConfig>,
}

impl SceneConfig {
    /// Parses a scene from JSON text. Paths are left as written.
    pub fn from_json(text: &str) -> WeftResult<Self> {
        serde_json::from_str(text).map_err(|e| WeftError::Serialization(e.to_string()))
    }

    /// Reads a scene file and makes its paths absolute.
    pub fn load(path: &Path) -> WeftResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            WeftError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut scene = Self::from_json(&text)?;
        let dir = absolute(path.parent().unwrap_or(Path::new("")))?;
        scene.resolve_paths(&dir);
        tracing::debug!(path = %path.display(), "loaded scene");
        Ok(scene)
    }

    /// Writes the scene as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> WeftResult<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| WeftError::Serialization(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Joins every relative path onto `dir`.
    pub fn resolve_paths(&mut self, dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };
        for cloth in &mut self.cloths {
            if let MeshSource::Obj(p) = &mut cloth.mesh {
                resolve(p);
            }
        }
        for obstacle in &mut self.obstacles {
            if let MeshSource::Obj(p) = &mut obstacle.mesh {
                resolve(p);
            }
            if let Some(p) = &mut obstacle.keyframes {
                resolve(p);
            }
        }
    }
}

fn absolute(path: &Path) -> WeftResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
