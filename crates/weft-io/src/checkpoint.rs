//! Frame checkpoints and resume.
//!
//! Output directory layout:
//!
//! ```text
//! conf.json              scene with absolute paths
//! timing                 per-stage seconds spent since the previous saved frame
//! obs_00.obj ...         obstacle base meshes (rigid mode)
//! 0000_00.obj ...        cloth c at frame f as <f:04>_<c:02>.obj (rigid mode)
//! cloth0000.obj ...      all cloths at frame f, one object each (keyframed mode)
//! 0000obs00.txt ...      obstacle o's rigid transform at frame f (rigid mode)
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use weft_math::Transform;
use weft_mesh::obj::{load_objs, save_objs};
use weft_mesh::Mesh;
use weft_obstacle::Obstacle;
use weft_sim::{ObstacleMode, Simulation, Stage, StageTimers};
use weft_types::{constants, WeftError, WeftResult};

use crate::config::SceneConfig;
use crate::scene::build_simulation;
use crate::validator::validate_scene;

pub const CONFIG_FILE: &str = "conf.json";
pub const TIMING_FILE: &str = "timing";

/// Prefix of the cloth files for `frame`.
pub fn cloth_prefix(out_dir: &Path, mode: ObstacleMode, frame: u32) -> PathBuf {
    match mode {
        ObstacleMode::Rigid => out_dir.join(format!("{frame:04}")),
        ObstacleMode::Keyframed => out_dir.join(format!("cloth{frame:04}")),
    }
}

/// File holding obstacle `obstacle`'s transform at `frame`.
pub fn obstacle_transform_path(out_dir: &Path, frame: u32, obstacle: usize) -> PathBuf {
    out_dir.join(format!("{frame:04}obs{obstacle:02}.txt"))
}

/// Reads a transform written by [`Checkpointer::save_obstacle_transforms`].
pub fn load_obstacle_transform(path: &Path) -> WeftResult<Transform> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| WeftError::Serialization(e.to_string()))
}

/// Writes frames of a run into an output directory.
#[derive(Debug)]
pub struct Checkpointer {
    out_dir: PathBuf,
    mode: ObstacleMode,
    timing: File,
    previous_totals: [f64; Stage::COUNT],
}

impl Checkpointer {
    /// Prepares `out_dir` for a run of `scene`.
    ///
    /// A fresh run writes `conf.json`, truncates the timing log and, in
    /// rigid mode, copies the obstacle base meshes. A resumed run only
    /// reopens the timing log for appending.
    pub fn create(
        out_dir: &Path,
        scene: &SceneConfig,
        sim: &Simulation,
        resuming: bool,
    ) -> WeftResult<Self> {
        fs::create_dir_all(out_dir)?;
        let timing_path = out_dir.join(TIMING_FILE);
        let timing = if resuming {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&timing_path)?
        } else {
            scene.save(&out_dir.join(CONFIG_FILE))?;
            File::create(&timing_path)?
        };

        let mode = scene.sim.obstacle_mode;
        if mode == ObstacleMode::Rigid && !resuming {
            let bases: Vec<&Mesh> = sim.obstacles.iter().map(Obstacle::base).collect();
            save_objs(&bases, &out_dir.join("obs"), false)?;
        }

        tracing::info!(out_dir = %out_dir.display(), resuming, "checkpointing enabled");
        Ok(Self {
            out_dir: out_dir.to_path_buf(),
            mode,
            timing,
            previous_totals: [0.0; Stage::COUNT],
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Writes the cloth meshes (and, in rigid mode, obstacle transforms)
    /// for `frame`. Frames past the four-digit range are skipped; the
    /// return value says whether anything was written.
    pub fn save(&self, sim: &Simulation, frame: u32) -> WeftResult<bool> {
        if frame >= constants::MAX_SAVED_FRAME {
            return Ok(false);
        }
        let meshes = sim.cloth_meshes();
        let prefix = cloth_prefix(&self.out_dir, self.mode, frame);
        save_objs(&meshes, &prefix, self.mode == ObstacleMode::Keyframed)?;
        if self.mode == ObstacleMode::Rigid {
            self.save_obstacle_transforms(sim, frame)?;
        }
        tracing::debug!(frame, "saved frame");
        Ok(true)
    }

    /// Writes every obstacle's absolute rigid transform at the current
    /// simulation time.
    pub fn save_obstacle_transforms(&self, sim: &Simulation, frame: u32) -> WeftResult<()> {
        for (o, obstacle) in sim.obstacles.iter().enumerate() {
            let transform = obstacle.transform_at(sim.clock.time);
            let text = serde_json::to_string(&transform)
                .map_err(|e| WeftError::Serialization(e.to_string()))?;
            fs::write(obstacle_transform_path(&self.out_dir, frame, o), text)?;
        }
        Ok(())
    }

    /// Appends one line of per-stage time spent since the previous call.
    pub fn save_timings(&mut self, timers: &StageTimers) -> WeftResult<()> {
        let totals = timers.totals();
        let line = totals
            .iter()
            .zip(&self.previous_totals)
            .map(|(total, previous)| (total - previous).to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(self.timing, "{line}")?;
        self.previous_totals = totals;
        Ok(())
    }
}

/// Rebuilds the simulation saved in `out_dir` as it stood at `frame`.
///
/// The clock is replayed from time zero with counter arithmetic only, so
/// time, step and regime match an uninterrupted run bit for bit. Cloth
/// geometry (positions and velocities) comes from the frame's files;
/// obstacles are re-materialized at the resumed time.
pub fn resume(out_dir: &Path, frame: u32) -> WeftResult<(SceneConfig, Simulation)> {
    let conf = out_dir.join(CONFIG_FILE);
    if !conf.is_file() {
        return Err(WeftError::Resume(format!("{} not found", conf.display())));
    }
    let scene = SceneConfig::load(&conf)?;
    validate_scene(&scene)?;
    let mut sim = build_simulation(&scene)?;

    let mode = scene.sim.obstacle_mode;
    let prefix = cloth_prefix(out_dir, mode, frame);
    let meshes = load_objs(&prefix, sim.cloths.len(), mode == ObstacleMode::Keyframed)
        .map_err(|e| WeftError::Resume(format!("frame {frame}: {e}")))?;

    let steps = sim.clock.fast_forward_to_frame(frame);
    for (cloth, mesh) in sim.cloths.iter_mut().zip(meshes) {
        cloth.mesh = mesh;
    }
    sim.mark_handle_nodes_preserved()?;
    sim.prepare()?;

    tracing::info!(
        frame,
        steps,
        time = sim.clock.time,
        "resumed from checkpoint"
    );
    Ok((scene, sim))
}
