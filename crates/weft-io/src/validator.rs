//! Scene validation.
//!
//! Runs before any simulation state is built, catching configuration
//! errors early with clear diagnostics. Node indices of handles are
//! checked later, once the cloth meshes are loaded.

use weft_math::MotionCurve;
use weft_obstacle::ActivityWindow;
use weft_sim::ObstacleMode;
use weft_types::{WeftError, WeftResult};

use crate::config::{MeshSource, SceneConfig};

/// Validates a complete scene.
///
/// Checks:
/// - simulation parameters (step counts, frame time, friction)
/// - every mesh source exists or describes a non-degenerate grid
/// - cloth density and strain limits
/// - obstacle windows, motion curves and keyframe directories against
///   the obstacle mode
/// - handle cloth indices and stiffness
pub fn validate_scene(scene: &SceneConfig) -> WeftResult<()> {
    scene.sim.validate()?;

    for (c, cloth) in scene.cloths.iter().enumerate() {
        validate_source(&cloth.mesh).map_err(|e| context(format!("cloth {c}"), e))?;
        if !(cloth.density > 0.0) {
            return Err(WeftError::InvalidConfig(format!(
                "cloth {c}: density must be positive, got {}",
                cloth.density
            )));
        }
        if let (Some(min), Some(max)) = (cloth.strain_min, cloth.strain_max) {
            if min > max {
                return Err(WeftError::InvalidConfig(format!(
                    "cloth {c}: strain_min {min} exceeds strain_max {max}"
                )));
            }
        }
    }

    for (o, obstacle) in scene.obstacles.iter().enumerate() {
        let what = format!("obstacle {o}");
        validate_source(&obstacle.mesh).map_err(|e| context(what.clone(), e))?;
        validate_window(&obstacle.window).map_err(|e| context(what.clone(), e))?;
        if let Some(curve) = &obstacle.motion {
            validate_curve(curve).map_err(|e| context(what.clone(), e))?;
        }
        match (scene.sim.obstacle_mode, &obstacle.keyframes) {
            (ObstacleMode::Keyframed, None) => {
                return Err(WeftError::InvalidConfig(format!(
                    "{what}: keyframed mode needs a keyframes directory"
                )));
            }
            (ObstacleMode::Keyframed, Some(dir)) if !dir.is_dir() => {
                return Err(WeftError::InvalidConfig(format!(
                    "{what}: keyframes directory {} not found",
                    dir.display()
                )));
            }
            (ObstacleMode::Rigid, Some(_)) => {
                return Err(WeftError::InvalidConfig(format!(
                    "{what}: keyframes given but obstacle_mode is rigid"
                )));
            }
            _ => {}
        }
    }

    for (h, handle) in scene.handles.iter().enumerate() {
        let what = format!("handle {h}");
        if handle.cloth as usize >= scene.cloths.len() {
            return Err(WeftError::InvalidConfig(format!(
                "{what}: cloth {} does not exist ({} cloths)",
                handle.cloth,
                scene.cloths.len()
            )));
        }
        if handle.nodes.is_empty() {
            return Err(WeftError::InvalidConfig(format!("{what}: no nodes")));
        }
        if !(handle.stiffness > 0.0) {
            return Err(WeftError::InvalidConfig(format!(
                "{what}: stiffness must be positive"
            )));
        }
        validate_window(&handle.window).map_err(|e| context(what.clone(), e))?;
        if let Some(curve) = &handle.motion {
            validate_curve(curve).map_err(|e| context(what.clone(), e))?;
        }
    }

    Ok(())
}

fn validate_source(source: &MeshSource) -> WeftResult<()> {
    match source {
        MeshSource::Obj(path) if !path.is_file() => Err(WeftError::InvalidConfig(format!(
            "mesh file {} not found",
            path.display()
        ))),
        MeshSource::Obj(_) => Ok(()),
        MeshSource::Grid {
            cols,
            rows,
            width,
            depth,
            ..
        } => {
            if *cols == 0 || *rows == 0 {
                return Err(WeftError::InvalidConfig(
                    "grid needs at least one column and one row".into(),
                ));
            }
            if !(*width > 0.0 && *depth > 0.0) {
                return Err(WeftError::InvalidConfig(
                    "grid width and depth must be positive".into(),
                ));
            }
            Ok(())
        }
    }
}

fn validate_window(window: &ActivityWindow) -> WeftResult<()> {
    if window.start_time.is_nan() || window.end_time.is_nan() || window.start_time > window.end_time {
        return Err(WeftError::InvalidConfig(format!(
            "activity window [{}, {}] is empty",
            window.start_time, window.end_time
        )));
    }
    Ok(())
}

fn validate_curve(curve: &MotionCurve) -> WeftResult<()> {
    if curve.is_empty() {
        return Err(WeftError::InvalidConfig("motion curve has no keys".into()));
    }
    if !curve.is_well_ordered() {
        return Err(WeftError::InvalidConfig(
            "motion curve has repeated key times".into(),
        ));
    }
    Ok(())
}

fn context(what: String, err: WeftError) -> WeftError {
    match err {
        WeftError::InvalidConfig(msg) => WeftError::InvalidConfig(format!("{what}: {msg}")),
        other => other,
    }
}
