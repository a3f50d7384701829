//! CLI command implementations.

use std::path::Path;

use weft_io::checkpoint::{cloth_prefix, CONFIG_FILE};
use weft_io::{validate_scene, RunSummary, Runner, SceneConfig};
use weft_mesh::obj::load_objs;
use weft_sim::{Clock, ObstacleMode, Solvers};

/// Run a scene from the start.
pub fn run(
    scene_path: &Path,
    out_dir: Option<&Path>,
    frames: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("weft simulation");
    println!("───────────────");
    println!("Scene:   {}", scene_path.display());
    match out_dir {
        Some(dir) => println!("Output:  {}", dir.display()),
        None => println!("Output:  (none)"),
    }
    println!();

    let scene = SceneConfig::load(scene_path)?;
    let runner = Runner::start(&scene, out_dir, frames, Solvers::default())?;
    print_summary(&runner.run()?);
    Ok(())
}

/// Continue a run from a saved frame.
pub fn resume(out_dir: &Path, frame: u32) -> Result<(), Box<dyn std::error::Error>> {
    println!("weft resume");
    println!("───────────");
    println!("Output:  {}", out_dir.display());
    println!("Frame:   {frame}");
    println!();

    let runner = Runner::resume(out_dir, frame, Solvers::default())?;
    print_summary(&runner.run()?);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Stopped:  {:?}", summary.reason);
    println!("Steps:    {}", summary.steps);
    println!("Frame:    {}", summary.frame);
    println!("Time:     {:.4}s", summary.time);
}

/// Check a scene file without running it.
pub fn validate(scene_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("weft validator");
    println!("──────────────");
    println!();

    let scene = SceneConfig::load(scene_path)?;
    match validate_scene(&scene) {
        Ok(()) => println!(
            "✅ Scene is valid ({} cloths, {} obstacles, {} handles).",
            scene.cloths.len(),
            scene.obstacles.len(),
            scene.handles.len()
        ),
        Err(e) => {
            println!("❌ Scene validation failed: {e}");
            return Err(e.into());
        }
    }
    Ok(())
}

/// Print statistics of a saved frame.
pub fn inspect(out_dir: &Path, frame: u32) -> Result<(), Box<dyn std::error::Error>> {
    println!("weft frame inspector");
    println!("────────────────────");
    println!();

    let scene = SceneConfig::load(&out_dir.join(CONFIG_FILE))?;
    let mode = scene.sim.obstacle_mode;
    let prefix = cloth_prefix(out_dir, mode, frame);
    let meshes = load_objs(&prefix, scene.cloths.len(), mode == ObstacleMode::Keyframed)?;

    let mut clock = Clock::new(&scene.sim);
    let steps = clock.fast_forward_to_frame(frame);

    println!("Frame:    {frame}");
    println!("Step:     {steps}");
    println!("Time:     {:.4}s", clock.time);
    for (c, mesh) in meshes.iter().enumerate() {
        println!(
            "Cloth {c}:  {} nodes, {} faces",
            mesh.node_count(),
            mesh.face_count()
        );
        if mesh.x.is_empty() {
            continue;
        }
        let min_y = mesh.x.iter().map(|x| x.y).fold(f64::INFINITY, f64::min);
        let max_y = mesh.x.iter().map(|x| x.y).fold(f64::NEG_INFINITY, f64::max);
        let max_speed = mesh.v.iter().map(|v| v.length()).fold(0.0, f64::max);
        println!("  Y range:    [{min_y:.4}, {max_y:.4}]");
        println!("  Max speed:  {max_speed:.4} m/s");
    }
    Ok(())
}
