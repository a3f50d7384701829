//! Building a [`Simulation`] from a [`SceneConfig`].

use weft_math::Transform;
use weft_mesh::generators::quad_grid;
use weft_mesh::obj::load_obj;
use weft_mesh::Mesh;
use weft_obstacle::{ObjSequence, Obstacle};
use weft_sim::{Cloth, NodeHandle, NodeRef, ObstacleMode, Simulation};
use weft_types::{WeftError, WeftResult};

use crate::config::{MeshSource, SceneConfig};

/// Loads or generates the mesh described by `source`.
pub fn load_mesh(source: &MeshSource) -> WeftResult<Mesh> {
    match source {
        MeshSource::Obj(path) => load_obj(path),
        MeshSource::Grid {
            cols,
            rows,
            width,
            depth,
            height,
        } => Ok(quad_grid(*cols, *rows, *width, *depth, *height)),
    }
}

fn place(mesh: &mut Mesh, transform: Option<&Transform>) {
    let Some(transform) = transform else { return };
    for x in &mut mesh.x {
        *x = transform.apply(*x);
    }
    mesh.update_x0();
    mesh.compute_ws_data();
}

/// Builds the simulation aggregate at time zero.
///
/// Handle nodes are marked preserved. Masses, baselines and obstacle
/// activation are left to [`Simulation::prepare`].
pub fn build_simulation(scene: &SceneConfig) -> WeftResult<Simulation> {
    let mut sim = Simulation::new(scene.sim.clone())?;

    for cloth in &scene.cloths {
        let mut mesh = load_mesh(&cloth.mesh)?;
        place(&mut mesh, cloth.transform.as_ref());
        sim.cloths.push(
            Cloth::new(mesh, cloth.density).with_strain_limits(cloth.strain_min, cloth.strain_max),
        );
    }

    for (o, obstacle) in scene.obstacles.iter().enumerate() {
        let mut base = load_mesh(&obstacle.mesh)?;
        place(&mut base, obstacle.transform.as_ref());
        let built = match scene.sim.obstacle_mode {
            ObstacleMode::Rigid => Obstacle::rigid(base, obstacle.motion.clone(), obstacle.window),
            ObstacleMode::Keyframed => {
                let dir = obstacle.keyframes.as_ref().ok_or_else(|| {
                    WeftError::InvalidConfig(format!("obstacle {o} has no keyframes directory"))
                })?;
                Obstacle::keyframed(base, Box::new(ObjSequence::new(dir.clone())), obstacle.window)
            }
        };
        sim.obstacles.push(built);
    }

    for handle in &scene.handles {
        for &node in &handle.nodes {
            let anchor = sim
                .cloths
                .get(handle.cloth as usize)
                .and_then(|cloth| cloth.mesh.x.get(node as usize))
                .copied()
                .ok_or_else(|| {
                    WeftError::InvalidConfig(format!(
                        "handle node {node} does not exist in cloth {}",
                        handle.cloth
                    ))
                })?;
            sim.handles.push(Box::new(NodeHandle {
                node: NodeRef::new(handle.cloth, node),
                anchor,
                motion: handle.motion.clone(),
                window: handle.window,
                stiffness: handle.stiffness,
            }));
        }
    }
    sim.mark_handle_nodes_preserved()?;

    tracing::info!(
        cloths = sim.cloths.len(),
        obstacles = sim.obstacles.len(),
        handles = sim.handles.len(),
        "scene built"
    );
    Ok(sim)
}
