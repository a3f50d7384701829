//! The simulation aggregate.
//!
//! Owns everything that evolves over a run: cloths, obstacles, handles,
//! the clock, stage flags and timers. The [`StepPipeline`] drives it; the
//! checkpoint controller builds and restores it.
//!
//! [`StepPipeline`]: crate::pipeline::StepPipeline

use weft_mesh::Mesh;
use weft_obstacle::Obstacle;
use weft_types::{WeftError, WeftResult};

use crate::cloth::Cloth;
use crate::clock::Clock;
use crate::config::{ObstacleMode, SimConfig};
use crate::constraint::{ConstraintTracker, Handle};
use crate::stage::{StageFlags, StageTimers};

/// Root simulation state.
#[derive(Debug)]
pub struct Simulation {
    pub cloths: Vec<Cloth>,
    pub obstacles: Vec<Obstacle>,
    pub handles: Vec<Box<dyn Handle>>,
    pub clock: Clock,
    pub config: SimConfig,
    pub enabled: StageFlags,
    pub timers: StageTimers,
    tracker: ConstraintTracker,
}

impl Simulation {
    /// An empty simulation at time zero.
    pub fn new(config: SimConfig) -> WeftResult<Self> {
        config.validate()?;
        Ok(Self {
            cloths: Vec::new(),
            obstacles: Vec::new(),
            handles: Vec::new(),
            clock: Clock::new(&config),
            enabled: StageFlags::without(&config.disable),
            timers: StageTimers::default(),
            tracker: ConstraintTracker::new(),
            config,
        })
    }

    pub fn with_cloth(mut self, cloth: Cloth) -> Self {
        self.cloths.push(cloth);
        self
    }

    pub fn with_obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    pub fn with_handle(mut self, handle: Box<dyn Handle>) -> Self {
        self.handles.push(handle);
        self
    }

    pub fn tracker(&self) -> &ConstraintTracker {
        &self.tracker
    }

    /// Computes masses, records cloth baselines and materializes every
    /// obstacle at the current clock time.
    pub fn prepare(&mut self) -> WeftResult<()> {
        for cloth in &mut self.cloths {
            cloth.compute_masses();
            cloth.mesh.update_x0();
        }
        self.materialize_obstacles()?;
        for mesh in self.obstacles.iter_mut().filter_map(Obstacle::mesh_mut) {
            mesh.update_x0();
        }
        Ok(())
    }

    /// Queries every obstacle at the current time (and frame, when
    /// keyframed), activating or releasing it as its window dictates.
    pub fn materialize_obstacles(&mut self) -> WeftResult<()> {
        let (time, frame) = (self.clock.time, self.clock.frame);
        for obstacle in &mut self.obstacles {
            match self.config.obstacle_mode {
                ObstacleMode::Rigid => {
                    obstacle.mesh_at(time);
                }
                ObstacleMode::Keyframed => {
                    obstacle.mesh_at_frame(time, frame)?;
                }
            }
        }
        Ok(())
    }

    /// Meshes of the currently active obstacles.
    pub fn obstacle_meshes(&self) -> Vec<&Mesh> {
        active_meshes(&self.obstacles)
    }

    pub fn cloth_meshes(&self) -> Vec<&Mesh> {
        self.cloths.iter().map(|cloth| &cloth.mesh).collect()
    }

    /// Flags every handle node as preserved by remeshing.
    pub fn mark_handle_nodes_preserved(&mut self) -> WeftResult<()> {
        let cloth_count = self.cloths.len();
        for handle in &self.handles {
            for node in handle.nodes() {
                let mesh = self
                    .cloths
                    .get_mut(node.cloth.index())
                    .map(|cloth| &mut cloth.mesh)
                    .ok_or_else(|| {
                        WeftError::InvalidConfig(format!(
                            "handle references cloth {} of {}",
                            node.cloth.0, cloth_count
                        ))
                    })?;
                let flag = mesh.preserve.get_mut(node.node.index()).ok_or_else(|| {
                    WeftError::InvalidConfig(format!(
                        "handle references node {} of cloth {}",
                        node.node.0, node.cloth.0
                    ))
                })?;
                *flag = true;
            }
        }
        Ok(())
    }

    /// Whether the configured end time or end frame has been reached.
    pub fn is_finished(&self) -> bool {
        self.clock
            .reached_end(self.config.end_time, self.config.end_frame)
    }
}

/// Meshes of the active obstacles in `obstacles`.
pub fn active_meshes(obstacles: &[Obstacle]) -> Vec<&Mesh> {
    obstacles.iter().filter_map(Obstacle::mesh).collect()
}
