//! The step pipeline.
//!
//! One call to [`StepPipeline::advance_step`] runs, in order:
//!
//! 1. clock: `time += step_time`, `step += 1`
//! 2. obstacle update (keyframe blend or rigid roll-back)
//! 3. constraint collection (handles, proximity)
//! 4. physics, then `x += v * dt` for cloth and obstacle nodes
//! 5. plasticity
//! 6. strain limiting, velocities re-derived
//! 7. collision response, velocities re-derived
//! 8. baseline commit (`x0 = x`, world-space data)
//! 9. on a frame boundary: remesh, consume a wait frame, maybe advance
//!    the frame
//! 10. constraint release
//!
//! Stages 3 to 7 and the remesh are gated by [`StageFlags`]; a disabled
//! stage does nothing and adds nothing to its timer.
//!
//! [`StageFlags`]: crate::stage::StageFlags

use std::time::Instant;

use weft_math::DVec3;
use weft_mesh::Mesh;
use weft_obstacle::Obstacle;
use weft_telemetry::{EventBus, EventKind};
use weft_types::{constants, ClothId, WeftError, WeftResult};

use crate::clock::Boundary;
use crate::config::{ObstacleMode, RelaxMode};
use crate::constraint::{Constraint, ConstraintSet};
use crate::simulation::{active_meshes, Simulation};
use crate::solvers::Solvers;
use crate::stage::Stage;
use crate::velocity::{node_positions, step_mesh, update_velocities};

/// Pop-filter regularization after a remesh.
const REMESH_POP_REGULARIZATION: f64 = 1000.0;

/// Pop-filter regularization while equilibrating.
const EQUILIBRATION_POP_REGULARIZATION: f64 = 1.0;

/// Summary of one completed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub step: u64,
    pub time: f64,
    /// Step size in effect after the step.
    pub step_time: f64,
    pub frame: u32,
    pub boundary: Boundary,
    pub frame_advanced: bool,
}

/// Drives a [`Simulation`] with a set of [`Solvers`].
#[derive(Debug)]
pub struct StepPipeline {
    sim: Simulation,
    solvers: Solvers,
    events: EventBus,
}

impl StepPipeline {
    pub fn new(sim: Simulation, solvers: Solvers) -> Self {
        Self {
            sim,
            solvers,
            events: EventBus::new(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    pub fn solvers_mut(&mut self) -> &mut Solvers {
        &mut self.solvers
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn into_sim(self) -> Simulation {
        self.sim
    }

    // ─── Stepping ────────────────────────────────────────────

    /// Advances the simulation by one step.
    pub fn advance_step(&mut self) -> WeftResult<StepReport> {
        let started = Instant::now();
        self.sim.clock.begin_step();

        self.update_obstacles()?;
        let constraints = self.collect(true)?;
        self.physics_step(&constraints)?;
        self.plasticity_step()?;
        self.strain_limiting_step(&constraints)?;
        self.collision_step()?;
        self.commit_baselines();

        let boundary = self.sim.clock.open_boundary();
        let step = self.sim.clock.step;
        if boundary == Boundary::RampUpComplete {
            let step_time = self.sim.clock.step_time;
            tracing::info!(step, step_time, "ramp-up complete");
            self.events
                .emit_at(step, EventKind::RegimeTransition { step_time });
        }
        if boundary.is_boundary() {
            self.remeshing_step(false)?;
        }
        let outcome = self.sim.clock.close_boundary(boundary);
        if outcome.wait_consumed {
            let remaining = self.sim.clock.wait_frames();
            tracing::debug!(step, remaining, "wait frame consumed");
            self.events
                .emit_at(step, EventKind::WaitFrameConsumed { remaining });
        }
        if outcome.frame_advanced {
            let (frame, time) = (self.sim.clock.frame, self.sim.clock.time);
            tracing::info!(frame, time, "frame advanced");
            self.events
                .emit_at(step, EventKind::FrameAdvanced { frame, time });
        }

        constraints.release();

        let clock = &self.sim.clock;
        let report = StepReport {
            step: clock.step,
            time: clock.time,
            step_time: clock.step_time,
            frame: clock.frame,
            boundary,
            frame_advanced: outcome.frame_advanced,
        };
        self.events.emit_at(
            step,
            EventKind::StepCompleted {
                time: report.time,
                step_time: report.step_time,
                wall_time: started.elapsed().as_secs_f64(),
            },
        );
        self.events.flush();
        tracing::trace!(step, time = report.time, "step complete");
        Ok(report)
    }

    /// Runs one nominal frame's worth of steps.
    pub fn advance_frame(&mut self) -> WeftResult<()> {
        for _ in 0..self.sim.config.frame_steps {
            self.advance_step()?;
        }
        Ok(())
    }

    // ─── Setup ───────────────────────────────────────────────

    /// Pushes obstacles out of the cloth before the first step.
    pub fn separate_obstacles(&mut self) -> WeftResult<()> {
        let mut obstacles: Vec<&mut Mesh> = self
            .sim
            .obstacles
            .iter_mut()
            .filter_map(Obstacle::mesh_mut)
            .collect();
        self.solvers
            .separator
            .separate_obstacles(&mut obstacles, &self.sim.cloths)
    }

    /// Settles the initial state before time-stepping begins.
    pub fn relax_initial_state(&mut self) -> WeftResult<()> {
        self.validate_handles()?;
        let preserve_creases = self.sim.config.preserve_creases;
        if preserve_creases {
            self.reset_plasticity()?;
        }
        match self.sim.config.relax {
            RelaxMode::Equilibrate => {
                self.equilibration_step()?;
                self.remeshing_step(true)?;
                self.equilibration_step()?;
            }
            RelaxMode::StrainZeroing => {
                self.remeshing_step(true)?;
                self.strain_zeroing_step()?;
                self.remeshing_step(true)?;
                self.strain_zeroing_step()?;
            }
        }
        if preserve_creases {
            self.reset_plasticity()?;
        }
        self.sim.config.preserve_creases = false;
        if self.sim.config.fixed_high_res_mesh {
            self.sim.enabled.disable(Stage::Remeshing);
        }
        tracing::debug!("initial state relaxed");
        Ok(())
    }

    /// Fails if a handle constrains a node remeshing may remove.
    pub fn validate_handles(&self) -> WeftResult<()> {
        for handle in &self.sim.handles {
            for node in handle.nodes() {
                let preserved = self
                    .sim
                    .cloths
                    .get(node.cloth.index())
                    .and_then(|cloth| cloth.mesh.preserve.get(node.node.index()))
                    .copied()
                    .unwrap_or(false);
                if !preserved {
                    return Err(WeftError::UnpreservedHandleNode {
                        cloth: node.cloth.0,
                        node: node.node.0,
                    });
                }
            }
        }
        Ok(())
    }

    fn reset_plasticity(&mut self) -> WeftResult<()> {
        for cloth in &mut self.sim.cloths {
            self.solvers.plasticity.reset(cloth)?;
        }
        Ok(())
    }

    // ─── Obstacles and constraints ───────────────────────────

    /// Moves every obstacle to the current time.
    ///
    /// Keyframed obstacles blend `1 / frame_steps` of the way toward the
    /// loaded keyframe and keep the result. Rigid obstacles are posed,
    /// smoothed toward their carried-over baseline, then rolled back to
    /// `x0` with the displacement turned into velocity; the physics stage
    /// moves them forward again.
    pub fn update_obstacles(&mut self) -> WeftResult<()> {
        let clock = &self.sim.clock;
        let (time, frame, step, dt) = (clock.time, clock.frame, clock.step, clock.step_time);
        match self.sim.config.obstacle_mode {
            ObstacleMode::Keyframed => {
                if !clock.advances_keyframes() {
                    return Ok(());
                }
                let blend = 1.0 / clock.frame_steps() as f64;
                for (o, obstacle) in self.sim.obstacles.iter_mut().enumerate() {
                    let was_active = obstacle.is_active();
                    if obstacle.mesh_at_frame(time, frame)?.is_some() {
                        obstacle.blend_with_next(blend);
                    } else if was_active {
                        self.events.emit_at(
                            step,
                            EventKind::ObstacleReleased {
                                obstacle: o as u32,
                                time,
                            },
                        );
                    }
                }
            }
            ObstacleMode::Rigid => {
                let blend = 1.0 / (1.0 + dt / constants::OBSTACLE_DECAY_TIME);
                for (o, obstacle) in self.sim.obstacles.iter_mut().enumerate() {
                    let was_active = obstacle.is_active();
                    if obstacle.mesh_at(time).is_none() {
                        if was_active {
                            self.events.emit_at(
                                step,
                                EventKind::ObstacleReleased {
                                    obstacle: o as u32,
                                    time,
                                },
                            );
                        }
                        continue;
                    }
                    obstacle.blend_with_previous(time, dt, blend);
                    if let Some(mesh) = obstacle.mesh_mut() {
                        roll_back(mesh, dt);
                    }
                }
            }
        }
        Ok(())
    }

    /// Gathers handle constraints and, when asked and enabled, proximity
    /// constraints into a set owned by the current step.
    pub fn collect(&mut self, include_proximity: bool) -> WeftResult<ConstraintSet> {
        let time = self.sim.clock.time;
        let mut constraints: Vec<Constraint> = self
            .sim
            .handles
            .iter()
            .flat_map(|handle| handle.constraints(time))
            .collect();
        if include_proximity && self.sim.enabled.is_enabled(Stage::Proximity) {
            self.sim.timers[Stage::Proximity].tick();
            let obstacles = active_meshes(&self.sim.obstacles);
            constraints.extend(self.solvers.proximity.detect(
                &self.sim.cloths,
                &obstacles,
                self.sim.config.friction,
                self.sim.config.obs_friction,
            )?);
            self.sim.timers[Stage::Proximity].tock();
        }
        Ok(self.sim.tracker().issue(self.sim.clock.step, constraints))
    }

    // ─── Stages ──────────────────────────────────────────────

    fn physics_step(&mut self, constraints: &[Constraint]) -> WeftResult<()> {
        if !self.sim.enabled.is_enabled(Stage::Physics) {
            return Ok(());
        }
        self.sim.timers[Stage::Physics].tick();
        let dt = self.sim.clock.step_time;
        let gravity: DVec3 = self.sim.config.gravity;
        for (c, cloth) in self.sim.cloths.iter_mut().enumerate() {
            self.solvers
                .integrator
                .integrate(cloth, ClothId(c as u32), gravity, constraints, dt)?;
        }
        for cloth in &mut self.sim.cloths {
            step_mesh(&mut cloth.mesh, dt);
        }
        for mesh in self.sim.obstacles.iter_mut().filter_map(Obstacle::mesh_mut) {
            step_mesh(mesh, dt);
        }
        self.sim.timers[Stage::Physics].tock();
        Ok(())
    }

    fn plasticity_step(&mut self) -> WeftResult<()> {
        if !self.sim.enabled.is_enabled(Stage::Plasticity) {
            return Ok(());
        }
        self.sim.timers[Stage::Plasticity].tick();
        for cloth in &mut self.sim.cloths {
            self.solvers.plasticity.plastic_update(cloth)?;
        }
        self.sim.timers[Stage::Plasticity].tock();
        Ok(())
    }

    fn strain_limiting_step(&mut self, constraints: &[Constraint]) -> WeftResult<()> {
        if !self.sim.enabled.is_enabled(Stage::StrainLimiting) {
            return Ok(());
        }
        self.sim.timers[Stage::StrainLimiting].tick();
        let xold = node_positions(&self.sim.cloths);
        let limits: Vec<_> = self.sim.cloths.iter().map(|c| c.strain_limits()).collect();
        self.solvers
            .strain_limiter
            .limit(&mut self.sim.cloths, &limits, constraints)?;
        update_velocities(&mut self.sim.cloths, &xold, self.sim.clock.step_time);
        self.sim.timers[Stage::StrainLimiting].tock();
        Ok(())
    }

    fn collision_step(&mut self) -> WeftResult<()> {
        if !self.sim.enabled.is_enabled(Stage::Collision) {
            return Ok(());
        }
        self.sim.timers[Stage::Collision].tick();
        let xold = node_positions(&self.sim.cloths);
        let constraints = self.collect(false)?;
        let obstacles = active_meshes(&self.sim.obstacles);
        self.solvers
            .collision
            .respond(&mut self.sim.cloths, &constraints, &obstacles)?;
        constraints.release();
        update_velocities(&mut self.sim.cloths, &xold, self.sim.clock.step_time);
        self.sim.timers[Stage::Collision].tock();
        Ok(())
    }

    /// Makes the post-step positions the baseline of the next step.
    fn commit_baselines(&mut self) {
        let cloth_meshes = self.sim.cloths.iter_mut().map(|cloth| &mut cloth.mesh);
        let obstacle_meshes = self.sim.obstacles.iter_mut().filter_map(Obstacle::mesh_mut);
        for mesh in cloth_meshes.chain(obstacle_meshes) {
            mesh.compute_ws_data();
            mesh.update_x0();
        }
    }

    /// Remeshes every cloth, carrying plastic residuals across and
    /// cleaning up afterwards.
    ///
    /// `initializing` skips the residual transfer and the pop filter.
    pub fn remeshing_step(&mut self, initializing: bool) -> WeftResult<()> {
        if !self.sim.enabled.is_enabled(Stage::Remeshing) {
            return Ok(());
        }
        let old: Vec<Mesh> = self.sim.cloths.iter().map(|c| c.mesh.clone()).collect();

        let carry_plasticity = self.sim.enabled.is_enabled(Stage::Plasticity) && !initializing;
        let residuals = if carry_plasticity {
            self.sim.timers[Stage::Plasticity].tick();
            let residuals: Vec<_> = self
                .sim
                .cloths
                .iter()
                .map(|cloth| self.solvers.plasticity.back_up_residuals(cloth))
                .collect();
            self.sim.timers[Stage::Plasticity].tock();
            Some(residuals)
        } else {
            None
        };

        self.sim.timers[Stage::Remeshing].tick();
        let plasticity = self.sim.enabled.is_enabled(Stage::Plasticity);
        for cloth in &mut self.sim.cloths {
            if self.sim.config.fixed_high_res_mesh {
                self.solvers.remesher.static_remesh(cloth)?;
            } else {
                let obstacles = active_meshes(&self.sim.obstacles);
                self.solvers
                    .remesher
                    .dynamic_remesh(cloth, &obstacles, plasticity)?;
            }
        }
        self.sim.timers[Stage::Remeshing].tock();

        if let Some(residuals) = residuals {
            self.sim.timers[Stage::Plasticity].tick();
            for ((cloth, old), res) in self.sim.cloths.iter_mut().zip(&old).zip(residuals) {
                self.solvers.plasticity.restore_residuals(cloth, old, res)?;
            }
            self.sim.timers[Stage::Plasticity].tock();
        }

        if self.sim.enabled.is_enabled(Stage::Separation) {
            self.sim.timers[Stage::Separation].tick();
            let obstacles = active_meshes(&self.sim.obstacles);
            self.solvers
                .separator
                .separate(&mut self.sim.cloths, &old, &obstacles)?;
            self.sim.timers[Stage::Separation].tock();
        }

        if self.sim.enabled.is_enabled(Stage::PopFilter) && !initializing {
            self.sim.timers[Stage::PopFilter].tick();
            let constraints = self.collect(true)?;
            for cloth in &mut self.sim.cloths {
                self.solvers
                    .pop_filter
                    .apply(cloth, &constraints, REMESH_POP_REGULARIZATION)?;
            }
            constraints.release();
            self.sim.timers[Stage::PopFilter].tock();
        }

        for cloth in &mut self.sim.cloths {
            cloth.compute_masses();
        }
        tracing::debug!(step = self.sim.clock.step, initializing, "remeshed");
        Ok(())
    }

    /// Pop filter on every cloth, then collision response.
    fn equilibration_step(&mut self) -> WeftResult<()> {
        self.sim.timers[Stage::Remeshing].tick();
        for cloth in &mut self.sim.cloths {
            self.solvers
                .pop_filter
                .apply(cloth, &[], EQUILIBRATION_POP_REGULARIZATION)?;
        }
        self.sim.timers[Stage::Remeshing].tock();

        let constraints = self.collect(false)?;
        if self.sim.enabled.is_enabled(Stage::Collision) {
            self.sim.timers[Stage::Collision].tick();
            let obstacles = active_meshes(&self.sim.obstacles);
            self.solvers
                .collision
                .respond(&mut self.sim.cloths, &constraints, &obstacles)?;
            self.sim.timers[Stage::Collision].tock();
        }
        constraints.release();
        Ok(())
    }

    /// Strain-limits every face to unit strain, then collision response.
    fn strain_zeroing_step(&mut self) -> WeftResult<()> {
        self.sim.timers[Stage::StrainLimiting].tick();
        let limits: Vec<_> = self
            .sim
            .cloths
            .iter()
            .map(|cloth| vec![(1.0, 1.0); cloth.mesh.face_count()])
            .collect();
        let proximity = {
            let obstacles = active_meshes(&self.sim.obstacles);
            self.solvers.proximity.detect(
                &self.sim.cloths,
                &obstacles,
                self.sim.config.friction,
                self.sim.config.obs_friction,
            )?
        };
        let constraints = self.sim.tracker().issue(self.sim.clock.step, proximity);
        self.solvers
            .strain_limiter
            .limit(&mut self.sim.cloths, &limits, &constraints)?;
        constraints.release();
        self.sim.timers[Stage::StrainLimiting].tock();

        if self.sim.enabled.is_enabled(Stage::Collision) {
            self.sim.timers[Stage::Collision].tick();
            let obstacles = active_meshes(&self.sim.obstacles);
            self.solvers
                .collision
                .respond(&mut self.sim.cloths, &[], &obstacles)?;
            self.sim.timers[Stage::Collision].tock();
        }
        Ok(())
    }
}

/// Turns the displacement from `x0` into velocity and restores `x0`.
fn roll_back(mesh: &mut Mesh, dt: f64) {
    let inv_dt = 1.0 / dt;
    for ((x, v), x0) in mesh.x.iter_mut().zip(&mut mesh.v).zip(&mesh.x0) {
        *v = (*x - *x0) * inv_dt;
        *x = *x0;
    }
}
