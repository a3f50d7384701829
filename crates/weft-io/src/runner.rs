//! Batch runs.
//!
//! A [`Runner`] owns the pipeline and, when an output directory is given,
//! the checkpointer. It saves frame 0 before the first step, then every
//! frame the pipeline reaches, and stops at the configured end time, end
//! frame, or frame budget.

use std::path::Path;

use weft_sim::{Simulation, Solvers, StepPipeline};
use weft_telemetry::{EventBus, EventKind, TracingSink};
use weft_types::{constants, WeftResult};

use crate::checkpoint::{self, Checkpointer};
use crate::config::SceneConfig;
use crate::scene::build_simulation;
use crate::validator::validate_scene;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTime,
    EndFrame,
    FrameBudget,
}

/// Final state of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub steps: u64,
    pub frame: u32,
    pub time: f64,
}

pub struct Runner {
    pipeline: StepPipeline,
    checkpointer: Option<Checkpointer>,
    num_frames: u32,
}

impl Runner {
    /// Builds a fresh run of `scene` and relaxes its initial state.
    pub fn start(
        scene: &SceneConfig,
        out_dir: Option<&Path>,
        num_frames: u32,
        solvers: Solvers,
    ) -> WeftResult<Self> {
        validate_scene(scene)?;
        let mut sim = build_simulation(scene)?;
        sim.prepare()?;
        let checkpointer = out_dir
            .map(|dir| Checkpointer::create(dir, scene, &sim, false))
            .transpose()?;

        let mut runner = Self::assemble(sim, solvers, checkpointer, num_frames);
        runner.pipeline.separate_obstacles()?;
        runner.pipeline.relax_initial_state()?;
        runner.save_frame()?;
        Ok(runner)
    }

    /// Picks up the run saved in `out_dir` at `frame`.
    pub fn resume(out_dir: &Path, frame: u32, solvers: Solvers) -> WeftResult<Self> {
        let (scene, sim) = checkpoint::resume(out_dir, frame)?;
        let checkpointer = Checkpointer::create(out_dir, &scene, &sim, true)?;
        let mut runner = Self::assemble(
            sim,
            solvers,
            Some(checkpointer),
            constants::DEFAULT_NUM_FRAMES,
        );
        runner.pipeline.separate_obstacles()?;
        Ok(runner)
    }

    fn assemble(
        sim: Simulation,
        solvers: Solvers,
        checkpointer: Option<Checkpointer>,
        num_frames: u32,
    ) -> Self {
        let events = EventBus::with_sink(Box::new(TracingSink::new(tracing::Level::DEBUG)));
        Self {
            pipeline: StepPipeline::new(sim, solvers).with_events(events),
            checkpointer,
            num_frames,
        }
    }

    pub fn pipeline(&self) -> &StepPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut StepPipeline {
        &mut self.pipeline
    }

    pub fn sim(&self) -> &Simulation {
        self.pipeline.sim()
    }

    /// Advances one step, saving the frame if one was completed.
    ///
    /// Returns the reason to stop once the run is over.
    pub fn step(&mut self) -> WeftResult<Option<StopReason>> {
        let report = self.pipeline.advance_step()?;
        if report.frame_advanced {
            self.save_frame()?;
        }

        let sim = self.pipeline.sim();
        let reason = if sim.clock.time >= sim.config.end_time {
            Some(StopReason::EndTime)
        } else if sim.clock.frame >= sim.config.end_frame {
            Some(StopReason::EndFrame)
        } else if sim.clock.frame >= self.num_frames {
            Some(StopReason::FrameBudget)
        } else {
            None
        };
        Ok(reason)
    }

    /// Steps until the run is over.
    pub fn run(mut self) -> WeftResult<RunSummary> {
        let reason = loop {
            if let Some(reason) = self.step()? {
                break reason;
            }
        };
        self.pipeline.events_mut().finalize();
        let clock = &self.pipeline.sim().clock;
        tracing::info!(?reason, frame = clock.frame, time = clock.time, "run finished");
        Ok(RunSummary {
            reason,
            steps: clock.step,
            frame: clock.frame,
            time: clock.time,
        })
    }

    fn save_frame(&mut self) -> WeftResult<()> {
        let Some(checkpointer) = &mut self.checkpointer else {
            return Ok(());
        };
        let sim = self.pipeline.sim();
        let frame = sim.clock.frame;
        if checkpointer.save(sim, frame)? {
            checkpointer.save_timings(&sim.timers)?;
            let step = sim.clock.step;
            let events = self.pipeline.events_mut();
            events.emit_at(step, EventKind::CheckpointSaved { frame });
            events.flush();
        }
        Ok(())
    }
}
