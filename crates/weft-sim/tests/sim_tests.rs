//! Integration tests for weft-sim.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use weft_math::{DQuat, DVec3, MotionCurve, MotionKey, Transform};
use weft_mesh::generators::quad_grid;
use weft_mesh::Mesh;
use weft_obstacle::{ActivityWindow, KeyframeSource, Obstacle};
use weft_sim::clock::{Boundary, Clock, Regime};
use weft_sim::constraint::{Constraint, ConstraintTracker, Handle, NodeHandle, NodeRef};
use weft_sim::solvers::{CollisionSolver, Integrator, Remesher};
use weft_sim::velocity::{node_positions, update_velocities};
use weft_sim::{
    Cloth, ObstacleMode, RelaxMode, SimConfig, Simulation, Solvers, Stage, StageFlags,
    StepPipeline,
};
use weft_telemetry::{EventBus, EventKind, VecSink};
use weft_types::{ClothId, WeftError, WeftResult};

fn config(frame_steps: u32) -> SimConfig {
    SimConfig {
        frame_time: 0.04,
        frame_steps,
        ..SimConfig::default()
    }
}

fn grid_sim(config: SimConfig) -> Simulation {
    let mut sim = Simulation::new(config)
        .unwrap()
        .with_cloth(Cloth::new(quad_grid(2, 2, 1.0, 1.0, 0.0), 0.15));
    sim.prepare().unwrap();
    sim
}

fn pipeline(config: SimConfig) -> StepPipeline {
    StepPipeline::new(grid_sim(config), Solvers::default())
}

/// Shared record of solver calls.
#[derive(Debug, Clone, Default)]
struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    fn push(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    fn count(&self, call: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| **c == call).count()
    }
}

struct CountingRemesher(CallLog);

impl Remesher for CountingRemesher {
    fn static_remesh(&mut self, _cloth: &mut Cloth) -> WeftResult<()> {
        self.0.push("static");
        Ok(())
    }

    fn dynamic_remesh(
        &mut self,
        _cloth: &mut Cloth,
        _obstacles: &[&Mesh],
        _plasticity: bool,
    ) -> WeftResult<()> {
        self.0.push("dynamic");
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

// ─── Clock Tests ──────────────────────────────────────────────

#[test]
fn steady_boundaries_every_frame_steps() {
    let mut clock = Clock::new(&config(4));
    assert_eq!(clock.regime(), Regime::Steady { origin_step: 0, wait_frames: 0 });
    let mut boundaries = Vec::new();
    for _ in 0..12 {
        clock.begin_step();
        let boundary = clock.open_boundary();
        if boundary.is_boundary() {
            boundaries.push(clock.step);
        }
        clock.close_boundary(boundary);
    }
    assert_eq!(boundaries, vec![4, 8, 12]);
    assert_eq!(clock.frame, 3);
}

#[test]
fn ramp_up_transition_happens_once() {
    let cfg = SimConfig {
        init_frame_steps: 3,
        ..config(8)
    };
    let ramp = cfg.ramp_up_step_time();
    let nominal = cfg.nominal_step_time();
    let mut clock = Clock::new(&cfg);
    assert!(clock.is_ramping_up());

    let mut transitions = 0;
    for step in 1..=30u64 {
        let expected = if step <= 4 { ramp } else { nominal };
        assert_eq!(clock.step_time, expected, "step size used by step {step}");
        clock.begin_step();
        let boundary = clock.open_boundary();
        if boundary == Boundary::RampUpComplete {
            transitions += 1;
            assert_eq!(clock.step, 4);
            assert_eq!(clock.step_time, nominal);
        }
        clock.close_boundary(boundary);
    }
    assert_eq!(transitions, 1);
    assert_eq!(clock.regime(), Regime::Steady { origin_step: 4, wait_frames: 0 });
}

#[test]
fn ramp_up_boundaries_are_relative_to_transition() {
    let cfg = SimConfig {
        init_frame_steps: 3,
        ..config(8)
    };
    let mut clock = Clock::new(&cfg);
    let mut frames = Vec::new();
    for _ in 0..20 {
        let outcome = clock.advance_counters();
        if outcome.frame_advanced {
            frames.push((clock.step, clock.frame));
        }
    }
    assert_eq!(frames, vec![(4, 1), (12, 2), (20, 3)]);
}

#[test]
fn wait_frames_delay_frame_zero() {
    let cfg = SimConfig {
        init_wait_frames: 2,
        ..config(2)
    };
    let mut clock = Clock::new(&cfg);
    let mut history = Vec::new();
    for _ in 0..8 {
        let before = clock.frame;
        let outcome = clock.advance_counters();
        assert!(clock.frame >= before);
        assert!(clock.frame - before <= 1);
        history.push((clock.step, clock.frame, outcome.wait_consumed));
    }
    assert_eq!(
        history,
        vec![
            (1, 0, false),
            (2, 0, true),
            (3, 0, false),
            (4, 1, true),
            (5, 1, false),
            (6, 2, false),
            (7, 2, false),
            (8, 3, false),
        ]
    );
}

#[test]
fn ramp_up_transition_does_not_consume_wait() {
    let cfg = SimConfig {
        init_frame_steps: 2,
        init_wait_frames: 1,
        ..config(4)
    };
    let mut clock = Clock::new(&cfg);
    for _ in 0..3 {
        clock.advance_counters();
    }
    assert!(!clock.is_ramping_up());
    assert_eq!(clock.frame, 0);
    assert_eq!(clock.wait_frames(), 1);

    for _ in 0..4 {
        clock.advance_counters();
    }
    assert_eq!(clock.step, 7);
    assert_eq!(clock.wait_frames(), 0);
    assert_eq!(clock.frame, 1);
}

#[test]
fn keyframes_advance_only_during_ramp_up_while_waiting() {
    let cfg = SimConfig {
        init_frame_steps: 2,
        init_wait_frames: 1,
        ..config(2)
    };
    let mut clock = Clock::new(&cfg);
    let mut seen = Vec::new();
    for _ in 0..6 {
        clock.begin_step();
        seen.push(clock.advances_keyframes());
        let boundary = clock.open_boundary();
        clock.close_boundary(boundary);
    }
    assert_eq!(seen, vec![true, true, false, false, false, true]);
}

#[test]
fn fast_forward_matches_real_run() {
    let cfg = SimConfig {
        init_frame_steps: 3,
        init_wait_frames: 1,
        ..config(4)
    };
    let mut pipeline = pipeline(cfg.clone());
    while pipeline.sim().clock.frame < 3 {
        pipeline.advance_step().unwrap();
    }

    let mut clock = Clock::new(&cfg);
    let replayed = clock.fast_forward_to_frame(3);
    assert_eq!(replayed, pipeline.sim().clock.step);
    assert_eq!(&clock, &pipeline.sim().clock);
}

#[test]
fn replayed_frame_time_includes_ramp_up_and_wait() {
    let cfg = SimConfig {
        init_frame_steps: 3,
        init_wait_frames: 1,
        ..config(4)
    };
    let mut clock = Clock::new(&cfg);
    let steps = clock.fast_forward_to_frame(1);

    // Four ramp-up steps of 0.04/3, then one waited frame of 0.01 steps.
    assert_eq!(steps, 8);
    assert_relative_eq!(clock.time, 4.0 * 0.04 / 3.0 + 4.0 * 0.01, epsilon = 1e-12);
    assert!((clock.time - 0.04).abs() > 1e-3);
}

#[test]
fn reached_end_by_time_or_frame() {
    let mut clock = Clock::new(&config(1));
    assert!(!clock.reached_end(f64::INFINITY, 2));
    clock.advance_counters();
    clock.advance_counters();
    assert!(clock.reached_end(f64::INFINITY, 2));
    assert!(clock.reached_end(0.05, u32::MAX));
}

// ─── Config Tests ─────────────────────────────────────────────

#[test]
fn config_defaults_fill_missing_fields() {
    let cfg: SimConfig =
        serde_json::from_str(r#"{"frame_steps": 4, "disable": ["strain_limiting", "remeshing"]}"#)
            .unwrap();
    assert_eq!(cfg.frame_steps, 4);
    assert_eq!(cfg.frame_time, 0.04);
    assert_eq!(cfg.end_frame, u32::MAX);
    assert_eq!(cfg.obstacle_mode, ObstacleMode::Rigid);
    assert_eq!(cfg.relax, RelaxMode::Equilibrate);

    let flags = StageFlags::without(&cfg.disable);
    assert!(!flags.is_enabled(Stage::StrainLimiting));
    assert!(!flags.is_enabled(Stage::Remeshing));
    assert!(flags.is_enabled(Stage::Physics));
}

#[test]
fn config_rejects_zero_frame_steps() {
    let err = Simulation::new(config(0)).unwrap_err();
    assert!(matches!(err, WeftError::InvalidConfig(_)));
}

#[test]
fn only_keeps_named_stages() {
    let cfg = SimConfig::default().only(&[Stage::Physics]);
    let flags = StageFlags::without(&cfg.disable);
    for stage in Stage::ALL {
        assert_eq!(flags.is_enabled(stage), stage == Stage::Physics, "{}", stage.name());
    }
}

// ─── Cloth and Velocity Tests ─────────────────────────────────

#[test]
fn masses_sum_to_density_times_area() {
    let mut cloth = Cloth::new(quad_grid(3, 3, 2.0, 1.0, 0.0), 0.2);
    cloth.compute_masses();
    assert_eq!(cloth.mass.len(), 16);
    assert_relative_eq!(cloth.total_mass(), 0.4, epsilon = 1e-12);
}

#[test]
fn velocities_rederived_from_displacement() {
    let mut cloths = vec![
        Cloth::new(quad_grid(1, 1, 1.0, 1.0, 0.0), 0.1),
        Cloth::new(quad_grid(1, 1, 1.0, 1.0, 1.0), 0.1),
    ];
    let xold = node_positions(&cloths);
    assert_eq!(xold.len(), 8);
    cloths[1].mesh.x[2].y += 0.5;
    update_velocities(&mut cloths, &xold, 0.25);
    assert_relative_eq!(cloths[1].mesh.v[2].y, 2.0);
    assert_eq!(cloths[0].mesh.v[2], DVec3::ZERO);
}

// ─── Pipeline Tests ───────────────────────────────────────────

#[test]
fn single_step_applies_gravity_only() {
    let cfg = SimConfig {
        end_frame: 1,
        ..config(1).only(&[Stage::Physics])
    };
    let mut pipeline = pipeline(cfg);
    let before = pipeline.sim().cloths[0].mesh.x.clone();

    let report = pipeline.advance_step().unwrap();
    assert_eq!(report.step, 1);
    assert!(report.frame_advanced);
    assert!(pipeline.sim().is_finished());

    let dt = 0.04;
    let drop = -9.8 * dt * dt;
    let mesh = &pipeline.sim().cloths[0].mesh;
    for (x, x_before) in mesh.x.iter().zip(&before) {
        assert_relative_eq!(x.x, x_before.x);
        assert_relative_eq!(x.z, x_before.z);
        assert_relative_eq!(x.y, x_before.y + drop, epsilon = 1e-12);
    }
    assert_eq!(mesh.x0, mesh.x);
}

#[test]
fn disabled_stages_leave_timers_at_zero() {
    let mut pipeline = pipeline(config(2).only(&[Stage::Physics]));
    for _ in 0..4 {
        pipeline.advance_step().unwrap();
    }
    let totals = pipeline.sim().timers.totals();
    for stage in Stage::ALL {
        if stage != Stage::Physics {
            assert_eq!(totals[stage.index()], 0.0, "{}", stage.name());
        }
    }
}

#[test]
fn disabled_physics_freezes_cloth() {
    let mut pipeline = pipeline(config(2).only(&[]));
    let before = pipeline.sim().cloths[0].mesh.x.clone();
    pipeline.advance_frame().unwrap();
    assert_eq!(pipeline.sim().cloths[0].mesh.x, before);
    assert_eq!(pipeline.sim().clock.frame, 1);
}

#[test]
fn remeshing_runs_on_frame_boundaries() {
    let log = CallLog::default();
    let cfg = SimConfig {
        init_frame_steps: 2,
        ..config(3).only(&[Stage::Remeshing])
    };
    let mut pipeline = pipeline(cfg);
    pipeline.solvers_mut().remesher = Box::new(CountingRemesher(log.clone()));
    for _ in 0..9 {
        pipeline.advance_step().unwrap();
    }
    // Transition at step 3, then steps 6 and 9.
    assert_eq!(log.count("dynamic"), 3);
    assert_eq!(log.count("static"), 0);
}

#[test]
fn fixed_high_res_mesh_remeshes_statically_while_relaxing_only() {
    for (relax, expected) in [(RelaxMode::Equilibrate, 1), (RelaxMode::StrainZeroing, 2)] {
        let log = CallLog::default();
        let cfg = SimConfig {
            fixed_high_res_mesh: true,
            relax,
            ..config(2)
        };
        let mut pipeline = pipeline(cfg);
        pipeline.solvers_mut().remesher = Box::new(CountingRemesher(log.clone()));
        pipeline.relax_initial_state().unwrap();
        assert!(!pipeline.sim().enabled.is_enabled(Stage::Remeshing));

        for _ in 0..4 {
            pipeline.advance_step().unwrap();
        }
        assert_eq!(log.count("static"), expected);
        assert_eq!(log.count("dynamic"), 0);
    }
}

#[test]
fn relaxing_clears_crease_preservation() {
    let cfg = SimConfig {
        preserve_creases: true,
        ..config(2)
    };
    let mut pipeline = pipeline(cfg);
    pipeline.relax_initial_state().unwrap();
    assert!(!pipeline.sim().config.preserve_creases);
    assert!(pipeline.sim().enabled.is_enabled(Stage::Remeshing));
}

// ─── Constraint Tests ─────────────────────────────────────────

#[test]
fn constraint_sets_are_stamped_and_counted() {
    let tracker = ConstraintTracker::new();
    let set = tracker.issue(7, vec![]);
    let other = tracker.issue(8, vec![]);
    assert_eq!(set.step(), 7);
    assert_eq!(tracker.live_sets(), 2);
    set.release();
    drop(other);
    assert_eq!(tracker.live_sets(), 0);
}

struct LiveSetProbe {
    tracker: ConstraintTracker,
    seen: Arc<Mutex<Vec<(&'static str, usize)>>>,
}

impl Integrator for LiveSetProbe {
    fn integrate(
        &mut self,
        _cloth: &mut Cloth,
        _id: ClothId,
        _gravity: DVec3,
        _constraints: &[Constraint],
        _dt: f64,
    ) -> WeftResult<()> {
        self.seen.lock().unwrap().push(("physics", self.tracker.live_sets()));
        Ok(())
    }

    fn name(&self) -> &str {
        "probe"
    }
}

impl CollisionSolver for LiveSetProbe {
    fn respond(
        &mut self,
        _cloths: &mut [Cloth],
        _constraints: &[Constraint],
        _obstacles: &[&Mesh],
    ) -> WeftResult<()> {
        self.seen.lock().unwrap().push(("collision", self.tracker.live_sets()));
        Ok(())
    }

    fn name(&self) -> &str {
        "probe"
    }
}

#[test]
fn constraint_sets_released_every_step() {
    let mut pipeline = pipeline(config(2).only(&[Stage::Physics, Stage::Collision]));
    let tracker = pipeline.sim().tracker().clone();
    let seen = Arc::new(Mutex::new(Vec::new()));
    pipeline.solvers_mut().integrator = Box::new(LiveSetProbe {
        tracker: tracker.clone(),
        seen: seen.clone(),
    });
    pipeline.solvers_mut().collision = Box::new(LiveSetProbe {
        tracker: tracker.clone(),
        seen: seen.clone(),
    });

    for _ in 0..3 {
        pipeline.advance_step().unwrap();
        assert_eq!(tracker.live_sets(), 0);
    }
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 6);
    for (stage, live) in seen.iter() {
        match *stage {
            "physics" => assert_eq!(*live, 1),
            _ => assert_eq!(*live, 2),
        }
    }
}

#[test]
fn handle_pins_node_while_cloth_falls() {
    let mut sim = grid_sim(config(2).only(&[Stage::Physics]));
    let anchor = sim.cloths[0].mesh.x[0];
    sim.handles
        .push(Box::new(NodeHandle::new(NodeRef::new(0, 0), anchor)));
    sim.mark_handle_nodes_preserved().unwrap();
    let mut pipeline = StepPipeline::new(sim, Solvers::default());
    pipeline.relax_initial_state().unwrap();

    pipeline.advance_frame().unwrap();
    let mesh = &pipeline.sim().cloths[0].mesh;
    assert!((mesh.x[0] - anchor).length() < 1e-12);
    assert!(mesh.x[4].y < anchor.y);

    let time = pipeline.sim().clock.time;
    let pins = pipeline.sim().handles[0].constraints(time);
    assert_eq!(pins.len(), 1);
    assert!(matches!(pins[0], Constraint::Equality { .. }));
    assert!(pins[0].violation(mesh.x[0]) < 1e-12);
    assert!(pins[0].violation(mesh.x[4]) > 0.0);
}

#[test]
fn contact_violation_is_signed_distance_to_plane() {
    let contact = Constraint::Contact {
        node: NodeRef::new(0, 0),
        point: DVec3::ZERO,
        normal: DVec3::Y,
        friction: 0.3,
    };
    assert_relative_eq!(contact.violation(DVec3::new(1.0, 0.25, 0.0)), 0.25);
    assert_relative_eq!(contact.violation(DVec3::new(0.0, -0.5, 2.0)), -0.5);
}

#[test]
fn unpreserved_handle_node_is_fatal() {
    let mut sim = grid_sim(config(2));
    sim.handles
        .push(Box::new(NodeHandle::new(NodeRef::new(0, 3), DVec3::ZERO)));
    let mut pipeline = StepPipeline::new(sim, Solvers::default());
    let err = pipeline.relax_initial_state().unwrap_err();
    assert!(matches!(err, WeftError::UnpreservedHandleNode { cloth: 0, node: 3 }));
    assert!(err.is_fatal());
}

#[test]
fn handle_out_of_range_is_config_error() {
    let mut sim = grid_sim(config(2));
    sim.handles
        .push(Box::new(NodeHandle::new(NodeRef::new(2, 0), DVec3::ZERO)));
    assert!(matches!(
        sim.mark_handle_nodes_preserved(),
        Err(WeftError::InvalidConfig(_))
    ));
}

#[test]
fn handle_outside_window_contributes_nothing() {
    let mut handle = NodeHandle::new(NodeRef::new(0, 0), DVec3::ZERO);
    handle.window = ActivityWindow::new(0.0, 1.0);
    assert_eq!(handle.constraints(0.5).len(), 1);
    assert!(handle.constraints(1.5).is_empty());
}

// ─── Obstacle Tests ───────────────────────────────────────────

fn rising_curve() -> MotionCurve {
    MotionCurve::new(vec![
        MotionKey {
            time: 0.0,
            transform: Transform::IDENTITY,
        },
        MotionKey {
            time: 1.0,
            transform: Transform::new(DVec3::new(0.0, 1.0, 0.0), DQuat::IDENTITY, 1.0),
        },
    ])
}

#[test]
fn rigid_obstacle_follows_curve() {
    let cfg = config(1).only(&[Stage::Physics]);
    let mut sim = Simulation::new(cfg).unwrap().with_obstacle(Obstacle::rigid(
        quad_grid(1, 1, 1.0, 1.0, 0.0),
        Some(rising_curve()),
        ActivityWindow::default(),
    ));
    sim.prepare().unwrap();
    let mut pipeline = StepPipeline::new(sim, Solvers::default());

    for step in 1..=5 {
        pipeline.advance_step().unwrap();
        let mesh = pipeline.sim().obstacles[0].mesh().unwrap();
        for (x, x0) in mesh.x.iter().zip(&mesh.x0) {
            assert_relative_eq!(x.y, 0.04 * step as f64, epsilon = 1e-9);
            assert_eq!(x, x0);
        }
    }
}

#[test]
fn rigid_obstacle_released_after_window() {
    let sink = VecSink::new();
    let mut sim = Simulation::new(config(1)).unwrap().with_obstacle(Obstacle::rigid(
        quad_grid(1, 1, 1.0, 1.0, 0.0),
        None,
        ActivityWindow::new(0.0, 0.1),
    ));
    sim.prepare().unwrap();
    let mut pipeline = StepPipeline::new(sim, Solvers::default())
        .with_events(EventBus::with_sink(Box::new(sink.clone())));

    pipeline.advance_step().unwrap();
    pipeline.advance_step().unwrap();
    assert!(pipeline.sim().obstacles[0].is_active());
    pipeline.advance_step().unwrap();
    assert!(!pipeline.sim().obstacles[0].is_active());
    assert_eq!(pipeline.sim().obstacles[0].base().node_count(), 4);

    let released: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::ObstacleReleased { obstacle: 0, .. }))
        .collect();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].step, 3);
}

/// Keyframe `f` is the base grid raised to height `f + 1`.
#[derive(Debug)]
struct RaisedGrids {
    available: u32,
}

impl KeyframeSource for RaisedGrids {
    fn load(&self, frame: u32) -> WeftResult<Mesh> {
        if frame >= self.available {
            return Err(WeftError::MissingKeyframe {
                frame,
                path: PathBuf::from(format!("body{frame:04}.obj")),
            });
        }
        Ok(quad_grid(1, 1, 1.0, 1.0, frame as f64 + 1.0))
    }
}

fn keyframed_pipeline(available: u32) -> StepPipeline {
    let cfg = SimConfig {
        obstacle_mode: ObstacleMode::Keyframed,
        ..config(2)
    };
    let mut sim = Simulation::new(cfg).unwrap().with_obstacle(Obstacle::keyframed(
        quad_grid(1, 1, 1.0, 1.0, 0.0),
        Box::new(RaisedGrids { available }),
        ActivityWindow::default(),
    ));
    sim.prepare().unwrap();
    StepPipeline::new(sim, Solvers::default())
}

#[test]
fn keyframed_obstacle_blends_across_frames() {
    let mut pipeline = keyframed_pipeline(10);
    let mut heights = Vec::new();
    for _ in 0..4 {
        pipeline.advance_step().unwrap();
        heights.push(pipeline.sim().obstacles[0].mesh().unwrap().x[0].y);
    }
    let expected = [0.5, 1.0, 1.5, 2.0];
    for (h, e) in heights.iter().zip(expected) {
        assert_relative_eq!(*h, e, epsilon = 1e-12);
    }
}

#[test]
fn missing_keyframe_aborts_step() {
    let mut pipeline = keyframed_pipeline(1);
    pipeline.advance_frame().unwrap();
    let err = pipeline.advance_step().unwrap_err();
    assert!(matches!(err, WeftError::MissingKeyframe { frame: 1, .. }));
    assert!(!pipeline.sim().obstacles[0].is_active());
    assert_eq!(pipeline.sim().tracker().live_sets(), 0);
}

// ─── Event Tests ──────────────────────────────────────────────

#[test]
fn pipeline_emits_step_regime_and_frame_events() {
    let sink = VecSink::new();
    let cfg = SimConfig {
        init_frame_steps: 2,
        ..config(2)
    };
    let mut pipeline =
        pipeline(cfg).with_events(EventBus::with_sink(Box::new(sink.clone())));
    for _ in 0..5 {
        pipeline.advance_step().unwrap();
    }
    let events = sink.events();
    let steps = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::StepCompleted { .. }))
        .count();
    assert_eq!(steps, 5);

    let transitions: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::RegimeTransition { .. }))
        .map(|e| e.step)
        .collect();
    assert_eq!(transitions, vec![3]);

    let frames: Vec<_> = events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::FrameAdvanced { frame, .. } => Some((e.step, frame)),
            _ => None,
        })
        .collect();
    assert_eq!(frames, vec![(3, 1), (5, 2)]);
}
