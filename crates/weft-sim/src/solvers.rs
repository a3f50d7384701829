//! Solver seams of the step pipeline.
//!
//! Each numerical stage is a trait so the pipeline can run with any
//! implementation. [`Solvers`] bundles one boxed implementation per
//! stage; its default is [`ExplicitIntegrator`] for physics and
//! [`Passive`] (leave everything untouched) for the rest.
//!
//! ```text
//! proximity ─> integrator ─> plasticity ─> strain limiter ─> collision
//!                                                              │
//!                 frame boundary: remesher ─> separator ─> pop filter
//! ```

use weft_math::DVec3;
use weft_mesh::Mesh;
use weft_types::{ClothId, WeftResult};

use crate::cloth::Cloth;
use crate::constraint::Constraint;

/// Advances cloth velocities over one step.
///
/// Positions are integrated by the pipeline afterwards (`x += v * dt`).
pub trait Integrator: Send {
    fn integrate(
        &mut self,
        cloth: &mut Cloth,
        id: ClothId,
        gravity: DVec3,
        constraints: &[Constraint],
        dt: f64,
    ) -> WeftResult<()>;

    fn name(&self) -> &str;
}

/// Per-node plastic state saved across a remesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Residuals {
    pub values: Vec<f64>,
}

/// Plastic deformation model.
pub trait PlasticityModel: Send {
    /// Updates plastic rest state and re-embeds it.
    fn plastic_update(&mut self, cloth: &mut Cloth) -> WeftResult<()>;

    /// Discards accumulated plastic deformation.
    fn reset(&mut self, cloth: &mut Cloth) -> WeftResult<()>;

    fn back_up_residuals(&self, cloth: &Cloth) -> Residuals;

    /// Transfers residuals saved on `old` onto the remeshed cloth.
    fn restore_residuals(
        &mut self,
        cloth: &mut Cloth,
        old: &Mesh,
        residuals: Residuals,
    ) -> WeftResult<()>;

    fn name(&self) -> &str;
}

/// Projects cloth positions into per-face `(min, max)` strain bounds.
pub trait StrainLimiter: Send {
    fn limit(
        &mut self,
        cloths: &mut [Cloth],
        limits: &[Vec<(f64, f64)>],
        constraints: &[Constraint],
    ) -> WeftResult<()>;

    fn name(&self) -> &str;
}

/// Resolves cloth-cloth and cloth-obstacle interpenetration.
pub trait CollisionSolver: Send {
    fn respond(
        &mut self,
        cloths: &mut [Cloth],
        constraints: &[Constraint],
        obstacles: &[&Mesh],
    ) -> WeftResult<()>;

    fn name(&self) -> &str;
}

/// Changes cloth resolution.
pub trait Remesher: Send {
    /// Refines to the fixed high-resolution mesh.
    fn static_remesh(&mut self, cloth: &mut Cloth) -> WeftResult<()>;

    /// Adapts resolution to curvature and nearby obstacles.
    fn dynamic_remesh(
        &mut self,
        cloth: &mut Cloth,
        obstacles: &[&Mesh],
        plasticity: bool,
    ) -> WeftResult<()>;

    fn name(&self) -> &str;
}

/// Untangles geometry.
pub trait Separator: Send {
    /// Removes intersections a remesh introduced, using the pre-remesh
    /// meshes as reference.
    fn separate(
        &mut self,
        cloths: &mut [Cloth],
        old: &[Mesh],
        obstacles: &[&Mesh],
    ) -> WeftResult<()>;

    /// Pushes obstacles out of the cloth at startup.
    fn separate_obstacles(&mut self, obstacles: &mut [&mut Mesh], cloths: &[Cloth])
        -> WeftResult<()>;

    fn name(&self) -> &str;
}

/// Damps spurious velocity spikes.
pub trait PopFilter: Send {
    fn apply(
        &mut self,
        cloth: &mut Cloth,
        constraints: &[Constraint],
        regularization: f64,
    ) -> WeftResult<()>;

    fn name(&self) -> &str;
}

/// Finds near-contacts and turns them into constraints.
pub trait ProximityDetector: Send {
    fn detect(
        &mut self,
        cloths: &[Cloth],
        obstacles: &[&Mesh],
        friction: f64,
        obs_friction: f64,
    ) -> WeftResult<Vec<Constraint>>;

    fn name(&self) -> &str;
}

/// One implementation per pipeline stage.
pub struct Solvers {
    pub integrator: Box<dyn Integrator>,
    pub plasticity: Box<dyn PlasticityModel>,
    pub strain_limiter: Box<dyn StrainLimiter>,
    pub collision: Box<dyn CollisionSolver>,
    pub remesher: Box<dyn Remesher>,
    pub separator: Box<dyn Separator>,
    pub pop_filter: Box<dyn PopFilter>,
    pub proximity: Box<dyn ProximityDetector>,
}

impl Default for Solvers {
    fn default() -> Self {
        Self {
            integrator: Box::new(ExplicitIntegrator),
            plasticity: Box::new(Passive),
            strain_limiter: Box::new(Passive),
            collision: Box::new(Passive),
            remesher: Box::new(Passive),
            separator: Box::new(Passive),
            pop_filter: Box::new(Passive),
            proximity: Box::new(Passive),
        }
    }
}

impl std::fmt::Debug for Solvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solvers")
            .field("integrator", &self.integrator.name())
            .field("plasticity", &self.plasticity.name())
            .field("strain_limiter", &self.strain_limiter.name())
            .field("collision", &self.collision.name())
            .field("remesher", &self.remesher.name())
            .field("separator", &self.separator.name())
            .field("pop_filter", &self.pop_filter.name())
            .field("proximity", &self.proximity.name())
            .finish()
    }
}

/// Symplectic Euler under gravity.
///
/// Equality constraints on the cloth are enforced exactly by choosing the
/// velocity that lands the node on its target after the position update.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitIntegrator;

impl Integrator for ExplicitIntegrator {
    fn integrate(
        &mut self,
        cloth: &mut Cloth,
        id: ClothId,
        gravity: DVec3,
        constraints: &[Constraint],
        dt: f64,
    ) -> WeftResult<()> {
        let mesh = &mut cloth.mesh;
        for v in &mut mesh.v {
            *v += gravity * dt;
        }
        for constraint in constraints {
            if let Constraint::Equality { node, target, .. } = constraint {
                if node.cloth != id {
                    continue;
                }
                let n = node.node.index();
                if n < mesh.node_count() {
                    mesh.v[n] = (*target - mesh.x[n]) / dt;
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "explicit"
    }
}

/// Leaves geometry untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passive;

impl PlasticityModel for Passive {
    fn plastic_update(&mut self, _cloth: &mut Cloth) -> WeftResult<()> {
        Ok(())
    }

    fn reset(&mut self, _cloth: &mut Cloth) -> WeftResult<()> {
        Ok(())
    }

    fn back_up_residuals(&self, _cloth: &Cloth) -> Residuals {
        Residuals::default()
    }

    fn restore_residuals(
        &mut self,
        _cloth: &mut Cloth,
        _old: &Mesh,
        _residuals: Residuals,
    ) -> WeftResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "passive"
    }
}

impl StrainLimiter for Passive {
    fn limit(
        &mut self,
        _cloths: &mut [Cloth],
        _limits: &[Vec<(f64, f64)>],
        _constraints: &[Constraint],
    ) -> WeftResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "passive"
    }
}

impl CollisionSolver for Passive {
    fn respond(
        &mut self,
        _cloths: &mut [Cloth],
        _constraints: &[Constraint],
        _obstacles: &[&Mesh],
    ) -> WeftResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "passive"
    }
}

impl Remesher for Passive {
    fn static_remesh(&mut self, _cloth: &mut Cloth) -> WeftResult<()> {
        Ok(())
    }

    fn dynamic_remesh(
        &mut self,
        _cloth: &mut Cloth,
        _obstacles: &[&Mesh],
        _plasticity: bool,
    ) -> WeftResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "passive"
    }
}

impl Separator for Passive {
    fn separate(
        &mut self,
        _cloths: &mut [Cloth],
        _old: &[Mesh],
        _obstacles: &[&Mesh],
    ) -> WeftResult<()> {
        Ok(())
    }

    fn separate_obstacles(
        &mut self,
        _obstacles: &mut [&mut Mesh],
        _cloths: &[Cloth],
    ) -> WeftResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "passive"
    }
}

impl PopFilter for Passive {
    fn apply(
        &mut self,
        _cloth: &mut Cloth,
        _constraints: &[Constraint],
        _regularization: f64,
    ) -> WeftResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "passive"
    }
}

impl ProximityDetector for Passive {
    fn detect(
        &mut self,
        _cloths: &[Cloth],
        _obstacles: &[&Mesh],
        _friction: f64,
        _obs_friction: f64,
    ) -> WeftResult<Vec<Constraint>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "passive"
    }
}
