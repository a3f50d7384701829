//! Simulated cloth: a mesh plus its material scalars.

use serde::{Deserialize, Serialize};
use weft_mesh::Mesh;
use weft_types::constants;

/// One piece of cloth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cloth {
    pub mesh: Mesh,
    /// Area density (kg/m²).
    pub density: f64,
    /// Lower principal-strain limit; `None` means unlimited.
    pub strain_min: Option<f64>,
    /// Upper principal-strain limit; `None` means unlimited.
    pub strain_max: Option<f64>,
    /// Lumped per-node mass, filled by [`Cloth::compute_masses`].
    #[serde(skip)]
    pub mass: Vec<f64>,
}

impl Cloth {
    pub fn new(mesh: Mesh, density: f64) -> Self {
        Self {
            mesh,
            density,
            strain_min: None,
            strain_max: None,
            mass: Vec::new(),
        }
    }

    pub fn with_strain_limits(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.strain_min = min;
        self.strain_max = max;
        self
    }

    /// Lumps a third of each face's mass onto each of its nodes.
    pub fn compute_masses(&mut self) {
        let mut mass = vec![0.0; self.mesh.node_count()];
        for t in 0..self.mesh.face_count() {
            let share = self.density * self.mesh.face_area(t) / 3.0;
            for i in self.mesh.face(t) {
                mass[i as usize] += share;
            }
        }
        self.mass = mass;
    }

    pub fn total_mass(&self) -> f64 {
        self.mass.iter().sum()
    }

    /// Per-face `(min, max)` strain limits.
    pub fn strain_limits(&self) -> Vec<(f64, f64)> {
        let limits = (
            self.strain_min.unwrap_or(f64::NEG_INFINITY),
            self.strain_max.unwrap_or(f64::INFINITY),
        );
        vec![limits; self.mesh.face_count()]
    }
}

impl Default for Cloth {
    fn default() -> Self {
        Self::new(Mesh::default(), constants::DEFAULT_DENSITY)
    }
}
