//! Core mesh type with SoA (Structure of Arrays) node layout.
//!
//! Every per-node attribute is its own contiguous array:
//! - `x: [x0, x1, x2, ...]` current positions
//! - `x0: [...]` rest baselines recorded by [`Mesh::update_x0`]
//! - `v: [...]` velocities
//!
//! Faces are stored flat in `indices`, three per triangle. Deep copy is
//! `Clone`; release is `Drop`.

use serde::{Deserialize, Serialize};
use weft_math::DVec3;
use weft_types::{WeftError, WeftResult};

/// A triangle mesh stored in Structure-of-Arrays layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    // --- Node data (SoA) ---
    /// Current world-space positions.
    pub x: Vec<DVec3>,
    /// Rest baselines. Obstacle blending and rollback read these.
    pub x0: Vec<DVec3>,
    /// Velocities.
    pub v: Vec<DVec3>,
    /// Nodes that remeshing must never delete.
    pub preserve: Vec<bool>,

    // --- World-space derived data ---
    /// Area-weighted unit node normals.
    #[serde(skip)]
    pub normals: Vec<DVec3>,
    /// Unit face normals.
    #[serde(skip)]
    pub face_normals: Vec<DVec3>,

    // --- Face data ---
    /// Triangle indices, flat: `[t0v0, t0v1, t0v2, t1v0, ...]`.
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Returns the number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.x.len()
    }

    /// Returns the number of triangles.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns the three node indices of face `t`.
    #[inline]
    pub fn face(&self, t: usize) -> [u32; 3] {
        let base = t * 3;
        [self.indices[base], self.indices[base + 1], self.indices[base + 2]]
    }

    /// Area of face `t` at current positions.
    pub fn face_area(&self, t: usize) -> f64 {
        let [a, b, c] = self.face(t).map(|i| self.x[i as usize]);
        0.5 * (b - a).cross(c - a).length()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Builds a resting mesh from positions and faces.
    ///
    /// Baselines equal the positions, velocities are zero and no node is
    /// preserved. World-space data is computed before returning.
    pub fn from_positions(positions: Vec<DVec3>, indices: Vec<u32>) -> WeftResult<Self> {
        let n = positions.len();
        let mut mesh = Self {
            x0: positions.clone(),
            x: positions,
            v: vec![DVec3::ZERO; n],
            preserve: vec![false; n],
            normals: Vec::new(),
            face_normals: Vec::new(),
            indices,
        };
        mesh.validate()?;
        mesh.compute_ws_data();
        Ok(mesh)
    }

    /// Records current positions as the rest baseline.
    pub fn update_x0(&mut self) {
        self.x0.clone_from(&self.x);
    }

    /// Recomputes world-space derived data (face and node normals).
    pub fn compute_ws_data(&mut self) {
        crate::normals::compute_normals(self);
    }

    /// Validates mesh integrity.
    ///
    /// Checks:
    /// - All node arrays have the same length
    /// - Face indices are within bounds
    /// - No face repeats a node
    pub fn validate(&self) -> WeftResult<()> {
        let n = self.x.len();

        if self.x0.len() != n || self.v.len() != n || self.preserve.len() != n {
            return Err(WeftError::InvalidMesh(format!(
                "Node arrays have inconsistent lengths (x: {}, x0: {}, v: {}, preserve: {})",
                n,
                self.x0.len(),
                self.v.len(),
                self.preserve.len()
            )));
        }

        if self.indices.len() % 3 != 0 {
            return Err(WeftError::InvalidMesh(
                "Index count is not divisible by 3".into(),
            ));
        }

        for (i, &idx) in self.indices.iter().enumerate() {
            if idx as usize >= n {
                return Err(WeftError::InvalidMesh(format!(
                    "Index {} at position {} is out of range (node count: {})",
                    idx, i, n
                )));
            }
        }

        for t in 0..self.face_count() {
            let [a, b, c] = self.face(t);
            if a == b || b == c || a == c {
                return Err(WeftError::InvalidMesh(format!(
                    "Face {} has repeated node indices: [{}, {}, {}]",
                    t, a, b, c
                )));
            }
        }

        Ok(())
    }
}
