//! Position snapshots and velocity re-derivation.

use rayon::prelude::*;
use weft_math::DVec3;
use weft_mesh::Mesh;

use crate::cloth::Cloth;

/// Positions of every cloth node, concatenated in cloth order.
pub fn node_positions(cloths: &[Cloth]) -> Vec<DVec3> {
    cloths
        .iter()
        .flat_map(|cloth| cloth.mesh.x.iter().copied())
        .collect()
}

/// Adds `(x - xold) / dt` to every cloth node's velocity.
///
/// `xold` is a snapshot from [`node_positions`] taken before a position
/// correction.
pub fn update_velocities(cloths: &mut [Cloth], xold: &[DVec3], dt: f64) {
    let inv_dt = 1.0 / dt;
    let mut offset = 0;
    for cloth in cloths {
        let mesh = &mut cloth.mesh;
        let n = mesh.node_count();
        let end = (offset + n).min(xold.len());
        let old = &xold[offset.min(end)..end];
        mesh.v
            .par_iter_mut()
            .zip(mesh.x.par_iter())
            .zip(old.par_iter())
            .for_each(|((v, x), x_old)| *v += (*x - *x_old) * inv_dt);
        offset += n;
    }
}

/// Explicit position update `x += v * dt`.
pub fn step_mesh(mesh: &mut Mesh, dt: f64) {
    for (x, v) in mesh.x.iter_mut().zip(&mesh.v) {
        *x += *v * dt;
    }
}
