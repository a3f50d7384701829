//! World-space normals.
//!
//! Face normals are unit vectors; node normals accumulate the
//! area-weighted face normals of every adjacent triangle.

use weft_math::DVec3;

use crate::mesh::Mesh;

/// Recompute face and node normals from current positions.
///
/// Degenerate faces contribute nothing and keep a zero normal.
pub fn compute_normals(mesh: &mut Mesh) {
    let n = mesh.node_count();
    mesh.normals.clear();
    mesh.normals.resize(n, DVec3::ZERO);
    mesh.face_normals.clear();
    mesh.face_normals.reserve(mesh.face_count());

    for t in 0..mesh.face_count() {
        let [a, b, c] = mesh.face(t).map(|i| i as usize);
        // Magnitude is twice the triangle area.
        let weighted = (mesh.x[b] - mesh.x[a]).cross(mesh.x[c] - mesh.x[a]);

        mesh.normals[a] += weighted;
        mesh.normals[b] += weighted;
        mesh.normals[c] += weighted;
        mesh.face_normals.push(weighted.normalize_or_zero());
    }

    for normal in &mut mesh.normals {
        *normal = normal.normalize_or_zero();
    }
}
