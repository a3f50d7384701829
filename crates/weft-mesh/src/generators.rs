//! Procedural mesh generators for test scenes.

use weft_math::DVec3;

use crate::mesh::Mesh;

/// Generates a flat rectangular grid in the horizontal XZ plane.
///
/// The grid spans `[-width/2, width/2]` in X and `[-depth/2, depth/2]` in Z
/// at `Y = height`.
///
/// # Arguments
/// - `cols`: number of quads along X (node count = cols + 1).
/// - `rows`: number of quads along Z (node count = rows + 1).
///
/// # Example
/// ```
/// use weft_mesh::generators::quad_grid;
/// let mesh = quad_grid(2, 2, 1.0, 1.0, 0.0);
/// assert_eq!(mesh.node_count(), 9);
/// assert_eq!(mesh.face_count(), 8);
/// ```
pub fn quad_grid(cols: usize, rows: usize, width: f64, depth: f64, height: f64) -> Mesh {
    let nodes_x = cols + 1;
    let nodes_z = rows + 1;

    let mut positions = Vec::with_capacity(nodes_x * nodes_z);
    for j in 0..nodes_z {
        for i in 0..nodes_x {
            let u = i as f64 / cols as f64;
            let w = j as f64 / rows as f64;
            positions.push(DVec3::new(
                -0.5 * width + u * width,
                height,
                -0.5 * depth + w * depth,
            ));
        }
    }

    let mut indices = Vec::with_capacity(cols * rows * 6);
    for j in 0..rows {
        for i in 0..cols {
            let near_left = (j * nodes_x + i) as u32;
            let near_right = near_left + 1;
            let far_left = near_left + nodes_x as u32;
            let far_right = far_left + 1;

            // Wound so that normals face +Y.
            indices.extend_from_slice(&[near_left, far_left, near_right]);
            indices.extend_from_slice(&[near_right, far_left, far_right]);
        }
    }

    let n = positions.len();
    let mut mesh = Mesh {
        x0: positions.clone(),
        x: positions,
        v: vec![DVec3::ZERO; n],
        preserve: vec![false; n],
        normals: Vec::new(),
        face_normals: Vec::new(),
        indices,
    };
    mesh.compute_ws_data();
    mesh
}
