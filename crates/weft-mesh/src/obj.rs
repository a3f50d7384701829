//! Wavefront OBJ input/output.
//!
//! Supported records:
//! - `v x y z`: node position
//! - `nv vx vy vz`: node velocity (weft extension, ignored by other readers)
//! - `f a b c ...`: face, polygon faces are fan-triangulated; `a/b/c` forms
//!   and negative (relative) indices are accepted
//! - `o name`: starts a new object when reading multi-object files
//!
//! Everything else is skipped.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use weft_math::DVec3;
use weft_types::{WeftError, WeftResult};

use crate::mesh::Mesh;

#[derive(Default)]
struct ObjectBuilder {
    positions: Vec<DVec3>,
    velocities: Vec<DVec3>,
    indices: Vec<u32>,
}

impl ObjectBuilder {
    fn finish(self, path: &Path) -> WeftResult<Mesh> {
        let n = self.positions.len();
        let mut mesh = Mesh::from_positions(self.positions, self.indices)
            .map_err(|e| WeftError::InvalidMesh(format!("{}: {e}", path.display())))?;
        if self.velocities.len() == n {
            mesh.v = self.velocities;
        }
        Ok(mesh)
    }
}

/// Reads every object of an OBJ file.
///
/// Face indices in OBJ are global to the file; each returned mesh is
/// re-indexed from zero. A file without `o` records yields one mesh.
pub fn load_obj_objects(path: &Path) -> WeftResult<Vec<Mesh>> {
    let text = fs::read_to_string(path)?;

    let mut meshes = Vec::new();
    let mut current = ObjectBuilder::default();
    // Global index of the first node of `current`.
    let mut offset = 0usize;

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        let Some(tag) = tokens.next() else { continue };
        match tag {
            "o" => {
                if !current.positions.is_empty() || !current.indices.is_empty() {
                    offset += current.positions.len();
                    meshes.push(std::mem::take(&mut current).finish(path)?);
                }
            }
            "v" => current.positions.push(parse_vec3(tokens, path, line_no)?),
            "nv" => current.velocities.push(parse_vec3(tokens, path, line_no)?),
            "f" => {
                let total = offset + current.positions.len();
                let corners = tokens
                    .map(|tok| parse_face_index(tok, total, offset, path, line_no))
                    .collect::<WeftResult<Vec<u32>>>()?;
                if corners.len() < 3 {
                    return Err(malformed(path, line_no, "face with fewer than 3 nodes"));
                }
                for k in 1..corners.len() - 1 {
                    current
                        .indices
                        .extend_from_slice(&[corners[0], corners[k], corners[k + 1]]);
                }
            }
            _ => {}
        }
    }

    if !current.positions.is_empty() || meshes.is_empty() {
        meshes.push(current.finish(path)?);
    }
    tracing::debug!(path = %path.display(), objects = meshes.len(), "loaded obj");
    Ok(meshes)
}

/// Reads an OBJ file as a single mesh, merging all objects.
pub fn load_obj(path: &Path) -> WeftResult<Mesh> {
    let mut objects = load_obj_objects(path)?.into_iter();
    let mut mesh = objects.next().unwrap_or_default();
    for other in objects {
        append(&mut mesh, &other);
    }
    Ok(mesh)
}

/// Writes one mesh.
pub fn save_obj(mesh: &Mesh, path: &Path) -> WeftResult<()> {
    let mut out = String::new();
    write_object(&mut out, mesh, 0);
    fs::write(path, out)?;
    Ok(())
}

/// Path of mesh `index` in a per-mesh numbered set.
pub fn numbered_path(prefix: &Path, index: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!("_{index:02}.obj"));
    PathBuf::from(name)
}

/// Path of a flattened set.
pub fn flattened_path(prefix: &Path) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".obj");
    PathBuf::from(name)
}

/// Writes a set of meshes under a common prefix.
///
/// With `flatten`, all meshes go to `<prefix>.obj` as separate `o` objects;
/// otherwise mesh `i` goes to `<prefix>_<ii>.obj`.
pub fn save_objs(meshes: &[&Mesh], prefix: &Path, flatten: bool) -> WeftResult<()> {
    if flatten {
        let mut out = String::new();
        let mut offset = 0;
        for (i, mesh) in meshes.iter().enumerate() {
            let _ = writeln!(out, "o object_{i:02}");
            write_object(&mut out, mesh, offset);
            offset += mesh.node_count();
        }
        fs::write(flattened_path(prefix), out)?;
    } else {
        for (i, mesh) in meshes.iter().enumerate() {
            save_obj(mesh, &numbered_path(prefix, i))?;
        }
    }
    Ok(())
}

/// Reads `count` meshes written by [`save_objs`] under the same prefix.
pub fn load_objs(prefix: &Path, count: usize, flatten: bool) -> WeftResult<Vec<Mesh>> {
    if flatten {
        let meshes = load_obj_objects(&flattened_path(prefix))?;
        if meshes.len() != count {
            return Err(WeftError::InvalidMesh(format!(
                "{} holds {} objects, expected {}",
                flattened_path(prefix).display(),
                meshes.len(),
                count
            )));
        }
        Ok(meshes)
    } else {
        (0..count).map(|i| load_obj(&numbered_path(prefix, i))).collect()
    }
}

fn write_object(out: &mut String, mesh: &Mesh, offset: usize) {
    for p in &mesh.x {
        let _ = writeln!(out, "v {} {} {}", p.x, p.y, p.z);
    }
    for v in &mesh.v {
        let _ = writeln!(out, "nv {} {} {}", v.x, v.y, v.z);
    }
    for t in 0..mesh.face_count() {
        let [a, b, c] = mesh.face(t).map(|i| i as usize + offset + 1);
        let _ = writeln!(out, "f {a} {b} {c}");
    }
}

fn append(mesh: &mut Mesh, other: &Mesh) {
    let offset = mesh.node_count() as u32;
    mesh.x.extend_from_slice(&other.x);
    mesh.x0.extend_from_slice(&other.x0);
    mesh.v.extend_from_slice(&other.v);
    mesh.preserve.extend_from_slice(&other.preserve);
    mesh.indices.extend(other.indices.iter().map(|i| i + offset));
    mesh.compute_ws_data();
}

fn parse_vec3<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
    path: &Path,
    line_no: usize,
) -> WeftResult<DVec3> {
    let mut c = [0.0; 3];
    for slot in &mut c {
        *slot = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| malformed(path, line_no, "expected three numbers"))?;
    }
    Ok(DVec3::from_array(c))
}

fn parse_face_index(
    token: &str,
    total: usize,
    offset: usize,
    path: &Path,
    line_no: usize,
) -> WeftResult<u32> {
    let raw: i64 = token
        .split('/')
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| malformed(path, line_no, "bad face index"))?;
    let global = match raw {
        r if r > 0 => r as usize - 1,
        r if r < 0 && (-r) as usize <= total => total - (-r) as usize,
        _ => return Err(malformed(path, line_no, "face index out of range")),
    };
    global
        .checked_sub(offset)
        .map(|i| i as u32)
        .ok_or_else(|| malformed(path, line_no, "face refers to a previous object"))
}

fn malformed(path: &Path, line_no: usize, what: &str) -> WeftError {
    WeftError::InvalidMesh(format!("{}:{}: {what}", path.display(), line_no + 1))
}
