// src/geometry/back_face.rs
//! Inverted-winding copy of a triangle mesh, drawn behind the front faces so
//! open shells read correctly from both sides.

use super::MeshBuffers;

/// `[a, b, c] -> [a, c, b]`, normals negated, positions and UVs unchanged.
pub fn synthesize_back_face(mesh: &MeshBuffers) -> MeshBuffers {
    let indices = mesh
        .indices
        .chunks_exact(3)
        .flat_map(|t| [t[0], t[2], t[1]])
        .collect();
    let normals = mesh.normals.iter().map(|n| [-n[0], -n[1], -n[2]]).collect();
    MeshBuffers {
        positions: mesh.positions.clone(),
        normals,
        indices,
        uvs: mesh.uvs.clone(),
    }
}
