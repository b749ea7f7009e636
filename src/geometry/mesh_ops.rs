// src/geometry/mesh_ops.rs
//! Mesh assembly helpers: merging sub-meshes, flat normals, de-interleaving
//! kernel vertex properties and centroids for label placement.
//!
//! Normals are never averaged across triangles. When a source has none, the
//! triangles are unshared (three fresh vertices each) and every vertex gets its
//! triangle's face normal. That triples the vertex count but keeps shading
//! consistent without a smoothing pass.

use glam::Vec3;

use crate::entity::Point3;
use crate::error::Result;

use super::MeshBuffers;

/// Unit face normal of a triangle; zero for degenerate triangles.
#[inline]
pub fn face_normal(a: Point3, b: Point3, c: Point3) -> Vec3 {
    let (a, b, c) = (Vec3::from(a), Vec3::from(b), Vec3::from(c));
    (b - a).cross(c - a).normalize_or_zero()
}

/// Three unique vertices per triangle, each carrying the flat face normal.
/// UVs follow their vertices when present.
pub fn unshare_with_flat_normals(
    positions: &[Point3],
    indices: &[u32],
    uvs: Option<&[[f32; 2]]>,
) -> MeshBuffers {
    let tri_count = indices.len() / 3;
    let mut out = MeshBuffers {
        positions: Vec::with_capacity(tri_count * 3),
        normals: Vec::with_capacity(tri_count * 3),
        indices: Vec::with_capacity(tri_count * 3),
        uvs: uvs.map(|_| Vec::with_capacity(tri_count * 3)),
    };

    for tri in indices.chunks_exact(3) {
        let ids = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if ids.iter().any(|&i| i >= positions.len()) {
            log::warn!("dropping triangle {:?}: index out of range ({} vertices)", tri, positions.len());
            continue;
        }
        let [a, b, c] = ids.map(|i| positions[i]);
        let n = face_normal(a, b, c).to_array();
        for (corner, &i) in ids.iter().enumerate() {
            out.indices.push(out.positions.len() as u32);
            out.positions.push([a, b, c][corner]);
            out.normals.push(n);
            if let (Some(dst), Some(src)) = (out.uvs.as_mut(), uvs) {
                dst.push(src.get(i).copied().unwrap_or([0.0, 0.0]));
            }
        }
    }
    out
}

/// Build a mesh from one decomposed face / sub-mesh. Normals are used as given
/// when there is one per position; otherwise flat normals are computed.
pub fn mesh_from_parts(
    positions: Vec<Point3>,
    normals: Vec<Point3>,
    indices: Vec<u32>,
    uvs: Option<Vec<[f32; 2]>>,
) -> MeshBuffers {
    let uvs = uvs.filter(|uv| uv.len() == positions.len());
    if !normals.is_empty() && normals.len() == positions.len() {
        return MeshBuffers { positions, normals, indices, uvs };
    }
    unshare_with_flat_normals(&positions, &indices, uvs.as_deref())
}

/// Concatenate meshes into one buffer set, shifting each part's indices by the
/// number of vertices already emitted. UVs survive only if every part has them.
pub fn merge<I>(parts: I) -> MeshBuffers
where
    I: IntoIterator<Item = MeshBuffers>,
{
    let mut out = MeshBuffers {
        uvs: Some(Vec::new()),
        ..MeshBuffers::default()
    };
    for part in parts {
        let offset = out.positions.len() as u32;
        out.indices.extend(part.indices.iter().map(|i| i + offset));
        out.uvs = match (out.uvs.take(), part.uvs) {
            (Some(mut dst), Some(src)) => {
                dst.extend(src);
                Some(dst)
            }
            _ => None,
        };
        out.positions.extend(part.positions);
        out.normals.extend(part.normals);
    }
    if out.positions.is_empty() {
        out.uvs = None;
    }
    out
}

/// Split interleaved vertex properties into positions. The first three
/// properties of every vertex are its position; the rest are skipped.
pub fn deinterleave_positions(props: &[f32], stride: usize) -> Result<Vec<Point3>> {
    crate::ensure!(stride >= 3, "vertex stride {} is smaller than 3", stride);
    crate::ensure!(
        props.len() % stride == 0,
        "{} vertex properties do not divide into stride {}",
        props.len(),
        stride
    );
    Ok(props
        .chunks_exact(stride)
        .map(|v| [v[0], v[1], v[2]])
        .collect())
}

/// Mean of a point set.
pub fn centroid(points: &[Point3]) -> Option<Point3> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vec3::ZERO, |acc, p| acc + Vec3::from(*p));
    Some((sum / points.len() as f32).to_array())
}
