// src/geometry/mod.rs
//! CPU-side geometry buffers and the pure transforms applied to them before
//! they are attached to scene nodes.

pub mod back_face;
pub mod mesh_ops;
pub mod point_groups;

use crate::entity::Point3;

pub use back_face::synthesize_back_face;
pub use point_groups::{group_by_colour, ColourGroup};

/// Indexed triangle mesh. `normals` and `uvs` are per position when present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    pub positions: Vec<Point3>,
    pub normals: Vec<Point3>,
    pub indices: Vec<u32>,
    pub uvs: Option<Vec<[f32; 2]>>,
}

impl MeshBuffers {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}

/// Independent line segments: positions come in pairs, one colour per position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentBuffers {
    pub positions: Vec<Point3>,
    pub colours: Vec<[f32; 3]>,
}

impl SegmentBuffers {
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.positions.len() / 2
    }
}
