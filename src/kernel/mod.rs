// src/kernel/mod.rs
//! Kernel RPC boundary.
//!
//! A kernel is an external geometry service reached by method name with a
//! serializable payload. It answers with decomposed meshes (faces, edges,
//! points) or, for the boolean kernel, interleaved vertex properties.

pub mod worker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entity::{KernelHandle, KernelTag, Point3};
use crate::error::{DrawError, Result};
use crate::options::DrawOptions;

pub use worker::{KernelBackend, WorkerKernel, WorkerStats};

/// Method names understood by kernel backends.
pub mod methods {
    pub const BREP_DECOMPOSE: &str = "brep.decompose";
    pub const BREP_DECOMPOSE_SET: &str = "brep.decomposeSet";
    pub const SOLID_DECOMPOSE: &str = "solid.decompose";
    pub const SOLID_DECOMPOSE_SET: &str = "solid.decomposeSet";
    pub const BOOLEAN_DECOMPOSE: &str = "boolean.decompose";
    pub const BOOLEAN_DECOMPOSE_SET: &str = "boolean.decomposeSet";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelRequest {
    pub method_name: String,
    pub payload: serde_json::Value,
}

impl KernelRequest {
    pub fn new(method_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { method_name: method_name.into(), payload }
    }

    /// Decompose one shape. `options` must already be stripped for transport.
    pub fn decompose(handle: &KernelHandle, options: &DrawOptions) -> Result<Self> {
        let method = match handle.tag {
            KernelTag::BRep => methods::BREP_DECOMPOSE,
            KernelTag::SolidMesh => methods::SOLID_DECOMPOSE,
            KernelTag::BooleanMesh => methods::BOOLEAN_DECOMPOSE,
        };
        Ok(Self::new(
            method,
            serde_json::json!({
                "shape": serde_json::to_value(handle)?,
                "precision": options.precision,
                "options": serde_json::to_value(options)?,
            }),
        ))
    }

    /// Decompose a homogeneous list of shapes in one call.
    pub fn decompose_set(handles: &[KernelHandle], options: &DrawOptions) -> Result<Self> {
        let tag = handles.first().map(|h| h.tag).unwrap_or(KernelTag::BRep);
        let method = match tag {
            KernelTag::BRep => methods::BREP_DECOMPOSE_SET,
            KernelTag::SolidMesh => methods::SOLID_DECOMPOSE_SET,
            KernelTag::BooleanMesh => methods::BOOLEAN_DECOMPOSE_SET,
        };
        Ok(Self::new(
            method,
            serde_json::json!({
                "shapes": serde_json::to_value(handles)?,
                "precision": options.precision,
                "options": serde_json::to_value(options)?,
            }),
        ))
    }
}

// ---------- Response DTOs ----------

/// One tessellated face. Coordinates are flat `[x, y, z, x, y, z, ...]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecomposedFace {
    pub vertex_coord: Vec<f32>,
    #[serde(default)]
    pub normal_coord: Vec<f32>,
    pub tri_indexes: Vec<u32>,
    /// Flat `[u, v, u, v, ...]`. May be empty.
    #[serde(default)]
    pub uvs: Vec<f32>,
    #[serde(default)]
    pub center_point: Option<Point3>,
    #[serde(default)]
    pub face_index: usize,
}

impl DecomposedFace {
    pub fn positions(&self) -> Vec<Point3> {
        triples(&self.vertex_coord)
    }

    pub fn normals(&self) -> Vec<Point3> {
        triples(&self.normal_coord)
    }

    pub fn uv_pairs(&self) -> Option<Vec<[f32; 2]>> {
        if self.uvs.is_empty() {
            return None;
        }
        Some(self.uvs.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecomposedEdge {
    pub vertex_coord: Vec<Point3>,
    #[serde(default)]
    pub middle_point: Option<Point3>,
    #[serde(default)]
    pub edge_index: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecomposedMesh {
    pub face_list: Vec<DecomposedFace>,
    #[serde(default)]
    pub edge_list: Vec<DecomposedEdge>,
    #[serde(default)]
    pub points_list: Vec<Point3>,
}

/// Boolean-kernel output: `num_prop` properties per vertex, first three are xyz.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterleavedMesh {
    pub vert_properties: Vec<f32>,
    pub tri_verts: Vec<u32>,
    #[serde(default)]
    pub num_prop: Option<usize>,
}

impl InterleavedMesh {
    pub fn stride(&self) -> usize {
        self.num_prop.unwrap_or(3)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KernelResponse {
    Decomposed(DecomposedMesh),
    Interleaved(InterleavedMesh),
    DecomposedSet(Vec<DecomposedMesh>),
    InterleavedSet(Vec<InterleavedMesh>),
}

/// Either shape of a single kernel mesh.
#[derive(Clone, Debug, PartialEq)]
pub enum KernelMeshData {
    Decomposed(DecomposedMesh),
    Interleaved(InterleavedMesh),
}

impl KernelResponse {
    pub fn into_decomposed(self, method: &str) -> Result<DecomposedMesh> {
        match self {
            KernelResponse::Decomposed(m) => Ok(m),
            _ => Err(unexpected(method, "a decomposed mesh")),
        }
    }

    pub fn into_decomposed_set(self, method: &str) -> Result<Vec<DecomposedMesh>> {
        match self {
            KernelResponse::DecomposedSet(set) => Ok(set),
            KernelResponse::Decomposed(m) => Ok(vec![m]),
            _ => Err(unexpected(method, "a list of decomposed meshes")),
        }
    }

    /// Flatten any mesh-bearing answer into a list of meshes.
    pub fn into_mesh_list(self) -> Vec<KernelMeshData> {
        match self {
            KernelResponse::Decomposed(m) => vec![KernelMeshData::Decomposed(m)],
            KernelResponse::Interleaved(m) => vec![KernelMeshData::Interleaved(m)],
            KernelResponse::DecomposedSet(set) => {
                set.into_iter().map(KernelMeshData::Decomposed).collect()
            }
            KernelResponse::InterleavedSet(set) => {
                set.into_iter().map(KernelMeshData::Interleaved).collect()
            }
        }
    }
}

fn unexpected(method: &str, expected: &'static str) -> DrawError {
    DrawError::UnexpectedResponse { method: method.to_string(), expected }
}

fn triples(flat: &[f32]) -> Vec<Point3> {
    flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

/// An asynchronous geometry kernel.
#[async_trait]
pub trait Kernel: Send + Sync {
    async fn call(&self, request: KernelRequest) -> Result<KernelResponse>;
}
