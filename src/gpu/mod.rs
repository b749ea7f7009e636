// src/gpu/mod.rs
//! Mirrors the retained scene into wgpu buffers.
//!
//! Only nodes whose buffer version changed are re-uploaded. A buffer whose size
//! did not change is rewritten through the queue; otherwise it is recreated.
//! Text labels are left to the overlay text pass and get no buffers here.

pub mod upload;

use std::collections::{HashMap, HashSet};

use wgpu::util::DeviceExt;

use crate::materials::{MaterialCache, MaterialId, MaterialRef};
use crate::scene::{NodeId, Primitive, RenderNode, Scene};

pub use upload::{bounds, pack_lines, pack_mesh, pack_points, LineVertex, MeshVertex, PointVertex};

pub struct GpuNode {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: Option<wgpu::Buffer>,
    /// Index count for meshes, vertex count otherwise.
    pub draw_count: u32,
    pub material: Option<MaterialId>,
    pub bounds: Option<([f32; 3], [f32; 3])>,
    version: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GpuSyncStats {
    pub uploaded: usize,
    pub rewritten: usize,
    pub released: usize,
    pub materials_uploaded: usize,
    pub materials_released: usize,
}

#[derive(Default)]
pub struct GpuSceneCache {
    nodes: HashMap<NodeId, GpuNode>,
    materials: HashMap<MaterialId, wgpu::Buffer>,
}

/// Packed bytes of a node: vertices, optional indices, draw count.
fn packed(node: &RenderNode) -> Option<(Vec<u8>, Option<Vec<u8>>, u32)> {
    match &node.primitive {
        Primitive::Mesh(mesh) if !mesh.is_empty() => Some((
            bytemuck::cast_slice(&pack_mesh(mesh)).to_vec(),
            Some(bytemuck::cast_slice(&mesh.indices).to_vec()),
            mesh.indices.len() as u32,
        )),
        Primitive::Lines(lines) if lines.segments.segment_count() > 0 => {
            let verts = pack_lines(lines);
            Some((bytemuck::cast_slice(&verts).to_vec(), None, verts.len() as u32))
        }
        Primitive::Points(points) if !points.positions.is_empty() => {
            let verts = pack_points(points);
            Some((bytemuck::cast_slice(&verts).to_vec(), None, verts.len() as u32))
        }
        _ => None,
    }
}

fn node_bounds(node: &RenderNode) -> Option<([f32; 3], [f32; 3])> {
    match &node.primitive {
        Primitive::Mesh(m) => bounds(&m.positions),
        Primitive::Lines(l) => bounds(&l.segments.positions),
        Primitive::Points(p) => bounds(&p.positions),
        _ => None,
    }
}

impl GpuSceneCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&GpuNode> {
        self.nodes.get(&id)
    }

    pub fn material_buffer(&self, id: MaterialId) -> Option<&wgpu::Buffer> {
        self.materials.get(&id)
    }

    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &mut Scene,
        cache: &MaterialCache,
    ) -> GpuSyncStats {
        let mut stats = GpuSyncStats::default();

        for id in scene.take_released() {
            if let Some(gpu) = self.nodes.remove(&id) {
                gpu.vertex_buffer.destroy();
                if let Some(ib) = gpu.index_buffer {
                    ib.destroy();
                }
                stats.released += 1;
            }
        }

        let mut live_materials: HashMap<MaterialId, MaterialRef> = cache
            .materials()
            .map(|m| (m.id(), MaterialRef::clone(m)))
            .collect();

        for (id, node) in scene.iter() {
            if let Some(m) = &node.material {
                live_materials.entry(m.id()).or_insert_with(|| MaterialRef::clone(m));
            }
            if self.nodes.get(&id).is_some_and(|g| g.version == node.version()) {
                continue;
            }
            let Some((vertices, indices, draw_count)) = packed(node) else {
                if let Some(stale) = self.nodes.remove(&id) {
                    stale.vertex_buffer.destroy();
                    stats.released += 1;
                }
                continue;
            };

            let material = node.material.as_ref().map(|m| m.id());
            let node_bounds = node_bounds(node);
            if let Some(existing) = self.nodes.get_mut(&id) {
                let same_size = existing.vertex_buffer.size() == vertices.len() as u64
                    && existing.index_buffer.as_ref().map(|b| b.size())
                        == indices.as_ref().map(|i| i.len() as u64);
                if same_size {
                    queue.write_buffer(&existing.vertex_buffer, 0, &vertices);
                    if let (Some(ib), Some(data)) = (&existing.index_buffer, &indices) {
                        queue.write_buffer(ib, 0, data);
                    }
                    existing.version = node.version();
                    existing.draw_count = draw_count;
                    existing.material = material;
                    existing.bounds = node_bounds;
                    stats.rewritten += 1;
                    continue;
                }
            }

            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(node.name.as_str()),
                contents: &vertices,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
            let index_buffer = indices.map(|data| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("geodraw_index_buffer"),
                    contents: &data,
                    usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                })
            });
            if let Some(old) = self.nodes.insert(
                id,
                GpuNode {
                    vertex_buffer,
                    index_buffer,
                    draw_count,
                    material,
                    bounds: node_bounds,
                    version: node.version(),
                },
            ) {
                old.vertex_buffer.destroy();
            }
            stats.uploaded += 1;
        }

        // Disposed (evicted) materials lose their uniform buffer even if a node
        // still points at them.
        let keep: HashSet<MaterialId> = live_materials
            .iter()
            .filter(|(_, m)| !m.is_disposed())
            .map(|(id, _)| *id)
            .collect();
        self.materials.retain(|id, buffer| {
            let kept = keep.contains(id);
            if !kept {
                buffer.destroy();
                stats.materials_released += 1;
            }
            kept
        });
        for id in keep {
            if self.materials.contains_key(&id) {
                continue;
            }
            let Some(material) = live_materials.get(&id) else {
                continue;
            };
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("geodraw_material_params"),
                contents: bytemuck::bytes_of(&material.params()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            self.materials.insert(id, buffer);
            stats.materials_uploaded += 1;
        }

        if stats != GpuSyncStats::default() {
            log::debug!("gpu sync: {:?}", stats);
        }
        stats
    }

    /// Drop every GPU buffer.
    pub fn clear(&mut self) {
        for (_, gpu) in self.nodes.drain() {
            gpu.vertex_buffer.destroy();
            if let Some(ib) = gpu.index_buffer {
                ib.destroy();
            }
        }
        for (_, buffer) in self.materials.drain() {
            buffer.destroy();
        }
    }
}
