// src/realize/meshes.rs
//! Surface realization: parametric surfaces and kernel meshes become one merged
//! face mesh per colour, optionally with a back-face twin and B-rep overlays.

use std::sync::Arc;

use crate::colour::Colour;
use crate::entity::{ParametricSurface, Point3, Polyline};
use crate::error::Result;
use crate::geometry::mesh_ops::{centroid, deinterleave_positions, merge, mesh_from_parts, unshare_with_flat_normals};
use crate::geometry::{group_by_colour, synthesize_back_face, MeshBuffers};
use crate::kernel::{DecomposedMesh, InterleavedMesh, KernelMeshData};
use crate::options::DrawOptions;
use crate::scene::{NodeId, NodeRole, PointBuffers, Primitive};

use super::{labels, lines, Realizer};

// ---------- CPU conversion ----------

pub fn from_surface(surface: &dyn ParametricSurface, precision: f32) -> MeshBuffers {
    let t = surface.tessellate(precision);
    let indices = t.faces.iter().flatten().copied().collect();
    let uvs = (!t.uvs.is_empty()).then_some(t.uvs);
    mesh_from_parts(t.points, t.normals, indices, uvs)
}

/// Merge every decomposed face into one buffer.
pub fn from_decomposed(mesh: &DecomposedMesh) -> MeshBuffers {
    merge(mesh.face_list.iter().map(|face| {
        mesh_from_parts(face.positions(), face.normals(), face.tri_indexes.clone(), face.uv_pairs())
    }))
}

/// De-interleave by stride, then unshare for flat normals.
pub fn from_interleaved(mesh: &InterleavedMesh) -> Result<MeshBuffers> {
    let positions = deinterleave_positions(&mesh.vert_properties, mesh.stride())?;
    Ok(unshare_with_flat_normals(&positions, &mesh.tri_verts, None))
}

pub fn from_kernel(data: &KernelMeshData) -> Result<MeshBuffers> {
    match data {
        KernelMeshData::Decomposed(m) => Ok(from_decomposed(m)),
        KernelMeshData::Interleaved(m) => from_interleaved(m),
    }
}

// ---------- Scene nodes ----------

/// Front faces plus, when two-sided, the inverted back faces.
fn build_faces(
    r: &mut Realizer<'_>,
    root: NodeId,
    mesh: MeshBuffers,
    colour: &Colour,
    opts: &DrawOptions,
) -> Result<()> {
    if mesh.is_empty() {
        log::debug!("skipping empty face mesh");
        return Ok(());
    }
    let front = match &opts.face_material {
        Some(m) => Arc::clone(m),
        None => r.material(colour, opts.opacity),
    };
    let back = opts.draw_two_sided.then(|| synthesize_back_face(&mesh));
    r.attach(root, "faces", NodeRole::Faces, Primitive::Mesh(mesh), Some(front), opts.hidden)?;

    if let Some(back) = back {
        let back_colour = match &opts.back_face_colour {
            Some(c) => Colour::parse_or(c, colour),
            None => colour.clone(),
        };
        let material = r.back_material(&back_colour, opts.back_opacity());
        r.attach(root, "back-faces", NodeRole::BackFaces, Primitive::Mesh(back), Some(material), opts.hidden)?;
    }
    Ok(())
}

/// Group meshes by their resolved colour and emit one face mesh per group.
fn build_coloured(
    r: &mut Realizer<'_>,
    root: NodeId,
    meshes: Vec<MeshBuffers>,
    opts: &DrawOptions,
) -> Result<()> {
    let colours: Vec<Colour> = (0..meshes.len()).map(|i| opts.colour_at(i)).collect();
    let order: Vec<usize> = (0..meshes.len()).collect();
    let mut slots: Vec<Option<MeshBuffers>> = meshes.into_iter().map(Some).collect();
    for group in group_by_colour(&order, &colours) {
        let merged = merge(group.items.iter().filter_map(|&i| slots[i].take()));
        build_faces(r, root, merged, &group.colour, opts)?;
    }
    Ok(())
}

pub fn build_surfaces(
    r: &mut Realizer<'_>,
    root: NodeId,
    surfaces: &[Arc<dyn ParametricSurface>],
    opts: &DrawOptions,
) -> Result<()> {
    if !opts.draw_faces {
        return Ok(());
    }
    let meshes = surfaces.iter().map(|s| from_surface(s.as_ref(), opts.precision)).collect();
    build_coloured(r, root, meshes, opts)
}

/// Kernel output with every face mesh already converted. Conversion is the
/// only step that can reject kernel data, so it runs before a group is touched.
pub struct KernelGeometry {
    pub faces: Vec<MeshBuffers>,
    pub decomposed: Vec<DecomposedMesh>,
}

impl KernelGeometry {
    pub fn convert(data: Vec<KernelMeshData>) -> Result<Self> {
        let faces = data.iter().map(from_kernel).collect::<Result<Vec<_>>>()?;
        let decomposed = data
            .into_iter()
            .filter_map(|d| match d {
                KernelMeshData::Decomposed(m) => Some(m),
                KernelMeshData::Interleaved(_) => None,
            })
            .collect();
        Ok(Self { faces, decomposed })
    }
}

/// Kernel output for one shape or a set. Decomposed meshes also get the B-rep
/// overlays the options ask for.
pub fn build_kernel(
    r: &mut Realizer<'_>,
    root: NodeId,
    geometry: KernelGeometry,
    opts: &DrawOptions,
) -> Result<()> {
    if opts.draw_faces {
        build_coloured(r, root, geometry.faces, opts)?;
    }
    let decomposed: Vec<&DecomposedMesh> = geometry.decomposed.iter().collect();
    build_overlays(r, root, &decomposed, opts)
}

fn build_overlays(
    r: &mut Realizer<'_>,
    root: NodeId,
    meshes: &[&DecomposedMesh],
    opts: &DrawOptions,
) -> Result<()> {
    if opts.draw_edges {
        let edges = meshes
            .iter()
            .flat_map(|m| &m.edge_list)
            .map(|e| Polyline { points: e.vertex_coord.clone(), is_closed: false, colour: None })
            .collect();
        lines::build_edges(r, root, edges, opts)?;
    }

    if opts.draw_vertices {
        let positions: Vec<Point3> = meshes.iter().flat_map(|m| m.points_list.iter().copied()).collect();
        if !positions.is_empty() {
            let colour = Colour::parse_or(&opts.vertex_colour, &opts.colour());
            let material = r.material(&colour, opts.opacity);
            let primitive = Primitive::Points(PointBuffers { positions, size: opts.vertex_size });
            r.attach(root, "vertices", NodeRole::Vertices, primitive, Some(material), opts.hidden)?;
        }
    }

    if opts.draw_edge_indexes {
        let anchors: Vec<(usize, Point3)> = meshes
            .iter()
            .flat_map(|m| &m.edge_list)
            .filter_map(|e| Some((e.edge_index, e.middle_point.or_else(|| centroid(&e.vertex_coord))?)))
            .collect();
        labels::build_index_labels(r, root, &anchors, opts.edge_index_height, &opts.edge_index_colour, opts)?;
    }

    if opts.draw_face_indexes {
        let anchors: Vec<(usize, Point3)> = meshes
            .iter()
            .flat_map(|m| &m.face_list)
            .filter_map(|f| Some((f.face_index, f.center_point.or_else(|| centroid(&f.positions()))?)))
            .collect();
        labels::build_index_labels(r, root, &anchors, opts.face_index_height, &opts.face_index_colour, opts)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::Colours;
    use crate::config::RendererConfig;
    use crate::entity::SurfaceTessellation;
    use crate::kernel::{DecomposedEdge, DecomposedFace};
    use crate::materials::MaterialCache;
    use crate::scene::{RenderNode, Scene};

    fn unit_square_face(index: usize) -> DecomposedFace {
        DecomposedFace {
            vertex_coord: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            normal_coord: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            tri_indexes: vec![0, 1, 2, 0, 2, 3],
            uvs: vec![],
            center_point: None,
            face_index: index,
        }
    }

    struct Flat;

    impl ParametricSurface for Flat {
        fn tessellate(&self, _tolerance: f32) -> SurfaceTessellation {
            SurfaceTessellation {
                points: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                normals: vec![],
                faces: vec![[0, 1, 2]],
                uvs: vec![],
            }
        }
    }

    #[test]
    fn decomposed_faces_merge_with_offsets() {
        let mesh = DecomposedMesh { face_list: vec![unit_square_face(0), unit_square_face(1)], ..Default::default() };
        let merged = from_decomposed(&mesh);
        assert_eq!(merged.vertex_count(), 8);
        assert_eq!(&merged.indices[6..], &[4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn interleaved_mesh_is_unshared() {
        let mesh = InterleavedMesh {
            // 4 vertices, stride 5, two triangles sharing an edge
            vert_properties: vec![
                0.0, 0.0, 0.0, 9.0, 9.0, //
                1.0, 0.0, 0.0, 9.0, 9.0, //
                1.0, 1.0, 0.0, 9.0, 9.0, //
                0.0, 1.0, 0.0, 9.0, 9.0,
            ],
            tri_verts: vec![0, 1, 2, 0, 2, 3],
            num_prop: Some(5),
        };
        let out = from_interleaved(&mesh).unwrap();
        assert_eq!(out.vertex_count(), 6);
        assert!(out.normals.iter().all(|n| *n == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn bad_stride_is_rejected_during_conversion() {
        let bad = InterleavedMesh { vert_properties: vec![0.0; 8], tri_verts: vec![0, 1, 2], num_prop: None };
        let good = KernelMeshData::Decomposed(DecomposedMesh { face_list: vec![unit_square_face(0)], ..Default::default() });
        assert!(KernelGeometry::convert(vec![good, KernelMeshData::Interleaved(bad)]).is_err());
    }

    #[test]
    fn surface_without_normals_gets_flat_normals() {
        let mesh = from_surface(&Flat, 0.01);
        assert_eq!(mesh.normals.len(), mesh.vertex_count());
        assert_eq!(mesh.normals[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn two_sided_box_face_gets_back_twin_and_overlays() {
        let (mut scene, mut cache, config) = (Scene::new(), MaterialCache::new(16), RendererConfig::default());
        let root = scene.spawn("group", RenderNode::group());
        let mut r = Realizer::new(&mut scene, &mut cache, &config);
        let mesh = DecomposedMesh {
            face_list: vec![unit_square_face(0)],
            edge_list: vec![DecomposedEdge { vertex_coord: vec![[0.0; 3], [1.0, 0.0, 0.0]], middle_point: None, edge_index: 0 }],
            points_list: vec![[0.0; 3]],
        };
        let mut opts = DrawOptions::default();
        opts.draw_vertices = true;
        opts.draw_edge_indexes = true;
        let geometry = KernelGeometry::convert(vec![KernelMeshData::Decomposed(mesh)]).unwrap();
        build_kernel(&mut r, root, geometry, &opts).unwrap();

        assert_eq!(scene.children_with_role(root, NodeRole::Faces).len(), 1);
        assert_eq!(scene.children_with_role(root, NodeRole::BackFaces).len(), 1);
        assert_eq!(scene.children_with_role(root, NodeRole::Edges).len(), 1);
        assert_eq!(scene.children_with_role(root, NodeRole::Vertices).len(), 1);
        let label = scene.children_with_role(root, NodeRole::Label)[0];
        let text = scene.get(label).unwrap().primitive.as_text().unwrap();
        assert_eq!(text.position, [0.5, 0.0, 0.0]);

        let back = scene.children_with_role(root, NodeRole::BackFaces)[0];
        let back_mat = scene.get(back).unwrap().material.clone().unwrap();
        assert_eq!(back_mat.depth_bias(), config.back_face_depth_bias);
    }

    #[test]
    fn set_members_group_by_colour() {
        let (mut scene, mut cache, config) = (Scene::new(), MaterialCache::new(16), RendererConfig::default());
        let root = scene.spawn("group", RenderNode::group());
        let mut r = Realizer::new(&mut scene, &mut cache, &config);
        let surfaces: Vec<Arc<dyn ParametricSurface>> = vec![Arc::new(Flat), Arc::new(Flat), Arc::new(Flat)];
        let opts = DrawOptions::default()
            .two_sided(false)
            .with_colours(Colours::Many(vec!["#ff0000".into(), "#00ff00".into(), "#ff0000".into()]));
        build_surfaces(&mut r, root, &surfaces, &opts).unwrap();

        let faces = scene.children_with_role(root, NodeRole::Faces);
        assert_eq!(faces.len(), 2);
        assert_eq!(scene.get(faces[0]).unwrap().primitive.as_mesh().unwrap().triangle_count(), 2);
    }
}
