// src/renderer.rs
//! The draw dispatcher.
//!
//! `SceneRenderer` owns the retained scene, the material cache and an optional
//! kernel. Every draw classifies its input, resolves options, decides between
//! a fresh group, an in-place update and a rebuild, and returns the handle to
//! pass back next time.

use std::sync::Arc;

use crate::classify::{classify, classify_on, DispatchPath};
use crate::config::RendererConfig;
use crate::entity::{EntityKind, GeometryEntity, Label, ParametricSurface, Point3, Polyline, RawEntity};
use crate::error::{DrawError, Result};
use crate::gpu::{GpuSceneCache, GpuSyncStats};
use crate::handle::RenderedGroup;
use crate::kernel::{Kernel, KernelMeshData, KernelRequest, KernelResponse};
use crate::materials::MaterialCache;
use crate::options::{plan_update, resolve_options, DrawOptions, StructuralSignature, UpdatePlan};
use crate::realize::meshes::KernelGeometry;
use crate::realize::{labels, lines, meshes, points, Realizer};
use crate::scene::{NodeId, RenderNode, Scene};

/// Geometry reduced to what a realizer consumes.
enum Prepared {
    Points(Vec<Point3>),
    Polylines(Vec<Polyline>),
    Surfaces(Vec<Arc<dyn ParametricSurface>>),
    Labels(Vec<Label>),
    Kernel(KernelGeometry),
}

impl Prepared {
    /// Topology fingerprint for the kinds that support in-place updates.
    fn signature(&self) -> Option<StructuralSignature> {
        match self {
            Prepared::Points(p) => Some(StructuralSignature::for_count(p.len())),
            Prepared::Polylines(p) => Some(StructuralSignature::for_polylines(p)),
            _ => None,
        }
    }
}

pub struct SceneRenderer {
    scene: Scene,
    materials: MaterialCache,
    config: RendererConfig,
    kernel: Option<Arc<dyn Kernel>>,
    gpu: GpuSceneCache,
}

impl SceneRenderer {
    pub fn new(config: RendererConfig) -> Self {
        let materials = MaterialCache::new(config.max_materials);
        log::info!("scene renderer up (max {} materials)", config.max_materials);
        Self {
            scene: Scene::new(),
            materials,
            config,
            kernel: None,
            gpu: GpuSceneCache::new(),
        }
    }

    pub fn with_kernel(mut self, kernel: Arc<dyn Kernel>) -> Self {
        self.kernel = Some(kernel);
        self
    }

    pub fn set_kernel(&mut self, kernel: Option<Arc<dyn Kernel>>) {
        self.kernel = kernel;
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn materials(&self) -> &MaterialCache {
        &self.materials
    }

    pub fn gpu(&self) -> &GpuSceneCache {
        &self.gpu
    }

    /// Draw anything realizable without a kernel. With a handle the input is
    /// read as the handle's kind instead of being classified. `Ok(None)` when
    /// the input matches no kind, cannot be read as the handle's kind, or the
    /// handle's root no longer exists.
    pub fn draw(
        &mut self,
        raw: &RawEntity,
        options: Option<&DrawOptions>,
        group: Option<&RenderedGroup>,
    ) -> Result<Option<RenderedGroup>> {
        if self.is_stale(group) {
            return Ok(None);
        }
        let kind = match group {
            Some(g) => g.kind,
            None => match classify(raw) {
                Some(kind) => kind,
                None => {
                    log::debug!("nothing to draw for {:?}", raw);
                    return Ok(None);
                }
            },
        };
        if kind.needs_kernel() {
            return Err(DrawError::KernelRequired(kind));
        }
        match read_as(kind, raw)? {
            Some(entity) => self.draw_entity(entity, options, group),
            None => Ok(None),
        }
    }

    /// Draw anything. Kernel-backed kinds are recognized first and suspend once
    /// on the kernel call.
    pub async fn draw_async(
        &mut self,
        raw: &RawEntity,
        options: Option<&DrawOptions>,
        group: Option<&RenderedGroup>,
    ) -> Result<Option<RenderedGroup>> {
        if self.is_stale(group) {
            return Ok(None);
        }
        let kind = match group {
            Some(g) => g.kind,
            None => match classify_on(DispatchPath::Kernel, raw) {
                Some(kind) => kind,
                None => return self.draw(raw, options, None),
            },
        };
        match read_as(kind, raw)? {
            Some(entity) => self.draw_entity_async(entity, options, group).await,
            None => Ok(None),
        }
    }

    /// Typed synchronous entry point.
    pub fn draw_entity(
        &mut self,
        entity: GeometryEntity,
        options: Option<&DrawOptions>,
        group: Option<&RenderedGroup>,
    ) -> Result<Option<RenderedGroup>> {
        let kind = entity.kind();
        if !self.accepts(group, kind) {
            return Ok(None);
        }
        let opts = resolve_options(options, group, self.config.defaults_for(kind));
        let prepared = match entity {
            GeometryEntity::Point(p) => Prepared::Points(vec![p]),
            GeometryEntity::PointCloud(p) => Prepared::Points(p),
            GeometryEntity::Line(l) => Prepared::Polylines(vec![l.into()]),
            GeometryEntity::LineSet(ls) => Prepared::Polylines(ls.into_iter().map(Into::into).collect()),
            GeometryEntity::Polyline(p) => Prepared::Polylines(vec![p]),
            GeometryEntity::PolylineSet(p) => Prepared::Polylines(p),
            GeometryEntity::ParametricCurve(c) => {
                Prepared::Polylines(lines::tessellate_curves(&[c], &opts))
            }
            GeometryEntity::ParametricCurveSet(cs) => {
                Prepared::Polylines(lines::tessellate_curves(&cs, &opts))
            }
            GeometryEntity::ParametricSurface(s) => Prepared::Surfaces(vec![s]),
            GeometryEntity::ParametricSurfaceSet(s) => Prepared::Surfaces(s),
            GeometryEntity::Label(l) => Prepared::Labels(vec![l]),
            GeometryEntity::LabelSet(l) => Prepared::Labels(l),
            GeometryEntity::BRepShape(_)
            | GeometryEntity::BRepShapeSet(_)
            | GeometryEntity::KernelMesh(_)
            | GeometryEntity::KernelMeshSet(_) => return Err(DrawError::KernelRequired(kind)),
        };
        self.apply(kind, prepared, opts, group).map(Some)
    }

    /// Typed asynchronous entry point.
    pub async fn draw_entity_async(
        &mut self,
        entity: GeometryEntity,
        options: Option<&DrawOptions>,
        group: Option<&RenderedGroup>,
    ) -> Result<Option<RenderedGroup>> {
        let kind = entity.kind();
        if !kind.needs_kernel() {
            return self.draw_entity(entity, options, group);
        }
        if !self.accepts(group, kind) {
            return Ok(None);
        }
        let kernel = self.kernel.clone().ok_or(DrawError::NoKernel(kind))?;
        let opts = resolve_options(options, group, self.config.defaults_for(kind));

        // Live materials never cross the worker boundary.
        let (mut transport, face_material) = opts.split_for_transport();
        let request = match kernel_request(&entity, &transport) {
            Some(request) => request?,
            None => return Err(DrawError::KernelRequired(kind)),
        };
        let method = request.method_name.clone();
        log::debug!("{} -> kernel method {}", kind, method);
        let response = kernel.call(request).await.map_err(|e| DrawError::kernel(kind, e))?;
        transport.face_material = face_material;

        let data = expect_meshes(kind, &method, response)?;
        let geometry = KernelGeometry::convert(data)?;
        self.apply(kind, Prepared::Kernel(geometry), transport, group).map(Some)
    }

    /// Tear down the nodes behind a handle. Returns `false` for stale handles.
    pub fn remove(&mut self, group: &RenderedGroup) -> bool {
        if !self.scene.is_alive(group.root) {
            return false;
        }
        self.scene.despawn(group.root);
        true
    }

    /// Release the whole scene and every cached material.
    pub fn dispose(&mut self) {
        self.scene.clear();
        self.materials.dispose();
        self.gpu.clear();
        // everything above is gone already
        self.scene.take_released();
        log::info!("scene renderer disposed");
    }

    /// Upload dirty buffers and release those of disposed nodes and materials.
    pub fn sync_gpu(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> GpuSyncStats {
        self.gpu.sync(device, queue, &mut self.scene, &self.materials)
    }

    fn is_stale(&self, group: Option<&RenderedGroup>) -> bool {
        match group {
            Some(g) if !self.scene.is_alive(g.root) => {
                log::debug!("handle for {} points at a removed root, ignoring", g.kind);
                true
            }
            _ => false,
        }
    }

    /// A handle only accepts geometry of its own kind.
    fn accepts(&self, group: Option<&RenderedGroup>, kind: EntityKind) -> bool {
        if self.is_stale(group) {
            return false;
        }
        match group {
            Some(g) if g.kind != kind => {
                log::debug!("handle drawn as {} cannot take a {}, ignoring", g.kind, kind);
                false
            }
            _ => true,
        }
    }

    fn apply(
        &mut self,
        kind: EntityKind,
        prepared: Prepared,
        opts: DrawOptions,
        group: Option<&RenderedGroup>,
    ) -> Result<RenderedGroup> {
        let signature = prepared.signature();
        let root_alive = group.is_some_and(|g| self.scene.is_alive(g.root));
        let plan = plan_update(group, root_alive, &opts, signature.as_ref());

        let root = match (plan, group) {
            (UpdatePlan::InPlace | UpdatePlan::Rebuild, Some(g)) => g.root,
            _ => self.scene.spawn(&kind.name().to_ascii_lowercase(), RenderNode::group()),
        };
        log::debug!("draw {} as {:?} (signature {:?})", kind, plan, signature);

        let mut r = Realizer::new(&mut self.scene, &mut self.materials, &self.config);
        let updated = plan == UpdatePlan::InPlace
            && match &prepared {
                Prepared::Points(p) => points::update(&mut r, root, p, &opts),
                Prepared::Polylines(p) => lines::update(&mut r, root, p, &opts),
                _ => false,
            };
        if !updated {
            if plan != UpdatePlan::Fresh {
                r.scene.clear_children(root);
            }
            if let Err(e) = build(&mut r, root, prepared, &opts) {
                if plan == UpdatePlan::Fresh {
                    r.scene.despawn(root);
                }
                return Err(e);
            }
        }
        if let Some(node) = self.scene.get_mut(root) {
            node.visible = !opts.hidden;
        }
        Ok(RenderedGroup::new(root, kind, opts, signature))
    }
}

fn read_as(kind: EntityKind, raw: &RawEntity) -> Result<Option<GeometryEntity>> {
    let entity = GeometryEntity::from_raw(kind, raw)?;
    if entity.is_none() {
        log::debug!("input cannot be read as {}", kind);
    }
    Ok(entity)
}

/// B-rep methods must answer with decomposed meshes; mesh kernels may answer
/// with either shape.
fn expect_meshes(kind: EntityKind, method: &str, response: KernelResponse) -> Result<Vec<KernelMeshData>> {
    match kind {
        EntityKind::BRepShape => Ok(vec![KernelMeshData::Decomposed(response.into_decomposed(method)?)]),
        EntityKind::BRepShapeSet => Ok(response
            .into_decomposed_set(method)?
            .into_iter()
            .map(KernelMeshData::Decomposed)
            .collect()),
        _ => Ok(response.into_mesh_list()),
    }
}

fn kernel_request(entity: &GeometryEntity, transport: &DrawOptions) -> Option<Result<KernelRequest>> {
    match entity {
        GeometryEntity::BRepShape(h) | GeometryEntity::KernelMesh(h) => {
            Some(KernelRequest::decompose(h, transport))
        }
        GeometryEntity::BRepShapeSet(hs) | GeometryEntity::KernelMeshSet(hs) => {
            Some(KernelRequest::decompose_set(hs, transport))
        }
        _ => None,
    }
}

fn build(r: &mut Realizer<'_>, root: NodeId, prepared: Prepared, opts: &DrawOptions) -> Result<()> {
    match prepared {
        Prepared::Points(p) => points::build(r, root, &p, opts),
        Prepared::Polylines(p) => lines::build(r, root, &p, opts),
        Prepared::Surfaces(s) => meshes::build_surfaces(r, root, &s, opts),
        Prepared::Labels(l) => labels::build(r, root, &l, opts),
        Prepared::Kernel(geometry) => meshes::build_kernel(r, root, geometry, opts),
    }
}

impl Drop for SceneRenderer {
    fn drop(&mut self) {
        self.gpu.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::colour::Colours;
    use crate::entity::{KernelHandle, KernelTag, ParametricCurve};
    use crate::kernel::{DecomposedFace, DecomposedMesh, InterleavedMesh};
    use crate::materials::{Material, MaterialKey};
    use crate::scene::NodeRole;

    fn renderer() -> SceneRenderer {
        SceneRenderer::new(RendererConfig::default())
    }

    /// Six quads of a unit cube, four shared-corner vertices per face.
    fn unit_box() -> DecomposedMesh {
        let quads: [[Point3; 4]; 6] = [
            [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
            [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
            [[0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0]],
            [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
            [[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [1.0, 0.0, 1.0]],
        ];
        DecomposedMesh {
            face_list: quads
                .iter()
                .enumerate()
                .map(|(i, q)| DecomposedFace {
                    vertex_coord: q.iter().flatten().copied().collect(),
                    normal_coord: vec![],
                    tri_indexes: vec![0, 1, 2, 0, 2, 3],
                    uvs: vec![],
                    center_point: None,
                    face_index: i,
                })
                .collect(),
            edge_list: vec![],
            points_list: vec![],
        }
    }

    struct BoxKernel {
        requests: Mutex<Vec<KernelRequest>>,
    }

    impl BoxKernel {
        fn new() -> Arc<Self> {
            Arc::new(Self { requests: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl Kernel for BoxKernel {
        async fn call(&self, request: KernelRequest) -> Result<KernelResponse> {
            self.requests.lock().push(request);
            Ok(KernelResponse::Decomposed(unit_box()))
        }
    }

    /// Answers with the queued responses in order.
    struct ScriptedKernel {
        responses: Mutex<Vec<KernelResponse>>,
    }

    impl ScriptedKernel {
        fn new(mut responses: Vec<KernelResponse>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self { responses: Mutex::new(responses) })
        }
    }

    #[async_trait]
    impl Kernel for ScriptedKernel {
        async fn call(&self, _request: KernelRequest) -> Result<KernelResponse> {
            self.responses.lock().pop().ok_or_else(|| DrawError::custom("no response queued"))
        }
    }

    fn tetrahedron(vert_properties: Vec<f32>) -> KernelResponse {
        KernelResponse::Interleaved(InterleavedMesh {
            vert_properties,
            tri_verts: vec![0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3],
            num_prop: None,
        })
    }

    struct FailingKernel;

    #[async_trait]
    impl Kernel for FailingKernel {
        async fn call(&self, _request: KernelRequest) -> Result<KernelResponse> {
            Err(DrawError::custom("shape is not closed"))
        }
    }

    fn brep() -> RawEntity {
        KernelHandle::new(KernelTag::BRep, "box-1").into()
    }

    fn points_child(r: &SceneRenderer, root: NodeId) -> Vec<Vec<Point3>> {
        r.scene()
            .children_with_role(root, NodeRole::Points)
            .into_iter()
            .map(|id| r.scene().get(id).unwrap().primitive.as_points().unwrap().positions.clone())
            .collect()
    }

    #[test]
    fn single_point_draws_one_primitive() {
        let mut r = renderer();
        let group = r.draw(&RawEntity::point([1.0, 2.0, 3.0]), None, None).unwrap().unwrap();
        assert_eq!(group.kind, EntityKind::Point);
        assert_eq!(points_child(&r, group.root), vec![vec![[1.0, 2.0, 3.0]]]);
        // point defaults from the config
        assert_eq!(group.options.size, 0.1);
    }

    #[test]
    fn three_points_two_colours_make_two_primitives() {
        let mut r = renderer();
        let opts = DrawOptions::default().with_colours(Colours::Many(vec![
            "#ff0000".into(),
            "#00ff00".into(),
            "#ff0000".into(),
        ]));
        let raw = RawEntity::points(&[[0.0; 3], [1.0; 3], [2.0; 3]]);
        let group = r.draw(&raw, Some(&opts), None).unwrap().unwrap();
        let groups = points_child(&r, group.root);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![[0.0; 3], [2.0; 3]]);
        assert_eq!(groups[1], vec![[1.0; 3]]);
    }

    #[test]
    fn same_size_polyline_updates_in_place() {
        let mut r = renderer();
        let opts = DrawOptions::default().updatable(true);
        let first = r
            .draw(&RawEntity::polyline(&[[0.0; 3], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]], false), Some(&opts), None)
            .unwrap()
            .unwrap();
        let line = r.scene().children_with_role(first.root, NodeRole::Lines)[0];
        let version = r.scene().get(line).unwrap().version();

        let moved = RawEntity::polyline(&[[0.0; 3], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0]], false);
        let second = r.draw(&moved, None, Some(&first)).unwrap().unwrap();

        assert_eq!(second.root, first.root);
        assert_eq!(r.scene().children(second.root), &[line]);
        let node = r.scene().get(line).unwrap();
        assert!(node.version() > version);
        assert_eq!(node.primitive.as_lines().unwrap().segments.positions[1], [2.0, 0.0, 0.0]);
        // remembered options were reused
        assert!(second.options.updatable);
    }

    #[test]
    fn resized_polyline_rebuilds_under_same_root() {
        let mut r = renderer();
        let opts = DrawOptions::default().updatable(true);
        let first = r
            .draw(&RawEntity::polyline(&[[0.0; 3], [1.0, 0.0, 0.0]], false), Some(&opts), None)
            .unwrap()
            .unwrap();
        let old_line = r.scene().children_with_role(first.root, NodeRole::Lines)[0];

        let longer = RawEntity::polyline(&[[0.0; 3], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]], false);
        let second = r.draw(&longer, None, Some(&first)).unwrap().unwrap();

        assert_eq!(second.root, first.root);
        assert!(!r.scene().is_alive(old_line));
        let new_line = r.scene().children_with_role(second.root, NodeRole::Lines)[0];
        assert_eq!(r.scene().get(new_line).unwrap().primitive.as_lines().unwrap().segments.segment_count(), 3);
        assert_eq!(second.signature.unwrap().as_slice(), &[1, 4]);
    }

    #[test]
    fn non_updatable_redraw_with_handle_rebuilds_in_place() {
        let mut r = renderer();
        let raw = RawEntity::points(&[[0.0; 3], [1.0; 3]]);
        let first = r.draw(&raw, None, None).unwrap().unwrap();
        let nodes = r.scene().len();
        let materials = r.materials().len();
        let second = r.draw(&raw, None, Some(&first)).unwrap().unwrap();
        assert_eq!(second.root, first.root);
        assert_eq!(r.scene().len(), nodes);
        assert_eq!(r.materials().len(), materials);
    }

    #[test]
    fn drawing_twice_without_handle_gives_equal_independent_groups() {
        let mut r = renderer();
        let opts = DrawOptions::default().with_colours(Colours::Many(vec!["#ff0000".into(), "#0000ff".into()]));
        let raw = RawEntity::points(&[[0.0; 3], [1.0; 3]]);
        let first = r.draw(&raw, Some(&opts), None).unwrap().unwrap();
        let second = r.draw(&raw, Some(&opts), None).unwrap().unwrap();

        assert_ne!(first.root, second.root);
        assert_eq!(first.kind, second.kind);
        assert_eq!(first.signature, second.signature);
        assert_eq!(points_child(&r, first.root), points_child(&r, second.root));
        let materials = |root| -> Vec<String> {
            r.scene()
                .children(root)
                .iter()
                .map(|id| r.scene().get(*id).unwrap().material.as_ref().unwrap().colour().as_hex().to_string())
                .collect()
        };
        assert_eq!(materials(first.root), materials(second.root));
    }

    #[test]
    fn handle_routes_by_its_own_kind() {
        let mut r = renderer();
        let cloud = r.draw(&RawEntity::points(&[[0.0; 3], [1.0; 3]]), None, None).unwrap().unwrap();
        let before = points_child(&r, cloud.root);
        assert!(r.draw(&RawEntity::point([5.0, 5.0, 5.0]), None, Some(&cloud)).unwrap().is_none());
        assert_eq!(points_child(&r, cloud.root), before);

        let pts = [[0.0; 3], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
        let polyline = r.draw(&RawEntity::polyline(&pts, false), None, None).unwrap().unwrap();
        let line = RawEntity::line([0.0; 3], [1.0; 3]);
        assert!(r.draw(&line, None, Some(&polyline)).unwrap().is_none());
        let child = r.scene().children_with_role(polyline.root, NodeRole::Lines)[0];
        assert_eq!(r.scene().get(child).unwrap().primitive.as_lines().unwrap().segments.segment_count(), 2);

        // a cloud handle still reads a cloud
        let moved = RawEntity::points(&[[2.0; 3], [3.0; 3]]);
        let again = r.draw(&moved, None, Some(&cloud)).unwrap().unwrap();
        assert_eq!(again.kind, EntityKind::PointCloud);
    }

    #[test]
    fn typed_draw_with_handle_of_other_kind_is_ignored() {
        let mut r = renderer();
        let cloud = r.draw(&RawEntity::points(&[[0.0; 3], [1.0; 3]]), None, None).unwrap().unwrap();
        let drawn = r.draw_entity(GeometryEntity::Point([1.0; 3]), None, Some(&cloud)).unwrap();
        assert!(drawn.is_none());
    }

    #[test]
    fn closing_a_polyline_forces_rebuild() {
        let mut r = renderer();
        let opts = DrawOptions::default().updatable(true);
        let pts = [[0.0; 3], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
        let first = r.draw(&RawEntity::polyline(&pts, false), Some(&opts), None).unwrap().unwrap();
        let old_line = r.scene().children_with_role(first.root, NodeRole::Lines)[0];
        let second = r.draw(&RawEntity::polyline(&pts, true), None, Some(&first)).unwrap().unwrap();
        assert!(!r.scene().is_alive(old_line));
        let line = r.scene().children_with_role(second.root, NodeRole::Lines)[0];
        assert_eq!(r.scene().get(line).unwrap().primitive.as_lines().unwrap().segments.segment_count(), 3);
    }

    #[test]
    fn curves_are_tessellated_into_lines() {
        struct Arc3;
        impl ParametricCurve for Arc3 {
            fn tessellate(&self, _tolerance: f32) -> Vec<Point3> {
                vec![[0.0; 3], [1.0, 1.0, 0.0], [2.0, 0.0, 0.0]]
            }
        }
        let mut r = renderer();
        let group = r.draw(&RawEntity::curve(Arc3), None, None).unwrap().unwrap();
        assert_eq!(group.kind, EntityKind::ParametricCurve);
        assert_eq!(group.signature.unwrap().as_slice(), &[1, 3]);
    }

    #[test]
    fn classification_miss_draws_nothing() {
        let mut r = renderer();
        assert!(r.draw(&RawEntity::Null, None, None).unwrap().is_none());
        assert!(r.draw(&RawEntity::Text("hello".into()), None, None).unwrap().is_none());
        assert!(r.scene().is_empty());
    }

    #[test]
    fn malformed_label_fails_synchronously() {
        let mut r = renderer();
        let raw = RawEntity::object([("text", RawEntity::Text("x".into())), ("position", RawEntity::Number(1.0))]);
        let err = r.draw(&raw, None, None).unwrap_err();
        assert!(err.is_malformed_label());
        assert!(r.scene().is_empty());
    }

    #[test]
    fn sync_draw_refuses_kernel_kinds() {
        let mut r = renderer();
        let err = r.draw(&brep(), None, None).unwrap_err();
        assert!(matches!(err, DrawError::KernelRequired(EntityKind::BRepShape)));
    }

    #[test]
    fn stale_handle_is_a_no_op() {
        let mut r = renderer();
        let group = r.draw(&RawEntity::point([0.0; 3]), None, None).unwrap().unwrap();
        assert!(r.remove(&group));
        assert!(!r.remove(&group));
        assert!(r.draw(&RawEntity::point([1.0; 3]), None, Some(&group)).unwrap().is_none());
        assert!(r.scene().is_empty());
    }

    #[test]
    fn hidden_groups_start_invisible() {
        let mut r = renderer();
        let mut opts = DrawOptions::default();
        opts.hidden = true;
        let group = r.draw(&RawEntity::point([0.0; 3]), Some(&opts), None).unwrap().unwrap();
        assert!(!r.scene().get(group.root).unwrap().visible);
    }

    #[test]
    fn cache_overflow_evicts_and_disposes_first_material() {
        let mut config = RendererConfig::default();
        config.max_materials = 3;
        let mut r = SceneRenderer::new(config);
        let colours = ["#ff0000", "#00ff00", "#0000ff", "#ffff00"];
        let mut first_material = None;
        for (i, c) in colours.iter().enumerate() {
            let opts = DrawOptions::default().with_colours(*c);
            let group = r.draw(&RawEntity::point([i as f32; 3]), Some(&opts), None).unwrap().unwrap();
            if i == 0 {
                let child = r.scene().children(group.root)[0];
                first_material = r.scene().get(child).unwrap().material.clone();
            }
        }
        assert_eq!(r.materials().len(), 3);
        let first = first_material.unwrap();
        assert!(first.is_disposed());
        let bias = r.config().front_depth_bias;
        let first_key = MaterialKey::new(first.colour(), 1.0, bias);
        assert!(!r.materials().contains(&first_key));
        assert_eq!(r.materials().stats().evictions, 1);
    }

    #[tokio::test]
    async fn kernel_box_gets_faces_and_back_faces() {
        let kernel = BoxKernel::new();
        let mut r = renderer().with_kernel(kernel.clone());
        let mut opts = DrawOptions::default();
        opts.draw_faces = true;
        opts.draw_two_sided = true;
        opts.draw_edges = false;
        let group = r.draw_async(&brep(), Some(&opts), None).await.unwrap().unwrap();
        assert_eq!(group.kind, EntityKind::BRepShape);

        let faces = r.scene().children_with_role(group.root, NodeRole::Faces);
        let backs = r.scene().children_with_role(group.root, NodeRole::BackFaces);
        assert_eq!((faces.len(), backs.len()), (1, 1));

        let front = r.scene().get(faces[0]).unwrap().primitive.as_mesh().unwrap().clone();
        let back = r.scene().get(backs[0]).unwrap().primitive.as_mesh().unwrap().clone();
        assert_eq!(front.triangle_count(), 12);
        for (f, b) in front.triangles().zip(back.triangles()) {
            assert_eq!(b, [f[0], f[2], f[1]]);
        }
        for (fn_, bn) in front.normals.iter().zip(&back.normals) {
            assert_eq!(*bn, [-fn_[0], -fn_[1], -fn_[2]]);
        }
        assert_eq!(kernel.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn face_material_is_stripped_and_restored() {
        let kernel = BoxKernel::new();
        let mut r = renderer().with_kernel(kernel.clone());
        let own = Arc::new(Material::new(crate::colour::Colour::parse("#abcdef").unwrap(), 1.0, 0.0));
        let opts = DrawOptions::default().two_sided(false).with_face_material(own.clone());
        let group = r.draw_async(&brep(), Some(&opts), None).await.unwrap().unwrap();

        let sent = kernel.requests.lock()[0].clone();
        assert!(sent.payload["options"].get("faceMaterial").is_none());
        let faces = r.scene().children_with_role(group.root, NodeRole::Faces);
        let used = r.scene().get(faces[0]).unwrap().material.clone().unwrap();
        assert!(Arc::ptr_eq(&used, &own));
        assert!(group.options.face_material.is_some());
    }

    #[tokio::test]
    async fn kernel_failure_is_wrapped_with_kind() {
        let mut r = renderer().with_kernel(Arc::new(FailingKernel));
        let err = r.draw_async(&brep(), None, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to draw BRepShape: shape is not closed");
        assert!(r.scene().is_empty());
    }

    #[tokio::test]
    async fn missing_kernel_is_reported() {
        let mut r = renderer();
        let err = r.draw_async(&brep(), None, None).await.unwrap_err();
        assert!(matches!(err, DrawError::NoKernel(EntityKind::BRepShape)));
    }

    #[tokio::test]
    async fn async_path_falls_back_to_sync_kinds() {
        let mut r = renderer();
        let group = r
            .draw_async(&RawEntity::line([0.0; 3], [1.0; 3]), None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(group.kind, EntityKind::Line);
    }

    #[tokio::test]
    async fn kernel_redraw_reuses_root() {
        let mut r = renderer().with_kernel(BoxKernel::new());
        let first = r.draw_async(&brep(), None, None).await.unwrap().unwrap();
        let nodes = r.scene().len();
        let second = r.draw_async(&brep(), None, Some(&first)).await.unwrap().unwrap();
        assert_eq!(first.root, second.root);
        assert_eq!(r.scene().len(), nodes);
    }

    #[tokio::test]
    async fn failed_kernel_redraw_keeps_previous_geometry() {
        let good = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        // 8 properties do not split into xyz triples
        let bad = vec![0.0; 8];
        let kernel = ScriptedKernel::new(vec![tetrahedron(good), tetrahedron(bad)]);
        let mut r = renderer().with_kernel(kernel);
        let mesh: RawEntity = KernelHandle::new(KernelTag::BooleanMesh, "tet").into();

        let first = r.draw_async(&mesh, None, None).await.unwrap().unwrap();
        let children = r.scene().children(first.root).to_vec();
        assert!(!children.is_empty());

        let err = r.draw_async(&mesh, None, Some(&first)).await.unwrap_err();
        assert!(err.to_string().contains("stride 3"));
        assert_eq!(r.scene().children(first.root), children.as_slice());
        assert!(children.iter().all(|id| r.scene().is_alive(*id)));
    }

    #[tokio::test]
    async fn brep_answered_with_interleaved_mesh_is_rejected() {
        let good = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let mut r = renderer().with_kernel(ScriptedKernel::new(vec![tetrahedron(good)]));
        let err = r.draw_async(&brep(), None, None).await.unwrap_err();
        assert!(matches!(err, DrawError::UnexpectedResponse { .. }));
        assert!(r.scene().is_empty());
    }

    #[tokio::test]
    async fn async_handle_routes_by_its_own_kind() {
        let mut r = renderer().with_kernel(BoxKernel::new());
        let boxed = r.draw_async(&brep(), None, None).await.unwrap().unwrap();
        let nodes = r.scene().len();
        let drawn = r.draw_async(&RawEntity::point([0.0; 3]), None, Some(&boxed)).await.unwrap();
        assert!(drawn.is_none());
        assert_eq!(r.scene().len(), nodes);
    }

    #[test]
    fn dispose_releases_scene_and_materials() {
        let mut r = renderer();
        r.draw(&RawEntity::point([0.0; 3]), None, None).unwrap();
        r.dispose();
        assert!(r.scene().is_empty());
        assert!(r.materials().is_empty());
    }
}
