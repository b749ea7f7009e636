#![cfg(not(target_arch = "wasm32"))]

use std::any::Any;
use std::backtrace::Backtrace;
use std::fs::File;
use std::io::Write;
use std::panic;
use std::sync::Arc;

use anyhow::Context as _;
use log::{info, LevelFilter};

use geodraw::kernel::{methods, DecomposedEdge, DecomposedFace, DecomposedMesh, InterleavedMesh};
use geodraw::{
    DrawOptions, KernelBackend, KernelHandle, KernelTag, ParametricCurve, Point3, RawEntity,
    RendererConfig, SceneRenderer, WorkerKernel,
};

fn main() -> anyhow::Result<()> {
    setup_diagnostics();

    // Optional JSON config as the first argument.
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            RendererConfig::from_json_str(&text)?
        }
        None => RendererConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name(config.worker_thread_name.clone())
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: RendererConfig) -> anyhow::Result<()> {
    let kernel = Arc::new(WorkerKernel::new(DemoBackend));
    let mut renderer = SceneRenderer::new(config).with_kernel(kernel.clone());

    info!("Starting geodraw demo...");

    let point = renderer.draw(&RawEntity::point([0.0, 0.0, 0.0]), None, None)?;
    let cloud_opts = DrawOptions::default().with_colours(geodraw::Colours::Many(vec![
        "#ff0000".into(),
        "#00ff00".into(),
        "#ff0000".into(),
    ]));
    let cloud = RawEntity::points(&[[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);
    renderer.draw(&cloud, Some(&cloud_opts), None)?;
    renderer.draw(&RawEntity::line([0.0; 3], [0.0, 0.0, 1.0]), None, None)?;
    renderer.draw(&RawEntity::label("origin", [0.0, 0.0, 0.2]), None, None)?;
    renderer.draw(&RawEntity::curve(Circle { radius: 1.0, segments: 32 }), None, None)?;

    // An updatable polyline, moved in place and then resized.
    let opts = DrawOptions::default().updatable(true);
    let square = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let mut handle = renderer.draw(&RawEntity::polyline(&square, true), Some(&opts), None)?;
    let shifted: Vec<Point3> = square.iter().map(|p| [p[0] + 0.5, p[1], p[2]]).collect();
    handle = renderer.draw(&RawEntity::polyline(&shifted, true), None, handle.as_ref())?;
    let triangle = &shifted[..3];
    renderer.draw(&RawEntity::polyline(triangle, true), None, handle.as_ref())?;

    // Kernel-backed shapes go through the worker.
    let brep: RawEntity = KernelHandle::new(KernelTag::BRep, "demo-box").into();
    let mut brep_opts = DrawOptions::default().with_colours("#3399ff");
    brep_opts.draw_vertices = true;
    brep_opts.draw_face_indexes = true;
    let boxed = renderer.draw_async(&brep, Some(&brep_opts), None).await?;

    let boolean: RawEntity = KernelHandle::new(KernelTag::BooleanMesh, "demo-tet").into();
    renderer.draw_async(&boolean, None, None).await?;

    let unknown: RawEntity = KernelHandle::new(KernelTag::SolidMesh, "missing").into();
    if let Err(e) = renderer.draw_async(&unknown, None, None).await {
        info!("expected failure: {}", e);
    }

    if let Some(point) = point {
        renderer.remove(&point);
    }

    let scene = renderer.scene().stats();
    let cache = renderer.materials().stats();
    info!(
        "scene: {} live nodes ({} spawned, {} disposed)",
        scene.live, scene.spawned, scene.disposed
    );
    info!(
        "materials: {} cached, {} hits, {} misses, {} evictions",
        renderer.materials().len(),
        cache.hits,
        cache.misses,
        cache.evictions
    );
    info!("kernel: {:?}", kernel.stats());
    if let Some(boxed) = boxed {
        info!("box drawn as {} with root {:?}", boxed.kind, boxed.root);
    }

    renderer.dispose();
    Ok(())
}

struct Circle {
    radius: f32,
    segments: usize,
}

impl ParametricCurve for Circle {
    fn tessellate(&self, _tolerance: f32) -> Vec<Point3> {
        (0..=self.segments)
            .map(|i| {
                let t = i as f32 / self.segments as f32 * std::f32::consts::TAU;
                [self.radius * t.cos(), self.radius * t.sin(), 0.0]
            })
            .collect()
    }
}

/// Answers every B-rep request with a unit cube and every boolean request
/// with a tetrahedron.
struct DemoBackend;

impl KernelBackend for DemoBackend {
    fn handle(&self, method: &str, _payload: serde_json::Value) -> Result<serde_json::Value, String> {
        let value = match method {
            methods::BREP_DECOMPOSE => serde_json::to_value(unit_cube()),
            methods::BOOLEAN_DECOMPOSE => serde_json::to_value(tetrahedron()),
            other => return Err(format!("demo kernel cannot answer {other}")),
        };
        value.map_err(|e| e.to_string())
    }
}

fn unit_cube() -> DecomposedMesh {
    let c = |x: f32, y: f32, z: f32| [x, y, z];
    let quads = [
        [c(0., 0., 0.), c(0., 1., 0.), c(1., 1., 0.), c(1., 0., 0.)],
        [c(0., 0., 1.), c(1., 0., 1.), c(1., 1., 1.), c(0., 1., 1.)],
        [c(0., 0., 0.), c(1., 0., 0.), c(1., 0., 1.), c(0., 0., 1.)],
        [c(0., 1., 0.), c(0., 1., 1.), c(1., 1., 1.), c(1., 1., 0.)],
        [c(0., 0., 0.), c(0., 0., 1.), c(0., 1., 1.), c(0., 1., 0.)],
        [c(1., 0., 0.), c(1., 1., 0.), c(1., 1., 1.), c(1., 0., 1.)],
    ];
    let face_list = quads
        .iter()
        .enumerate()
        .map(|(i, q)| DecomposedFace {
            vertex_coord: q.iter().flatten().copied().collect(),
            normal_coord: Vec::new(),
            tri_indexes: vec![0, 1, 2, 0, 2, 3],
            uvs: Vec::new(),
            center_point: None,
            face_index: i,
        })
        .collect();
    let edge_list = quads
        .iter()
        .take(2)
        .flat_map(|q| (0..4).map(move |i| vec![q[i], q[(i + 1) % 4]]))
        .enumerate()
        .map(|(i, vertex_coord)| DecomposedEdge { vertex_coord, middle_point: None, edge_index: i })
        .collect();
    let points_list = quads[0].iter().chain(quads[1].iter()).copied().collect();
    DecomposedMesh { face_list, edge_list, points_list }
}

fn tetrahedron() -> InterleavedMesh {
    InterleavedMesh {
        // xyz + one extra property per vertex
        vert_properties: vec![
            0.0, 0.0, 0.0, 1.0, //
            1.0, 0.0, 0.0, 1.0, //
            0.0, 1.0, 0.0, 1.0, //
            0.0, 0.0, 1.0, 1.0,
        ],
        tri_verts: vec![0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3],
        num_prop: Some(4),
    }
}

const CRASH_LOG: &str = "geodraw_crash.log";

/// `RUST_LOG` overrides the build-dependent default level.
fn setup_diagnostics() {
    let level = if cfg!(debug_assertions) { LevelFilter::Debug } else { LevelFilter::Warn };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();

    panic::set_hook(Box::new(|info| {
        let report = crash_report(info.payload(), info.location(), &Backtrace::force_capture());
        eprintln!("{report}");
        match File::create(CRASH_LOG).and_then(|mut file| file.write_all(report.as_bytes())) {
            Ok(()) => eprintln!("crash report written to {CRASH_LOG}"),
            Err(e) => eprintln!("could not write {CRASH_LOG}: {e}"),
        }
    }));
}

fn crash_report(
    payload: &(dyn Any + Send),
    location: Option<&panic::Location<'_>>,
    backtrace: &Backtrace,
) -> String {
    let reason = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    let location = location
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown".to_string());
    format!("geodraw-demo panicked at {location}: {reason}\n\n{backtrace}")
}
