// src/lib.rs
//! Incremental draw/update engine for geometry coming out of CAD, mesh and
//! boolean kernels or parametric curve/surface objects.
//!
//! Input is classified into one of sixteen kinds, realized into a retained
//! scene of render nodes and handed back as a [`RenderedGroup`]. Passing the
//! handle to a later draw updates buffers in place when the topology allows it
//! and rebuilds under the same root otherwise. Materials come from a bounded
//! FIFO cache. [`SceneRenderer::sync_gpu`] mirrors the scene into wgpu buffers.

pub mod classify;
pub mod colour;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod handle;
pub mod kernel;
pub mod materials;
pub mod options;
pub mod realize;
pub mod renderer;
pub mod scene;

pub use classify::{classify, classify_on, DispatchPath};
pub use colour::{Colour, Colours};
pub use config::RendererConfig;
pub use context::{Context, OptionContext};
pub use entity::{
    EntityKind, GeometryEntity, KernelHandle, KernelTag, ParametricCurve, ParametricSurface,
    Point3, RawEntity, SurfaceTessellation,
};
pub use error::{DrawError, Result};
pub use handle::RenderedGroup;
pub use kernel::{Kernel, KernelBackend, KernelRequest, KernelResponse, WorkerKernel};
pub use materials::{Material, MaterialCache, MaterialRef};
pub use options::{resolve_options, DrawOptions, StructuralSignature};
pub use renderer::SceneRenderer;
pub use scene::{NodeId, NodeRole, Scene};
