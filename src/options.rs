// src/options.rs
//! Draw options, their resolution order and the update-vs-recreate decision.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::colour::{Colour, Colours};
use crate::entity::Polyline;
use crate::handle::RenderedGroup;
use crate::materials::MaterialRef;

/// Per-draw render options. Every field has a default; JSON uses camelCase.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrawOptions {
    /// Point size, line width or label height depending on the kind.
    pub size: f32,
    pub opacity: f32,
    pub colours: Colours,
    /// Allow in-place buffer rewrites on later draws with the same handle.
    pub updatable: bool,
    pub hidden: bool,
    pub draw_two_sided: bool,
    /// Back-face colour; the front colour when absent.
    pub back_face_colour: Option<String>,
    /// Back-face opacity; the front opacity when absent.
    pub back_face_opacity: Option<f32>,
    pub draw_faces: bool,
    pub draw_edges: bool,
    pub draw_vertices: bool,
    /// Tessellation tolerance handed to curves, surfaces and kernels.
    pub precision: f32,
    pub edge_colour: String,
    pub edge_width: f32,
    pub edge_opacity: f32,
    pub vertex_colour: String,
    pub vertex_size: f32,
    pub draw_edge_indexes: bool,
    pub draw_face_indexes: bool,
    pub edge_index_height: f32,
    pub face_index_height: f32,
    pub edge_index_colour: String,
    pub face_index_colour: String,
    /// Caller-owned face material. Never crosses the kernel boundary.
    #[serde(skip)]
    pub face_material: Option<MaterialRef>,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            size: 1.0,
            opacity: 1.0,
            colours: Colours::Single("#ff0000".into()),
            updatable: false,
            hidden: false,
            draw_two_sided: true,
            back_face_colour: None,
            back_face_opacity: None,
            draw_faces: true,
            draw_edges: true,
            draw_vertices: false,
            precision: 0.01,
            edge_colour: "#ffffff".into(),
            edge_width: 2.0,
            edge_opacity: 1.0,
            vertex_colour: "#ff00ff".into(),
            vertex_size: 0.03,
            draw_edge_indexes: false,
            draw_face_indexes: false,
            edge_index_height: 0.06,
            face_index_height: 0.06,
            edge_index_colour: "#ff00ff".into(),
            face_index_colour: "#0000ff".into(),
            face_material: None,
        }
    }
}

impl DrawOptions {
    pub fn with_colours(mut self, colours: impl Into<Colours>) -> Self {
        self.colours = colours.into();
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    pub fn two_sided(mut self, two_sided: bool) -> Self {
        self.draw_two_sided = two_sided;
        self
    }

    pub fn with_face_material(mut self, material: MaterialRef) -> Self {
        self.face_material = Some(material);
        self
    }

    /// The scalar colour (first entry of a list).
    pub fn colour(&self) -> Colour {
        self.colours.scalar(&fallback_colour())
    }

    /// Colour for item `index` (matching list entry, else the scalar colour).
    pub fn colour_at(&self, index: usize) -> Colour {
        self.colours.at(index, &fallback_colour())
    }

    pub fn back_colour(&self) -> Colour {
        match &self.back_face_colour {
            Some(c) => Colour::parse_or(c, &self.colour()),
            None => self.colour(),
        }
    }

    pub fn back_opacity(&self) -> f32 {
        self.back_face_opacity.unwrap_or(self.opacity)
    }

    /// Serializable copy for the kernel boundary plus the fields that had to be
    /// stripped from it. The stripped part is restored on the caller side.
    pub fn split_for_transport(&self) -> (DrawOptions, Option<MaterialRef>) {
        let mut transport = self.clone();
        let face_material = transport.face_material.take();
        (transport, face_material)
    }
}

fn fallback_colour() -> Colour {
    Colour::default()
}

/// Effective options: explicit > remembered on the handle > kind default.
pub fn resolve_options(
    explicit: Option<&DrawOptions>,
    group: Option<&RenderedGroup>,
    default: &DrawOptions,
) -> DrawOptions {
    explicit
        .or_else(|| group.map(|g| &g.options))
        .unwrap_or(default)
        .clone()
}

/// Cheap topology fingerprint: `[count, items...]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuralSignature(Vec<usize>);

impl StructuralSignature {
    /// Polyline count followed by the point count of each polyline.
    pub fn for_polylines(polylines: &[Polyline]) -> Self {
        let mut sig = Vec::with_capacity(polylines.len() + 1);
        sig.push(polylines.len());
        sig.extend(polylines.iter().map(|p| p.points.len()));
        Self(sig)
    }

    /// Item count only; points carry no connectivity.
    pub fn for_count(count: usize) -> Self {
        Self(vec![count])
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for StructuralSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

/// How a draw call touches the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePlan {
    /// No usable handle: new root, new children.
    Fresh,
    /// Same root, same children, buffers rewritten.
    InPlace,
    /// Same root, children disposed and rebuilt.
    Rebuild,
}

/// Decide between fresh, in-place and rebuild. `root_alive` is whether the
/// handle's root still exists in the scene.
pub fn plan_update(
    group: Option<&RenderedGroup>,
    root_alive: bool,
    options: &DrawOptions,
    signature: Option<&StructuralSignature>,
) -> UpdatePlan {
    let Some(group) = group.filter(|_| root_alive) else {
        return UpdatePlan::Fresh;
    };
    let same_topology = match (group.signature.as_ref(), signature) {
        (Some(old), Some(new)) => old == new,
        _ => false,
    };
    if options.updatable && same_topology {
        UpdatePlan::InPlace
    } else {
        UpdatePlan::Rebuild
    }
}
