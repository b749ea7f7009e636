// src/classify.rs
//! Structural classification of raw input.
//!
//! One ordered rule table, evaluated top-down, first match wins. Several kinds
//! are structural subsets of others (a list of two point triples could be read
//! as a line by looser heuristics), so the order is part of the contract.

use crate::entity::{EntityKind, KernelTag, RawEntity};

/// Which dispatch path a rule belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchPath {
    /// Needs a kernel round trip; only reachable through `draw_async`.
    Kernel,
    /// Realizable on the calling thread.
    Sync,
}

pub struct Rule {
    pub kind: EntityKind,
    pub path: DispatchPath,
    pub matches: fn(&RawEntity) -> bool,
}

/// Kernel rules come first: a tagged kernel handle is also an object and would
/// otherwise be open to the object heuristics below.
pub static RULES: &[Rule] = &[
    Rule { kind: EntityKind::BRepShape, path: DispatchPath::Kernel, matches: is_brep_handle },
    Rule { kind: EntityKind::KernelMesh, path: DispatchPath::Kernel, matches: is_mesh_handle },
    Rule { kind: EntityKind::BRepShapeSet, path: DispatchPath::Kernel, matches: is_brep_handle_list },
    Rule { kind: EntityKind::KernelMeshSet, path: DispatchPath::Kernel, matches: is_mesh_handle_list },
    Rule { kind: EntityKind::ParametricCurve, path: DispatchPath::Sync, matches: is_curve },
    Rule { kind: EntityKind::ParametricSurface, path: DispatchPath::Sync, matches: is_surface },
    Rule { kind: EntityKind::ParametricCurveSet, path: DispatchPath::Sync, matches: is_curve_list },
    Rule { kind: EntityKind::ParametricSurfaceSet, path: DispatchPath::Sync, matches: is_surface_list },
    Rule { kind: EntityKind::Line, path: DispatchPath::Sync, matches: is_line },
    Rule { kind: EntityKind::Polyline, path: DispatchPath::Sync, matches: is_polyline },
    Rule { kind: EntityKind::Label, path: DispatchPath::Sync, matches: is_label },
    Rule { kind: EntityKind::Point, path: DispatchPath::Sync, matches: is_point },
    Rule { kind: EntityKind::LineSet, path: DispatchPath::Sync, matches: is_line_list },
    Rule { kind: EntityKind::PolylineSet, path: DispatchPath::Sync, matches: is_polyline_list },
    Rule { kind: EntityKind::LabelSet, path: DispatchPath::Sync, matches: is_label_list },
    Rule { kind: EntityKind::PointCloud, path: DispatchPath::Sync, matches: is_point_list },
];

/// Classify against every rule. `None` is a classification miss, not an error.
pub fn classify(raw: &RawEntity) -> Option<EntityKind> {
    if raw.is_empty() {
        return None;
    }
    RULES.iter().find(|rule| (rule.matches)(raw)).map(|rule| rule.kind)
}

/// Classify against the rules of one path only.
pub fn classify_on(path: DispatchPath, raw: &RawEntity) -> Option<EntityKind> {
    if raw.is_empty() {
        return None;
    }
    RULES
        .iter()
        .filter(|rule| rule.path == path)
        .find(|rule| (rule.matches)(raw))
        .map(|rule| rule.kind)
}

fn all_items(raw: &RawEntity, pred: fn(&RawEntity) -> bool) -> bool {
    match raw.as_list() {
        Some(items) if !items.is_empty() => items.iter().all(pred),
        _ => false,
    }
}

fn is_brep_handle(raw: &RawEntity) -> bool {
    matches!(raw.as_kernel_handle(), Some(h) if h.tag == KernelTag::BRep)
}

fn is_mesh_handle(raw: &RawEntity) -> bool {
    matches!(
        raw.as_kernel_handle(),
        Some(h) if matches!(h.tag, KernelTag::SolidMesh | KernelTag::BooleanMesh)
    )
}

fn is_brep_handle_list(raw: &RawEntity) -> bool {
    all_items(raw, is_brep_handle)
}

fn is_mesh_handle_list(raw: &RawEntity) -> bool {
    all_items(raw, is_mesh_handle)
}

fn is_curve(raw: &RawEntity) -> bool {
    raw.as_curve().is_some()
}

fn is_surface(raw: &RawEntity) -> bool {
    raw.as_surface().is_some()
}

fn is_curve_list(raw: &RawEntity) -> bool {
    all_items(raw, is_curve)
}

fn is_surface_list(raw: &RawEntity) -> bool {
    all_items(raw, is_surface)
}

fn is_line(raw: &RawEntity) -> bool {
    raw.has_field("start") && raw.has_field("end")
}

fn is_polyline(raw: &RawEntity) -> bool {
    raw.has_field("points")
}

fn is_label(raw: &RawEntity) -> bool {
    raw.has_field("text")
}

fn is_point(raw: &RawEntity) -> bool {
    raw.as_point().is_some()
}

fn is_line_list(raw: &RawEntity) -> bool {
    all_items(raw, is_line)
}

fn is_polyline_list(raw: &RawEntity) -> bool {
    all_items(raw, is_polyline)
}

fn is_label_list(raw: &RawEntity) -> bool {
    all_items(raw, is_label)
}

fn is_point_list(raw: &RawEntity) -> bool {
    all_items(raw, is_point)
}
