// src/entity.rs
//! Raw (untyped) input values, the closed set of geometry kinds and the typed
//! entities the realizers consume.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DrawError, Result};

pub type Point3 = [f32; 3];

// ═══════════════════════════════════════════════════════════════════════════════
// Parametric geometry sources
// ═══════════════════════════════════════════════════════════════════════════════

/// Anything that can tessellate itself into a polyline.
pub trait ParametricCurve: Send + Sync {
    fn tessellate(&self, tolerance: f32) -> Vec<Point3>;
}

/// Triangulated surface as produced by a parametric surface evaluator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceTessellation {
    pub points: Vec<Point3>,
    /// Per-point normals. May be empty.
    pub normals: Vec<Point3>,
    pub faces: Vec<[u32; 3]>,
    pub uvs: Vec<[f32; 2]>,
}

pub trait ParametricSurface: Send + Sync {
    fn tessellate(&self, tolerance: f32) -> SurfaceTessellation;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Raw input
// ═══════════════════════════════════════════════════════════════════════════════

/// Untyped input to the dispatcher. Mirrors a JSON value plus the two
/// non-data variants that carry a `tessellate` capability.
#[derive(Clone)]
pub enum RawEntity {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<RawEntity>),
    Object(BTreeMap<String, RawEntity>),
    Curve(Arc<dyn ParametricCurve>),
    Surface(Arc<dyn ParametricSurface>),
}

impl RawEntity {
    pub fn point(p: Point3) -> Self {
        RawEntity::List(p.iter().map(|v| RawEntity::Number(*v as f64)).collect())
    }

    pub fn points(points: &[Point3]) -> Self {
        RawEntity::List(points.iter().copied().map(RawEntity::point).collect())
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, RawEntity)>) -> Self {
        RawEntity::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn line(start: Point3, end: Point3) -> Self {
        Self::object([("start", Self::point(start)), ("end", Self::point(end))])
    }

    pub fn polyline(points: &[Point3], is_closed: bool) -> Self {
        Self::object([
            ("points", Self::points(points)),
            ("isClosed", RawEntity::Bool(is_closed)),
        ])
    }

    pub fn label(text: &str, position: Point3) -> Self {
        Self::object([
            ("text", RawEntity::Text(text.to_string())),
            ("position", Self::point(position)),
        ])
    }

    pub fn curve(curve: impl ParametricCurve + 'static) -> Self {
        RawEntity::Curve(Arc::new(curve))
    }

    pub fn surface(surface: impl ParametricSurface + 'static) -> Self {
        RawEntity::Surface(Arc::new(surface))
    }

    /// `Null`, an empty list or an empty object.
    pub fn is_empty(&self) -> bool {
        match self {
            RawEntity::Null => true,
            RawEntity::List(items) => items.is_empty(),
            RawEntity::Object(fields) => fields.is_empty(),
            _ => false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&RawEntity> {
        match self {
            RawEntity::Object(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn as_list(&self) -> Option<&[RawEntity]> {
        match self {
            RawEntity::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawEntity::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawEntity::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RawEntity::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// A list of exactly three numbers.
    pub fn as_point(&self) -> Option<Point3> {
        match self.as_list()? {
            [x, y, z] => Some([
                x.as_number()? as f32,
                y.as_number()? as f32,
                z.as_number()? as f32,
            ]),
            _ => None,
        }
    }

    pub fn as_points(&self) -> Option<Vec<Point3>> {
        self.as_list()?.iter().map(RawEntity::as_point).collect()
    }

    pub fn as_curve(&self) -> Option<&Arc<dyn ParametricCurve>> {
        match self {
            RawEntity::Curve(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_surface(&self) -> Option<&Arc<dyn ParametricSurface>> {
        match self {
            RawEntity::Surface(s) => Some(s),
            _ => None,
        }
    }

    /// Kernel handles are objects whose `type` field is one of the kernel tags.
    pub fn as_kernel_handle(&self) -> Option<KernelHandle> {
        let tag = KernelTag::parse(self.field("type")?.as_str()?)?;
        let hash = self.field("hash")?.as_str()?.to_string();
        Some(KernelHandle { tag, hash })
    }
}

impl fmt::Debug for RawEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawEntity::Null => f.write_str("Null"),
            RawEntity::Bool(b) => write!(f, "{b}"),
            RawEntity::Number(n) => write!(f, "{n}"),
            RawEntity::Text(s) => write!(f, "{s:?}"),
            RawEntity::List(items) => f.debug_list().entries(items).finish(),
            RawEntity::Object(fields) => f.debug_map().entries(fields).finish(),
            RawEntity::Curve(_) => f.write_str("<curve>"),
            RawEntity::Surface(_) => f.write_str("<surface>"),
        }
    }
}

impl From<serde_json::Value> for RawEntity {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => RawEntity::Null,
            Value::Bool(b) => RawEntity::Bool(b),
            Value::Number(n) => RawEntity::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => RawEntity::Text(s),
            Value::Array(items) => RawEntity::List(items.into_iter().map(Into::into).collect()),
            Value::Object(fields) => {
                RawEntity::Object(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<KernelHandle> for RawEntity {
    fn from(handle: KernelHandle) -> Self {
        RawEntity::object([
            ("type", RawEntity::Text(handle.tag.as_str().to_string())),
            ("hash", RawEntity::Text(handle.hash)),
        ])
    }
}

impl<'de> Deserialize<'de> for RawEntity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Into::into)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Kernel handles
// ═══════════════════════════════════════════════════════════════════════════════

/// Type discriminator supplied by the kernel boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelTag {
    /// Boundary-representation CAD shape.
    #[serde(rename = "occ-shape")]
    BRep,
    /// Polygon / solid mesh kernel output.
    #[serde(rename = "solid-mesh")]
    SolidMesh,
    /// Mesh-boolean kernel output (interleaved vertex properties).
    #[serde(rename = "manifold-shape")]
    BooleanMesh,
}

impl KernelTag {
    pub fn as_str(self) -> &'static str {
        match self {
            KernelTag::BRep => "occ-shape",
            KernelTag::SolidMesh => "solid-mesh",
            KernelTag::BooleanMesh => "manifold-shape",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "occ-shape" => Some(KernelTag::BRep),
            "solid-mesh" => Some(KernelTag::SolidMesh),
            "manifold-shape" => Some(KernelTag::BooleanMesh),
            _ => None,
        }
    }
}

/// Opaque reference to a shape living inside a kernel worker.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelHandle {
    #[serde(rename = "type")]
    pub tag: KernelTag,
    pub hash: String,
}

impl KernelHandle {
    pub fn new(tag: KernelTag, hash: impl Into<String>) -> Self {
        Self { tag, hash: hash.into() }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Kinds and typed entities
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Point,
    PointCloud,
    Line,
    LineSet,
    Polyline,
    PolylineSet,
    ParametricCurve,
    ParametricCurveSet,
    ParametricSurface,
    ParametricSurfaceSet,
    BRepShape,
    BRepShapeSet,
    KernelMesh,
    KernelMeshSet,
    Label,
    LabelSet,
}

impl EntityKind {
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Point => "Point",
            EntityKind::PointCloud => "PointCloud",
            EntityKind::Line => "Line",
            EntityKind::LineSet => "LineSet",
            EntityKind::Polyline => "Polyline",
            EntityKind::PolylineSet => "PolylineSet",
            EntityKind::ParametricCurve => "ParametricCurve",
            EntityKind::ParametricCurveSet => "ParametricCurveSet",
            EntityKind::ParametricSurface => "ParametricSurface",
            EntityKind::ParametricSurfaceSet => "ParametricSurfaceSet",
            EntityKind::BRepShape => "BRepShape",
            EntityKind::BRepShapeSet => "BRepShapeSet",
            EntityKind::KernelMesh => "KernelMesh",
            EntityKind::KernelMeshSet => "KernelMeshSet",
            EntityKind::Label => "Label",
            EntityKind::LabelSet => "LabelSet",
        }
    }

    /// Kinds that need a kernel round trip before they can be realized.
    pub fn needs_kernel(self) -> bool {
        matches!(
            self,
            EntityKind::BRepShape
                | EntityKind::BRepShapeSet
                | EntityKind::KernelMesh
                | EntityKind::KernelMeshSet
        )
    }

    /// Kinds realized as one line-segment primitive.
    pub fn is_polyline_family(self) -> bool {
        matches!(
            self,
            EntityKind::Line
                | EntityKind::LineSet
                | EntityKind::Polyline
                | EntityKind::PolylineSet
                | EntityKind::ParametricCurve
                | EntityKind::ParametricCurveSet
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    pub start: Point3,
    pub end: Point3,
    pub colour: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    pub points: Vec<Point3>,
    pub is_closed: bool,
    pub colour: Option<String>,
}

impl From<Line> for Polyline {
    fn from(line: Line) -> Self {
        Polyline {
            points: vec![line.start, line.end],
            is_closed: false,
            colour: line.colour,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub text: String,
    pub position: Point3,
    pub size: Option<f32>,
    pub colour: Option<String>,
}

/// Classified, typed geometry.
#[derive(Clone)]
pub enum GeometryEntity {
    Point(Point3),
    PointCloud(Vec<Point3>),
    Line(Line),
    LineSet(Vec<Line>),
    Polyline(Polyline),
    PolylineSet(Vec<Polyline>),
    ParametricCurve(Arc<dyn ParametricCurve>),
    ParametricCurveSet(Vec<Arc<dyn ParametricCurve>>),
    ParametricSurface(Arc<dyn ParametricSurface>),
    ParametricSurfaceSet(Vec<Arc<dyn ParametricSurface>>),
    BRepShape(KernelHandle),
    BRepShapeSet(Vec<KernelHandle>),
    KernelMesh(KernelHandle),
    KernelMeshSet(Vec<KernelHandle>),
    Label(Label),
    LabelSet(Vec<Label>),
}

impl GeometryEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            GeometryEntity::Point(_) => EntityKind::Point,
            GeometryEntity::PointCloud(_) => EntityKind::PointCloud,
            GeometryEntity::Line(_) => EntityKind::Line,
            GeometryEntity::LineSet(_) => EntityKind::LineSet,
            GeometryEntity::Polyline(_) => EntityKind::Polyline,
            GeometryEntity::PolylineSet(_) => EntityKind::PolylineSet,
            GeometryEntity::ParametricCurve(_) => EntityKind::ParametricCurve,
            GeometryEntity::ParametricCurveSet(_) => EntityKind::ParametricCurveSet,
            GeometryEntity::ParametricSurface(_) => EntityKind::ParametricSurface,
            GeometryEntity::ParametricSurfaceSet(_) => EntityKind::ParametricSurfaceSet,
            GeometryEntity::BRepShape(_) => EntityKind::BRepShape,
            GeometryEntity::BRepShapeSet(_) => EntityKind::BRepShapeSet,
            GeometryEntity::KernelMesh(_) => EntityKind::KernelMesh,
            GeometryEntity::KernelMeshSet(_) => EntityKind::KernelMeshSet,
            GeometryEntity::Label(_) => EntityKind::Label,
            GeometryEntity::LabelSet(_) => EntityKind::LabelSet,
        }
    }

    /// Read `raw` as `kind`. `Ok(None)` when the shape does not fit; labels
    /// are user-authored, so a label that does not fit is an error instead.
    pub fn from_raw(kind: EntityKind, raw: &RawEntity) -> Result<Option<Self>> {
        let entity = match kind {
            EntityKind::Point => raw.as_point().map(GeometryEntity::Point),
            EntityKind::PointCloud => raw.as_points().map(GeometryEntity::PointCloud),
            EntityKind::Line => read_line(raw).map(GeometryEntity::Line),
            EntityKind::LineSet => {
                list_of(raw, read_line).map(GeometryEntity::LineSet)
            }
            EntityKind::Polyline => read_polyline(raw).map(GeometryEntity::Polyline),
            EntityKind::PolylineSet => {
                list_of(raw, read_polyline).map(GeometryEntity::PolylineSet)
            }
            EntityKind::ParametricCurve => {
                raw.as_curve().cloned().map(GeometryEntity::ParametricCurve)
            }
            EntityKind::ParametricCurveSet => {
                list_of(raw, |r| r.as_curve().cloned()).map(GeometryEntity::ParametricCurveSet)
            }
            EntityKind::ParametricSurface => {
                raw.as_surface().cloned().map(GeometryEntity::ParametricSurface)
            }
            EntityKind::ParametricSurfaceSet => list_of(raw, |r| r.as_surface().cloned())
                .map(GeometryEntity::ParametricSurfaceSet),
            EntityKind::BRepShape => raw
                .as_kernel_handle()
                .filter(|h| h.tag == KernelTag::BRep)
                .map(GeometryEntity::BRepShape),
            EntityKind::BRepShapeSet => list_of(raw, |r| {
                r.as_kernel_handle().filter(|h| h.tag == KernelTag::BRep)
            })
            .map(GeometryEntity::BRepShapeSet),
            EntityKind::KernelMesh => raw
                .as_kernel_handle()
                .filter(|h| h.tag != KernelTag::BRep)
                .map(GeometryEntity::KernelMesh),
            EntityKind::KernelMeshSet => list_of(raw, |r| {
                r.as_kernel_handle().filter(|h| h.tag != KernelTag::BRep)
            })
            .map(GeometryEntity::KernelMeshSet),
            EntityKind::Label => Some(GeometryEntity::Label(read_label(raw)?)),
            EntityKind::LabelSet => {
                let items = raw
                    .as_list()
                    .ok_or_else(|| DrawError::MalformedLabel("label set must be a list".into()))?;
                let labels = items.iter().map(read_label).collect::<Result<Vec<_>>>()?;
                Some(GeometryEntity::LabelSet(labels))
            }
        };
        Ok(entity)
    }
}

fn list_of<T>(raw: &RawEntity, read: impl Fn(&RawEntity) -> Option<T>) -> Option<Vec<T>> {
    let items = raw.as_list()?;
    if items.is_empty() {
        return None;
    }
    items.iter().map(read).collect()
}

fn embedded_colour(raw: &RawEntity) -> Option<String> {
    raw.field("colour")
        .or_else(|| raw.field("color"))
        .and_then(RawEntity::as_str)
        .map(str::to_string)
}

fn read_line(raw: &RawEntity) -> Option<Line> {
    Some(Line {
        start: raw.field("start")?.as_point()?,
        end: raw.field("end")?.as_point()?,
        colour: embedded_colour(raw),
    })
}

fn read_polyline(raw: &RawEntity) -> Option<Polyline> {
    Some(Polyline {
        points: raw.field("points")?.as_points()?,
        is_closed: raw.field("isClosed").and_then(RawEntity::as_bool).unwrap_or(false),
        colour: embedded_colour(raw),
    })
}

fn read_label(raw: &RawEntity) -> Result<Label> {
    let text = match raw.field("text") {
        Some(RawEntity::Text(s)) => s.clone(),
        Some(RawEntity::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(DrawError::MalformedLabel(format!(
                "text must be a string, got {other:?}"
            )))
        }
        None => return Err(DrawError::MalformedLabel(format!("missing text in {raw:?}"))),
    };
    let position = raw
        .field("position")
        .ok_or_else(|| DrawError::MalformedLabel(format!("label {text:?} has no position")))?
        .as_point()
        .ok_or_else(|| {
            DrawError::MalformedLabel(format!("label {text:?} position must be [x, y, z]"))
        })?;
    let size = match raw.field("size") {
        None => None,
        Some(RawEntity::Number(n)) if *n > 0.0 => Some(*n as f32),
        Some(other) => {
            return Err(DrawError::MalformedLabel(format!(
                "label {text:?} size must be a positive number, got {other:?}"
            )))
        }
    };
    Ok(Label {
        text,
        position,
        size,
        colour: embedded_colour(raw),
    })
}
