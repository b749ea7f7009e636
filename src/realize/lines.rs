// src/realize/lines.rs
//! Polyline-family realization: lines, polylines and tessellated curves all
//! end up as one segment buffer.

use std::sync::Arc;

use crate::colour::Colour;
use crate::entity::{ParametricCurve, Polyline};
use crate::error::Result;
use crate::geometry::SegmentBuffers;
use crate::options::DrawOptions;
use crate::scene::{LineBuffers, NodeId, NodeRole, Primitive};

use super::Realizer;

/// Colour of polyline `index`: embedded colour, else the options list entry,
/// else the scalar options colour.
pub fn polyline_colour(polyline: &Polyline, index: usize, opts: &DrawOptions) -> Colour {
    let from_options = opts.colour_at(index);
    match &polyline.colour {
        Some(embedded) => Colour::parse_or(embedded, &from_options),
        None => from_options,
    }
}

/// Flatten polylines into segment pairs. Closed polylines get the closing
/// segment; single-point polylines contribute nothing.
pub fn flatten(polylines: &[Polyline], opts: &DrawOptions) -> SegmentBuffers {
    let mut out = SegmentBuffers::default();
    for (i, polyline) in polylines.iter().enumerate() {
        let rgb = polyline_colour(polyline, i, opts).rgb();
        let pts = &polyline.points;
        for pair in pts.windows(2) {
            out.positions.extend_from_slice(pair);
            out.colours.extend([rgb, rgb]);
        }
        if polyline.is_closed && pts.len() > 2 {
            out.positions.push(pts[pts.len() - 1]);
            out.positions.push(pts[0]);
            out.colours.extend([rgb, rgb]);
        }
    }
    out
}

/// Tessellate curves into open polylines at the options precision.
pub fn tessellate_curves(curves: &[Arc<dyn ParametricCurve>], opts: &DrawOptions) -> Vec<Polyline> {
    curves
        .iter()
        .map(|c| Polyline { points: c.tessellate(opts.precision), is_closed: false, colour: None })
        .collect()
}

fn line_material(r: &mut Realizer<'_>, opts: &DrawOptions) -> crate::materials::MaterialRef {
    // Segment colours are per vertex; the material only carries opacity.
    let white = Colour::parse_or("#ffffff", &Colour::default());
    r.material(&white, opts.opacity)
}

pub fn build(
    r: &mut Realizer<'_>,
    root: NodeId,
    polylines: &[Polyline],
    opts: &DrawOptions,
) -> Result<()> {
    let segments = flatten(polylines, opts);
    let material = line_material(r, opts);
    let primitive = Primitive::Lines(LineBuffers { segments, width: opts.size });
    r.attach(root, "lines", NodeRole::Lines, primitive, Some(material), opts.hidden)?;
    Ok(())
}

/// Overwrite the segment buffer in place. Refuses when there is no single line
/// child or the buffer length changed (a polyline toggled `is_closed`). The
/// material is re-resolved from the new options.
pub fn update(r: &mut Realizer<'_>, root: NodeId, polylines: &[Polyline], opts: &DrawOptions) -> bool {
    let segments = flatten(polylines, opts);
    let material = line_material(r, opts);
    let children = r.scene.children_with_role(root, NodeRole::Lines);
    let [child] = children.as_slice() else {
        return false;
    };
    let Some(node) = r.scene.get_mut(*child) else {
        return false;
    };
    let Some(existing) = node.primitive.as_lines() else {
        return false;
    };
    if existing.segments.positions.len() != segments.positions.len() {
        return false;
    }
    node.primitive = Primitive::Lines(LineBuffers { segments, width: opts.size });
    node.material = Some(material);
    node.visible = !opts.hidden;
    node.touch();
    true
}

/// Edge overlay of a B-rep shape: open polylines in the edge colour.
pub fn build_edges(
    r: &mut Realizer<'_>,
    root: NodeId,
    edges: Vec<Polyline>,
    opts: &DrawOptions,
) -> Result<()> {
    if edges.is_empty() {
        return Ok(());
    }
    let colour = Colour::parse_or(&opts.edge_colour, &opts.colour());
    let flat = DrawOptions::default().with_colours(colour.as_hex());
    let segments = flatten(&edges, &flat);
    let material = r.material(&colour, opts.edge_opacity);
    let primitive = Primitive::Lines(LineBuffers { segments, width: opts.edge_width });
    r.attach(root, "edges", NodeRole::Edges, primitive, Some(material), opts.hidden)?;
    Ok(())
}
