// src/realize/points.rs
//! Point and point-cloud realization.

use crate::colour::Colour;
use crate::entity::Point3;
use crate::error::Result;
use crate::geometry::group_by_colour;
use crate::options::DrawOptions;
use crate::scene::{NodeId, NodeRole, PointBuffers, Primitive};

use super::Realizer;

/// Per-point colours: the list entry at the point's index when the options
/// carry a list, the scalar colour otherwise.
fn point_colours(count: usize, opts: &DrawOptions) -> Vec<Colour> {
    if opts.colours.is_list() {
        (0..count).map(|i| opts.colour_at(i)).collect()
    } else {
        vec![opts.colour(); count]
    }
}

/// One point primitive per distinct colour.
pub fn build(
    r: &mut Realizer<'_>,
    root: NodeId,
    points: &[Point3],
    opts: &DrawOptions,
) -> Result<()> {
    let colours = point_colours(points.len(), opts);
    for group in group_by_colour(points, &colours) {
        let material = r.material(&group.colour, opts.opacity);
        let primitive = Primitive::Points(PointBuffers { positions: group.items, size: opts.size });
        r.attach(root, "points", NodeRole::Points, primitive, Some(material), opts.hidden)?;
    }
    Ok(())
}

/// Rewrite point positions in place and re-resolve the material, so an
/// opacity change lands without a rebuild. Returns `false` (and touches nothing)
/// when the colour grouping no longer matches the existing children.
pub fn update(r: &mut Realizer<'_>, root: NodeId, points: &[Point3], opts: &DrawOptions) -> bool {
    let colours = point_colours(points.len(), opts);
    let groups = group_by_colour(points, &colours);
    let children = r.scene.children_with_role(root, NodeRole::Points);
    if children.len() != groups.len() {
        return false;
    }
    let layout_matches = children.iter().zip(&groups).all(|(id, group)| {
        r.scene.get(*id).is_some_and(|node| {
            let same_colour = node.material.as_ref().map(|m| m.colour()) == Some(&group.colour);
            let same_len = node.primitive.as_points().map(|p| p.positions.len()) == Some(group.len());
            same_colour && same_len
        })
    });
    if !layout_matches {
        return false;
    }

    for (id, group) in children.into_iter().zip(groups) {
        let material = r.material(&group.colour, opts.opacity);
        if let Some(node) = r.scene.get_mut(id) {
            node.primitive = Primitive::Points(PointBuffers { positions: group.items, size: opts.size });
            node.material = Some(material);
            node.visible = !opts.hidden;
            node.touch();
        }
    }
    true
}
