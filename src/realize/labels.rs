// src/realize/labels.rs
//! Text labels, including the edge / face index overlays of B-rep shapes.

use crate::colour::Colour;
use crate::entity::{Label, Point3};
use crate::error::Result;
use crate::options::DrawOptions;
use crate::scene::{NodeId, NodeRole, Primitive, TextLabel};

use super::Realizer;

pub fn build(r: &mut Realizer<'_>, root: NodeId, labels: &[Label], opts: &DrawOptions) -> Result<()> {
    for (i, label) in labels.iter().enumerate() {
        let fallback = opts.colour_at(i);
        let colour = match &label.colour {
            Some(c) => Colour::parse_or(c, &fallback),
            None => fallback,
        };
        let size = label.size.unwrap_or(opts.size);
        attach_text(r, root, &label.text, label.position, size, &colour, opts)?;
    }
    Ok(())
}

/// Index labels (`0`, `1`, ...) at the given anchors.
pub fn build_index_labels(
    r: &mut Realizer<'_>,
    root: NodeId,
    anchors: &[(usize, Point3)],
    height: f32,
    colour: &str,
    opts: &DrawOptions,
) -> Result<()> {
    let colour = Colour::parse_or(colour, &opts.colour());
    for (index, position) in anchors {
        attach_text(r, root, &index.to_string(), *position, height, &colour, opts)?;
    }
    Ok(())
}

fn attach_text(
    r: &mut Realizer<'_>,
    root: NodeId,
    text: &str,
    position: Point3,
    size: f32,
    colour: &Colour,
    opts: &DrawOptions,
) -> Result<NodeId> {
    let material = r.material(colour, opts.opacity);
    let primitive = Primitive::Text(TextLabel { text: text.to_string(), position, size });
    r.attach(root, "label", NodeRole::Label, primitive, Some(material), opts.hidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::materials::MaterialCache;
    use crate::scene::{RenderNode, Scene};

    #[test]
    fn label_size_and_colour_override_options() {
        let (mut scene, mut cache, config) = (Scene::new(), MaterialCache::new(8), RendererConfig::default());
        let root = scene.spawn("group", RenderNode::group());
        let mut r = Realizer::new(&mut scene, &mut cache, &config);
        let labels = [
            Label { text: "a".into(), position: [0.0; 3], size: Some(0.5), colour: Some("#00ff00".into()) },
            Label { text: "b".into(), position: [1.0; 3], size: None, colour: None },
        ];
        build(&mut r, root, &labels, &DrawOptions::default().with_size(0.2)).unwrap();

        let nodes: Vec<_> = scene.children(root).iter().map(|id| scene.get(*id).unwrap()).collect();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].primitive.as_text().unwrap().size, 0.5);
        assert_eq!(nodes[0].material.as_ref().unwrap().colour().as_hex(), "#00ff00");
        assert_eq!(nodes[1].primitive.as_text().unwrap().size, 0.2);
        assert_eq!(nodes[1].material.as_ref().unwrap().colour().as_hex(), "#ff0000");
    }
}
