// src/realize/mod.rs
//! Realizers: typed geometry (and kernel output) into scene nodes.
//!
//! Every realizer works under a root group node that the renderer owns. Build
//! functions append children; update functions rewrite an existing child's
//! buffers and report whether the layout allowed it.

pub mod labels;
pub mod lines;
pub mod meshes;
pub mod points;

use crate::colour::Colour;
use crate::config::RendererConfig;
use crate::context::OptionContext;
use crate::error::Result;
use crate::materials::{MaterialCache, MaterialRef};
use crate::scene::{NodeId, NodeRole, Primitive, RenderNode, Scene};

/// Mutable view of the renderer state a realizer needs.
pub struct Realizer<'a> {
    pub scene: &'a mut Scene,
    pub materials: &'a mut MaterialCache,
    pub config: &'a RendererConfig,
}

impl<'a> Realizer<'a> {
    pub fn new(
        scene: &'a mut Scene,
        materials: &'a mut MaterialCache,
        config: &'a RendererConfig,
    ) -> Self {
        Self { scene, materials, config }
    }

    /// Cached material at the front depth bias.
    pub fn material(&mut self, colour: &Colour, opacity: f32) -> MaterialRef {
        let bias = self.config.front_depth_bias;
        self.materials.get_or_create_flat(colour, opacity, bias)
    }

    /// Cached material at the back-face depth bias.
    pub fn back_material(&mut self, colour: &Colour, opacity: f32) -> MaterialRef {
        let bias = self.config.back_face_depth_bias;
        self.materials.get_or_create_flat(colour, opacity, bias)
    }

    /// Spawn a child of `root`.
    pub fn attach(
        &mut self,
        root: NodeId,
        base_name: &str,
        role: NodeRole,
        primitive: Primitive,
        material: Option<MaterialRef>,
        hidden: bool,
    ) -> Result<NodeId> {
        let node = RenderNode::new(role, primitive, material).hidden(hidden);
        self.scene
            .spawn_child(root, base_name, node)
            .with_context(|| format!("cannot attach {base_name}: group root is gone"))
    }
}
