// src/scene.rs
// Retained scene of render nodes.
//
// Nodes live in a slab with generation-checked ids so a stale handle never
// aliases a recycled slot. Disposed ids are queued until the GPU layer has
// released their buffers.

use std::collections::VecDeque;

use crate::entity::Point3;
use crate::geometry::{MeshBuffers, SegmentBuffers};
use crate::materials::MaterialRef;

/// Node id (slot index + generation).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[inline]
    fn slot(self) -> usize {
        self.index as usize
    }
}

/// What a node is for inside its rendered group.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum NodeRole {
    Group,
    Points,
    Lines,
    Faces,
    BackFaces,
    Edges,
    Vertices,
    Label,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointBuffers {
    pub positions: Vec<Point3>,
    pub size: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineBuffers {
    pub segments: SegmentBuffers,
    pub width: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub position: Point3,
    pub size: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Empty,
    Points(PointBuffers),
    Lines(LineBuffers),
    Mesh(MeshBuffers),
    Text(TextLabel),
}

impl Primitive {
    pub fn as_points(&self) -> Option<&PointBuffers> {
        match self {
            Primitive::Points(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_lines(&self) -> Option<&LineBuffers> {
        match self {
            Primitive::Lines(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&MeshBuffers> {
        match self {
            Primitive::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextLabel> {
        match self {
            Primitive::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct RenderNode {
    pub name: String,
    pub role: NodeRole,
    pub primitive: Primitive,
    pub material: Option<MaterialRef>,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Bumped whenever the primitive's buffers change.
    version: u64,
}

impl RenderNode {
    pub fn new(role: NodeRole, primitive: Primitive, material: Option<MaterialRef>) -> Self {
        Self {
            name: String::new(),
            role,
            primitive,
            material,
            visible: true,
            parent: None,
            children: Vec::new(),
            version: 1,
        }
    }

    pub fn group() -> Self {
        Self::new(NodeRole::Group, Primitive::Empty, None)
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.visible = !hidden;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Mark the buffers dirty so the next GPU sync re-uploads them.
    pub fn touch(&mut self) {
        self.version += 1;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub spawned: u64,
    pub disposed: u64,
    pub live: usize,
}

#[derive(Default)]
pub struct Scene {
    slots: Vec<Option<RenderNode>>,
    generations: Vec<u32>,
    free_list: VecDeque<u32>,
    /// Ids disposed since the last GPU sync.
    pending_release: Vec<NodeId>,
    next_serial: u64,
    stats: SceneStats,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node without a parent. The name gets a unique serial suffix.
    pub fn spawn(&mut self, base_name: &str, mut node: RenderNode) -> NodeId {
        self.next_serial += 1;
        node.name = format!("{}-{}", base_name, self.next_serial);
        node.parent = None;

        let index = match self.free_list.pop_front() {
            Some(i) => i,
            None => {
                self.slots.push(None);
                self.generations.push(0);
                (self.slots.len() - 1) as u32
            }
        };
        let generation = self.generations[index as usize];
        self.slots[index as usize] = Some(node);
        self.stats.spawned += 1;
        self.stats.live += 1;
        NodeId { index, generation }
    }

    /// Insert a node under `parent`. Returns `None` if the parent is gone.
    pub fn spawn_child(&mut self, parent: NodeId, base_name: &str, node: RenderNode) -> Option<NodeId> {
        if !self.is_alive(parent) {
            return None;
        }
        let id = self.spawn(base_name, node);
        if let Some(child) = self.get_mut(id) {
            child.parent = Some(parent);
        }
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        Some(id)
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&RenderNode> {
        if self.generations.get(id.slot()) != Some(&id.generation) {
            return None;
        }
        self.slots.get(id.slot())?.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        if self.generations.get(id.slot()) != Some(&id.generation) {
            return None;
        }
        self.slots.get_mut(id.slot())?.as_mut()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(RenderNode::children).unwrap_or(&[])
    }

    /// Children of `id` playing `role`.
    pub fn children_with_role(&self, id: NodeId, role: NodeRole) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.get(*c).map(|n| n.role) == Some(role))
            .collect()
    }

    /// Remove `id` and its whole subtree, detaching it from its parent.
    pub fn despawn(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).map(|n| n.parent) else {
            return;
        };
        if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
            p.children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if self.get(cur).is_none() {
                continue;
            }
            let slot = cur.slot();
            if let Some(node) = self.slots[slot].take() {
                stack.extend(node.children);
            }
            self.generations[slot] = self.generations[slot].wrapping_add(1);
            self.free_list.push_back(cur.index);
            self.pending_release.push(cur);
            self.stats.disposed += 1;
            self.stats.live -= 1;
        }
    }

    /// Dispose every child of `id`, keeping `id` itself.
    pub fn clear_children(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.children(id).to_vec();
        for c in children {
            self.despawn(c);
        }
    }

    /// Ids disposed since the previous call.
    pub fn take_released(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.pending_release)
    }

    /// Every live node, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &RenderNode)> {
        self.slots.iter().enumerate().filter_map(move |(i, slot)| {
            slot.as_ref().map(|node| {
                (
                    NodeId {
                        index: i as u32,
                        generation: self.generations[i],
                    },
                    node,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.stats.live
    }

    pub fn is_empty(&self) -> bool {
        self.stats.live == 0
    }

    pub fn stats(&self) -> SceneStats {
        self.stats
    }

    /// Dispose every node.
    pub fn clear(&mut self) {
        let roots: Vec<NodeId> = self
            .iter()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(id, _)| id)
            .collect();
        for r in roots {
            self.despawn(r);
        }
    }
}
