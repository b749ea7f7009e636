// src/handle.rs
//! The opaque handle returned by every successful draw.

use crate::entity::EntityKind;
use crate::options::{DrawOptions, StructuralSignature};
use crate::scene::NodeId;

/// A rendered group: scene root, the kind it was drawn as, the options that
/// produced it and, for updatable kinds, its structural signature.
///
/// Pass it back to a later draw to update in place or rebuild under the same
/// root.
#[derive(Clone, Debug)]
pub struct RenderedGroup {
    pub root: NodeId,
    pub kind: EntityKind,
    pub options: DrawOptions,
    pub signature: Option<StructuralSignature>,
}

impl RenderedGroup {
    pub fn new(
        root: NodeId,
        kind: EntityKind,
        options: DrawOptions,
        signature: Option<StructuralSignature>,
    ) -> Self {
        Self { root, kind, options, signature }
    }
}
