// src/materials/mod.rs
//! Shared render materials and the bounded cache that hands them out.

pub mod material_cache;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::colour::Colour;
use crate::error::{DrawError, Result};

pub use material_cache::{MaterialCache, MaterialCacheStats, MaterialKey};

/// Monotonic id source; ids only need to be unique, not dense.
static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

fn next_material_id() -> MaterialId {
    MaterialId(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

/// Material uniform layout (colour + depth bias), padded to 32 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialParams {
    pub base_color: [f32; 4],
    pub depth_bias: f32,
    pub _pad: [f32; 3],
}

/// A flat-coloured material. Shared between scene nodes through [`MaterialRef`].
#[derive(Debug)]
pub struct Material {
    id: MaterialId,
    colour: Colour,
    opacity: f32,
    depth_bias: f32,
    disposed: AtomicBool,
}

pub type MaterialRef = Arc<Material>;

impl Material {
    pub fn new(colour: Colour, opacity: f32, depth_bias: f32) -> Self {
        Self {
            id: next_material_id(),
            colour,
            opacity: opacity.clamp(0.0, 1.0),
            depth_bias,
            disposed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn colour(&self) -> &Colour {
        &self.colour
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn depth_bias(&self) -> f32 {
        self.depth_bias
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }

    pub fn params(&self) -> MaterialParams {
        MaterialParams {
            base_color: self.colour.rgba(self.opacity),
            depth_bias: self.depth_bias,
            _pad: [0.0; 3],
        }
    }

    /// Release the material. A second call fails; the GPU layer drops its
    /// uniform buffer on the next sync.
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(DrawError::AlreadyDisposed(self.id.0));
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
