// src/config.rs
//! Renderer configuration.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::entity::EntityKind;
use crate::error::Result;
use crate::options::DrawOptions;

// ---------- Config ----------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RendererConfig {
    /// Upper bound on cached materials; the oldest is evicted first.
    pub max_materials: usize,
    /// Depth bias of front faces and every other surface material.
    pub front_depth_bias: f32,
    /// Depth bias of synthesized back faces. Kept apart from the front value
    /// so coplanar front and back surfaces do not fight.
    pub back_face_depth_bias: f32,
    /// Thread name for the blocking kernel worker.
    pub worker_thread_name: String,
    pub point_defaults: DrawOptions,
    pub line_defaults: DrawOptions,
    pub surface_defaults: DrawOptions,
    pub label_defaults: DrawOptions,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_materials: 100,
            front_depth_bias: 1.0,
            back_face_depth_bias: 2.0,
            worker_thread_name: "geodraw-kernel".to_string(),
            point_defaults: DrawOptions::default().with_size(0.1),
            line_defaults: DrawOptions::default().with_size(2.0),
            surface_defaults: DrawOptions::default(),
            label_defaults: DrawOptions::default()
                .with_colours("#ffffff")
                .with_size(0.2),
        }
    }
}

impl RendererConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid renderer config")?;
        Ok(config.sanitized())
    }

    /// Kind-specific default options, the last step of option resolution.
    pub fn defaults_for(&self, kind: EntityKind) -> &DrawOptions {
        match kind {
            EntityKind::Point | EntityKind::PointCloud => &self.point_defaults,
            EntityKind::Label | EntityKind::LabelSet => &self.label_defaults,
            k if k.is_polyline_family() => &self.line_defaults,
            _ => &self.surface_defaults,
        }
    }

    fn sanitized(mut self) -> Self {
        if self.max_materials == 0 {
            log::warn!("maxMaterials must be at least 1, using 1");
            self.max_materials = 1;
        }
        if self.back_face_depth_bias == self.front_depth_bias {
            log::warn!(
                "back face depth bias equals front bias ({}), back faces may z-fight",
                self.front_depth_bias
            );
        }
        self
    }
}
