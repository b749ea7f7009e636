// src/error.rs
//! Error handling for the whole draw engine.
//!
//! Classification misses are not errors (they surface as `Ok(None)` from the
//! dispatcher). Everything that *is* an error funnels through [`DrawError`] so
//! callers see one shape regardless of which kernel or realizer failed.

use thiserror::Error;

use crate::entity::EntityKind;

/// Main error type. Send + Sync + 'static so it crosses the worker boundary.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DrawError {
    /// A kernel call was rejected. Display matches `Failed to draw <kind>: <original>`.
    #[error("Failed to draw {kind}: {message}")]
    Kernel { kind: EntityKind, message: String },

    /// A user-authored label does not have the expected structure.
    #[error("malformed label: {0}")]
    MalformedLabel(String),

    /// A kernel-backed kind reached the synchronous entry point.
    #[error("{0} must be drawn through draw_async")]
    KernelRequired(EntityKind),

    /// A kernel-backed kind was drawn but the renderer has no kernel attached.
    #[error("no kernel attached, cannot draw {0}")]
    NoKernel(EntityKind),

    /// The kernel answered with a payload of the wrong shape for the method.
    #[error("unexpected kernel response for {method}: expected {expected}")]
    UnexpectedResponse { method: String, expected: &'static str },

    /// Colour strings that are not `#rrggbb` / `#rgb`.
    #[error("invalid colour: {0:?}")]
    InvalidColour(String),

    /// Disposing a GPU-side resource twice or after teardown.
    #[error("material {0} already disposed")]
    AlreadyDisposed(u64),

    /// JSON (de)serialization at the worker boundary or in configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker task panicked or was torn down.
    #[error("worker error: {0}")]
    Worker(String),

    /// Simple custom message.
    #[error("{0}")]
    Custom(String),

    /// Context chaining.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<DrawError>,
    },
}

impl DrawError {
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    #[inline]
    pub fn format(args: std::fmt::Arguments) -> Self {
        Self::Custom(std::fmt::format(args))
    }

    /// Add context to any error (chainable, like `.context()` in anyhow).
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap any kernel-side failure into the single error shape callers rely on.
    pub fn kernel(kind: EntityKind, original: impl std::fmt::Display) -> Self {
        Self::Kernel {
            kind,
            message: original.to_string(),
        }
    }

    #[inline]
    pub fn is_kernel(&self) -> bool {
        matches!(self, DrawError::Kernel { .. })
    }

    #[inline]
    pub fn is_malformed_label(&self) -> bool {
        matches!(self, DrawError::MalformedLabel(_))
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DrawError>;
