// src/context.rs
//! `.context()` helpers for `Result` and `Option`, plus `ensure!`.

use crate::error::{DrawError, Result};

/// Attach a message to a failed `Result` whose error converts into [`DrawError`].
pub trait Context<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<DrawError>> Context<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|err| err.into().context(context))
    }
}

/// Turn a missing value into a [`DrawError::Custom`].
pub trait OptionContext<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Lazy variant; the message is only built when the value is missing.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> OptionContext<T> for Option<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| DrawError::custom(context))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| DrawError::custom(f()))
    }
}

/// Return a formatted [`DrawError`] unless the condition holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($fmt:tt)+) => {
        if !($cond) {
            return Err($crate::error::DrawError::format(format_args!($($fmt)+)));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn needs_three(stride: usize) -> Result<usize> {
        crate::ensure!(stride >= 3, "stride {} too small", stride);
        Ok(stride)
    }

    #[test]
    fn ensure_formats_message() {
        let err = needs_three(2).unwrap_err();
        assert_eq!(err.to_string(), "stride 2 too small");
        assert_eq!(needs_three(4).unwrap(), 4);
    }

    #[test]
    fn option_context_produces_custom_error() {
        let missing: Option<u32> = None;
        let err = missing.context("no edge index").unwrap_err();
        assert_eq!(err.to_string(), "no edge index");
        let lazy: Option<u32> = None;
        assert_eq!(lazy.with_context(|| format!("edge {}", 7)).unwrap_err().to_string(), "edge 7");
    }

    #[test]
    fn result_context_chains_json_errors() {
        let parsed: std::result::Result<u32, serde_json::Error> = serde_json::from_str("nope");
        let err = parsed.context("reading config").unwrap_err();
        assert!(err.to_string().starts_with("reading config: JSON error"));
    }
}
