// src/colour.rs
//! Hex colours as they appear in draw options and on entities.

use serde::{Deserialize, Serialize};

use crate::error::{DrawError, Result};

/// Normalized `#rrggbb` colour.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Colour(String);

impl Colour {
    /// Parse `#rrggbb`, `rrggbb` or the short `#rgb` form. Output is lowercase `#rrggbb`.
    pub fn parse(raw: &str) -> Result<Self> {
        let hex = raw.trim().trim_start_matches('#');
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(DrawError::InvalidColour(raw.to_string())),
        };
        if !expanded.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DrawError::InvalidColour(raw.to_string()));
        }
        Ok(Self(format!("#{}", expanded.to_ascii_lowercase())))
    }

    /// Parse, falling back to `fallback` (and logging) when the string is not a colour.
    pub fn parse_or(raw: &str, fallback: &Colour) -> Self {
        match Self::parse(raw) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("{}, using {}", e, fallback);
                fallback.clone()
            }
        }
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Linear 0..1 RGB components.
    pub fn rgb(&self) -> [f32; 3] {
        let byte = |i: usize| u8::from_str_radix(&self.0[i..i + 2], 16).unwrap_or(0) as f32 / 255.0;
        [byte(1), byte(3), byte(5)]
    }

    pub fn rgba(&self, opacity: f32) -> [f32; 4] {
        let [r, g, b] = self.rgb();
        [r, g, b, opacity.clamp(0.0, 1.0)]
    }
}

/// Red, the draw colour when nothing else is given.
impl Default for Colour {
    fn default() -> Self {
        Self("#ff0000".to_string())
    }
}

impl std::fmt::Display for Colour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `colours` option: a single colour for everything or one per item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Colours {
    Single(String),
    Many(Vec<String>),
}

impl Colours {
    /// Colour for item `index`: the matching list entry, else the first list entry,
    /// else the scalar colour.
    pub fn at(&self, index: usize, fallback: &Colour) -> Colour {
        match self {
            Colours::Single(c) => Colour::parse_or(c, fallback),
            Colours::Many(list) => match list.get(index).or_else(|| list.first()) {
                Some(c) => Colour::parse_or(c, fallback),
                None => fallback.clone(),
            },
        }
    }

    /// The colour used when the option carries a single value for the whole entity.
    pub fn scalar(&self, fallback: &Colour) -> Colour {
        self.at(0, fallback)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Colours::Many(_))
    }
}

impl From<&str> for Colours {
    fn from(value: &str) -> Self {
        Colours::Single(value.to_string())
    }
}
