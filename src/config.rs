use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::GfxError;
use crate::font::RenderStyle;
use crate::psd::PsdOptions;

pub const DEFAULT_GLYPH_CACHE_SIZE: usize = 256;
pub const DEFAULT_WORD_BREAKERS: &str = " -\t";

/// Library-wide defaults. Every field is optional in JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GfxConfig {
    /// Glyphs kept per TrueType font. Zero disables the cache.
    pub glyph_cache_size: usize,
    pub render_style: RenderStyle,
    /// Characters after which word-wrap may break a line.
    pub word_breakers: String,
    pub psd: PsdOptions,
}

impl Default for GfxConfig {
    fn default() -> Self {
        GfxConfig {
            glyph_cache_size: DEFAULT_GLYPH_CACHE_SIZE,
            render_style: RenderStyle::default(),
            word_breakers: DEFAULT_WORD_BREAKERS.to_string(),
            psd: PsdOptions::default(),
        }
    }
}

impl GfxConfig {
    pub fn from_json_str(json: &str) -> Result<Self, GfxError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GfxError> {
        let path = path.as_ref();
        let config = Self::from_json_str(&fs::read_to_string(path)?)?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, GfxError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
