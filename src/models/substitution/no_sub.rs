//! Identity substitution baseline.

use serde::{Deserialize, Serialize};

use crate::core::traits::GlyphSubstitutionModel;
use crate::domain::{GlyphChar, GlyphType};

/// Renders every character as itself and nothing else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoSubGlyphSubstitutionModel;

impl NoSubGlyphSubstitutionModel {
    pub fn new() -> Self {
        Self
    }
}

impl GlyphSubstitutionModel for NoSubGlyphSubstitutionModel {
    fn glyph_prob(&self, _language: usize, lm_char: usize, glyph: GlyphChar) -> f64 {
        if glyph.glyph_type == GlyphType::NormalChar && glyph.template_char_index == lm_char {
            1.0
        } else {
            0.0
        }
    }
}
