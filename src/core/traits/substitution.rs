//! Glyph substitution model interface.

use crate::domain::GlyphChar;

/// `P(glyph | language, lm char)`, sharpened by the model's power.
///
/// Language and character indices outside the model's tables are caller
/// errors and panic.
pub trait GlyphSubstitutionModel: Send + Sync {
    /// Probability of rendering `lm_char` in `language` as `glyph`.
    fn glyph_prob(&self, language: usize, lm_char: usize, glyph: GlyphChar) -> f64;
}
