//! Table-backed glyph substitution model.

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::traits::GlyphSubstitutionModel;
use crate::domain::{GlyphChar, SymbolIndexer};

/// Immutable `P(glyph | language, lm char)` table.
///
/// Produced by normalizing a count table; a new model is made for every EM
/// iteration rather than updating one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicGlyphSubstitutionModel {
    probs: Array3<f64>,
    gsm_power: f64,
    lang_indexer: Arc<SymbolIndexer>,
    char_indexer: Arc<SymbolIndexer>,
}

impl BasicGlyphSubstitutionModel {
    /// Wraps a `[language][lm char][glyph]` probability table.
    pub fn new(
        probs: Array3<f64>,
        gsm_power: f64,
        lang_indexer: Arc<SymbolIndexer>,
        char_indexer: Arc<SymbolIndexer>,
    ) -> Self {
        debug_assert_eq!(probs.dim().0, lang_indexer.len());
        debug_assert_eq!(probs.dim().1, char_indexer.len());
        Self {
            probs,
            gsm_power,
            lang_indexer,
            char_indexer,
        }
    }

    /// The unsharpened probability table.
    pub fn probs(&self) -> &Array3<f64> {
        &self.probs
    }

    pub fn gsm_power(&self) -> f64 {
        self.gsm_power
    }

    pub fn num_languages(&self) -> usize {
        self.probs.dim().0
    }

    pub fn num_chars(&self) -> usize {
        self.probs.dim().1
    }

    pub fn num_glyphs(&self) -> usize {
        self.probs.dim().2
    }

    pub fn lang_indexer(&self) -> &SymbolIndexer {
        &self.lang_indexer
    }

    pub fn char_indexer(&self) -> &SymbolIndexer {
        &self.char_indexer
    }
}

impl GlyphSubstitutionModel for BasicGlyphSubstitutionModel {
    fn glyph_prob(&self, language: usize, lm_char: usize, glyph: GlyphChar) -> f64 {
        let g = glyph.glyph_index(self.num_chars());
        self.probs[[language, lm_char, g]].powf(self.gsm_power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GlyphType;

    fn model(power: f64) -> BasicGlyphSubstitutionModel {
        let langs = Arc::new(SymbolIndexer::from_symbols(["latin"]));
        let chars = Arc::new(SymbolIndexer::from_symbols(["a", "b"]));
        let mut probs = Array3::zeros((1, 2, GlyphChar::num_glyphs(2)));
        probs[[0, 0, 0]] = 0.5;
        probs[[0, 0, 1]] = 0.25;
        probs[[0, 0, 2 + GlyphType::Elided.ordinal()]] = 0.25;
        probs[[0, 1, 1]] = 1.0;
        BasicGlyphSubstitutionModel::new(probs, power, langs, chars)
    }

    #[test]
    fn test_power_applied_at_query_time() {
        let m = model(2.0);
        assert_eq!(m.glyph_prob(0, 0, GlyphChar::normal(0)), 0.25);
        assert_eq!(m.probs()[[0, 0, 0]], 0.5);
        let elided = GlyphChar::new(0, GlyphType::Elided);
        assert!((m.glyph_prob(0, 0, elided) - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn test_fractional_power() {
        let m = model(0.5);
        assert!((m.glyph_prob(0, 0, GlyphChar::normal(1)) - 0.5).abs() < 1e-12);
        assert_eq!(m.glyph_prob(0, 1, GlyphChar::normal(0)), 0.0);
    }

    #[test]
    fn test_dimensions() {
        let m = model(1.0);
        assert_eq!(m.num_languages(), 1);
        assert_eq!(m.num_chars(), 2);
        assert_eq!(m.num_glyphs(), 7);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_language_panics() {
        model(1.0).glyph_prob(3, 0, GlyphChar::normal(0));
    }

    #[test]
    fn test_serde_round_trip() {
        let m = model(4.0);
        let json = serde_json::to_string(&m).unwrap();
        let restored: BasicGlyphSubstitutionModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.probs(), m.probs());
        assert_eq!(restored.char_indexer().get_index("b"), Some(1));
    }
}
