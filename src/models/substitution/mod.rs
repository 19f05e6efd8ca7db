//! Glyph substitution models.
//!
//! `P(glyph | language, lm char)` tables, the identity baseline, and the
//! factory that re-estimates tables from decoded paths.

pub mod basic;
pub mod factory;
pub mod no_sub;

pub use basic::BasicGlyphSubstitutionModel;
pub use factory::{BasicGlyphSubstitutionModelFactory, GsmCounts};
pub use no_sub::NoSubGlyphSubstitutionModel;

use crate::core::traits::GlyphSubstitutionModel;
use crate::domain::GlyphChar;

/// Either substitution model, dispatched statically.
#[derive(Debug, Clone)]
pub enum SubstitutionModel {
    Basic(BasicGlyphSubstitutionModel),
    NoSub(NoSubGlyphSubstitutionModel),
}

impl GlyphSubstitutionModel for SubstitutionModel {
    fn glyph_prob(&self, language: usize, lm_char: usize, glyph: GlyphChar) -> f64 {
        match self {
            SubstitutionModel::Basic(m) => m.glyph_prob(language, lm_char, glyph),
            SubstitutionModel::NoSub(m) => m.glyph_prob(language, lm_char, glyph),
        }
    }
}

impl From<BasicGlyphSubstitutionModel> for SubstitutionModel {
    fn from(model: BasicGlyphSubstitutionModel) -> Self {
        SubstitutionModel::Basic(model)
    }
}

impl From<NoSubGlyphSubstitutionModel> for SubstitutionModel {
    fn from(model: NoSubGlyphSubstitutionModel) -> Self {
        SubstitutionModel::NoSub(model)
    }
}
