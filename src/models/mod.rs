//! Scoring models.
//!
//! This module contains the glyph substitution models and their factory, the
//! caching emission model with its score kernel, and the reference pixel
//! template the emission model scores against.

pub mod emission;
pub mod substitution;
pub mod template;

pub use emission::{CachingEmissionModel, CpuScoreKernel, EmissionCache};
pub use substitution::{
    BasicGlyphSubstitutionModel, BasicGlyphSubstitutionModelFactory, GsmCounts,
    NoSubGlyphSubstitutionModel, SubstitutionModel,
};
pub use template::{PixelTemplate, TemplateCounts};
