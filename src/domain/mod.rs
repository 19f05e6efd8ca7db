//! Domain-level value types shared by the scoring models.
//!
//! This module groups the glyph variants, transition-state data, line images,
//! symbol indexing and orthographic rules that the substitution and emission
//! models are expressed in.

pub mod charset;
pub mod glyph;
pub mod indexer;
pub mod observation;
pub mod transition;

pub use charset::OrthographyRules;
pub use glyph::{GlyphChar, GlyphType, NUM_SPECIAL_GLYPHS};
pub use indexer::SymbolIndexer;
pub use observation::{LineImage, PixelType};
pub use transition::{BasicTransitionState, DecodeState, TransitionStateType};
