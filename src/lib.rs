//! # OAR HOCR
//!
//! The probabilistic scoring core of a historical-document OCR engine. Given
//! normalized line images and hypothesized character sequences, it produces
//! the log-probabilities a Viterbi decoder and an EM training loop consume.
//!
//! ## Components
//!
//! - **Glyph Substitution Model**: `P(glyph | language, lm char)`, covering
//!   elision, doubling, tilde marks and long-s, with additive smoothing from
//!   orthographic rules and count-based re-estimation
//! - **Caching Emission Model**: best-configuration log-likelihoods of every
//!   character template at every position, offset and width of every line,
//!   rebuilt in parallel through a replaceable score kernel
//! - **Pixel Templates**: a reference character template implementation
//!
//! ## Modules
//!
//! * [`core`] - Traits, configuration, constants and error handling
//! * [`domain`] - Glyph variants, transition states, line images and symbol indexing
//! * [`models`] - Substitution models, the caching emission model and templates
//! * [`utils`] - Character dictionary loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oar_hocr::prelude::*;
//! use std::collections::HashSet;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let chars = Arc::new(indexer_from_dict(Path::new("models/chars.txt"))?);
//! let langs = Arc::new(SymbolIndexer::from_symbols(["latin", "spanish"]));
//! let active: HashSet<usize> = (0..chars.len()).collect();
//!
//! let factory = BasicGlyphSubstitutionModelFactory::new(
//!     GsmConfig::default(),
//!     langs,
//!     chars.clone(),
//!     vec![active.clone(), active],
//! )?;
//! let gsm = factory.uniform();
//!
//! // one template per dictionary entry, loaded elsewhere
//! # let templates: Vec<Arc<dyn CharacterTemplate>> = Vec::new();
//! # let lines: Vec<LineImage> = Vec::new();
//! let mut emission = CachingEmissionModel::new(
//!     Arc::from(templates),
//!     &chars,
//!     Arc::from(lines),
//!     EmissionConfig::default(),
//!     Box::new(CpuScoreKernel::new(2, 4)),
//! )?;
//! emission.rebuild_cache()?;
//! let score = emission.log_prob(0, 0, 1, 4);
//! # let _ = (gsm, score);
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod core;
pub mod domain;
pub mod models;

pub mod utils;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use oar_hocr::prelude::*;
/// ```
///
/// Included items focus on the most common tasks:
/// - The model traits (`GlyphSubstitutionModel`, `EmissionModel`, `CharacterTemplate`, `TransitionState`)
/// - Model implementations and the substitution factory
/// - Configuration (`GsmConfig`, `EmissionConfig`, `ParallelPolicy`)
/// - Domain values (`GlyphChar`, `GlyphType`, `LineImage`, `SymbolIndexer`)
/// - Essential error and result types (`OCRError`, `OcrResult`)
///
/// For the cache layout, kernel tables and charset rules, import directly
/// from the respective modules (e.g., `oar_hocr::models::emission`,
/// `oar_hocr::core::traits`, `oar_hocr::domain::charset`).
pub mod prelude {
    // Model interfaces
    pub use crate::core::traits::{
        CharacterTemplate, EmissionModel, GlyphSubstitutionModel, ScoreKernel, TransitionState,
    };

    // Models
    pub use crate::models::{
        BasicGlyphSubstitutionModel, BasicGlyphSubstitutionModelFactory, CachingEmissionModel,
        CpuScoreKernel, GsmCounts, NoSubGlyphSubstitutionModel, PixelTemplate, SubstitutionModel,
    };

    // Configuration
    pub use crate::core::{EmissionConfig, GsmConfig, ParallelPolicy};

    // Domain values
    pub use crate::domain::{
        BasicTransitionState, DecodeState, GlyphChar, GlyphType, LineImage, PixelType,
        SymbolIndexer, TransitionStateType,
    };

    // Error Handling (essential)
    pub use crate::core::{OCRError, OcrResult};

    // Dictionary loading
    pub use crate::utils::indexer_from_dict;
}
