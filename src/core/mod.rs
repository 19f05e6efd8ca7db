//! The core module of the scoring engine.
//!
//! This module contains the fundamental components shared by the glyph
//! substitution and emission models, including:
//! - Configuration management
//! - Constants describing line and template geometry
//! - Error handling
//! - Traits defining the models and their collaborators
//!
//! It also provides re-exports of commonly used types and functions for convenience.

pub mod config;
pub mod constants;
pub mod errors;
pub mod traits;

pub use config::{ConfigError, ConfigValidator, EmissionConfig, GsmConfig, ParallelPolicy};
pub use constants::*;
pub use errors::{OCRError, OcrResult, ProcessingStage};
pub use traits::{
    CharacterTemplate, EmissionModel, GlyphSubstitutionModel, KernelTemplates, ScoreKernel,
    TransitionState,
};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
