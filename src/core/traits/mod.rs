//! Trait definitions for the scoring core.
//!
//! This module groups the interfaces the models expose (`substitution`,
//! `emission`) and the collaborator interfaces they consume (`transition`,
//! `template`, `kernel`). The collaborators are implemented outside the core
//! in a full system; this crate ships reference implementations of each.

pub mod emission;
pub mod kernel;
pub mod substitution;
pub mod template;
pub mod transition;

pub use emission::EmissionModel;
pub use kernel::{KernelTemplates, ScoreKernel, template_match_score};
pub use substitution::GlyphSubstitutionModel;
pub use template::CharacterTemplate;
pub use transition::TransitionState;
