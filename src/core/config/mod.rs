//! Configuration management for the scoring core.
//!
//! This module provides configuration types and validation traits for the
//! glyph substitution model, the caching emission model and the worker pool
//! used during cache rebuilds.

pub mod emission;
pub mod errors;
pub mod gsm;
pub mod parallel;

pub use emission::EmissionConfig;
pub use errors::{ConfigError, ConfigValidator};
pub use gsm::GsmConfig;
pub use parallel::ParallelPolicy;
