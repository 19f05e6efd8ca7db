//! Caching emission model.
//!
//! [`CachingEmissionModel`] owns a flat [`EmissionCache`] of best-configuration
//! log-probabilities, rebuilt from the character templates through a
//! replaceable [`ScoreKernel`](crate::core::traits::ScoreKernel).
//! [`CpuScoreKernel`] is the reference kernel.

pub mod cache;
pub mod caching;
pub mod kernel;

pub use cache::{CacheLayout, EmissionCache, estimate_memory_gb};
pub use caching::CachingEmissionModel;
pub use kernel::CpuScoreKernel;
