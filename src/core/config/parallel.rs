//! Shared parallel processing configuration types.

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigValidator};

/// Configuration for the two parallel phases of an emission cache rebuild.
///
/// The outer phase scores whole line images concurrently through the score
/// kernel; the inner phase populates cache columns of a single image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Maximum number of threads in the worker pool.
    /// If None, rayon picks its default (typically the number of CPU cores).
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Number of line images scored concurrently.
    /// Default: 1
    #[serde(default = "ParallelPolicy::default_outer_threads")]
    pub outer_threads: usize,

    /// Number of column workers used while populating the cache for one image.
    /// Default: 1 (populate sequentially)
    #[serde(default = "ParallelPolicy::default_populate_threads")]
    pub populate_threads: usize,

    /// Images with at most this many columns are populated sequentially.
    /// Default: 64
    #[serde(default = "ParallelPolicy::default_column_threshold")]
    pub column_threshold: usize,
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of threads.
    pub fn with_max_threads(mut self, max_threads: Option<usize>) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the number of images scored concurrently.
    pub fn with_outer_threads(mut self, threads: usize) -> Self {
        self.outer_threads = threads;
        self
    }

    /// Set the number of column workers per image.
    pub fn with_populate_threads(mut self, threads: usize) -> Self {
        self.populate_threads = threads;
        self
    }

    /// Set the column count at or below which population runs sequentially.
    pub fn with_column_threshold(mut self, threshold: usize) -> Self {
        self.column_threshold = threshold;
        self
    }

    /// Whether an image of `columns` columns should be populated in parallel.
    pub fn should_parallelize_columns(&self, columns: usize) -> bool {
        self.populate_threads > 1 && columns > self.column_threshold
    }

    /// Builds the fixed-size worker pool used for cache rebuilds.
    ///
    /// The pool is sized to hold every outer worker together with its column
    /// workers, capped by `max_threads`.
    pub fn build_thread_pool(&self) -> Result<ThreadPool, ConfigError> {
        let wanted = self.outer_threads.max(1) * self.populate_threads.max(1);
        let threads = match self.max_threads {
            Some(max) => wanted.min(max.max(1)),
            None => wanted,
        };
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("oar-hocr-emission-{i}"))
            .build()
            .map_err(|e| ConfigError::ValidationFailed {
                message: format!("failed to build emission thread pool: {e}"),
            })
    }

    fn default_outer_threads() -> usize {
        1
    }

    fn default_populate_threads() -> usize {
        1
    }

    fn default_column_threshold() -> usize {
        64
    }
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            max_threads: None,
            outer_threads: Self::default_outer_threads(),
            populate_threads: Self::default_populate_threads(),
            column_threshold: Self::default_column_threshold(),
        }
    }
}

impl ConfigValidator for ParallelPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_thread_count(self.outer_threads)?;
        self.validate_thread_count(self.populate_threads)?;
        if let Some(max) = self.max_threads {
            self.validate_thread_count(max)?;
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}
