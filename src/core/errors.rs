//! Error types for the scoring core.
//!
//! This module defines the errors that can occur while configuring the glyph
//! substitution and emission models, while rebuilding the emission cache, and
//! while accumulating expected counts. Infeasible scoring queries are not
//! errors: they are reported as `f32::NEG_INFINITY` log-probabilities.

use thiserror::Error;

use crate::core::config::ConfigError;

/// Enum representing the phase of work in which an error occurred.
///
/// This enum is used to identify which part of a cache rebuild or an EM
/// M-step produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Running the bulk score kernel over a line image.
    ScoreKernel,
    /// Walking a decoded path to accumulate counts.
    CountAccumulation,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::ScoreKernel => write!(f, "score kernel"),
            ProcessingStage::CountAccumulation => write!(f, "count accumulation"),
        }
    }
}

/// Enum representing the errors that can be surfaced by the scoring core.
#[derive(Error, Debug)]
pub enum OCRError {
    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The bulk score kernel failed while scoring a line image.
    #[error("score kernel '{kernel}' failed: {message}")]
    ScoreKernel {
        /// Name of the kernel implementation.
        kernel: String,
        /// A message describing the failure.
        message: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error raised by a configuration validator.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error while reading or writing configuration as JSON.
    #[error("serialization")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl OCRError {
    /// Creates a processing error for the given stage.
    ///
    /// # Arguments
    ///
    /// * `kind` - The stage in which the error occurred.
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error that caused this error.
    pub fn processing(
        kind: ProcessingStage,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates an error for a failed score kernel invocation.
    pub fn kernel_failure(kernel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScoreKernel {
            kernel: kernel.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a configuration error naming the component it belongs to.
    pub fn config_error_detailed(component: &str, message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: format!("{}: {}", component, message.into()),
        }
    }

    /// Returns the processing stage when this is a processing error.
    pub fn stage(&self) -> Option<ProcessingStage> {
        match self {
            Self::Processing { kind, .. } => Some(*kind),
            Self::ScoreKernel { .. } => Some(ProcessingStage::ScoreKernel),
            _ => None,
        }
    }
}

/// Convenient result alias for scoring operations.
pub type OcrResult<T> = Result<T, OCRError>;
