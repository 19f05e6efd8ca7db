//! Character template interface.
//!
//! A character template models the pixels of one character at every
//! allowed rendering width, exposure level and vertical offset. Its own
//! re-estimation lives with the template; the emission model only reads the
//! log tables and forwards expected counts through
//! [`CharacterTemplate::increment_counts`].

use crate::domain::LineImage;

/// Pixel model of a single character.
///
/// Log tables are flat, column-major, `width * LINE_HEIGHT` long: the value
/// for column `i` and row `j` is at `i * LINE_HEIGHT + j`.
pub trait CharacterTemplate: Send + Sync {
    /// The symbol this template renders.
    fn character(&self) -> &str;

    /// Whether this is the blank-column template.
    fn is_space(&self) -> bool;

    /// Widths in `template_min_width()..=template_max_width()` with nonzero probability.
    fn allowed_widths(&self) -> Vec<usize>;

    fn template_min_width(&self) -> usize;

    fn template_max_width(&self) -> usize;

    /// Log-probability of rendering at `width`.
    fn width_log_prob(&self, width: usize) -> f32;

    /// Log-probabilities that each pixel is white.
    fn log_white_probs(&self, exposure: usize, offset: i32, width: usize) -> Vec<f32>;

    /// Log-probabilities that each pixel is black.
    fn log_black_probs(&self, exposure: usize, offset: i32, width: usize) -> Vec<f32>;

    /// Log-likelihood of columns `start_col..end_col` of `observations`.
    fn emission_log_prob(
        &self,
        observations: &LineImage,
        start_col: usize,
        end_col: usize,
        exposure: usize,
        offset: i32,
    ) -> f32;

    /// Adds `weight` expected counts for rendering `width` columns from `start_col`.
    ///
    /// Implementations synchronize internally so a shared template may be
    /// updated through `&self`.
    fn increment_counts(
        &self,
        weight: f32,
        observations: &LineImage,
        start_col: usize,
        width: usize,
        exposure: usize,
        offset: i32,
    );
}
