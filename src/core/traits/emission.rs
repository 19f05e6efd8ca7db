//! Emission model interface.

use super::transition::TransitionState;
use crate::core::OcrResult;

/// Log-likelihood of line-image spans under character templates.
///
/// Positions and widths are in image columns. Widths that no template and
/// padding combination can produce score `f32::NEG_INFINITY`.
pub trait EmissionModel: Send + Sync {
    fn num_chars(&self) -> usize;

    fn num_sequences(&self) -> usize;

    fn sequence_length(&self, d: usize) -> usize;

    /// Total widths (template plus padding) character `c` can occupy.
    fn allowed_widths(&self, c: usize) -> &[usize];

    /// Total widths the glyph of `ts` can occupy.
    fn allowed_widths_for(&self, ts: &dyn TransitionState) -> &[usize] {
        self.allowed_widths(ts.glyph_char().template_char_index)
    }

    /// Best log-probability of character `c` spanning `w` columns from `t`, over all offsets.
    fn log_prob(&self, d: usize, t: usize, c: usize, w: usize) -> f32;

    /// Best log-probability of `ts` spanning `w` columns from `t`, at the state's offset.
    fn log_prob_for(&self, d: usize, t: usize, ts: &dyn TransitionState, w: usize) -> f32;

    /// Exposure achieving [`log_prob_for`](Self::log_prob_for), or `None` if infeasible.
    fn get_exposure(&self, d: usize, t: usize, ts: &dyn TransitionState, w: usize)
    -> Option<usize>;

    /// Offset used by [`log_prob_for`](Self::log_prob_for).
    fn get_offset(&self, d: usize, t: usize, ts: &dyn TransitionState, w: usize) -> i32;

    /// Padding width achieving [`log_prob_for`](Self::log_prob_for), or `None` if infeasible.
    fn get_pad_width(&self, d: usize, t: usize, ts: &dyn TransitionState, w: usize)
    -> Option<usize>;

    /// Log-probability of a padding width.
    fn pad_width_log_prob(&self, pw: usize) -> f32;

    /// Recomputes every cached score from the current templates.
    fn rebuild_cache(&mut self) -> OcrResult<()>;

    /// Forwards `weight` expected counts for the span `start_col..end_col` to the template of `ts`.
    fn increment_count(
        &self,
        d: usize,
        ts: &dyn TransitionState,
        start_col: usize,
        end_col: usize,
        weight: f32,
    ) -> OcrResult<()>;

    /// Applies [`increment_count`](Self::increment_count) along a decoded path with unit weight.
    fn increment_counts(
        &self,
        d: usize,
        states: &[&dyn TransitionState],
        widths: &[usize],
    ) -> OcrResult<()>;
}
