//! Bulk template score kernel interface.
//!
//! A score kernel computes, for one line image, the raw match score of every
//! flattened template against every starting column. Implementations may run
//! on any device; the emission cache only depends on the layout of the score
//! buffer described by [`KernelTemplates`].

use crate::core::OcrResult;
use crate::core::constants::LINE_HEIGHT;

/// Flattened template tables grouped by template width.
///
/// For each template width `tw` in `min_template_width..=max_template_width`
/// (slot `tw - min_template_width`), `white[slot]` and `black[slot]` hold
/// `num_indices[slot]` templates of `tw * LINE_HEIGHT` values each, back to back.
#[derive(Debug, Clone, Default)]
pub struct KernelTemplates {
    pub white: Vec<Vec<f32>>,
    pub black: Vec<Vec<f32>>,
    pub num_indices: Vec<usize>,
    pub index_offsets: Vec<usize>,
    pub min_template_width: usize,
    pub max_template_width: usize,
    pub max_sequence_length: usize,
    pub total_indices: usize,
}

impl KernelTemplates {
    /// Number of template-width slots.
    pub fn num_widths(&self) -> usize {
        self.num_indices.len()
    }

    /// Length of the score buffer for a line of `sequence_length` columns.
    pub fn scores_len(&self, sequence_length: usize) -> usize {
        self.total_indices * sequence_length
    }

    /// Position in the score buffer of template `i` of width `tw` starting at column `t`.
    #[inline]
    pub fn score_index(&self, tw: usize, t: usize, i: usize, sequence_length: usize) -> usize {
        let slot = tw - self.min_template_width;
        self.index_offsets[slot] * sequence_length + t * self.num_indices[slot] + i
    }

    /// White and black tables of template `i` of width `tw`.
    pub fn template(&self, tw: usize, i: usize) -> (&[f32], &[f32]) {
        let slot = tw - self.min_template_width;
        let len = tw * LINE_HEIGHT;
        (
            &self.white[slot][i * len..(i + 1) * len],
            &self.black[slot][i * len..(i + 1) * len],
        )
    }
}

/// Replaceable bulk scorer.
///
/// `startup` is called once per cache rebuild before any `compute`, and
/// `shutdown` once after the last. `compute` may be called concurrently from
/// several workers, one line image each.
pub trait ScoreKernel: Send + Sync {
    /// Human-readable kernel name.
    fn name(&self) -> &str;

    /// Loads the template tables for the coming rebuild.
    fn startup(&mut self, templates: &KernelTemplates) -> OcrResult<()>;

    /// Adds the white and black match scores for one line image into `scores`.
    ///
    /// `scores` is zeroed by the caller and laid out per
    /// [`KernelTemplates::score_index`]. Only starting columns that leave room
    /// for the full template width are written.
    fn compute(
        &self,
        scores: &mut [f32],
        white_observations: &[f32],
        black_observations: &[f32],
        sequence_length: usize,
    ) -> OcrResult<()>;

    /// Releases resources acquired in `startup`.
    fn shutdown(&mut self);

    /// Number of line images to score concurrently.
    fn num_outer_threads(&self) -> usize;

    /// Number of column workers to populate one image with.
    fn num_populate_threads(&self) -> usize;
}

/// Dot product of a template against the observation window it covers,
/// white pixels first and black pixels added on.
///
/// Every score the emission cache stores or re-derives goes through this
/// function so the two agree bit for bit.
#[inline]
pub fn template_match_score(
    white_observations: &[f32],
    black_observations: &[f32],
    white_template: &[f32],
    black_template: &[f32],
) -> f32 {
    let mut white = 0.0f32;
    for (o, p) in white_observations.iter().zip(white_template) {
        white += o * p;
    }
    let mut black = 0.0f32;
    for (o, p) in black_observations.iter().zip(black_template) {
        black += o * p;
    }
    white + black
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_index_layout() {
        let templates = KernelTemplates {
            num_indices: vec![3, 2],
            index_offsets: vec![0, 3],
            min_template_width: 4,
            max_template_width: 5,
            total_indices: 5,
            ..KernelTemplates::default()
        };
        assert_eq!(templates.scores_len(10), 50);
        assert_eq!(templates.score_index(4, 0, 0, 10), 0);
        assert_eq!(templates.score_index(4, 2, 1, 10), 7);
        assert_eq!(templates.score_index(5, 0, 0, 10), 30);
        assert_eq!(templates.score_index(5, 9, 1, 10), 49);
    }

    #[test]
    fn test_template_match_score() {
        let white_obs = [1.0, 0.0, 1.0];
        let black_obs = [0.0, 1.0, 0.0];
        let white_tmpl = [-0.5, -1.0, -0.25];
        let black_tmpl = [-2.0, -3.0, -4.0];
        let score = template_match_score(&white_obs, &black_obs, &white_tmpl, &black_tmpl);
        assert_eq!(score, -0.75 - 3.0);
    }
}
