//! CPU reference score kernel.

use rayon::prelude::*;

use crate::core::constants::LINE_HEIGHT;
use crate::core::traits::{KernelTemplates, ScoreKernel, template_match_score};
use crate::core::{OCRError, OcrResult};

/// Scores every template against every column on the CPU.
///
/// Template widths are scored in parallel; within one width the loop runs
/// over starting columns, then templates.
#[derive(Debug, Default)]
pub struct CpuScoreKernel {
    outer_threads: usize,
    populate_threads: usize,
    templates: Option<KernelTemplates>,
}

impl CpuScoreKernel {
    pub fn new(outer_threads: usize, populate_threads: usize) -> Self {
        Self {
            outer_threads: outer_threads.max(1),
            populate_threads: populate_threads.max(1),
            templates: None,
        }
    }
}

impl ScoreKernel for CpuScoreKernel {
    fn name(&self) -> &str {
        "cpu"
    }

    fn startup(&mut self, templates: &KernelTemplates) -> OcrResult<()> {
        if templates.white.len() != templates.num_widths()
            || templates.black.len() != templates.num_widths()
        {
            return Err(OCRError::kernel_failure(
                self.name(),
                "template tables do not match the number of template widths",
            ));
        }
        self.templates = Some(templates.clone());
        Ok(())
    }

    fn compute(
        &self,
        scores: &mut [f32],
        white_observations: &[f32],
        black_observations: &[f32],
        sequence_length: usize,
    ) -> OcrResult<()> {
        let templates = self
            .templates
            .as_ref()
            .ok_or_else(|| OCRError::kernel_failure(self.name(), "compute called before startup"))?;
        if scores.len() < templates.scores_len(sequence_length) {
            return Err(OCRError::kernel_failure(
                self.name(),
                format!(
                    "score buffer holds {} values, need {}",
                    scores.len(),
                    templates.scores_len(sequence_length)
                ),
            ));
        }
        let observed = sequence_length * LINE_HEIGHT;
        if white_observations.len() < observed || black_observations.len() < observed {
            return Err(OCRError::kernel_failure(
                self.name(),
                "observation buffers shorter than the sequence",
            ));
        }

        // each width owns a contiguous, disjoint run of the score buffer
        let mut regions = Vec::with_capacity(templates.num_widths());
        let mut rest = &mut scores[..templates.scores_len(sequence_length)];
        for slot in 0..templates.num_widths() {
            let (head, tail) =
                std::mem::take(&mut rest).split_at_mut(templates.num_indices[slot] * sequence_length);
            regions.push((slot, head));
            rest = tail;
        }

        regions.into_par_iter().for_each(|(slot, region)| {
            let tw = templates.min_template_width + slot;
            let n = templates.num_indices[slot];
            if n == 0 || tw > sequence_length {
                return;
            }
            let span = tw * LINE_HEIGHT;
            for t in 0..=(sequence_length - tw) {
                let window = t * LINE_HEIGHT..t * LINE_HEIGHT + span;
                let white = &white_observations[window.clone()];
                let black = &black_observations[window];
                for i in 0..n {
                    let (white_template, black_template) = templates.template(tw, i);
                    region[t * n + i] +=
                        template_match_score(white, black, white_template, black_template);
                }
            }
        });
        Ok(())
    }

    fn shutdown(&mut self) {
        self.templates = None;
    }

    fn num_outer_threads(&self) -> usize {
        self.outer_threads
    }

    fn num_populate_threads(&self) -> usize {
        self.populate_threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_width_templates(tw: usize, n: usize) -> KernelTemplates {
        let white: Vec<f32> = (0..n * tw * LINE_HEIGHT).map(|k| -(k as f32) * 1e-3).collect();
        let black: Vec<f32> = (0..n * tw * LINE_HEIGHT).map(|k| -1.0 - (k as f32) * 1e-3).collect();
        KernelTemplates {
            white: vec![white],
            black: vec![black],
            num_indices: vec![n],
            index_offsets: vec![0],
            min_template_width: tw,
            max_template_width: tw,
            max_sequence_length: 8,
            total_indices: n,
        }
    }

    #[test]
    fn test_compute_before_startup_fails() {
        let kernel = CpuScoreKernel::new(1, 1);
        let mut scores = vec![0.0; 4];
        let err = kernel.compute(&mut scores, &[], &[], 0).unwrap_err();
        assert!(matches!(err, OCRError::ScoreKernel { .. }));
    }

    #[test]
    fn test_compute_matches_direct_dot_products() {
        let tw = 2;
        let n = 3;
        let seq = 5;
        let templates = single_width_templates(tw, n);
        let mut kernel = CpuScoreKernel::new(1, 1);
        kernel.startup(&templates).unwrap();

        let white: Vec<f32> = (0..seq * LINE_HEIGHT).map(|k| (k % 2) as f32).collect();
        let black: Vec<f32> = white.iter().map(|w| 1.0 - w).collect();
        let mut scores = vec![0.0; templates.scores_len(seq)];
        kernel.compute(&mut scores, &white, &black, seq).unwrap();

        for t in 0..=(seq - tw) {
            for i in 0..n {
                let (wt, bt) = templates.template(tw, i);
                let range = t * LINE_HEIGHT..(t + tw) * LINE_HEIGHT;
                let expected = template_match_score(&white[range.clone()], &black[range], wt, bt);
                assert_eq!(scores[templates.score_index(tw, t, i, seq)], expected);
            }
        }
        // starting columns without room for the template are untouched
        assert_eq!(scores[templates.score_index(tw, seq - 1, 0, seq)], 0.0);
        kernel.shutdown();
    }

    #[test]
    fn test_short_buffer_rejected() {
        let templates = single_width_templates(2, 1);
        let mut kernel = CpuScoreKernel::new(1, 1);
        kernel.startup(&templates).unwrap();
        let obs = vec![0.0; 4 * LINE_HEIGHT];
        let mut scores = vec![0.0; 2];
        assert!(kernel.compute(&mut scores, &obs, &obs, 4).is_err());
    }

    #[test]
    fn test_thread_counts_are_at_least_one() {
        let kernel = CpuScoreKernel::new(0, 3);
        assert_eq!(kernel.num_outer_threads(), 1);
        assert_eq!(kernel.num_populate_threads(), 3);
    }
}
