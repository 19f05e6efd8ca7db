//! Reference pixel template.
//!
//! [`PixelTemplate`] is a self-contained implementation of
//! [`CharacterTemplate`]: per-exposure, per-width black-pixel probabilities
//! derived from a prototype bitmap, a categorical width distribution, and
//! thread-safe accumulators for the expected counts the emission model
//! forwards during EM.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::constants::{EXP_GAINS, LINE_HEIGHT, NUM_EXPOSURES, SPACE_BLACK_PROBS};
use crate::core::traits::CharacterTemplate;
use crate::core::{OCRError, OcrResult};
use crate::domain::charset::SPACE;
use crate::domain::{LineImage, PixelType};

/// Pixel probabilities are kept inside `[MIN_PIXEL_PROB, 1 - MIN_PIXEL_PROB]`
/// so every log table entry is finite.
pub const MIN_PIXEL_PROB: f32 = 1e-4;

#[inline]
fn shifted_row(j: usize, offset: i32) -> usize {
    (j as i32 + offset).clamp(0, LINE_HEIGHT as i32 - 1) as usize
}

/// Expected counts accumulated since the last [`PixelTemplate::clear_counts`].
///
/// Pixel tables are indexed `[exposure][width - min_width][i * LINE_HEIGHT + j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateCounts {
    pub black: Vec<Vec<Vec<f32>>>,
    pub white: Vec<Vec<Vec<f32>>>,
    pub width: Vec<f32>,
}

impl TemplateCounts {
    fn zeros(min_width: usize, max_width: usize) -> Self {
        let tables: Vec<Vec<Vec<f32>>> = (0..NUM_EXPOSURES)
            .map(|_| {
                (min_width..=max_width)
                    .map(|w| vec![0.0; w * LINE_HEIGHT])
                    .collect()
            })
            .collect();
        Self {
            black: tables.clone(),
            white: tables,
            width: vec![0.0; max_width - min_width + 1],
        }
    }

    /// Sum of all width counts.
    pub fn total_weight(&self) -> f32 {
        self.width.iter().sum()
    }
}

/// Character template backed by explicit probability tables.
#[derive(Debug)]
pub struct PixelTemplate {
    character: String,
    min_width: usize,
    max_width: usize,
    // [exposure][width - min_width][i * LINE_HEIGHT + j]; empty for the space template
    log_black: Vec<Vec<Vec<f32>>>,
    log_white: Vec<Vec<Vec<f32>>>,
    width_probs: Vec<f32>,
    counts: Mutex<TemplateCounts>,
}

impl PixelTemplate {
    /// The blank-column template, rendered at `min_width..=max_width` columns.
    ///
    /// # Errors
    ///
    /// Returns `OCRError::InvalidInput` if the width range is empty or starts at zero.
    pub fn space(min_width: usize, max_width: usize) -> OcrResult<Self> {
        Self::check_widths(SPACE, min_width, max_width)?;
        Ok(Self {
            character: SPACE.to_string(),
            min_width,
            max_width,
            log_black: Vec::new(),
            log_white: Vec::new(),
            width_probs: uniform(max_width - min_width + 1),
            counts: Mutex::new(TemplateCounts::zeros(min_width, max_width)),
        })
    }

    /// A glyph template rendered by resampling `prototype`.
    ///
    /// `prototype` holds black-pixel probabilities for `max_width` columns,
    /// column-major. At width `w`, column `i` samples prototype column
    /// `floor((i + 0.5) * max_width / w)`, scaled by the exposure gain.
    ///
    /// # Errors
    ///
    /// Returns `OCRError::InvalidInput` if the width range is invalid or the
    /// prototype is not `max_width * LINE_HEIGHT` long.
    pub fn from_prototype(
        character: impl Into<String>,
        prototype: &[f32],
        min_width: usize,
        max_width: usize,
    ) -> OcrResult<Self> {
        let character = character.into();
        Self::check_widths(&character, min_width, max_width)?;
        if prototype.len() != max_width * LINE_HEIGHT {
            return Err(OCRError::invalid_input(format!(
                "prototype for '{}' has {} values, expected {}",
                character,
                prototype.len(),
                max_width * LINE_HEIGHT
            )));
        }

        let mut log_black = Vec::with_capacity(NUM_EXPOSURES);
        let mut log_white = Vec::with_capacity(NUM_EXPOSURES);
        for gain in EXP_GAINS {
            let mut black_by_width = Vec::with_capacity(max_width - min_width + 1);
            let mut white_by_width = Vec::with_capacity(max_width - min_width + 1);
            for w in min_width..=max_width {
                let mut black = Vec::with_capacity(w * LINE_HEIGHT);
                let mut white = Vec::with_capacity(w * LINE_HEIGHT);
                for i in 0..w {
                    let src = ((i as f32 + 0.5) * max_width as f32 / w as f32) as usize;
                    let src = src.min(max_width - 1);
                    for j in 0..LINE_HEIGHT {
                        let p = (gain * prototype[src * LINE_HEIGHT + j])
                            .clamp(MIN_PIXEL_PROB, 1.0 - MIN_PIXEL_PROB);
                        black.push((p as f64).ln() as f32);
                        white.push((1.0 - p as f64).ln() as f32);
                    }
                }
                black_by_width.push(black);
                white_by_width.push(white);
            }
            log_black.push(black_by_width);
            log_white.push(white_by_width);
        }

        Ok(Self {
            character,
            min_width,
            max_width,
            log_black,
            log_white,
            width_probs: uniform(max_width - min_width + 1),
            counts: Mutex::new(TemplateCounts::zeros(min_width, max_width)),
        })
    }

    /// Replaces the width distribution. Zero entries disallow a width.
    ///
    /// # Errors
    ///
    /// Returns `OCRError::InvalidInput` if the length does not match the width
    /// range, or if any entry is negative or every entry is zero.
    pub fn with_width_probs(mut self, probs: Vec<f32>) -> OcrResult<Self> {
        if probs.len() != self.max_width - self.min_width + 1 {
            return Err(OCRError::invalid_input(format!(
                "'{}' has {} widths, got {} width probabilities",
                self.character,
                self.max_width - self.min_width + 1,
                probs.len()
            )));
        }
        let total: f32 = probs.iter().sum();
        if probs.iter().any(|&p| p < 0.0) || total <= 0.0 {
            return Err(OCRError::invalid_input(format!(
                "width probabilities for '{}' must be non-negative with positive mass",
                self.character
            )));
        }
        self.width_probs = probs.into_iter().map(|p| p / total).collect();
        Ok(self)
    }

    /// Snapshot of the accumulated counts.
    pub fn counts(&self) -> TemplateCounts {
        self.lock_counts().clone()
    }

    /// Resets every accumulator to zero.
    pub fn clear_counts(&self) {
        let mut counts = self.lock_counts();
        *counts = TemplateCounts::zeros(self.min_width, self.max_width);
    }

    fn lock_counts(&self) -> MutexGuard<'_, TemplateCounts> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_widths(character: &str, min_width: usize, max_width: usize) -> OcrResult<()> {
        if min_width == 0 || min_width > max_width {
            return Err(OCRError::invalid_input(format!(
                "template '{}' has invalid width range {}..={}",
                character, min_width, max_width
            )));
        }
        Ok(())
    }

    fn shifted_table(&self, table: &[f32], width: usize, offset: i32) -> Vec<f32> {
        let mut out = Vec::with_capacity(width * LINE_HEIGHT);
        for i in 0..width {
            for j in 0..LINE_HEIGHT {
                out.push(table[i * LINE_HEIGHT + shifted_row(j, offset)]);
            }
        }
        out
    }

    fn space_log_black(exposure: usize) -> f32 {
        (SPACE_BLACK_PROBS[exposure] as f64).ln() as f32
    }

    fn space_log_white(exposure: usize) -> f32 {
        (1.0 - SPACE_BLACK_PROBS[exposure] as f64).ln() as f32
    }

    fn pixel_log_prob(
        &self,
        exposure: usize,
        offset: i32,
        width: usize,
        pos: usize,
        j: usize,
        pixel: PixelType,
    ) -> f32 {
        if self.is_space() {
            return match pixel {
                PixelType::Black => Self::space_log_black(exposure),
                PixelType::White => Self::space_log_white(exposure),
                PixelType::Obscured => 0.0,
            };
        }
        let slot = width - self.min_width;
        let k = pos * LINE_HEIGHT + shifted_row(j, offset);
        match pixel {
            PixelType::Black => self.log_black[exposure][slot][k],
            PixelType::White => self.log_white[exposure][slot][k],
            PixelType::Obscured => 0.0,
        }
    }
}

fn uniform(n: usize) -> Vec<f32> {
    vec![1.0 / n as f32; n]
}

impl CharacterTemplate for PixelTemplate {
    fn character(&self) -> &str {
        &self.character
    }

    fn is_space(&self) -> bool {
        self.character == SPACE
    }

    fn allowed_widths(&self) -> Vec<usize> {
        (self.min_width..=self.max_width)
            .filter(|&w| self.width_probs[w - self.min_width] > 0.0)
            .collect()
    }

    fn template_min_width(&self) -> usize {
        self.min_width
    }

    fn template_max_width(&self) -> usize {
        self.max_width
    }

    fn width_log_prob(&self, width: usize) -> f32 {
        if width < self.min_width || width > self.max_width {
            return f32::NEG_INFINITY;
        }
        (self.width_probs[width - self.min_width] as f64).ln() as f32
    }

    fn log_white_probs(&self, exposure: usize, offset: i32, width: usize) -> Vec<f32> {
        if self.is_space() {
            return vec![Self::space_log_white(exposure); width * LINE_HEIGHT];
        }
        self.shifted_table(&self.log_white[exposure][width - self.min_width], width, offset)
    }

    fn log_black_probs(&self, exposure: usize, offset: i32, width: usize) -> Vec<f32> {
        if self.is_space() {
            return vec![Self::space_log_black(exposure); width * LINE_HEIGHT];
        }
        self.shifted_table(&self.log_black[exposure][width - self.min_width], width, offset)
    }

    fn emission_log_prob(
        &self,
        observations: &LineImage,
        start_col: usize,
        end_col: usize,
        exposure: usize,
        offset: i32,
    ) -> f32 {
        let width = end_col - start_col;
        let mut log_prob = 0.0f32;
        for pos in 0..width {
            let column = observations.column(start_col + pos);
            let mut column_log_prob = 0.0f32;
            for (j, &pixel) in column.iter().enumerate() {
                column_log_prob += self.pixel_log_prob(exposure, offset, width, pos, j, pixel);
            }
            log_prob += column_log_prob;
        }
        log_prob
    }

    fn increment_counts(
        &self,
        weight: f32,
        observations: &LineImage,
        start_col: usize,
        width: usize,
        exposure: usize,
        offset: i32,
    ) {
        let mut counts = self.lock_counts();
        if !self.is_space() {
            let slot = width - self.min_width;
            for pos in 0..width {
                let column = observations.column(start_col + pos);
                for (j, &pixel) in column.iter().enumerate() {
                    let k = pos * LINE_HEIGHT + shifted_row(j, offset);
                    match pixel {
                        PixelType::Black => counts.black[exposure][slot][k] += weight,
                        PixelType::White => counts.white[exposure][slot][k] += weight,
                        PixelType::Obscured => {}
                    }
                }
            }
        }
        counts.width[width - self.min_width] += weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_prototype(max_width: usize) -> Vec<f32> {
        let mut proto = vec![0.0; max_width * LINE_HEIGHT];
        for i in 0..max_width {
            for j in 10..20 {
                proto[i * LINE_HEIGHT + j] = 1.0;
            }
        }
        proto
    }

    #[test]
    fn test_space_tables_are_constant() {
        let space = PixelTemplate::space(1, 3).unwrap();
        assert!(space.is_space());
        let black = space.log_black_probs(2, 4, 2);
        assert_eq!(black.len(), 2 * LINE_HEIGHT);
        let expected = (0.1f64).ln() as f32;
        assert!(black.iter().all(|&v| (v - expected).abs() < 1e-6));
        assert!(black.iter().all(|&v| v == black[0]));
        let white = space.log_white_probs(0, 0, 1);
        assert!((white[0] - (0.95f64).ln() as f32).abs() < 1e-6);
    }

    #[test]
    fn test_offset_shifts_rows_with_clamping() {
        let t = PixelTemplate::from_prototype("l", &bar_prototype(4), 2, 4).unwrap();
        let unshifted = t.log_black_probs(0, 0, 3);
        let shifted = t.log_black_probs(0, 2, 3);
        assert_eq!(shifted[8], unshifted[10]);
        assert_eq!(shifted[LINE_HEIGHT - 1], unshifted[LINE_HEIGHT - 1]);
        let down = t.log_black_probs(0, -5, 3);
        assert_eq!(down[0], unshifted[0]);
        assert_eq!(down[15], unshifted[10]);
    }

    #[test]
    fn test_exposure_gain_lightens_ink() {
        let t = PixelTemplate::from_prototype("l", &bar_prototype(3), 3, 3).unwrap();
        let heavy = t.log_black_probs(0, 0, 3)[12];
        let light = t.log_black_probs(2, 0, 3)[12];
        assert!(heavy > light);
        assert!((light - (0.25f64).ln() as f32).abs() < 1e-6);
    }

    #[test]
    fn test_emission_matches_tables() {
        let t = PixelTemplate::from_prototype("l", &bar_prototype(3), 2, 3).unwrap();
        let image = LineImage::filled(4, PixelType::White);
        let lp = t.emission_log_prob(&image, 1, 3, 1, 0);
        let white = t.log_white_probs(1, 0, 2);
        let expected: f32 = white.iter().sum();
        assert!((lp - expected).abs() < 1e-3);
    }

    #[test]
    fn test_width_probs_gate_allowed_widths() {
        let t = PixelTemplate::from_prototype("m", &bar_prototype(5), 3, 5)
            .unwrap()
            .with_width_probs(vec![0.0, 1.0, 3.0])
            .unwrap();
        assert_eq!(t.allowed_widths(), vec![4, 5]);
        assert_eq!(t.width_log_prob(3), f32::NEG_INFINITY);
        assert!((t.width_log_prob(5) - (0.75f64).ln() as f32).abs() < 1e-6);
        assert_eq!(t.width_log_prob(9), f32::NEG_INFINITY);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(PixelTemplate::space(0, 2).is_err());
        assert!(PixelTemplate::from_prototype("a", &[0.0; 3], 1, 2).is_err());
        let t = PixelTemplate::from_prototype("a", &bar_prototype(2), 1, 2).unwrap();
        assert!(t.with_width_probs(vec![1.0]).is_err());
    }

    #[test]
    fn test_increment_and_clear_counts() {
        let t = PixelTemplate::from_prototype("l", &bar_prototype(3), 2, 3).unwrap();
        let mut column = [PixelType::White; LINE_HEIGHT];
        column[0] = PixelType::Black;
        let image = LineImage::new(vec![column; 4]);

        t.increment_counts(0.5, &image, 1, 2, 1, 1);
        let counts = t.counts();
        assert_eq!(counts.width, vec![0.5, 0.0]);
        assert_eq!(counts.black[1][0][1], 0.5);
        assert_eq!(counts.black[1][0][LINE_HEIGHT + 1], 0.5);
        assert_eq!(counts.white[1][0][LINE_HEIGHT - 1], 1.0);
        assert_eq!(counts.total_weight(), 0.5);

        t.clear_counts();
        assert_eq!(t.counts().total_weight(), 0.0);
    }
}
