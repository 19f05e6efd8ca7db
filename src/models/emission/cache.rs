//! Flat storage for cached emission log-probabilities.
//!
//! Conceptually the cache is `[sequence][position][char][offset][width]`,
//! with a per-character width range. It is stored as one `Vec<f32>`: each
//! sequence is a contiguous run of position blocks, and each position block
//! holds every character's `NUM_OFFSETS * width_span` cells back to back.
//! Position blocks are disjoint, so workers can fill them independently.

use crate::core::constants::{MAX_OFFSET, NUM_OFFSETS, offset_slot};

/// Index arithmetic for an [`EmissionCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    sequence_lengths: Vec<usize>,
    sequence_offsets: Vec<usize>,
    min_widths: Vec<usize>,
    width_spans: Vec<usize>,
    char_offsets: Vec<usize>,
    position_stride: usize,
}

impl CacheLayout {
    /// Layout for sequences of the given lengths, where character `c` may
    /// occupy total widths `min_widths[c]..=max_widths[c]`.
    pub fn new(sequence_lengths: &[usize], min_widths: &[usize], max_widths: &[usize]) -> Self {
        debug_assert_eq!(min_widths.len(), max_widths.len());
        let width_spans: Vec<usize> = min_widths
            .iter()
            .zip(max_widths)
            .map(|(&lo, &hi)| hi + 1 - lo)
            .collect();

        let mut char_offsets = Vec::with_capacity(width_spans.len());
        let mut position_stride = 0;
        for span in &width_spans {
            char_offsets.push(position_stride);
            position_stride += NUM_OFFSETS * span;
        }

        let mut sequence_offsets = Vec::with_capacity(sequence_lengths.len());
        let mut total = 0;
        for len in sequence_lengths {
            sequence_offsets.push(total);
            total += len * position_stride;
        }

        Self {
            sequence_lengths: sequence_lengths.to_vec(),
            sequence_offsets,
            min_widths: min_widths.to_vec(),
            width_spans,
            char_offsets,
            position_stride,
        }
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.sequence_lengths
            .iter()
            .map(|len| len * self.position_stride)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cells per position block.
    pub fn position_stride(&self) -> usize {
        self.position_stride
    }

    pub fn num_sequences(&self) -> usize {
        self.sequence_lengths.len()
    }

    pub fn sequence_length(&self, d: usize) -> usize {
        self.sequence_lengths[d]
    }

    /// Position of a cell inside its position block, or `None` if `w` is
    /// outside the character's width range.
    ///
    /// Panics if `offset` is outside `-MAX_OFFSET..=MAX_OFFSET`.
    #[inline]
    pub fn cell_in_block(&self, c: usize, offset: i32, w: usize) -> Option<usize> {
        assert!(
            (-MAX_OFFSET..=MAX_OFFSET).contains(&offset),
            "vertical offset {offset} out of range"
        );
        let lo = self.min_widths[c];
        if w < lo || w - lo >= self.width_spans[c] {
            return None;
        }
        Some(self.char_offsets[c] + offset_slot(offset) * self.width_spans[c] + (w - lo))
    }

    /// Absolute position of a cell, or `None` for an infeasible width.
    ///
    /// Panics if `d`, `t` or `c` is out of range.
    #[inline]
    pub fn index(&self, d: usize, t: usize, c: usize, offset: i32, w: usize) -> Option<usize> {
        assert!(
            t < self.sequence_lengths[d],
            "position {t} out of range for sequence {d}"
        );
        self.cell_in_block(c, offset, w)
            .map(|k| self.sequence_offsets[d] + t * self.position_stride + k)
    }
}

/// Best-configuration log-probabilities for every cell of a [`CacheLayout`].
#[derive(Debug, Clone)]
pub struct EmissionCache {
    layout: CacheLayout,
    data: Vec<f32>,
}

impl EmissionCache {
    /// A cache with every cell at negative infinity.
    pub fn new(layout: CacheLayout) -> Self {
        let data = vec![f32::NEG_INFINITY; layout.len()];
        Self { layout, data }
    }

    /// Cached value, or negative infinity for an infeasible width.
    pub fn get(&self, d: usize, t: usize, c: usize, offset: i32, w: usize) -> f32 {
        match self.layout.index(d, t, c, offset, w) {
            Some(i) => self.data[i],
            None => f32::NEG_INFINITY,
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the cell storage in gigabytes.
    pub fn estimate_memory_gb(&self) -> f64 {
        estimate_memory_gb(self.data.len())
    }

    /// The layout together with one mutable slice per sequence.
    pub fn split_sequences_mut(&mut self) -> (&CacheLayout, Vec<&mut [f32]>) {
        let mut slices = Vec::with_capacity(self.layout.num_sequences());
        let mut rest: &mut [f32] = &mut self.data;
        for len in &self.layout.sequence_lengths {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(len * self.layout.position_stride);
            slices.push(head);
            rest = tail;
        }
        (&self.layout, slices)
    }

    /// Raw cell values.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Gigabytes needed to store `cells` single-precision values.
pub fn estimate_memory_gb(cells: usize) -> f64 {
    4.0 * cells as f64 / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> CacheLayout {
        // two chars: widths 3..=5 and 2..=2
        CacheLayout::new(&[4, 2], &[3, 2], &[5, 2])
    }

    #[test]
    fn test_layout_sizes() {
        let layout = layout();
        assert_eq!(layout.position_stride(), NUM_OFFSETS * 3 + NUM_OFFSETS);
        assert_eq!(layout.len(), 6 * layout.position_stride());
    }

    #[test]
    fn test_indices_are_distinct() {
        let layout = layout();
        let mut seen = std::collections::HashSet::new();
        for d in 0..2 {
            for t in 0..layout.sequence_length(d) {
                for offset in -MAX_OFFSET..=MAX_OFFSET {
                    for w in 3..=5 {
                        assert!(seen.insert(layout.index(d, t, 0, offset, w).unwrap()));
                    }
                    assert!(seen.insert(layout.index(d, t, 1, offset, 2).unwrap()));
                }
            }
        }
        assert_eq!(seen.len(), layout.len());
        assert!(seen.iter().all(|&i| i < layout.len()));
    }

    #[test]
    fn test_infeasible_widths_are_neg_infinity() {
        let mut cache = EmissionCache::new(layout());
        {
            let (layout, mut slices) = cache.split_sequences_mut();
            let k = layout.cell_in_block(0, 0, 4).unwrap();
            slices[0][layout.position_stride() + k] = -3.0;
        }
        assert_eq!(cache.get(0, 1, 0, 0, 4), -3.0);
        assert_eq!(cache.get(0, 1, 0, 0, 2), f32::NEG_INFINITY);
        assert_eq!(cache.get(0, 1, 0, 0, 6), f32::NEG_INFINITY);
        assert_eq!(cache.get(0, 1, 0, 1, 4), f32::NEG_INFINITY);
    }

    #[test]
    fn test_split_sequences() {
        let mut cache = EmissionCache::new(layout());
        let (layout, slices) = cache.split_sequences_mut();
        let stride = layout.position_stride();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), 4 * stride);
        assert_eq!(slices[1].len(), 2 * stride);
    }

    #[test]
    fn test_memory_estimate() {
        assert!((estimate_memory_gb(250_000_000) - 1.0).abs() < 1e-12);
        let cache = EmissionCache::new(layout());
        assert_eq!(cache.estimate_memory_gb(), 4.0 * cache.len() as f64 / 1e9);
    }

    #[test]
    #[should_panic]
    fn test_position_out_of_range_panics() {
        EmissionCache::new(layout()).get(1, 2, 0, 0, 3);
    }
}
