//! Constants used throughout the scoring core.
//!
//! This module defines the fixed geometry of a rendered line image and of the
//! template rendering variants (exposure levels and vertical offsets).

/// Height, in pixels, of every normalized line image and template column.
pub const LINE_HEIGHT: usize = 30;

/// Ink gain applied at each exposure level, from heaviest to lightest.
pub const EXP_GAINS: [f32; 3] = [1.0, 0.5, 0.25];

/// Number of ink-exposure levels a template can be rendered at.
pub const NUM_EXPOSURES: usize = EXP_GAINS.len();

/// Probability that a pixel of a blank column is black, per exposure level.
pub const SPACE_BLACK_PROBS: [f32; NUM_EXPOSURES] = [5e-2, 2e-2, 1e-1];

/// Largest vertical offset, in pixels, in either direction.
pub const MAX_OFFSET: i32 = 5;

/// Number of distinct vertical offsets, `-MAX_OFFSET..=MAX_OFFSET`.
pub const NUM_OFFSETS: usize = (2 * MAX_OFFSET + 1) as usize;

/// Counts at or below this value are treated as zero when normalizing.
pub const NEAR_ZERO_COUNT: f64 = 1e-9;

/// Maps a signed vertical offset to its slot in `0..NUM_OFFSETS`.
#[inline]
pub fn offset_slot(offset: i32) -> usize {
    debug_assert!((-MAX_OFFSET..=MAX_OFFSET).contains(&offset));
    (offset + MAX_OFFSET) as usize
}

/// Iterates every vertical offset from `-MAX_OFFSET` to `MAX_OFFSET`.
#[inline]
pub fn offsets() -> impl Iterator<Item = i32> {
    -MAX_OFFSET..=MAX_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_slots_cover_range() {
        let slots: Vec<usize> = offsets().map(offset_slot).collect();
        assert_eq!(slots.len(), NUM_OFFSETS);
        assert_eq!(slots[0], 0);
        assert_eq!(slots[NUM_OFFSETS - 1], NUM_OFFSETS - 1);
        assert_eq!(offset_slot(0), MAX_OFFSET as usize);
    }
}
