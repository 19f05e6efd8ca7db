//! Read-only view of a decoder transition state.

use crate::domain::{GlyphChar, TransitionStateType};

/// The fields of a decoder state that the scoring models consult.
///
/// Implementations are owned by the transition model; the substitution and
/// emission models only read them.
pub trait TransitionState {
    /// Language of the state, or `None` outside any language.
    fn language_index(&self) -> Option<usize>;

    /// Language-model character index.
    fn lm_char_index(&self) -> usize;

    /// Kind of transition.
    fn state_type(&self) -> TransitionStateType;

    /// What is rendered for this state.
    fn glyph_char(&self) -> GlyphChar;

    /// Vertical offset in `-MAX_OFFSET..=MAX_OFFSET`.
    fn offset(&self) -> i32;

    /// Ink exposure level.
    fn exposure(&self) -> usize;
}

impl<T: TransitionState + ?Sized> TransitionState for &T {
    fn language_index(&self) -> Option<usize> {
        (**self).language_index()
    }

    fn lm_char_index(&self) -> usize {
        (**self).lm_char_index()
    }

    fn state_type(&self) -> TransitionStateType {
        (**self).state_type()
    }

    fn glyph_char(&self) -> GlyphChar {
        (**self).glyph_char()
    }

    fn offset(&self) -> i32 {
        (**self).offset()
    }

    fn exposure(&self) -> usize {
        (**self).exposure()
    }
}
