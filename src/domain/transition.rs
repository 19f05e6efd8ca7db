//! Decoder transition states as seen by the scoring models.
//!
//! The transition graph and its search live outside this crate. The models
//! only read the fields exposed by [`TransitionState`]; the concrete types here
//! are a plain-data implementation for callers and tests, and a [`DecodeState`]
//! that records one step of a decoded path.

use serde::{Deserialize, Serialize};

use super::glyph::GlyphChar;
use crate::core::traits::TransitionState;

/// Closed set of transition kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionStateType {
    /// A character template is emitted.
    Template,
    /// Left margin of a line.
    LeftMargin,
    /// Left margin following a line-break hyphen.
    LeftMarginHyphen,
    /// Right margin of a line.
    RightMargin,
    /// First step of a line-break hyphen at the right margin.
    RightMarginHyphenInit,
    /// Continuation of a line-break hyphen at the right margin.
    RightMarginHyphen,
}

impl TransitionStateType {
    pub fn is_margin(self) -> bool {
        !matches!(self, TransitionStateType::Template)
    }
}

/// Plain-data transition state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BasicTransitionState {
    pub language: Option<usize>,
    pub lm_char: usize,
    pub state_type: TransitionStateType,
    pub glyph: GlyphChar,
    pub offset: i32,
    pub exposure: usize,
}

impl BasicTransitionState {
    /// A template-emitting state with zero offset and the heaviest exposure.
    pub fn template(language: Option<usize>, lm_char: usize, glyph: GlyphChar) -> Self {
        Self {
            language,
            lm_char,
            state_type: TransitionStateType::Template,
            glyph,
            offset: 0,
            exposure: 0,
        }
    }

    pub fn with_type(mut self, state_type: TransitionStateType) -> Self {
        self.state_type = state_type;
        self
    }

    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_exposure(mut self, exposure: usize) -> Self {
        self.exposure = exposure;
        self
    }
}

impl TransitionState for BasicTransitionState {
    fn language_index(&self) -> Option<usize> {
        self.language
    }

    fn lm_char_index(&self) -> usize {
        self.lm_char
    }

    fn state_type(&self) -> TransitionStateType {
        self.state_type
    }

    fn glyph_char(&self) -> GlyphChar {
        self.glyph
    }

    fn offset(&self) -> i32 {
        self.offset
    }

    fn exposure(&self) -> usize {
        self.exposure
    }
}

/// One step of a decoded path, with the widths and rendering chosen for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeState<S> {
    pub state: S,
    pub char_and_pad_width: usize,
    pub pad_width: usize,
    pub exposure: usize,
    pub vertical_offset: i32,
}

impl<S: TransitionState> DecodeState<S> {
    pub fn new(
        state: S,
        char_and_pad_width: usize,
        pad_width: usize,
        exposure: usize,
        vertical_offset: i32,
    ) -> Self {
        debug_assert!(pad_width <= char_and_pad_width);
        Self {
            state,
            char_and_pad_width,
            pad_width,
            exposure,
            vertical_offset,
        }
    }

    /// Width of the rendered glyph without its padding.
    pub fn char_width(&self) -> usize {
        self.char_and_pad_width - self.pad_width
    }
}
