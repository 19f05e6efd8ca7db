//! Rendered glyph variants.
//!
//! A [`GlyphChar`] names what is actually printed for one decoding step: either
//! a normal rendering of some template character, or one of the special empty
//! or decorated variants produced by elision and doubling.

use serde::{Deserialize, Serialize};

/// Number of glyph types other than [`GlyphType::NormalChar`].
pub const NUM_SPECIAL_GLYPHS: usize = 5;

/// Closed set of glyph rendering variants.
///
/// The declaration order fixes each variant's ordinal, which in turn fixes the
/// column it occupies in substitution tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GlyphType {
    /// The character is printed with a tilde marking an elided successor.
    ElisionTilde,
    /// The character is dropped after a tilde-marked predecessor.
    TildeElided,
    /// The character is dropped as the first of an elided run.
    FirstElided,
    /// The character is printed twice.
    Doubled,
    /// The character is dropped.
    Elided,
    /// The character is printed normally.
    NormalChar,
}

impl GlyphType {
    /// Every special variant, in ordinal order.
    pub const SPECIAL: [GlyphType; NUM_SPECIAL_GLYPHS] = [
        GlyphType::ElisionTilde,
        GlyphType::TildeElided,
        GlyphType::FirstElided,
        GlyphType::Doubled,
        GlyphType::Elided,
    ];

    /// Position of the variant in declaration order.
    #[inline]
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Inverse of [`ordinal`](Self::ordinal).
    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        match ordinal {
            0 => Some(GlyphType::ElisionTilde),
            1 => Some(GlyphType::TildeElided),
            2 => Some(GlyphType::FirstElided),
            3 => Some(GlyphType::Doubled),
            4 => Some(GlyphType::Elided),
            5 => Some(GlyphType::NormalChar),
            _ => None,
        }
    }
}

impl std::fmt::Display for GlyphType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GlyphType::ElisionTilde => "ELISION_TILDE",
            GlyphType::TildeElided => "TILDE_ELIDED",
            GlyphType::FirstElided => "FIRST_ELIDED",
            GlyphType::Doubled => "DOUBLED",
            GlyphType::Elided => "ELIDED",
            GlyphType::NormalChar => "NORMAL_CHAR",
        };
        f.write_str(name)
    }
}

/// What is rendered for one decoding step.
///
/// For non-normal variants `template_char_index` still names the underlying
/// character being elided or doubled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlyphChar {
    pub template_char_index: usize,
    pub glyph_type: GlyphType,
}

impl GlyphChar {
    pub fn new(template_char_index: usize, glyph_type: GlyphType) -> Self {
        Self {
            template_char_index,
            glyph_type,
        }
    }

    /// A normal rendering of `template_char_index`.
    pub fn normal(template_char_index: usize) -> Self {
        Self::new(template_char_index, GlyphType::NormalChar)
    }

    /// Whether nothing is printed for this step.
    pub fn is_elided(&self) -> bool {
        matches!(
            self.glyph_type,
            GlyphType::TildeElided | GlyphType::FirstElided | GlyphType::Elided
        )
    }

    /// Column of this glyph in a table with `num_chars` normal glyphs.
    ///
    /// Normal glyphs map to their character index; each special variant maps
    /// to `num_chars + ordinal`.
    #[inline]
    pub fn glyph_index(&self, num_chars: usize) -> usize {
        match self.glyph_type {
            GlyphType::NormalChar => self.template_char_index,
            special => num_chars + special.ordinal(),
        }
    }

    /// Total table width for an alphabet of `num_chars` characters.
    #[inline]
    pub fn num_glyphs(num_chars: usize) -> usize {
        num_chars + NUM_SPECIAL_GLYPHS
    }

    /// Splits a glyph column back into `None` for a normal character, or the
    /// special variant occupying it.
    pub fn special_type_at(glyph_index: usize, num_chars: usize) -> Option<GlyphType> {
        glyph_index
            .checked_sub(num_chars)
            .and_then(GlyphType::from_ordinal)
            .filter(|t| *t != GlyphType::NormalChar)
    }
}

impl std::fmt::Display for GlyphChar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.glyph_type, self.template_char_index)
    }
}
