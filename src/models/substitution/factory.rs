//! Smoothing, count accumulation and re-estimation for the glyph
//! substitution model.
//!
//! The factory holds everything that stays fixed across EM iterations: the
//! smoothing constants, the indexers, the per-language active character sets
//! and the orthographic side tables. Each iteration starts from
//! [`initialize_counts`](BasicGlyphSubstitutionModelFactory::initialize_counts),
//! adds counts along decoded paths, and normalizes into a fresh model.

use ndarray::{Array3, Axis, Zip};
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use super::basic::BasicGlyphSubstitutionModel;
use crate::core::config::{ConfigValidator, GsmConfig};
use crate::core::constants::NEAR_ZERO_COUNT;
use crate::core::traits::TransitionState;
use crate::core::{OCRError, OcrResult};
use crate::domain::charset::{self, OrthographyRules};
use crate::domain::{DecodeState, GlyphChar, GlyphType, SymbolIndexer, TransitionStateType};

/// Mutable `[language][lm char][glyph]` count table.
#[derive(Debug, Clone, PartialEq)]
pub struct GsmCounts {
    counts: Array3<f64>,
}

impl GsmCounts {
    /// An all-zero table.
    pub fn zeros(num_languages: usize, num_chars: usize, num_glyphs: usize) -> Self {
        Self {
            counts: Array3::zeros((num_languages, num_chars, num_glyphs)),
        }
    }

    pub fn from_array(counts: Array3<f64>) -> Self {
        Self { counts }
    }

    pub fn get(&self, language: usize, lm_char: usize, glyph: usize) -> f64 {
        self.counts[[language, lm_char, glyph]]
    }

    pub fn add(&mut self, language: usize, lm_char: usize, glyph: usize, amount: f64) {
        self.counts[[language, lm_char, glyph]] += amount;
    }

    /// Adds another table of the same shape cell by cell.
    ///
    /// # Errors
    ///
    /// Returns `OCRError::InvalidInput` if the shapes differ.
    pub fn merge(&mut self, other: &GsmCounts) -> OcrResult<()> {
        if self.counts.dim() != other.counts.dim() {
            return Err(OCRError::invalid_input(format!(
                "cannot merge count tables of shapes {:?} and {:?}",
                self.counts.dim(),
                other.counts.dim()
            )));
        }
        self.counts += &other.counts;
        Ok(())
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.counts.dim()
    }

    pub fn as_array(&self) -> &Array3<f64> {
        &self.counts
    }

    pub fn into_array(self) -> Array3<f64> {
        self.counts
    }
}

/// Builds glyph substitution models from smoothed counts.
#[derive(Debug, Clone)]
pub struct BasicGlyphSubstitutionModelFactory {
    config: GsmConfig,
    lang_indexer: Arc<SymbolIndexer>,
    char_indexer: Arc<SymbolIndexer>,
    active_character_sets: Vec<HashSet<usize>>,
    rules: OrthographyRules,
    num_languages: usize,
    num_chars: usize,
    num_glyphs: usize,
}

impl BasicGlyphSubstitutionModelFactory {
    /// Creates a factory.
    ///
    /// # Arguments
    ///
    /// * `config` - Smoothing constants, power and evaluation threshold.
    /// * `lang_indexer` - Languages; one active character set per language.
    /// * `char_indexer` - The full character alphabet.
    /// * `active_character_sets` - Characters each language may produce.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is invalid, either indexer
    /// is empty, or the active character sets do not match the languages.
    pub fn new(
        config: GsmConfig,
        lang_indexer: Arc<SymbolIndexer>,
        char_indexer: Arc<SymbolIndexer>,
        active_character_sets: Vec<HashSet<usize>>,
    ) -> OcrResult<Self> {
        config.validate()?;
        if lang_indexer.is_empty() {
            return Err(OCRError::config_error_detailed(
                "glyph substitution",
                "language indexer is empty",
            ));
        }
        if char_indexer.is_empty() {
            return Err(OCRError::config_error_detailed(
                "glyph substitution",
                "character indexer is empty",
            ));
        }
        if active_character_sets.len() != lang_indexer.len() {
            return Err(OCRError::config_error_detailed(
                "glyph substitution",
                format!(
                    "{} active character sets for {} languages",
                    active_character_sets.len(),
                    lang_indexer.len()
                ),
            ));
        }
        if let Some(language) = active_character_sets.iter().position(HashSet::is_empty) {
            return Err(OCRError::config_error_detailed(
                "glyph substitution",
                format!(
                    "active character set for '{}' is empty",
                    lang_indexer.get_object(language).unwrap_or("?")
                ),
            ));
        }

        let rules = OrthographyRules::from_indexer(&char_indexer);
        let num_languages = lang_indexer.len();
        let num_chars = char_indexer.len();
        Ok(Self {
            config,
            lang_indexer,
            char_indexer,
            active_character_sets,
            rules,
            num_languages,
            num_chars,
            num_glyphs: GlyphChar::num_glyphs(num_chars),
        })
    }

    pub fn config(&self) -> &GsmConfig {
        &self.config
    }

    pub fn rules(&self) -> &OrthographyRules {
        &self.rules
    }

    pub fn num_languages(&self) -> usize {
        self.num_languages
    }

    pub fn num_chars(&self) -> usize {
        self.num_chars
    }

    pub fn num_glyphs(&self) -> usize {
        self.num_glyphs
    }

    pub fn glyph_elision_tilde(&self) -> usize {
        self.num_chars + GlyphType::ElisionTilde.ordinal()
    }

    pub fn glyph_tilde_elided(&self) -> usize {
        self.num_chars + GlyphType::TildeElided.ordinal()
    }

    pub fn glyph_first_elided(&self) -> usize {
        self.num_chars + GlyphType::FirstElided.ordinal()
    }

    pub fn glyph_doubled(&self) -> usize {
        self.num_chars + GlyphType::Doubled.ordinal()
    }

    pub fn glyph_elided(&self) -> usize {
        self.num_chars + GlyphType::Elided.ordinal()
    }

    /// Column of `glyph` in the count and probability tables.
    pub fn glyph_index(&self, glyph: GlyphChar) -> usize {
        glyph.glyph_index(self.num_chars)
    }

    /// The model obtained from smoothing counts alone.
    pub fn uniform(&self) -> BasicGlyphSubstitutionModel {
        self.make(&self.initialize_counts(), 0, 0)
    }

    /// A count table holding only the smoothing pseudo-counts.
    pub fn initialize_counts(&self) -> GsmCounts {
        let counts = Array3::from_shape_fn(
            (self.num_languages, self.num_chars, self.num_glyphs),
            |(language, lm_char, glyph)| self.get_smoothing_value(language, lm_char, glyph),
        );
        GsmCounts::from_array(counts)
    }

    /// Smoothing pseudo-count for one `(language, lm char, glyph)` cell.
    ///
    /// Panics if `language` is out of range.
    pub fn get_smoothing_value(&self, language: usize, lm_char: usize, glyph: usize) -> f64 {
        let base = self.config.smoothing_count;
        let elevated = base * self.config.elision_smoothing_multiplier;
        let rules = &self.rules;
        let active = &self.active_character_sets[language];

        // lm char must be valid for the language
        if !(active.contains(&lm_char) || Some(lm_char) == rules.hyphen_char) {
            return 0.0;
        }

        match GlyphChar::special_type_at(glyph, self.num_chars) {
            Some(GlyphType::ElisionTilde) => {
                if rules.add_tilde.contains_key(&lm_char) {
                    elevated
                } else {
                    0.0
                }
            }
            Some(GlyphType::TildeElided) | Some(GlyphType::FirstElided) => {
                if rules.can_be_elided.contains(&lm_char) {
                    elevated
                } else {
                    0.0
                }
            }
            Some(GlyphType::Doubled) => {
                if rules.can_be_doubled.contains(&lm_char) {
                    base
                } else {
                    0.0
                }
            }
            Some(GlyphType::Elided) => {
                if rules.can_be_elided.contains(&lm_char) {
                    base
                } else {
                    0.0
                }
            }
            Some(GlyphType::NormalChar) | None => {
                let is_s = Some(lm_char) == rules.s_char;
                if rules.diacritic_disregard.get(&lm_char) == Some(&glyph) {
                    elevated
                } else if is_s && Some(glyph) == rules.long_s_char {
                    base
                } else if is_s && (Some(glyph) == rules.f_char || Some(glyph) == rules.l_char) {
                    0.0
                } else if Some(lm_char) == rules.hyphen_char && Some(glyph) == rules.space_char {
                    // line-break hyphens may be elided
                    base
                } else if rules.can_be_replaced.contains(&lm_char)
                    && rules.valid_substitutions.contains(&glyph)
                    && active.contains(&glyph)
                {
                    base
                } else if lm_char == glyph {
                    base
                } else {
                    0.0
                }
            }
        }
    }

    /// Adds one count per template step of a decoded path.
    ///
    /// Template steps credit `(language, lm char, glyph)`. A right-margin
    /// hyphen-init step that renders a space credits the hyphen instead, so a
    /// dropped line-break hyphen is attributed to the hyphen character.
    /// Steps without a language are skipped.
    pub fn increment_counts<S: TransitionState>(
        &self,
        counts: &mut GsmCounts,
        path: &[DecodeState<S>],
    ) {
        for step in path {
            let ts = &step.state;
            let Some(language) = ts.language_index() else {
                continue;
            };
            match ts.state_type() {
                TransitionStateType::Template => {
                    let glyph = self.glyph_index(ts.glyph_char());
                    counts.add(language, ts.lm_char_index(), glyph, 1.0);
                }
                TransitionStateType::RightMarginHyphenInit => {
                    let glyph_char = ts.glyph_char();
                    if let Some(hyphen) = self.rules.hyphen_char
                        && Some(glyph_char.template_char_index) == self.rules.space_char
                    {
                        counts.add(language, hyphen, self.glyph_index(glyph_char), 1.0);
                    }
                }
                _ => {}
            }
        }
    }

    /// Normalizes each `(language, lm char)` row of `counts` into a new model.
    ///
    /// Cells at or below the near-zero threshold get probability zero; an
    /// all-zero row stays all zero.
    pub fn make(
        &self,
        counts: &GsmCounts,
        iter: usize,
        batch_id: usize,
    ) -> BasicGlyphSubstitutionModel {
        tracing::debug!(
            "Estimating parameters of a new glyph substitution model. Iter: {}, batch: {}",
            iter,
            batch_id
        );
        self.to_model(normalize_rows(counts.as_array()))
    }

    /// Builds the evaluation model using the configured count threshold.
    pub fn make_for_eval(
        &self,
        counts: &GsmCounts,
        iter: usize,
        batch_id: usize,
    ) -> BasicGlyphSubstitutionModel {
        self.make_for_eval_with_min(counts, iter, batch_id, self.config.min_count_for_eval)
    }

    /// Builds a model from observed counts only, dropping rare events.
    ///
    /// The base smoothing count is subtracted from every cell, so elevated
    /// cells keep their excess prior mass. Cells whose remaining count is
    /// below `min_count` are zeroed before normalizing. A threshold below 1
    /// keeps every event and is identical to [`make`](Self::make).
    pub fn make_for_eval_with_min(
        &self,
        counts: &GsmCounts,
        iter: usize,
        batch_id: usize,
        min_count: f64,
    ) -> BasicGlyphSubstitutionModel {
        if min_count < 1.0 {
            return self.make(counts, iter, batch_id);
        }
        tracing::debug!(
            "Estimating parameters of an evaluation glyph substitution model (min count {}). Iter: {}, batch: {}",
            min_count,
            iter,
            batch_id
        );
        let eval_counts = Array3::from_shape_fn(counts.dim(), |(language, lm_char, glyph)| {
            let true_count = counts.get(language, lm_char, glyph) - self.config.smoothing_count;
            if true_count < NEAR_ZERO_COUNT || true_count < min_count - NEAR_ZERO_COUNT {
                0.0
            } else {
                true_count
            }
        });
        self.to_model(normalize_rows(&eval_counts))
    }

    /// Writes a tab-separated summary of `counts` and `model`.
    ///
    /// Rows are emitted for every cell with more than the base smoothing
    /// count, plus a fixed set of diagnostic characters.
    pub fn write_report<W: Write>(
        &self,
        writer: &mut W,
        counts: &GsmCounts,
        model: &BasicGlyphSubstitutionModel,
    ) -> OcrResult<()> {
        let always: HashSet<&str> = [
            charset::SPACE,
            charset::HYPHEN,
            "a",
            "b",
            "c",
            "d",
            charset::LONG_S,
        ]
        .into_iter()
        .collect();

        writeln!(writer, "language\tlm_char\tglyph\tcount\tmin_prob\tprob")?;
        for language in 0..self.num_languages {
            let language_name = self.lang_indexer.get_object(language).unwrap_or("?");
            for lm_char in 0..self.num_chars {
                let lm_name = self.char_indexer.get_object(lm_char).unwrap_or("?");
                let row = model.probs().index_axis(Axis(0), language);
                let row = row.index_axis(Axis(0), lm_char);
                let min_prob = row.iter().copied().fold(f64::INFINITY, f64::min);
                for glyph in 0..self.num_glyphs {
                    let glyph_name = match GlyphChar::special_type_at(glyph, self.num_chars) {
                        Some(special) => special.to_string(),
                        None => self.char_indexer.get_object(glyph).unwrap_or("?").to_string(),
                    };
                    let c = counts.get(language, lm_char, glyph);
                    let show = c > self.config.smoothing_count
                        || (always.contains(lm_name)
                            && (always.contains(glyph_name.as_str()) || glyph >= self.num_chars));
                    if show {
                        writeln!(
                            writer,
                            "{}\t{}\t{}\t{}\t{}\t{}",
                            language_name, lm_name, glyph_name, c, min_prob, row[glyph]
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn to_model(&self, probs: Array3<f64>) -> BasicGlyphSubstitutionModel {
        BasicGlyphSubstitutionModel::new(
            probs,
            self.config.gsm_power,
            Arc::clone(&self.lang_indexer),
            Arc::clone(&self.char_indexer),
        )
    }
}

fn normalize_rows(counts: &Array3<f64>) -> Array3<f64> {
    let mut probs = Array3::zeros(counts.raw_dim());
    Zip::from(probs.lanes_mut(Axis(2)))
        .and(counts.lanes(Axis(2)))
        .for_each(|mut out, row| {
            let sum = row.sum();
            for (p, &c) in out.iter_mut().zip(row.iter()) {
                *p = if c > NEAR_ZERO_COUNT { c / sum } else { 0.0 };
            }
        });
    probs
}
