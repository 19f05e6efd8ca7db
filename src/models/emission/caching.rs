//! Caching emission model.
//!
//! Every rebuild scores each character template against every column of
//! every line image through a [`ScoreKernel`], then folds in padding and
//! exposure by keeping, per cell, the best `(exposure, padding width)`
//! configuration for each total width. Arg-maxes are not stored; the getters
//! re-derive them with the same arithmetic the rebuild uses.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use rayon::ThreadPool;
use rayon::prelude::*;

use super::cache::{CacheLayout, EmissionCache, estimate_memory_gb};
use crate::core::config::{ConfigValidator, EmissionConfig, ParallelPolicy};
use crate::core::constants::{LINE_HEIGHT, NUM_EXPOSURES, NUM_OFFSETS, offset_slot, offsets};
use crate::core::traits::{
    CharacterTemplate, EmissionModel, KernelTemplates, ScoreKernel, TransitionState,
    template_match_score,
};
use crate::core::{OCRError, OcrResult, ProcessingStage};
use crate::domain::charset::SPACE;
use crate::domain::{LineImage, SymbolIndexer};

/// Per-character width tables derived from the current templates.
#[derive(Debug, Clone)]
struct WidthTables {
    /// Template widths with nonzero probability, per character.
    template_widths: Vec<Vec<usize>>,
    /// Sorted total widths (template plus padding), per character.
    total_widths: Vec<Vec<usize>>,
    min_total: Vec<usize>,
    max_total: Vec<usize>,
    min_template_width: usize,
    max_template_width: usize,
}

impl WidthTables {
    fn new(templates: &[Arc<dyn CharacterTemplate>], pad_min: usize, pad_max: usize) -> Self {
        let mut template_widths = Vec::with_capacity(templates.len());
        let mut total_widths = Vec::with_capacity(templates.len());
        let mut min_total = Vec::with_capacity(templates.len());
        let mut max_total = Vec::with_capacity(templates.len());
        for template in templates {
            let allowed = template.allowed_widths();
            let totals: BTreeSet<usize> = allowed
                .iter()
                .flat_map(|&tw| (pad_min..=pad_max).map(move |pw| tw + pw))
                .collect();
            template_widths.push(allowed);
            total_widths.push(totals.into_iter().collect());
            min_total.push(template.template_min_width() + pad_min);
            max_total.push(template.template_max_width() + pad_max);
        }
        let min_template_width = templates
            .iter()
            .map(|t| t.template_min_width())
            .min()
            .unwrap_or(0);
        let max_template_width = templates
            .iter()
            .map(|t| t.template_max_width())
            .max()
            .unwrap_or(0);
        Self {
            template_widths,
            total_widths,
            min_total,
            max_total,
            min_template_width,
            max_template_width,
        }
    }
}

/// Where each `(char, template width)` block starts in its kernel width slot.
///
/// Within a block, index `e * NUM_OFFSETS + offset_slot(offset)` selects the
/// exposure and offset variant.
#[derive(Debug, Clone)]
struct TemplateIndex {
    min_template_width: usize,
    base: Vec<Vec<Option<usize>>>,
}

impl TemplateIndex {
    #[inline]
    fn get(&self, c: usize, tw: usize, exposure: usize, offset: i32) -> usize {
        let base = self.base[c][tw - self.min_template_width]
            .unwrap_or_else(|| panic!("template width {tw} is not allowed for char {c}"));
        base + exposure * NUM_OFFSETS + offset_slot(offset)
    }
}

/// Everything a successful rebuild installs.
struct BuiltCache {
    tables: WidthTables,
    // [sequence][position * NUM_EXPOSURES + exposure]
    whitespace: Vec<Vec<f32>>,
    cache: EmissionCache,
}

/// Best configuration for one `(sequence, position, state, width)` query.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Configuration {
    exposure: usize,
    pad_width: usize,
    score: f32,
}

/// Emission model backed by a rebuildable cache of best-configuration scores.
pub struct CachingEmissionModel {
    templates: Arc<[Arc<dyn CharacterTemplate>]>,
    observations: Arc<[LineImage]>,
    space_index: usize,
    config: EmissionConfig,
    policy: ParallelPolicy,
    kernel: Box<dyn ScoreKernel>,
    pool: ThreadPool,
    built: Option<BuiltCache>,
}

impl CachingEmissionModel {
    /// Creates a model over shared templates and line images.
    ///
    /// `templates[c]` renders the character with index `c` in `indexer`. The
    /// worker pool is sized from the kernel's thread counts, capped by the
    /// configured maximum. The cache is empty until the first
    /// [`rebuild_cache`](EmissionModel::rebuild_cache).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, there are no
    /// templates or no line images, the template count does not match the
    /// indexer, or the indexer has no space template.
    pub fn new(
        templates: Arc<[Arc<dyn CharacterTemplate>]>,
        indexer: &SymbolIndexer,
        observations: Arc<[LineImage]>,
        config: EmissionConfig,
        kernel: Box<dyn ScoreKernel>,
    ) -> OcrResult<Self> {
        config.validate()?;
        if templates.is_empty() {
            return Err(OCRError::invalid_input("emission model needs at least one template"));
        }
        if templates.len() != indexer.len() {
            return Err(OCRError::invalid_input(format!(
                "{} templates for {} indexed characters",
                templates.len(),
                indexer.len()
            )));
        }
        if observations.is_empty() {
            return Err(OCRError::invalid_input("emission model needs at least one line image"));
        }
        let space_index = indexer
            .get_index(SPACE)
            .ok_or_else(|| OCRError::invalid_input("character indexer has no space"))?;
        if !templates[space_index].is_space() {
            return Err(OCRError::invalid_input(format!(
                "template {} for the space character is not a space template",
                space_index
            )));
        }

        let policy = config
            .parallel
            .clone()
            .with_outer_threads(kernel.num_outer_threads())
            .with_populate_threads(kernel.num_populate_threads());
        let pool = policy.build_thread_pool()?;
        tracing::debug!(
            "Emission model using kernel '{}' on {} threads",
            kernel.name(),
            pool.current_num_threads()
        );

        Ok(Self {
            templates,
            observations,
            space_index,
            config,
            policy,
            kernel,
            pool,
            built: None,
        })
    }

    pub fn config(&self) -> &EmissionConfig {
        &self.config
    }

    pub fn kernel_name(&self) -> &str {
        self.kernel.name()
    }

    pub fn is_cache_built(&self) -> bool {
        self.built.is_some()
    }

    /// Size of the cache for the current templates and line images, in gigabytes.
    pub fn estimate_memory_usage_gb(&self) -> f64 {
        if let Some(built) = &self.built {
            return built.cache.estimate_memory_gb();
        }
        let tables = self.width_tables();
        estimate_memory_gb(self.cache_layout(&tables).len())
    }

    fn built(&self) -> &BuiltCache {
        match &self.built {
            Some(built) => built,
            None => panic!("emission cache queried before rebuild_cache"),
        }
    }

    fn width_tables(&self) -> WidthTables {
        WidthTables::new(
            &self.templates,
            self.config.pad_min_width,
            self.config.pad_max_width,
        )
    }

    fn cache_layout(&self, tables: &WidthTables) -> CacheLayout {
        let lengths: Vec<usize> = self.observations.iter().map(LineImage::len).collect();
        CacheLayout::new(&lengths, &tables.min_total, &tables.max_total)
    }

    /// Log-probability of each blank column under the space template, per exposure.
    fn whitespace_columns(&self) -> Vec<Vec<f32>> {
        let space = &self.templates[self.space_index];
        // one blank column
        let per_exposure: Vec<(Vec<f32>, Vec<f32>)> = (0..NUM_EXPOSURES)
            .map(|e| (space.log_white_probs(e, 0, 1), space.log_black_probs(e, 0, 1)))
            .collect();

        self.observations
            .iter()
            .map(|image| {
                let mut columns = Vec::with_capacity(image.len() * NUM_EXPOSURES);
                for t in 0..image.len() {
                    let white_obs = image.white_column(t);
                    let black_obs = image.black_column(t);
                    for (white, black) in &per_exposure {
                        let mut score = 0.0f32;
                        for (o, p) in white_obs.iter().zip(white) {
                            score += o * p;
                        }
                        for (o, p) in black_obs.iter().zip(black) {
                            score += o * p;
                        }
                        columns.push(score);
                    }
                }
                columns
            })
            .collect()
    }

    /// Flattens every allowed `(char, width, exposure, offset)` template for the kernel.
    fn kernel_templates(&self, tables: &WidthTables) -> (KernelTemplates, TemplateIndex) {
        let min_tw = tables.min_template_width;
        let num_widths = tables.max_template_width + 1 - min_tw;
        let mut white = vec![Vec::new(); num_widths];
        let mut black = vec![Vec::new(); num_widths];
        let mut num_indices = vec![0; num_widths];
        let mut base = vec![vec![None; num_widths]; self.templates.len()];

        for (c, template) in self.templates.iter().enumerate() {
            for &tw in &tables.template_widths[c] {
                let slot = tw - min_tw;
                base[c][slot] = Some(num_indices[slot]);
                for e in 0..NUM_EXPOSURES {
                    for offset in offsets() {
                        white[slot].extend(template.log_white_probs(e, offset, tw));
                        black[slot].extend(template.log_black_probs(e, offset, tw));
                        num_indices[slot] += 1;
                    }
                }
            }
        }

        let mut index_offsets = Vec::with_capacity(num_widths);
        let mut total_indices = 0;
        for n in &num_indices {
            index_offsets.push(total_indices);
            total_indices += n;
        }

        let templates = KernelTemplates {
            white,
            black,
            num_indices,
            index_offsets,
            min_template_width: min_tw,
            max_template_width: tables.max_template_width,
            max_sequence_length: self.observations.iter().map(LineImage::len).max().unwrap_or(0),
            total_indices,
        };
        let index = TemplateIndex {
            min_template_width: min_tw,
            base,
        };
        (templates, index)
    }

    /// Log-probability of `pw` blank columns starting at `start`.
    #[inline]
    fn padding_score(&self, whitespace: &[f32], start: usize, pw: usize, exposure: usize) -> f32 {
        let mut blank = 0.0f32;
        for tt in 0..pw {
            blank += whitespace[(start + tt) * NUM_EXPOSURES + exposure];
        }
        self.pad_width_log_prob(pw) + blank
    }

    /// Width-weighted score of template `c` rendered `tw` columns wide at `t`.
    fn template_score(
        &self,
        d: usize,
        t: usize,
        c: usize,
        tw: usize,
        exposure: usize,
        offset: i32,
    ) -> f32 {
        let template = &self.templates[c];
        let image = &self.observations[d];
        let window = t * LINE_HEIGHT..(t + tw) * LINE_HEIGHT;
        let score = template_match_score(
            &image.white()[window.clone()],
            &image.black()[window],
            &template.log_white_probs(exposure, offset, tw),
            &template.log_black_probs(exposure, offset, tw),
        );
        template.width_log_prob(tw) + score
    }

    /// Arg-max `(exposure, padding width)` for `c` at `offset` spanning `w` columns from `t`.
    fn best_configuration(
        &self,
        d: usize,
        t: usize,
        c: usize,
        offset: i32,
        w: usize,
    ) -> Option<Configuration> {
        let built = self.built();
        if t + w > self.observations[d].len() {
            return None;
        }
        let template_widths = &built.tables.template_widths[c];
        let mut best: Option<Configuration> = None;
        let mut best_score = f32::NEG_INFINITY;
        for exposure in 0..NUM_EXPOSURES {
            for pad_width in self.config.pad_min_width..=self.config.pad_max_width {
                let Some(tw) = w.checked_sub(pad_width) else {
                    continue;
                };
                if !template_widths.contains(&tw) {
                    continue;
                }
                let score = self.template_score(d, t, c, tw, exposure, offset)
                    + self.padding_score(&built.whitespace[d], t + tw, pad_width, exposure);
                if score > best_score {
                    best_score = score;
                    best = Some(Configuration {
                        exposure,
                        pad_width,
                        score,
                    });
                }
            }
        }
        best
    }

    /// Scores every line image and fills `cache`.
    fn populate(
        &self,
        cache: &mut EmissionCache,
        tables: &WidthTables,
        whitespace: &[Vec<f32>],
        kernel_templates: &KernelTemplates,
        index: &TemplateIndex,
    ) -> OcrResult<()> {
        let (layout, sequences) = cache.split_sequences_mut();
        self.pool.install(|| {
            sequences.into_par_iter().enumerate().try_for_each_init(
                Vec::new,
                |scores: &mut Vec<f32>, (d, cells)| {
                    let image = &self.observations[d];
                    let n = image.len();
                    scores.clear();
                    scores.resize(kernel_templates.scores_len(n), 0.0);
                    self.kernel
                        .compute(scores, image.white(), image.black(), n)
                        .map_err(|e| {
                            OCRError::processing(
                                ProcessingStage::ScoreKernel,
                                &format!("line image {}", d),
                                e,
                            )
                        })?;

                    let scores: &[f32] = scores;
                    let fill = |(t, block): (usize, &mut [f32])| {
                        self.populate_position(
                            t,
                            block,
                            layout,
                            tables,
                            &whitespace[d],
                            scores,
                            kernel_templates,
                            index,
                            n,
                        )
                    };
                    let stride = layout.position_stride();
                    if self.policy.should_parallelize_columns(n) {
                        cells.par_chunks_mut(stride).enumerate().for_each(fill);
                    } else {
                        cells.chunks_mut(stride).enumerate().for_each(fill);
                    }
                    Ok(())
                },
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn populate_position(
        &self,
        t: usize,
        block: &mut [f32],
        layout: &CacheLayout,
        tables: &WidthTables,
        whitespace: &[f32],
        scores: &[f32],
        kernel_templates: &KernelTemplates,
        index: &TemplateIndex,
        sequence_length: usize,
    ) {
        let pad_min = self.config.pad_min_width;
        let pad_max = self.config.pad_max_width;
        let mut pads = vec![0.0f32; NUM_EXPOSURES * (pad_max - pad_min + 1)];

        for (c, template) in self.templates.iter().enumerate() {
            for &tw in &tables.template_widths[c] {
                if t + tw + pad_min > sequence_length {
                    continue;
                }
                let pad_limit = pad_max.min(sequence_length - t - tw);
                for e in 0..NUM_EXPOSURES {
                    for pw in pad_min..=pad_limit {
                        pads[e * (pad_max - pad_min + 1) + pw - pad_min] =
                            self.padding_score(whitespace, t + tw, pw, e);
                    }
                }

                let width_log_prob = template.width_log_prob(tw);
                for e in 0..NUM_EXPOSURES {
                    for offset in offsets() {
                        let i = index.get(c, tw, e, offset);
                        let template_score = width_log_prob
                            + scores[kernel_templates.score_index(tw, t, i, sequence_length)];
                        for pw in pad_min..=pad_limit {
                            let value = template_score
                                + pads[e * (pad_max - pad_min + 1) + pw - pad_min];
                            if let Some(k) = layout.cell_in_block(c, offset, tw + pw) {
                                if value > block[k] {
                                    block[k] = value;
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

impl EmissionModel for CachingEmissionModel {
    fn num_chars(&self) -> usize {
        self.templates.len()
    }

    fn num_sequences(&self) -> usize {
        self.observations.len()
    }

    fn sequence_length(&self, d: usize) -> usize {
        self.observations[d].len()
    }

    fn allowed_widths(&self, c: usize) -> &[usize] {
        &self.built().tables.total_widths[c]
    }

    fn log_prob(&self, d: usize, t: usize, c: usize, w: usize) -> f32 {
        let cache = &self.built().cache;
        offsets()
            .map(|offset| cache.get(d, t, c, offset, w))
            .fold(f32::NEG_INFINITY, f32::max)
    }

    fn log_prob_for(&self, d: usize, t: usize, ts: &dyn TransitionState, w: usize) -> f32 {
        let c = ts.glyph_char().template_char_index;
        self.built().cache.get(d, t, c, ts.offset(), w)
    }

    fn get_exposure(
        &self,
        d: usize,
        t: usize,
        ts: &dyn TransitionState,
        w: usize,
    ) -> Option<usize> {
        let c = ts.glyph_char().template_char_index;
        self.best_configuration(d, t, c, ts.offset(), w)
            .map(|best| best.exposure)
    }

    fn get_offset(&self, _d: usize, _t: usize, ts: &dyn TransitionState, _w: usize) -> i32 {
        ts.offset()
    }

    fn get_pad_width(
        &self,
        d: usize,
        t: usize,
        ts: &dyn TransitionState,
        w: usize,
    ) -> Option<usize> {
        let c = ts.glyph_char().template_char_index;
        self.best_configuration(d, t, c, ts.offset(), w)
            .map(|best| best.pad_width)
    }

    fn pad_width_log_prob(&self, _pw: usize) -> f32 {
        let choices = self.config.pad_max_width - self.config.pad_min_width + 1;
        (1.0 / choices as f64).ln() as f32
    }

    fn rebuild_cache(&mut self) -> OcrResult<()> {
        let started = Instant::now();
        let tables = self.width_tables();
        let whitespace = self.whitespace_columns();
        let (kernel_templates, index) = self.kernel_templates(&tables);

        let layout = self.cache_layout(&tables);
        let estimate_gb = estimate_memory_gb(layout.len());
        if estimate_gb > self.config.max_cache_memory_gb {
            tracing::warn!(
                "Emission cache needs {:.3} GB, above the {:.3} GB budget",
                estimate_gb,
                self.config.max_cache_memory_gb
            );
        }
        let mut cache = EmissionCache::new(layout);

        let result = self.kernel.startup(&kernel_templates).and_then(|()| {
            self.populate(&mut cache, &tables, &whitespace, &kernel_templates, &index)
        });
        self.kernel.shutdown();
        if let Err(e) = result {
            tracing::warn!("Emission cache rebuild failed: {}", e);
            return Err(e);
        }

        self.built = Some(BuiltCache {
            tables,
            whitespace,
            cache,
        });
        tracing::info!(
            "Rebuilt emission cache for {} sequences in {} ms ({:.3} GB)",
            self.observations.len(),
            started.elapsed().as_millis(),
            estimate_gb
        );
        Ok(())
    }

    fn increment_count(
        &self,
        d: usize,
        ts: &dyn TransitionState,
        start_col: usize,
        end_col: usize,
        weight: f32,
    ) -> OcrResult<()> {
        if weight <= 0.0 {
            return Ok(());
        }
        let w = end_col.checked_sub(start_col).ok_or_else(|| {
            OCRError::invalid_input(format!("span {}..{} is reversed", start_col, end_col))
        })?;
        let c = ts.glyph_char().template_char_index;
        let offset = ts.offset();
        let best = self
            .best_configuration(d, start_col, c, offset, w)
            .ok_or_else(|| {
                OCRError::invalid_input(format!(
                    "char {} cannot span columns {}..{} of sequence {}",
                    c, start_col, end_col, d
                ))
            })?;
        self.templates[c].increment_counts(
            weight,
            &self.observations[d],
            start_col,
            w - best.pad_width,
            best.exposure,
            offset,
        );
        Ok(())
    }

    fn increment_counts(
        &self,
        d: usize,
        states: &[&dyn TransitionState],
        widths: &[usize],
    ) -> OcrResult<()> {
        if states.len() != widths.len() {
            return Err(OCRError::invalid_input(format!(
                "{} states but {} widths",
                states.len(),
                widths.len()
            )));
        }
        let mut t = 0;
        for (step, (&ts, &w)) in states.iter().zip(widths).enumerate() {
            self.increment_count(d, ts, t, t + w, 1.0).map_err(|e| {
                OCRError::processing(
                    ProcessingStage::CountAccumulation,
                    &format!("step {} at column {} of sequence {}", step, t, d),
                    e,
                )
            })?;
            t += w;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BasicTransitionState, GlyphChar, PixelType};
    use crate::models::emission::CpuScoreKernel;
    use crate::models::template::PixelTemplate;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn prototype(max_width: usize, rows: std::ops::Range<usize>) -> Vec<f32> {
        let mut proto = vec![0.05; max_width * LINE_HEIGHT];
        for i in 0..max_width {
            for j in rows.clone() {
                proto[i * LINE_HEIGHT + j] = 0.9;
            }
        }
        proto
    }

    fn line(width: usize) -> LineImage {
        let columns = (0..width)
            .map(|t| {
                let mut column = [PixelType::White; LINE_HEIGHT];
                if t % 4 != 3 {
                    for (j, pixel) in column.iter_mut().enumerate() {
                        if (8 + t % 3..22).contains(&j) {
                            *pixel = PixelType::Black;
                        }
                    }
                }
                column[0] = PixelType::Obscured;
                column
            })
            .collect();
        LineImage::new(columns)
    }

    struct Fixture {
        space: Arc<PixelTemplate>,
        a: Arc<PixelTemplate>,
        b: Arc<PixelTemplate>,
        templates: Arc<[Arc<dyn CharacterTemplate>]>,
        indexer: SymbolIndexer,
        observations: Arc<[LineImage]>,
    }

    fn fixture() -> Fixture {
        let space = Arc::new(PixelTemplate::space(1, 2).unwrap());
        let a = Arc::new(PixelTemplate::from_prototype("a", &prototype(3, 6..20), 2, 3).unwrap());
        let b = Arc::new(
            PixelTemplate::from_prototype("b", &prototype(2, 12..26), 1, 2)
                .unwrap()
                .with_width_probs(vec![1.0, 3.0])
                .unwrap(),
        );
        let templates: Arc<[Arc<dyn CharacterTemplate>]> = Arc::from(vec![
            space.clone() as Arc<dyn CharacterTemplate>,
            a.clone() as Arc<dyn CharacterTemplate>,
            b.clone() as Arc<dyn CharacterTemplate>,
        ]);
        Fixture {
            space,
            a,
            b,
            templates,
            indexer: SymbolIndexer::from_symbols([" ", "a", "b"]),
            observations: Arc::from(vec![line(9), line(6)]),
        }
    }

    fn config() -> EmissionConfig {
        EmissionConfig::new().with_pad_widths(1, 2)
    }

    fn model_with(fixture: &Fixture, kernel: Box<dyn ScoreKernel>) -> CachingEmissionModel {
        CachingEmissionModel::new(
            fixture.templates.clone(),
            &fixture.indexer,
            fixture.observations.clone(),
            config(),
            kernel,
        )
        .unwrap()
    }

    fn built_model(fixture: &Fixture) -> CachingEmissionModel {
        let mut model = model_with(fixture, Box::new(CpuScoreKernel::new(1, 1)));
        model.rebuild_cache().unwrap();
        model
    }

    fn cache_bits(model: &CachingEmissionModel) -> Vec<u32> {
        model
            .built()
            .cache
            .as_slice()
            .iter()
            .map(|v| v.to_bits())
            .collect()
    }

    fn state(c: usize, offset: i32) -> BasicTransitionState {
        BasicTransitionState::template(Some(0), c, GlyphChar::normal(c)).with_offset(offset)
    }

    /// Fails `compute` while `fail` is set and counts shutdowns.
    struct FlakyKernel {
        inner: CpuScoreKernel,
        fail: Arc<AtomicBool>,
        shutdowns: Arc<AtomicUsize>,
    }

    impl ScoreKernel for FlakyKernel {
        fn name(&self) -> &str {
            "flaky"
        }

        fn startup(&mut self, templates: &KernelTemplates) -> OcrResult<()> {
            self.inner.startup(templates)
        }

        fn compute(
            &self,
            scores: &mut [f32],
            white: &[f32],
            black: &[f32],
            sequence_length: usize,
        ) -> OcrResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(OCRError::kernel_failure("flaky", "device lost"));
            }
            self.inner.compute(scores, white, black, sequence_length)
        }

        fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            self.inner.shutdown();
        }

        fn num_outer_threads(&self) -> usize {
            1
        }

        fn num_populate_threads(&self) -> usize {
            1
        }
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let fixture = fixture();
        let mut model = built_model(&fixture);
        let first = cache_bits(&model);
        model.rebuild_cache().unwrap();
        assert_eq!(first, cache_bits(&model));
    }

    #[test]
    fn test_parallel_rebuild_matches_sequential() {
        let fixture = fixture();
        let sequential = built_model(&fixture);

        let parallel_config = config().with_parallel(
            ParallelPolicy::new()
                .with_outer_threads(2)
                .with_populate_threads(2)
                .with_column_threshold(0),
        );
        let mut parallel = CachingEmissionModel::new(
            fixture.templates.clone(),
            &fixture.indexer,
            fixture.observations.clone(),
            parallel_config,
            Box::new(CpuScoreKernel::new(2, 2)),
        )
        .unwrap();
        parallel.rebuild_cache().unwrap();
        assert_eq!(cache_bits(&sequential), cache_bits(&parallel));
    }

    #[test]
    fn test_every_finite_cell_is_achievable() {
        let fixture = fixture();
        let model = built_model(&fixture);
        let tables = &model.built().tables;
        let mut finite = 0;
        for d in 0..model.num_sequences() {
            for t in 0..model.sequence_length(d) {
                for c in 0..model.num_chars() {
                    for offset in offsets() {
                        for w in tables.min_total[c]..=tables.max_total[c] {
                            let cached = model.built().cache.get(d, t, c, offset, w);
                            let best = model.best_configuration(d, t, c, offset, w);
                            if cached.is_finite() {
                                finite += 1;
                                assert_eq!(best.map(|b| b.score), Some(cached));
                            } else {
                                assert_eq!(best, None);
                            }
                        }
                    }
                }
            }
        }
        assert!(finite > 0);
    }

    #[test]
    fn test_infeasible_widths_are_neg_infinity() {
        let fixture = fixture();
        let model = built_model(&fixture);
        // 'a' spans 3..=5 columns with padding
        assert_eq!(model.log_prob(0, 0, 1, 2), f32::NEG_INFINITY);
        assert_eq!(model.log_prob(0, 0, 1, 6), f32::NEG_INFINITY);
        assert_eq!(model.log_prob(0, 0, 1, 100), f32::NEG_INFINITY);
        assert!(model.log_prob(0, 0, 1, 4).is_finite());
        // runs off the end of the line
        assert_eq!(model.log_prob(1, 4, 1, 3), f32::NEG_INFINITY);
        assert_eq!(model.get_pad_width(1, 4, &state(1, 0), 3), None);
    }

    #[test]
    fn test_allowed_widths_combine_padding() {
        let fixture = fixture();
        let model = built_model(&fixture);
        assert_eq!(model.allowed_widths(0), &[2, 3, 4]);
        assert_eq!(model.allowed_widths(1), &[3, 4, 5]);
        assert_eq!(model.allowed_widths_for(&state(2, 0)), &[2, 3, 4]);
    }

    #[test]
    fn test_log_prob_maxes_over_offsets() {
        let fixture = fixture();
        let model = built_model(&fixture);
        let best = model.log_prob(0, 1, 1, 4);
        let per_offset: Vec<f32> = offsets()
            .map(|o| model.log_prob_for(0, 1, &state(1, o), 4))
            .collect();
        assert!(per_offset.iter().all(|&v| v <= best));
        assert!(per_offset.contains(&best));
    }

    #[test]
    fn test_getters_reproduce_cached_value() {
        let fixture = fixture();
        let model = built_model(&fixture);
        let ts = state(1, -2);
        let w = 4;
        let exposure = model.get_exposure(0, 2, &ts, w).unwrap();
        let pad = model.get_pad_width(0, 2, &ts, w).unwrap();
        assert_eq!(model.get_offset(0, 2, &ts, w), -2);
        assert!(exposure < NUM_EXPOSURES);
        assert!((1..=2).contains(&pad));

        let whitespace = &model.built().whitespace[0];
        let rederived = model.template_score(0, 2, 1, w - pad, exposure, -2)
            + model.padding_score(whitespace, 2 + w - pad, pad, exposure);
        assert_eq!(rederived, model.log_prob_for(0, 2, &ts, w));
    }

    #[test]
    fn test_pad_width_log_prob_is_uniform() {
        let fixture = fixture();
        let model = model_with(&fixture, Box::new(CpuScoreKernel::new(1, 1)));
        let expected = (0.5f64).ln() as f32;
        assert_eq!(model.pad_width_log_prob(1), expected);
        assert_eq!(model.pad_width_log_prob(2), expected);
    }

    /// A space template whose multi-column tables are darker than its
    /// single-column table.
    struct ShadedSpace {
        inner: PixelTemplate,
    }

    impl ShadedSpace {
        fn shade(width: usize, mut table: Vec<f32>) -> Vec<f32> {
            if width > 1 {
                table.iter_mut().for_each(|v| *v -= 5.0);
            }
            table
        }
    }

    impl CharacterTemplate for ShadedSpace {
        fn character(&self) -> &str {
            self.inner.character()
        }

        fn is_space(&self) -> bool {
            true
        }

        fn allowed_widths(&self) -> Vec<usize> {
            self.inner.allowed_widths()
        }

        fn template_min_width(&self) -> usize {
            self.inner.template_min_width()
        }

        fn template_max_width(&self) -> usize {
            self.inner.template_max_width()
        }

        fn width_log_prob(&self, width: usize) -> f32 {
            self.inner.width_log_prob(width)
        }

        fn log_white_probs(&self, exposure: usize, offset: i32, width: usize) -> Vec<f32> {
            Self::shade(width, self.inner.log_white_probs(exposure, offset, width))
        }

        fn log_black_probs(&self, exposure: usize, offset: i32, width: usize) -> Vec<f32> {
            Self::shade(width, self.inner.log_black_probs(exposure, offset, width))
        }

        fn emission_log_prob(
            &self,
            observations: &LineImage,
            start_col: usize,
            end_col: usize,
            exposure: usize,
            offset: i32,
        ) -> f32 {
            self.inner
                .emission_log_prob(observations, start_col, end_col, exposure, offset)
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
            self.inner
                .increment_counts(weight, observations, start_col, width, exposure, offset)
        }
    }

    #[test]
    fn test_whitespace_uses_single_column_space_table() {
        let fixture = fixture();
        let plain = model_with(&fixture, Box::new(CpuScoreKernel::new(1, 1)));

        let shaded = ShadedSpace {
            inner: PixelTemplate::space(2, 3).unwrap(),
        };
        let templates: Arc<[Arc<dyn CharacterTemplate>]> = Arc::from(vec![
            Arc::new(shaded) as Arc<dyn CharacterTemplate>,
            fixture.a.clone() as Arc<dyn CharacterTemplate>,
            fixture.b.clone() as Arc<dyn CharacterTemplate>,
        ]);
        let model = CachingEmissionModel::new(
            templates,
            &fixture.indexer,
            fixture.observations.clone(),
            config(),
            Box::new(CpuScoreKernel::new(1, 1)),
        )
        .unwrap();

        assert_eq!(plain.whitespace_columns(), model.whitespace_columns());
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_cache() {
        let fixture = fixture();
        let fail = Arc::new(AtomicBool::new(false));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let kernel = FlakyKernel {
            inner: CpuScoreKernel::new(1, 1),
            fail: fail.clone(),
            shutdowns: shutdowns.clone(),
        };
        let mut model = model_with(&fixture, Box::new(kernel));

        fail.store(true, Ordering::SeqCst);
        assert!(model.rebuild_cache().is_err());
        assert!(!model.is_cache_built());

        fail.store(false, Ordering::SeqCst);
        model.rebuild_cache().unwrap();
        let before = cache_bits(&model);

        fail.store(true, Ordering::SeqCst);
        let err = model.rebuild_cache().unwrap_err();
        assert_eq!(err.stage(), Some(ProcessingStage::ScoreKernel));
        assert!(err.to_string().starts_with("score kernel failed: line image"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "score kernel 'flaky' failed: device lost");
        assert!(model.is_cache_built());
        assert_eq!(before, cache_bits(&model));
        assert_eq!(shutdowns.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_increment_counts_forwards_to_templates() {
        let fixture = fixture();
        let model = built_model(&fixture);
        let a = state(1, 0);
        let space = state(0, 0);
        let b = state(2, 1);
        let path: [&dyn TransitionState; 3] = [&a, &space, &b];
        model.increment_counts(0, &path, &[4, 2, 3]).unwrap();

        assert_eq!(fixture.a.counts().total_weight(), 1.0);
        assert_eq!(fixture.space.counts().total_weight(), 1.0);
        assert_eq!(fixture.b.counts().total_weight(), 1.0);

        let pad = model.get_pad_width(0, 0, &a, 4).unwrap();
        let width_counts = fixture.a.counts().width;
        assert_eq!(width_counts[4 - pad - 2], 1.0);
    }

    #[test]
    fn test_increment_count_edge_cases() {
        let fixture = fixture();
        let model = built_model(&fixture);
        model.increment_count(0, &state(1, 0), 0, 4, 0.0).unwrap();
        assert_eq!(fixture.a.counts().total_weight(), 0.0);

        assert!(model.increment_count(0, &state(1, 0), 0, 1, 1.0).is_err());
        assert!(model.increment_count(0, &state(1, 0), 4, 2, 1.0).is_err());

        let s = state(1, 0);
        let states: [&dyn TransitionState; 1] = [&s];
        assert!(model.increment_counts(0, &states, &[3, 1]).is_err());

        let path: [&dyn TransitionState; 2] = [&s, &s];
        let err = model.increment_counts(0, &path, &[4, 1]).unwrap_err();
        assert_eq!(err.stage(), Some(ProcessingStage::CountAccumulation));
        assert_eq!(
            err.to_string(),
            "count accumulation failed: step 1 at column 4 of sequence 0"
        );
    }

    #[test]
    fn test_memory_estimate_before_and_after_build() {
        let fixture = fixture();
        let mut model = model_with(&fixture, Box::new(CpuScoreKernel::new(1, 1)));
        let before = model.estimate_memory_usage_gb();
        model.rebuild_cache().unwrap();
        assert_eq!(before, model.estimate_memory_usage_gb());
        assert_eq!(
            before,
            estimate_memory_gb(model.built().cache.len())
        );
    }

    #[test]
    fn test_construction_errors() {
        let fixture = fixture();
        let kernel = || Box::new(CpuScoreKernel::new(1, 1)) as Box<dyn ScoreKernel>;

        let short = SymbolIndexer::from_symbols([" ", "a"]);
        assert!(
            CachingEmissionModel::new(
                fixture.templates.clone(),
                &short,
                fixture.observations.clone(),
                config(),
                kernel()
            )
            .is_err()
        );

        let no_space = SymbolIndexer::from_symbols(["x", "a", "b"]);
        assert!(
            CachingEmissionModel::new(
                fixture.templates.clone(),
                &no_space,
                fixture.observations.clone(),
                config(),
                kernel()
            )
            .is_err()
        );

        let misplaced = SymbolIndexer::from_symbols(["a", " ", "b"]);
        assert!(
            CachingEmissionModel::new(
                fixture.templates.clone(),
                &misplaced,
                fixture.observations.clone(),
                config(),
                kernel()
            )
            .is_err()
        );

        assert!(
            CachingEmissionModel::new(
                fixture.templates.clone(),
                &fixture.indexer,
                Arc::from(Vec::<LineImage>::new()),
                config(),
                kernel()
            )
            .is_err()
        );

        assert!(
            CachingEmissionModel::new(
                fixture.templates.clone(),
                &fixture.indexer,
                fixture.observations.clone(),
                EmissionConfig::new().with_pad_widths(3, 1),
                kernel()
            )
            .is_err()
        );
    }

    #[test]
    #[should_panic(expected = "before rebuild_cache")]
    fn test_query_before_rebuild_panics() {
        let fixture = fixture();
        let model = model_with(&fixture, Box::new(CpuScoreKernel::new(1, 1)));
        model.log_prob(0, 0, 1, 4);
    }
}
