//! Batch driver for the color pipeline.
//!
//! Items never share state. With the `rayon` feature they run on a dedicated
//! pool of `workers` threads, which also caps the number of in-flight
//! requests against the image host. Outcomes are collected by indexed
//! parallel iteration, so they come back in input order without locking.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use super::background::{BackgroundRemover, BorderKeyRemover};
use super::fetch::{HttpFetcher, ImageFetcher};
use super::item::{ColorOutcome, FallbackKind, ItemRun};
use super::palette::PaletteExtractor;
use super::resize::FixedResize;
use super::selector::SelectionPolicy;
use crate::config::PipelineConfig;
use crate::error::{ConfigError, FetchError, PipelineBuildError};
use crate::table::{AnnotatedTable, ItemRecord, ItemTable};

/// Cooperative cancellation flag for a running batch.
///
/// Checked before each item starts; items already in flight finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Summary of a finished batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub fallbacks: BTreeMap<FallbackKind, usize>,
    pub elapsed: Duration,
}

impl BatchReport {
    fn from_outcomes(outcomes: &[ColorOutcome], elapsed: Duration) -> Self {
        let mut report = Self {
            total: outcomes.len(),
            elapsed,
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome.fallback_kind() {
                None => report.succeeded += 1,
                Some(kind) => *report.fallbacks.entry(kind).or_default() += 1,
            }
        }
        report
    }

    pub fn fallback_count(&self, kind: FallbackKind) -> usize {
        self.fallbacks.get(&kind).copied().unwrap_or(0)
    }

    /// Items that received the fallback color for any reason.
    pub fn degraded(&self) -> usize {
        self.fallbacks.values().sum()
    }
}

/// Annotated table plus the batch summary.
#[derive(Debug, Clone)]
pub struct ColorBatch {
    pub table: AnnotatedTable,
    pub report: BatchReport,
}

/// Fetch, resize, segment, extract and select, for every item of a table.
#[derive(Debug, Clone)]
pub struct ColorPipeline<F = HttpFetcher, R = BorderKeyRemover> {
    fetcher: F,
    remover: R,
    resize: FixedResize,
    extractor: PaletteExtractor,
    palette_size: usize,
    selection: SelectionPolicy,
    workers: usize,
    progress_interval: usize,
}

impl ColorPipeline {
    /// Pipeline with the HTTP fetcher and the built-in background remover.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineBuildError> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config.fetch)?;
        let remover = BorderKeyRemover::new(
            config.segmentation.tolerance,
            config.segmentation.alpha_threshold,
        );
        Ok(Self::with_stages(config, fetcher, remover)?)
    }
}

impl<F, R> ColorPipeline<F, R>
where
    F: ImageFetcher,
    R: BackgroundRemover,
{
    /// Pipeline with caller-provided fetch and segmentation stages.
    pub fn with_stages(config: &PipelineConfig, fetcher: F, remover: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let resize = FixedResize::new(config.target_width, config.target_height)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(Self {
            fetcher,
            remover,
            resize,
            extractor: PaletteExtractor::new(config.palette.method, config.palette.alpha_threshold),
            palette_size: config.palette.size,
            selection: config.selection,
            workers: config.workers,
            progress_interval: config.progress_interval,
        })
    }

    /// Runs a single item to its terminal state. Never fails: errors become
    /// a fallback outcome.
    #[instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    pub fn process_item(&self, record: &ItemRecord) -> ColorOutcome {
        let mut run = ItemRun::new(&record.id);

        let fetched = match record.img_url.as_deref() {
            None => Err(FetchError::MissingUrl),
            Some(url) => self.fetcher.fetch(url),
        };
        let bitmap = match fetched {
            Ok(bitmap) => bitmap,
            Err(e) => return run.fail(FallbackKind::Fetch, &e),
        };
        run.advance();

        let resized = match self.resize.resize(&bitmap) {
            Ok(resized) => resized,
            Err(e) => return run.fail(FallbackKind::Fetch, &e),
        };
        drop(bitmap);
        run.advance();

        let foreground = match self.remover.remove_background(&resized) {
            Ok(foreground) => foreground,
            Err(e) => return run.fail(FallbackKind::Segmentation, &e),
        };
        run.advance();

        let palette = match self.extractor.extract(&foreground, self.palette_size) {
            Ok(palette) => palette,
            Err(e) => return run.fail(FallbackKind::Palette, &e),
        };
        run.advance();

        match self.selection.select(&palette) {
            Some(color) => run.select(color),
            None => {
                let detail = format!(
                    "palette has {} cluster(s), rank {} requested",
                    palette.len(),
                    self.selection.rank
                );
                run.fail(FallbackKind::InsufficientClusters, &detail)
            }
        }
    }

    /// Processes every row. The result has exactly one row per input row, in
    /// input order.
    pub fn run(&self, table: ItemTable) -> ColorBatch {
        self.run_with_cancel(table, &CancelToken::new())
    }

    #[instrument(skip_all, fields(items = table.len(), workers = self.workers))]
    pub fn run_with_cancel(&self, table: ItemTable, cancel: &CancelToken) -> ColorBatch {
        let started = Instant::now();
        let completed = AtomicUsize::new(0);
        let total = table.len();

        let outcomes = self.collect_outcomes(table.records(), |record| {
            let outcome = if cancel.is_cancelled() {
                ColorOutcome::cancelled()
            } else {
                self.process_item(record)
            };
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % self.progress_interval == 0 || done == total {
                info!("Extracted colors for {}/{} items", done, total);
            }
            outcome
        });

        let report = BatchReport::from_outcomes(&outcomes, started.elapsed());
        info!(
            total = report.total,
            succeeded = report.succeeded,
            degraded = report.degraded(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Color preprocessing done"
        );

        ColorBatch {
            table: AnnotatedTable::from_outcomes(table, outcomes),
            report,
        }
    }

    #[cfg(feature = "rayon")]
    fn collect_outcomes<P>(&self, records: &[ItemRecord], process: P) -> Vec<ColorOutcome>
    where
        P: Fn(&ItemRecord) -> ColorOutcome + Sync,
    {
        use rayon::prelude::*;

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|index| format!("catalog-color-{index}"))
            .build()
        {
            Ok(pool) => pool.install(|| records.par_iter().map(&process).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "Worker pool unavailable, processing sequentially");
                records.iter().map(process).collect()
            }
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn collect_outcomes<P>(&self, records: &[ItemRecord], process: P) -> Vec<ColorOutcome>
    where
        P: Fn(&ItemRecord) -> ColorOutcome + Sync,
    {
        records.iter().map(process).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_color::item::{FallbackReason, ItemStage};
    use crate::error::SegmentationError;
    use crate::test_utils::{create_solid_square_on_background, create_two_tone_item};
    use crate::Bitmap;
    use image::{Rgb, Rgba};

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([220, 20, 20, 255]);
    const BLUE: Rgba<u8> = Rgba([30, 60, 200, 255]);
    const GREEN: Rgba<u8> = Rgba([34, 139, 34, 255]);

    /// Serves synthetic images by URL; anything else is a 404.
    fn catalog_fetcher(url: &str) -> Result<Bitmap, FetchError> {
        match url {
            "mem://red" => Ok(create_solid_square_on_background(240, 320, 100, RED, WHITE)),
            "mem://shoe" => Ok(create_two_tone_item(BLUE, GREEN, WHITE)),
            other => Err(FetchError::Status {
                url: other.to_string(),
                status: 404,
            }),
        }
    }

    fn pipeline() -> ColorPipeline<impl ImageFetcher, BorderKeyRemover> {
        let config = PipelineConfig::builder().workers(2).build().unwrap();
        ColorPipeline::with_stages(&config, catalog_fetcher, BorderKeyRemover::default()).unwrap()
    }

    #[test]
    fn process_item_with_two_tone_item_selects_second_color() {
        let outcome = pipeline().process_item(&ItemRecord::new("shoe", Some("mem://shoe")));
        assert_eq!(outcome, ColorOutcome::Success(Rgb([34, 139, 34])));
    }

    #[test]
    fn process_item_with_solid_item_falls_back_for_insufficient_clusters() {
        let outcome = pipeline().process_item(&ItemRecord::new("red", Some("mem://red")));
        assert_eq!(outcome.rgb(), Rgb([0, 0, 0]));
        assert_eq!(outcome.fallback_kind(), Some(FallbackKind::InsufficientClusters));
    }

    #[test]
    fn process_item_with_resampled_solid_item_still_falls_back() {
        let config = PipelineConfig::default();
        for (width, height) in [(300, 300), (100, 100), (500, 500), (333, 421), (180, 240)] {
            let source =
                create_solid_square_on_background(width, height, width.min(height) / 3, RED, WHITE);
            let fetcher = move |_: &str| -> Result<Bitmap, FetchError> { Ok(source.clone()) };
            let pipeline =
                ColorPipeline::with_stages(&config, fetcher, BorderKeyRemover::default()).unwrap();

            let outcome = pipeline.process_item(&ItemRecord::new("red", Some("mem://red")));
            assert_eq!(
                outcome.fallback_kind(),
                Some(FallbackKind::InsufficientClusters),
                "{width}x{height}: {outcome:?}"
            );
        }
    }

    #[test]
    fn process_item_with_missing_url_falls_back_at_pending() {
        let outcome = pipeline().process_item(&ItemRecord::new("none", None::<String>));
        match outcome {
            ColorOutcome::Fallback(FallbackReason { kind, stage, .. }) => {
                assert_eq!(kind, FallbackKind::Fetch);
                assert_eq!(stage, ItemStage::Pending);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn process_item_with_failing_remover_falls_back_after_resize() {
        let config = PipelineConfig::default();
        let remover = |_: &Bitmap| -> Result<Bitmap, SegmentationError> {
            Err(SegmentationError::Model("matting model unavailable".to_string()))
        };
        let pipeline =
            ColorPipeline::with_stages(&config, catalog_fetcher, remover).unwrap();

        match pipeline.process_item(&ItemRecord::new("shoe", Some("mem://shoe"))) {
            ColorOutcome::Fallback(reason) => {
                assert_eq!(reason.kind, FallbackKind::Segmentation);
                assert_eq!(reason.stage, ItemStage::Resized);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn process_item_with_blank_foreground_falls_back_for_palette() {
        let config = PipelineConfig::default();
        let remover = |bitmap: &Bitmap| -> Result<Bitmap, SegmentationError> {
            Ok(Bitmap::new(bitmap.width(), bitmap.height()))
        };
        let pipeline =
            ColorPipeline::with_stages(&config, catalog_fetcher, remover).unwrap();

        let outcome = pipeline.process_item(&ItemRecord::new("shoe", Some("mem://shoe")));
        assert_eq!(outcome.fallback_kind(), Some(FallbackKind::Palette));
    }

    #[test]
    fn run_preserves_order_and_counts_outcomes() {
        let table: ItemTable = [
            ("1", Some("mem://shoe")),
            ("2", Some("mem://missing")),
            ("3", None),
            ("4", Some("mem://red")),
            ("5", Some("mem://shoe")),
        ]
        .into_iter()
        .map(|(id, url)| ItemRecord::new(id, url))
        .collect();

        let batch = pipeline().run(table);

        let ids: Vec<&str> = batch.table.iter().map(|row| row.record.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4", "5"]);
        assert_eq!(
            batch.table.colors(),
            vec![
                Rgb([34, 139, 34]),
                Rgb([0, 0, 0]),
                Rgb([0, 0, 0]),
                Rgb([0, 0, 0]),
                Rgb([34, 139, 34]),
            ]
        );
        assert_eq!(batch.report.total, 5);
        assert_eq!(batch.report.succeeded, 2);
        assert_eq!(batch.report.fallback_count(FallbackKind::Fetch), 2);
        assert_eq!(
            batch.report.fallback_count(FallbackKind::InsufficientClusters),
            1
        );
        assert_eq!(batch.report.degraded(), 3);
    }

    #[test]
    fn run_with_cancelled_token_emits_one_fallback_per_row() {
        let table: ItemTable = (0..6)
            .map(|i| ItemRecord::new(i.to_string(), Some("mem://shoe")))
            .collect();
        let cancel = CancelToken::new();
        cancel.cancel();

        let batch = pipeline().run_with_cancel(table, &cancel);
        assert_eq!(batch.table.len(), 6);
        assert_eq!(batch.report.fallback_count(FallbackKind::Cancelled), 6);
    }

    #[test]
    fn run_with_empty_table_returns_empty_batch() {
        let batch = pipeline().run(ItemTable::default());
        assert!(batch.table.is_empty());
        assert_eq!(batch.report.total, 0);
    }

    #[test]
    fn with_stages_with_invalid_config_is_rejected() {
        let mut config = PipelineConfig::default();
        config.palette.size = 0;
        assert!(
            ColorPipeline::with_stages(&config, catalog_fetcher, BorderKeyRemover::default())
                .is_err()
        );
    }
}
