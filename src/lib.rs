//! Dominant-color preprocessing for catalog item images.
//!
//! Each item's image is fetched, resized to a fixed size, stripped of its
//! background, reduced to a ranked palette, and one palette color is
//! selected as the item's representative color. Items that fail at any
//! stage get [`FALLBACK_COLOR`] and a reason, never an error, so a batch
//! always yields one color per input row.
//!
//! ```no_run
//! use catalog_color::{ColorPipeline, ItemRecord, ItemTable, PipelineConfig, TableSink, XlsxSink};
//!
//! let config = PipelineConfig::default();
//! let pipeline = ColorPipeline::from_config(&config)?;
//! let table: ItemTable = [ItemRecord::new("1", Some("https://img.example.com/1.jpg"))]
//!     .into_iter()
//!     .collect();
//!
//! let batch = pipeline.run(table);
//! XlsxSink::new(&config.checkpoint_path).write(&batch.table)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod catalog_color;
mod config;
mod error;
mod sink;
mod table;
#[cfg(test)]
mod test_utils;
mod utils;

use image::{ImageBuffer, Pixel, Rgba};

pub use catalog_color::alpha_mask::{ApplyForegroundMask, BACKGROUND_SENTINEL};
pub use catalog_color::background::{BackgroundRemover, BorderKeyRemover};
pub use catalog_color::fetch::{decode_image, HttpFetcher, ImageFetcher};
pub use catalog_color::item::{
    ColorOutcome, FallbackKind, FallbackReason, ItemStage, FALLBACK_COLOR,
};
pub use catalog_color::orchestrator::{BatchReport, CancelToken, ColorBatch, ColorPipeline};
pub use catalog_color::palette::{
    ColorCluster, ExtractPalette, Palette, PaletteExtractor, PaletteMethod,
};
pub use catalog_color::resize::{FixedResize, ResizeExactExt};
pub use catalog_color::selector::{InsufficientClusters, SelectionPolicy};
pub use config::{
    FetchConfig, PaletteConfig, PipelineConfig, PipelineConfigBuilder, SegmentationConfig,
    CHECKPOINT_FILE, PALETTE_SIZE, TARGET_HEIGHT, TARGET_WIDTH,
};
pub use error::{
    ConfigError, FetchError, PaletteError, PipelineBuildError, ResizeError, SegmentationError,
    SinkError,
};
pub use sink::{TableSink, XlsxSink};
pub use table::{AnnotatedRow, AnnotatedTable, ColorCell, ItemRecord, ItemTable};

pub type Image<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;

/// 8-bit RGBA image, the currency of every pipeline stage.
pub type Bitmap = Image<Rgba<u8>>;
