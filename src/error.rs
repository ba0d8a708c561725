use std::path::PathBuf;

use thiserror::Error;

/// Error type for image retrieval
///
/// Covers everything between an item's URL and a decoded bitmap. Every
/// variant is item-scoped: the batch driver turns it into the fallback
/// color and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The item has no image URL, or it is blank
    #[error("Item has no image URL")]
    MissingUrl,

    /// The URL could not be parsed or uses an unsupported scheme
    #[error("Invalid image URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request did not complete within the configured timeout
    #[error("Request to {url} timed out")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Connection failure or any other transport-level error
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body could not be read
    #[error("Failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The payload is not a decodable image
    #[error("Failed to decode image from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },

    /// The HTTP client itself could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Error type for the fixed-size resize
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResizeError {
    /// The source image has a zero dimension
    #[error("Cannot resize an empty image ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// The requested target has a zero dimension
    #[error("Invalid target dimensions {width}x{height}")]
    InvalidTargetDimensions { width: u32, height: u32 },
}

/// Error type for background removal
///
/// Built-in and external removers report failures through this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentationError {
    /// The input bitmap has a zero dimension
    #[error("Cannot segment an empty image ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// Image and foreground mask dimensions do not match
    #[error("Image and mask dimensions do not match: expected {expected:?}, actual {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height)
        expected: (u32, u32),
        /// Actual dimensions (width, height)
        actual: (u32, u32),
    },

    /// An external segmentation model or service failed
    #[error("Segmentation model failed: {0}")]
    Model(String),
}

/// Error type for palette extraction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    /// Every pixel is transparent or below the alpha threshold
    #[error("Image has no eligible foreground pixels")]
    NoEligiblePixels,

    /// A palette of zero colors was requested
    #[error("Invalid cluster count {0}; at least one cluster is required")]
    InvalidClusterCount(usize),
}

/// Error type for loading and validating [`crate::PipelineConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Error type for writing the annotated table
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write spreadsheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Table has {rows} rows, more than the sink can hold ({limit})")]
    TooManyRows { rows: usize, limit: usize },

    #[error("Table has {columns} columns, more than the sink can hold ({limit})")]
    TooManyColumns { columns: usize, limit: usize },
}

/// Error type for building a [`crate::ColorPipeline`] from config
#[derive(Debug, Error)]
pub enum PipelineBuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
