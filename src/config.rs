//! Pipeline configuration.
//!
//! Defaults reproduce the catalog preprocessing constants: images are resized
//! to 240x320, a 5-color palette is extracted and the second-ranked color is
//! selected. Everything can be overridden programmatically or from JSON:
//!
//! ```no_run
//! use catalog_color::PipelineConfig;
//! use std::path::Path;
//!
//! let config = PipelineConfig::from_json_file(Path::new("color.json"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Missing fields fall back to their defaults, so `{"workers": 16}` is a
//! complete config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog_color::palette::PaletteMethod;
use crate::catalog_color::selector::{InsufficientClusters, SelectionPolicy};
use crate::error::ConfigError;

/// Resize target width.
pub const TARGET_WIDTH: u32 = 240;
/// Resize target height.
pub const TARGET_HEIGHT: u32 = 320;
/// Number of palette colors extracted per item.
pub const PALETTE_SIZE: usize = 5;
/// Default checkpoint file written after a batch.
pub const CHECKPOINT_FILE: &str = "temp_preprocess_color.xlsx";

/// Complete configuration of the color pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_width: u32,
    pub target_height: u32,
    /// Worker threads; bounds concurrent fetches against the image host
    pub workers: usize,
    /// Log progress every this many completed items
    pub progress_interval: usize,
    pub fetch: FetchConfig,
    pub segmentation: SegmentationConfig,
    pub palette: PaletteConfig,
    pub selection: SelectionPolicy,
    /// Where the annotated table is checkpointed
    pub checkpoint_path: PathBuf,
}

/// HTTP retrieval settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Built-in background remover settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Max per-channel distance from a corner color counted as background
    pub tolerance: u8,
    pub alpha_threshold: u8,
}

/// Palette extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    /// K, the maximum number of clusters
    pub size: usize,
    pub method: PaletteMethod,
    /// Pixels below this alpha are not clustered
    pub alpha_threshold: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_width: TARGET_WIDTH,
            target_height: TARGET_HEIGHT,
            workers: 8,
            progress_interval: 100,
            fetch: FetchConfig::default(),
            segmentation: SegmentationConfig::default(),
            palette: PaletteConfig::default(),
            selection: SelectionPolicy::default(),
            checkpoint_path: PathBuf::from(CHECKPOINT_FILE),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            tolerance: 24,
            alpha_threshold: 128,
        }
    }
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            size: PALETTE_SIZE,
            method: PaletteMethod::Histogram,
            alpha_threshold: 128,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "target size must be non-zero, got {}x{}",
                self.target_width, self.target_height
            )));
        }
        if self.palette.size == 0 {
            return Err(ConfigError::Invalid(
                "palette size must be at least 1".to_string(),
            ));
        }
        if let PaletteMethod::KMeans { runs, .. } = self.palette.method {
            if runs == 0 {
                return Err(ConfigError::Invalid(
                    "k-means needs at least one run".to_string(),
                ));
            }
            if self.palette.size > usize::from(u8::MAX) {
                return Err(ConfigError::Invalid(format!(
                    "k-means supports at most {} clusters, got {}",
                    u8::MAX,
                    self.palette.size
                )));
            }
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::Invalid(
                "progress interval must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fluent construction of a [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn target_size(mut self, width: u32, height: u32) -> Self {
        self.config.target_width = width;
        self.config.target_height = height;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn progress_interval(mut self, interval: usize) -> Self {
        self.config.progress_interval = interval;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch.timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.fetch.user_agent = user_agent.into();
        self
    }

    pub fn segmentation_tolerance(mut self, tolerance: u8) -> Self {
        self.config.segmentation.tolerance = tolerance;
        self
    }

    pub fn palette_size(mut self, size: usize) -> Self {
        self.config.palette.size = size;
        self
    }

    pub fn palette_method(mut self, method: PaletteMethod) -> Self {
        self.config.palette.method = method;
        self
    }

    pub fn selection_rank(mut self, rank: usize) -> Self {
        self.config.selection.rank = rank;
        self
    }

    pub fn on_insufficient_clusters(mut self, policy: InsufficientClusters) -> Self {
        self.config.selection.on_insufficient = policy;
        self
    }

    pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.checkpoint_path = path.into();
        self
    }

    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
