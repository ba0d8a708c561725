//! Dominant color extraction.
//!
//! Eligible pixels (alpha at or above the threshold) are grouped into at most
//! `k` clusters, which are ranked by pixel count. Two grouping methods exist:
//!
//! - [`PaletteMethod::Histogram`] buckets pixels by the top two bits of their
//!   relative luminance, hue and lightness (64 buckets) and averages each
//!   bucket. Fully deterministic.
//! - [`PaletteMethod::KMeans`] runs seeded Hamerly k-means in CIE Lab.
//!   Deterministic for a fixed seed.
//!
//! Ties in pixel count keep the order the method produced them in (bucket
//! index for the histogram, ascending RGB for k-means), so one invocation
//! always ranks the same way.

use image::{Rgb, Rgba};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{kmeans, quantize};
use crate::error::PaletteError;
use crate::Bitmap;

/// A group of similar pixel colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCluster {
    /// Representative (mean or centroid) color
    pub color: Rgb<u8>,
    /// Number of eligible pixels in the cluster
    pub count: u64,
    /// `count` divided by the number of eligible pixels in the image
    pub proportion: f32,
}

/// Clusters ranked by prevalence, most prevalent first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Palette {
    clusters: Vec<ColorCluster>,
    eligible_pixels: u64,
}

impl Palette {
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Cluster at `rank` (0 is the most prevalent), if the palette has one.
    pub fn get(&self, rank: usize) -> Option<&ColorCluster> {
        self.clusters.get(rank)
    }

    pub fn dominant(&self) -> Option<&ColorCluster> {
        self.get(0)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColorCluster> {
        self.clusters.iter()
    }

    pub fn colors(&self) -> Vec<Rgb<u8>> {
        self.clusters.iter().map(|cluster| cluster.color).collect()
    }

    /// Number of pixels that took part in clustering.
    pub fn eligible_pixels(&self) -> u64 {
        self.eligible_pixels
    }

    pub fn into_clusters(self) -> Vec<ColorCluster> {
        self.clusters
    }

    /// Ranks raw `(color, count)` groups and keeps the `k` most prevalent.
    fn from_groups(mut groups: Vec<(Rgb<u8>, u64)>, k: usize, eligible_pixels: u64) -> Self {
        groups.retain(|(_, count)| *count > 0);
        // Stable: equal counts keep the method's order
        groups.sort_by(|(_, a), (_, b)| b.cmp(a));
        groups.truncate(k);

        let clusters = groups
            .into_iter()
            .map(|(color, count)| ColorCluster {
                color,
                count,
                proportion: count as f32 / eligible_pixels as f32,
            })
            .collect();

        Self {
            clusters,
            eligible_pixels,
        }
    }
}

impl<'a> IntoIterator for &'a Palette {
    type Item = &'a ColorCluster;
    type IntoIter = std::slice::Iter<'a, ColorCluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}

/// Color grouping procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaletteMethod {
    /// Luminance/hue/lightness bucket histogram
    #[default]
    Histogram,
    /// Best of `runs` seeded k-means runs in CIE Lab
    KMeans { runs: u8, seed: u64 },
}

/// Extracts ranked palettes from foreground bitmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteExtractor {
    pub method: PaletteMethod,
    /// Pixels with alpha below this value are ignored
    pub alpha_threshold: u8,
}

impl Default for PaletteExtractor {
    fn default() -> Self {
        Self {
            method: PaletteMethod::Histogram,
            alpha_threshold: 128,
        }
    }
}

impl PaletteExtractor {
    pub const fn new(method: PaletteMethod, alpha_threshold: u8) -> Self {
        Self {
            method,
            alpha_threshold,
        }
    }

    /// Partitions the eligible pixels of `bitmap` into at most `k` ranked clusters.
    ///
    /// # Errors
    ///
    /// * `PaletteError::InvalidClusterCount` - When `k` is zero
    /// * `PaletteError::NoEligiblePixels` - When every pixel is below the alpha threshold
    pub fn extract(&self, bitmap: &Bitmap, k: usize) -> Result<Palette, PaletteError> {
        if k == 0 {
            return Err(PaletteError::InvalidClusterCount(k));
        }

        let pixels: Vec<Rgb<u8>> = bitmap
            .pixels()
            .filter(|Rgba([_, _, _, alpha])| *alpha >= self.alpha_threshold)
            .map(|&Rgba([red, green, blue, _])| Rgb([red, green, blue]))
            .collect();

        if pixels.is_empty() {
            return Err(PaletteError::NoEligiblePixels);
        }

        let groups = match self.method {
            PaletteMethod::Histogram => quantize::bucket_means(&pixels),
            PaletteMethod::KMeans { runs, seed } => kmeans::cluster(&pixels, k, runs, seed),
        };
        let palette = Palette::from_groups(groups, k, pixels.len() as u64);

        debug!(
            eligible = pixels.len(),
            clusters = palette.len(),
            requested = k,
            "Extracted palette"
        );

        Ok(palette)
    }
}

/// Extension trait for extracting a palette with the default extractor.
pub trait ExtractPalette {
    fn extract_palette(&self, k: usize) -> Result<Palette, PaletteError>;
}

impl ExtractPalette for Bitmap {
    fn extract_palette(&self, k: usize) -> Result<Palette, PaletteError> {
        PaletteExtractor::default().extract(self, k)
    }
}
