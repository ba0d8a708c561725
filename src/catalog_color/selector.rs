use image::Rgb;
use serde::{Deserialize, Serialize};

use super::palette::Palette;

/// What to do when the palette is too short for the configured rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientClusters {
    /// Emit the fallback color
    #[default]
    Fallback,
    /// Use the most prevalent cluster instead
    MostProminent,
}

/// Picks the representative color out of a ranked palette.
///
/// The default picks rank 1, the second most prevalent cluster: on catalog
/// shots rank 0 tends to be a leftover fringe of the removed background,
/// while rank 1 is usually the garment itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// Zero-based rank of the cluster to pick
    pub rank: usize,
    pub on_insufficient: InsufficientClusters,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            rank: 1,
            on_insufficient: InsufficientClusters::Fallback,
        }
    }
}

impl SelectionPolicy {
    pub const fn new(rank: usize, on_insufficient: InsufficientClusters) -> Self {
        Self {
            rank,
            on_insufficient,
        }
    }

    /// Returns `None` when the palette cannot satisfy the policy.
    pub fn select(&self, palette: &Palette) -> Option<Rgb<u8>> {
        palette
            .get(self.rank)
            .or_else(|| match self.on_insufficient {
                InsufficientClusters::Fallback => None,
                InsufficientClusters::MostProminent => palette.dominant(),
            })
            .map(|cluster| cluster.color)
    }
}
