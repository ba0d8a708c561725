//! Per-item processing state.
//!
//! Every item walks `Pending -> Fetched -> Resized -> Segmented -> Extracted
//! -> Selected`, or drops into `Failed` from whichever stage it had reached.
//! Both terminal states produce exactly one [`ColorOutcome`].

use std::fmt;

use image::Rgb;
use tracing::{debug, warn};

/// Color emitted for an item whenever any stage fails.
pub const FALLBACK_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Position of an item in the color pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemStage {
    Pending,
    Fetched,
    Resized,
    Segmented,
    Extracted,
    Selected,
    Failed,
}

impl ItemStage {
    /// Next stage on the success path; `None` for terminal stages.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Fetched),
            Self::Fetched => Some(Self::Resized),
            Self::Resized => Some(Self::Segmented),
            Self::Segmented => Some(Self::Extracted),
            Self::Extracted => Some(Self::Selected),
            Self::Selected | Self::Failed => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Selected | Self::Failed)
    }
}

/// Why an item fell back to [`FALLBACK_COLOR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FallbackKind {
    /// Missing URL, network failure, bad status or undecodable payload
    Fetch,
    /// Background removal failed
    Segmentation,
    /// No eligible foreground pixels
    Palette,
    /// The palette had fewer clusters than the selection rank needs
    InsufficientClusters,
    /// The batch was cancelled before the item started
    Cancelled,
}

impl FallbackKind {
    /// Value written to the `color_status` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Segmentation => "segmentation",
            Self::Palette => "palette",
            Self::InsufficientClusters => "insufficient_clusters",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details of a fallback, kept alongside the emitted color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackReason {
    pub kind: FallbackKind,
    /// Last stage the item completed before failing
    pub stage: ItemStage,
    /// Rendered error message
    pub detail: String,
}

/// Result of running one item through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorOutcome {
    Success(Rgb<u8>),
    Fallback(FallbackReason),
}

impl ColorOutcome {
    /// The emitted color: the selected one, or [`FALLBACK_COLOR`].
    pub fn rgb(&self) -> Rgb<u8> {
        match self {
            Self::Success(color) => *color,
            Self::Fallback(_) => FALLBACK_COLOR,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn fallback_kind(&self) -> Option<FallbackKind> {
        match self {
            Self::Success(_) => None,
            Self::Fallback(reason) => Some(reason.kind),
        }
    }

    /// Value written to the `color_status` column.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "ok",
            Self::Fallback(reason) => reason.kind.as_str(),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::Fallback(FallbackReason {
            kind: FallbackKind::Cancelled,
            stage: ItemStage::Pending,
            detail: "batch cancelled".to_string(),
        })
    }
}

/// Tracks one item through the stages and produces its outcome.
#[derive(Debug)]
pub(crate) struct ItemRun<'a> {
    id: &'a str,
    stage: ItemStage,
}

impl<'a> ItemRun<'a> {
    pub(crate) fn new(id: &'a str) -> Self {
        Self {
            id,
            stage: ItemStage::Pending,
        }
    }

    #[cfg(test)]
    pub(crate) fn stage(&self) -> ItemStage {
        self.stage
    }

    /// Moves to the next stage on the success path.
    pub(crate) fn advance(&mut self) {
        debug_assert!(!self.stage.is_terminal(), "advance from terminal stage");
        if let Some(next) = self.stage.next() {
            debug!(id = self.id, from = ?self.stage, to = ?next, "Item advanced");
            self.stage = next;
        }
    }

    pub(crate) fn select(mut self, color: Rgb<u8>) -> ColorOutcome {
        self.advance();
        debug_assert_eq!(self.stage, ItemStage::Selected);
        ColorOutcome::Success(color)
    }

    pub(crate) fn fail(mut self, kind: FallbackKind, error: &dyn fmt::Display) -> ColorOutcome {
        let reached = std::mem::replace(&mut self.stage, ItemStage::Failed);
        let detail = error.to_string();
        warn!(
            id = self.id,
            stage = ?reached,
            kind = %kind,
            error = %detail,
            "Item fell back to default color"
        );
        ColorOutcome::Fallback(FallbackReason {
            kind,
            stage: reached,
            detail,
        })
    }
}
