//! Background removal.
//!
//! Segmentation is a capability behind [`BackgroundRemover`]: anything that
//! maps a bitmap to a same-sized bitmap whose background pixels are
//! transparent can be plugged into the pipeline, including a closure that
//! calls out to a matting model.
//!
//! The built-in [`BorderKeyRemover`] targets catalog product shots, which
//! put a single subject on a flat studio background. The background color
//! is keyed off the image corners, and only key-colored regions connected to
//! the image border are removed, so white stitching or logos inside the
//! subject survive.
//!
//! Resampling blends the subject's outline with the studio color. Those
//! anti-aliased pixels are too far from the key to be caught by the
//! tolerance test, so they are peeled off afterwards: a subject pixel next
//! to the removed background whose color lies on the line between a key and
//! a neighboring subject color is a blend, not subject.

use image::{Luma, Rgba};
use itertools::iproduct;
use imageproc::map::map_colors;
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

use super::alpha_mask::ApplyForegroundMask;
use crate::error::SegmentationError;
use crate::utils::{max_channel_distance, validate_non_empty_image};
use crate::{Bitmap, Image};

const CANDIDATE: Luma<u8> = Luma([255]);
const NOT_CANDIDATE: Luma<u8> = Luma([0]);
const FOREGROUND: Luma<u8> = Luma([255]);
const BACKGROUND: Luma<u8> = Luma([0]);

/// Rings of blended outline pixels removed at most. Bilinear enlargement of
/// up to 4x blends about three pixels per edge.
const FRINGE_PASSES: usize = 4;
/// Max per-channel distance from the key-to-subject line still counted as a blend.
const FRINGE_LINE_TOLERANCE: f32 = 6.0;

/// Removes the background of a bitmap.
///
/// Implementations must return a bitmap with the same dimensions as the
/// input, keep foreground pixels at their original color and must not
/// mutate the input. Results may differ between invocations.
pub trait BackgroundRemover: Send + Sync {
    fn remove_background(&self, bitmap: &Bitmap) -> Result<Bitmap, SegmentationError>;
}

impl<F> BackgroundRemover for F
where
    F: Fn(&Bitmap) -> Result<Bitmap, SegmentationError> + Send + Sync,
{
    fn remove_background(&self, bitmap: &Bitmap) -> Result<Bitmap, SegmentationError> {
        self(bitmap)
    }
}

/// Corner-keyed, border-connected background removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderKeyRemover {
    /// Maximum per-channel distance from a corner color still counted as background
    pub tolerance: u8,
    /// Pixels with alpha below this are background regardless of color
    pub alpha_threshold: u8,
}

impl Default for BorderKeyRemover {
    fn default() -> Self {
        Self {
            tolerance: 24,
            alpha_threshold: 128,
        }
    }
}

impl BorderKeyRemover {
    pub const fn new(tolerance: u8, alpha_threshold: u8) -> Self {
        Self {
            tolerance,
            alpha_threshold,
        }
    }

    /// Computes the foreground mask: 255 for subject pixels, 0 for background.
    pub fn foreground_mask(&self, bitmap: &Bitmap) -> Result<Image<Luma<u8>>, SegmentationError> {
        let (width, height) = bitmap.dimensions();
        validate_non_empty_image(width, height, "BorderKeyRemover")
            .map_err(|_| SegmentationError::EmptyImage { width, height })?;

        let keys = self.border_keys(bitmap);
        let candidates = self.candidate_map(bitmap, &keys);
        let labels = connected_components(&candidates, Connectivity::Eight, NOT_CANDIDATE);

        let max_label = labels.pixels().map(|Luma([label])| *label).max().unwrap_or(0);
        let mut touches_border = vec![false; max_label as usize + 1];
        for (x, y, Luma([label])) in labels.enumerate_pixels() {
            if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                touches_border[*label as usize] = true;
            }
        }
        // Label 0 is everything that is not a candidate
        touches_border[0] = false;

        let mut mask = map_colors(&labels, |Luma([label])| {
            if touches_border[label as usize] {
                BACKGROUND
            } else {
                FOREGROUND
            }
        });
        let peeled = self.peel_fringe(bitmap, &keys, &mut mask);

        debug!(
            width,
            height,
            regions = max_label,
            peeled,
            "Computed foreground mask from border keys"
        );

        Ok(mask)
    }

    /// Opaque corner colors; transparent corners are covered by the alpha rule.
    fn border_keys(&self, bitmap: &Bitmap) -> Vec<Rgba<u8>> {
        let (width, height) = bitmap.dimensions();
        let right = width.saturating_sub(1);
        let bottom = height.saturating_sub(1);

        let mut keys: Vec<Rgba<u8>> = [(0, 0), (right, 0), (0, bottom), (right, bottom)]
            .into_iter()
            .map(|(x, y)| *bitmap.get_pixel(x, y))
            .filter(|Rgba([_, _, _, alpha])| *alpha >= self.alpha_threshold)
            .collect();
        keys.dedup();
        keys
    }

    fn candidate_map(&self, bitmap: &Bitmap, keys: &[Rgba<u8>]) -> Image<Luma<u8>> {
        map_colors(bitmap, |pixel| {
            let transparent = pixel[3] < self.alpha_threshold;
            let keyed = keys
                .iter()
                .any(|key| max_channel_distance(&pixel, key) <= self.tolerance);
            if transparent || keyed {
                CANDIDATE
            } else {
                NOT_CANDIDATE
            }
        })
    }
}

impl BorderKeyRemover {
    /// Moves blended outline pixels from the foreground to the background,
    /// one ring per pass. Returns the number of pixels moved.
    fn peel_fringe(&self, bitmap: &Bitmap, keys: &[Rgba<u8>], mask: &mut Image<Luma<u8>>) -> usize {
        if keys.is_empty() {
            return 0;
        }

        let mut peeled = 0;
        for _ in 0..FRINGE_PASSES {
            let current: &Image<Luma<u8>> = mask;
            let ring: Vec<(u32, u32)> = current
                .enumerate_pixels()
                .filter(|(_, _, value)| **value == FOREGROUND)
                .filter(|&(x, y, _)| self.is_fringe(bitmap, current, keys, x, y))
                .map(|(x, y, _)| (x, y))
                .collect();
            if ring.is_empty() {
                break;
            }
            peeled += ring.len();
            for (x, y) in ring {
                mask.put_pixel(x, y, BACKGROUND);
            }
        }
        peeled
    }

    fn is_fringe(
        &self,
        bitmap: &Bitmap,
        mask: &Image<Luma<u8>>,
        keys: &[Rgba<u8>],
        x: u32,
        y: u32,
    ) -> bool {
        let (width, height) = mask.dimensions();
        let xs = x.saturating_sub(1)..=(x + 1).min(width - 1);
        let ys = y.saturating_sub(1)..=(y + 1).min(height - 1);

        let mut touches_background = false;
        let mut subject = Vec::with_capacity(8);
        for (ny, nx) in iproduct!(ys, xs) {
            if (nx, ny) == (x, y) {
                continue;
            }
            if *mask.get_pixel(nx, ny) == BACKGROUND {
                touches_background = true;
            } else {
                let neighbor = *bitmap.get_pixel(nx, ny);
                if neighbor[3] >= self.alpha_threshold {
                    subject.push(neighbor);
                }
            }
        }
        if !touches_background {
            return false;
        }

        let pixel = bitmap.get_pixel(x, y);
        keys.iter().any(|key| {
            subject
                .iter()
                .any(|inner| max_channel_distance(pixel, inner) > 0 && is_blend(key, pixel, inner))
        })
    }
}

/// True if `pixel` lies on the segment from `key` to `inner`, strictly
/// short of `inner`, within [`FRINGE_LINE_TOLERANCE`].
fn is_blend(key: &Rgba<u8>, pixel: &Rgba<u8>, inner: &Rgba<u8>) -> bool {
    let toward: [f32; 3] = std::array::from_fn(|c| f32::from(inner[c]) - f32::from(key[c]));
    let offset: [f32; 3] = std::array::from_fn(|c| f32::from(pixel[c]) - f32::from(key[c]));

    let length_sq: f32 = toward.iter().map(|d| d * d).sum();
    if length_sq == 0.0 {
        return false;
    }
    let t = toward.iter().zip(&offset).map(|(d, o)| d * o).sum::<f32>() / length_sq;
    if !(0.0..1.0).contains(&t) {
        return false;
    }
    toward
        .iter()
        .zip(&offset)
        .all(|(d, o)| (o - t * d).abs() <= FRINGE_LINE_TOLERANCE)
}

impl BackgroundRemover for BorderKeyRemover {
    fn remove_background(&self, bitmap: &Bitmap) -> Result<Bitmap, SegmentationError> {
        let mask = self.foreground_mask(bitmap)?;
        bitmap.apply_foreground_mask(&mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_color::alpha_mask::BACKGROUND_SENTINEL;
    use crate::catalog_color::resize::FixedResize;
    use crate::test_utils::{create_framed_subject, create_solid_square_on_background};

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([200, 20, 30, 255]);

    #[test]
    fn remove_background_with_white_studio_shot_keeps_only_subject() {
        let image = create_solid_square_on_background(60, 80, 20, RED, WHITE);
        let result = BorderKeyRemover::default().remove_background(&image).unwrap();

        assert_eq!(result.dimensions(), (60, 80));
        let opaque = result.pixels().filter(|p| p[3] > 0).count();
        assert_eq!(opaque, 20 * 20);
        assert!(result.pixels().filter(|p| p[3] > 0).all(|p| *p == RED));
        assert_eq!(result.get_pixel(0, 0), &BACKGROUND_SENTINEL);
    }

    #[test]
    fn remove_background_with_interior_white_keeps_enclosed_region() {
        // A red frame around a white window: the window is not border-connected
        let image = create_framed_subject(40, 40, RED, WHITE);
        let mask = BorderKeyRemover::default().foreground_mask(&image).unwrap();

        assert_eq!(mask.get_pixel(20, 20), &Luma([255]));
        assert_eq!(mask.get_pixel(0, 0), &Luma([0]));
    }

    #[test]
    fn remove_background_after_resampling_peels_blended_outline() {
        let resize = FixedResize::new(240, 320).unwrap();
        for (width, height) in [(300, 300), (100, 100), (500, 500), (333, 421), (180, 240)] {
            let source =
                create_solid_square_on_background(width, height, width.min(height) / 3, RED, WHITE);
            let resized = resize.resize(&source).unwrap();
            let result = BorderKeyRemover::default().remove_background(&resized).unwrap();

            let opaque: Vec<&Rgba<u8>> = result.pixels().filter(|p| p[3] > 0).collect();
            assert!(!opaque.is_empty(), "{width}x{height}");
            assert!(opaque.iter().all(|p| **p == RED), "{width}x{height}");
        }
    }

    #[test]
    fn is_blend_accepts_only_points_between_key_and_subject() {
        assert!(is_blend(&WHITE, &Rgba([228, 138, 143, 255]), &RED));
        assert!(!is_blend(&WHITE, &RED, &RED));
        // Off the white-to-red line
        assert!(!is_blend(&WHITE, &Rgba([120, 200, 143, 255]), &RED));
        // Darker than the subject, beyond the segment
        assert!(!is_blend(&WHITE, &Rgba([150, 10, 20, 255]), &RED));
    }

    #[test]
    fn remove_background_with_near_white_noise_removes_it_within_tolerance() {
        let mut image = create_solid_square_on_background(30, 30, 10, RED, WHITE);
        image.put_pixel(1, 1, Rgba([240, 245, 250, 255]));
        let result = BorderKeyRemover::default().remove_background(&image).unwrap();
        assert_eq!(result.get_pixel(1, 1), &BACKGROUND_SENTINEL);
    }

    #[test]
    fn remove_background_with_transparent_input_treats_transparency_as_background() {
        let image = create_solid_square_on_background(30, 30, 10, RED, BACKGROUND_SENTINEL);
        let result = BorderKeyRemover::default().remove_background(&image).unwrap();
        assert_eq!(result.pixels().filter(|p| p[3] > 0).count(), 100);
    }

    #[test]
    fn remove_background_does_not_mutate_input() {
        let image = create_solid_square_on_background(30, 30, 10, RED, WHITE);
        let before = image.clone();
        let _ = BorderKeyRemover::default().remove_background(&image).unwrap();
        assert_eq!(image, before);
    }

    #[test]
    fn remove_background_with_empty_image_returns_error() {
        let image = Bitmap::new(0, 0);
        assert_eq!(
            BorderKeyRemover::default().remove_background(&image),
            Err(SegmentationError::EmptyImage {
                width: 0,
                height: 0
            })
        );
    }

    #[test]
    fn closure_remover_is_accepted_as_background_remover() {
        let failing = |_: &Bitmap| -> Result<Bitmap, SegmentationError> {
            Err(SegmentationError::Model("out of memory".to_string()))
        };
        let image = create_solid_square_on_background(4, 4, 2, RED, WHITE);
        assert!(matches!(
            failing.remove_background(&image),
            Err(SegmentationError::Model(_))
        ));
    }
}
