use image::{GenericImageView, Luma, Rgba};
use imageproc::map::map_colors2;

use crate::error::SegmentationError;
use crate::utils::validate_matching_dimensions;
use crate::{Bitmap, Image};

/// Pixel written for every masked-out position.
pub const BACKGROUND_SENTINEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Trait for cutting a bitmap down to its foreground with a mask
///
/// The mask is combined with the existing alpha channel (the smaller value
/// wins). Pixels whose resulting alpha is zero are replaced with
/// [`BACKGROUND_SENTINEL`] so no background color survives in them.
pub trait ApplyForegroundMask {
    /// Returns a new bitmap with the mask applied. `self` is left untouched.
    ///
    /// # Errors
    ///
    /// * `SegmentationError::DimensionMismatch` - When image and mask dimensions don't match
    fn apply_foreground_mask(&self, mask: &Image<Luma<u8>>) -> Result<Bitmap, SegmentationError>;

    /// Applies the mask in-place.
    fn apply_foreground_mask_mut(
        &mut self,
        mask: &Image<Luma<u8>>,
    ) -> Result<&mut Self, SegmentationError>;
}

impl ApplyForegroundMask for Bitmap {
    fn apply_foreground_mask(&self, mask: &Image<Luma<u8>>) -> Result<Bitmap, SegmentationError> {
        validate_dimensions(self, mask)?;

        Ok(map_colors2(self, mask, |pixel, Luma([mask_alpha])| {
            mask_pixel(pixel, mask_alpha)
        }))
    }

    fn apply_foreground_mask_mut(
        &mut self,
        mask: &Image<Luma<u8>>,
    ) -> Result<&mut Self, SegmentationError> {
        validate_dimensions(self, mask)?;

        self.pixels_mut()
            .zip(mask.pixels())
            .for_each(|(pixel, &Luma([mask_alpha]))| *pixel = mask_pixel(*pixel, mask_alpha));

        Ok(self)
    }
}

#[inline]
fn mask_pixel(pixel: Rgba<u8>, mask_alpha: u8) -> Rgba<u8> {
    let Rgba([red, green, blue, alpha]) = pixel;
    match alpha.min(mask_alpha) {
        0 => BACKGROUND_SENTINEL,
        alpha => Rgba([red, green, blue, alpha]),
    }
}

#[inline]
fn validate_dimensions<I>(image: &I, mask: &Image<Luma<u8>>) -> Result<(), SegmentationError>
where
    I: GenericImageView,
{
    let (img_w, img_h) = image.dimensions();
    let (mask_w, mask_h) = mask.dimensions();

    validate_matching_dimensions(img_w, img_h, mask_w, mask_h, "ApplyForegroundMask").map_err(
        |_| SegmentationError::DimensionMismatch {
            expected: (img_w, img_h),
            actual: (mask_w, mask_h),
        },
    )
}
