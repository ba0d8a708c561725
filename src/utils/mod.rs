//! Internal utility functions for catalog-color.
//!
//! This module contains common functionality used across the pipeline stages.

use image::{Primitive, Rgba};
use imageproc::definitions::Clamp;

/// Converts an accumulated channel value back to a subpixel.
///
/// Integer subpixels are rounded to the nearest value so that weight tables
/// summing to `0.99999` still reproduce uniform colors exactly. Floating
/// subpixels pass through unchanged.
#[inline]
pub fn round_to_subpixel<S>(value: f32) -> S
where
    S: Primitive + Into<f32> + Clamp<f32>,
{
    let max: f32 = S::DEFAULT_MAX_VALUE.into();
    if max > 1.0 {
        S::clamp(value.round())
    } else {
        S::clamp(value)
    }
}

/// Largest per-channel difference between the color parts of two pixels.
#[inline]
pub fn max_channel_distance(a: &Rgba<u8>, b: &Rgba<u8>) -> u8 {
    let Rgba([ar, ag, ab, _]) = *a;
    let Rgba([br, bg, bb, _]) = *b;
    ar.abs_diff(br).max(ag.abs_diff(bg)).max(ab.abs_diff(bb))
}

/// Validates that an image has non-zero dimensions.
///
/// # Returns
///
/// `Ok(())` if the dimensions are valid, otherwise a message naming `context`
pub fn validate_non_empty_image(width: u32, height: u32, context: &str) -> Result<(), String> {
    if width == 0 || height == 0 {
        Err(format!("{}: Image dimensions must be non-zero", context))
    } else {
        Ok(())
    }
}

/// Validates that two images have matching dimensions.
pub fn validate_matching_dimensions(
    width1: u32,
    height1: u32,
    width2: u32,
    height2: u32,
    context: &str,
) -> Result<(), String> {
    if width1 != width2 || height1 != height2 {
        Err(format!(
            "{}: Image dimensions must match. Got {}x{} and {}x{}",
            context, width1, height1, width2, height2
        ))
    } else {
        Ok(())
    }
}
