//! Synthetic catalog images for unit tests.

use std::io::Cursor;

use image::{ImageFormat, Rgba};

use crate::Bitmap;

/// Creates a 2x2 RGBA image with known pixel values:
/// - (0,0): [200, 150, 100, 255] (opaque)
/// - (1,0): [100, 200, 150, 128] (semi-transparent)
/// - (0,1): [150, 100, 200, 64]  (more transparent)
/// - (1,1): [50, 75, 25, 0]      (fully transparent)
pub fn create_test_rgba_image() -> Bitmap {
    let mut image = Bitmap::new(2, 2);
    image.put_pixel(0, 0, Rgba([200, 150, 100, 255]));
    image.put_pixel(1, 0, Rgba([100, 200, 150, 128]));
    image.put_pixel(0, 1, Rgba([150, 100, 200, 64]));
    image.put_pixel(1, 1, Rgba([50, 75, 25, 0]));
    image
}

/// A `size`x`size` square of `color`, centered on a `background` canvas.
pub fn create_solid_square_on_background(
    width: u32,
    height: u32,
    size: u32,
    color: Rgba<u8>,
    background: Rgba<u8>,
) -> Bitmap {
    let left = (width - size) / 2;
    let top = (height - size) / 2;
    Bitmap::from_fn(width, height, |x, y| {
        if (left..left + size).contains(&x) && (top..top + size).contains(&y) {
            color
        } else {
            background
        }
    })
}

/// A ring of `frame` enclosing a window of `background`.
///
/// The ring spans the middle 60% of each axis and is 15% of the short side
/// thick, so the window never touches the border.
pub fn create_framed_subject(
    width: u32,
    height: u32,
    frame: Rgba<u8>,
    background: Rgba<u8>,
) -> Bitmap {
    let thickness = (width.min(height) * 3 / 20).max(1);
    let outer_x = (width / 5)..(width - width / 5);
    let outer_y = (height / 5)..(height - height / 5);
    let inner_x = (outer_x.start + thickness)..(outer_x.end - thickness);
    let inner_y = (outer_y.start + thickness)..(outer_y.end - thickness);

    Bitmap::from_fn(width, height, |x, y| {
        let in_outer = outer_x.contains(&x) && outer_y.contains(&y);
        let in_inner = inner_x.contains(&x) && inner_y.contains(&y);
        if in_outer && !in_inner {
            frame
        } else {
            background
        }
    })
}

/// A 240x320 product shot: a `primary` body with a smaller `secondary`
/// band across its lower part, on a `background` canvas.
///
/// The body covers 25600 pixels and the band 6400, so `primary` always
/// ranks first.
pub fn create_two_tone_item(
    primary: Rgba<u8>,
    secondary: Rgba<u8>,
    background: Rgba<u8>,
) -> Bitmap {
    Bitmap::from_fn(240, 320, |x, y| match (x, y) {
        (40..=199, 200..=239) => secondary,
        (40..=199, 60..=259) => primary,
        _ => background,
    })
}

pub fn encode_png(bitmap: &Bitmap) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    bitmap
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encoding an in-memory PNG cannot fail");
    bytes.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([200, 20, 30, 255]);
    const BLUE: Rgba<u8> = Rgba([30, 60, 200, 255]);
    const GREEN: Rgba<u8> = Rgba([34, 139, 34, 255]);

    fn count(image: &Bitmap, color: Rgba<u8>) -> usize {
        image.pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn solid_square_is_centered_with_exact_area() {
        let image = create_solid_square_on_background(60, 80, 20, RED, WHITE);
        assert_eq!(count(&image, RED), 400);
        assert_eq!(image.get_pixel(20, 30), &RED);
        assert_eq!(image.get_pixel(19, 30), &WHITE);
        assert_eq!(image.get_pixel(39, 49), &RED);
        assert_eq!(image.get_pixel(40, 49), &WHITE);
    }

    #[test]
    fn framed_subject_has_background_window_inside_frame() {
        let image = create_framed_subject(40, 40, RED, WHITE);
        assert_eq!(image.get_pixel(20, 20), &WHITE);
        assert_eq!(image.get_pixel(9, 20), &RED);
        assert_eq!(image.get_pixel(0, 0), &WHITE);
    }

    #[test]
    fn two_tone_item_ranks_primary_by_area() {
        let image = create_two_tone_item(BLUE, GREEN, WHITE);
        assert_eq!(image.dimensions(), (240, 320));
        assert_eq!(count(&image, BLUE), 25600);
        assert_eq!(count(&image, GREEN), 6400);
        assert_eq!(image.get_pixel(0, 0), &WHITE);
    }
}
