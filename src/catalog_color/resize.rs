use image::{GenericImageView, ImageBuffer, Pixel, Primitive};
use imageproc::definitions::{Clamp, Image};

use crate::error::ResizeError;
use crate::utils::round_to_subpixel;

/// Element of the separable weight table.
#[derive(Debug, Clone, Copy)]
pub struct InterpolationWeight {
    /// Destination index
    pub destination_index: u32,
    /// Source index
    pub source_index: u32,
    /// Weight value
    pub weight: f32,
}

/// Resizes to an exact target size, ignoring the source aspect ratio.
///
/// Each axis is handled independently: a shrinking axis uses area averaging
/// (OpenCV `INTER_AREA`), a growing axis uses bilinear interpolation with
/// half-pixel centers. The result is deterministic for a given input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedResize {
    /// New width
    pub new_width: u32,
    /// New height
    pub new_height: u32,
}

impl FixedResize {
    /// Create a new resizer for the given target.
    pub const fn new(new_width: u32, new_height: u32) -> Result<Self, ResizeError> {
        if new_width == 0 || new_height == 0 {
            return Err(ResizeError::InvalidTargetDimensions {
                width: new_width,
                height: new_height,
            });
        }
        Ok(Self {
            new_width,
            new_height,
        })
    }
}

/// Area decimation table for a shrinking (or same-size) axis.
fn compute_area_weights(src_size: u32, dst_size: u32, scale: f32) -> Vec<InterpolationWeight> {
    let mut tab = Vec::new();

    for dx in 0..dst_size {
        let src_x_start = dx as f32 * scale;
        let src_x_end = src_x_start + scale;

        let src_x_start_int = (src_x_start.ceil() as u32).min(src_size);
        let src_x_end_int = (src_x_end.floor() as u32).min(src_size);

        let cell_width = if src_x_end - src_x_start != scale {
            // Footprint extends beyond image bounds
            if src_x_start_int == 0 {
                src_x_end_int as f32
            } else if src_x_end_int == src_size {
                src_size as f32 - src_x_start
            } else {
                scale
            }
        } else {
            scale
        };

        // Left partial overlap
        if src_x_start_int > 0 && (src_x_start_int as f32 - src_x_start) > 1e-3 {
            tab.push(InterpolationWeight {
                destination_index: dx,
                source_index: src_x_start_int - 1,
                weight: (src_x_start_int as f32 - src_x_start) / cell_width,
            });
        }

        // Full overlaps
        for sx in src_x_start_int..src_x_end_int {
            tab.push(InterpolationWeight {
                destination_index: dx,
                source_index: sx,
                weight: 1.0 / cell_width,
            });
        }

        // Right partial overlap
        if src_x_end_int < src_size && (src_x_end - src_x_end_int as f32) > 1e-3 {
            tab.push(InterpolationWeight {
                destination_index: dx,
                source_index: src_x_end_int,
                weight: (src_x_end - src_x_end_int as f32) / cell_width,
            });
        }
    }

    tab
}

/// Linear interpolation table for a growing axis.
fn compute_bilinear_weights(src_size: u32, dst_size: u32) -> Vec<InterpolationWeight> {
    let scale = src_size as f32 / dst_size as f32;
    let last = src_size - 1;
    let mut tab = Vec::with_capacity(dst_size as usize * 2);

    for dx in 0..dst_size {
        let center = ((dx as f32 + 0.5) * scale - 0.5).max(0.0);
        let left = (center.floor() as u32).min(last);
        let right = (left + 1).min(last);
        let t = (center - left as f32).clamp(0.0, 1.0);

        if left == right || t <= f32::EPSILON {
            tab.push(InterpolationWeight {
                destination_index: dx,
                source_index: left,
                weight: 1.0,
            });
            continue;
        }

        tab.push(InterpolationWeight {
            destination_index: dx,
            source_index: left,
            weight: 1.0 - t,
        });
        tab.push(InterpolationWeight {
            destination_index: dx,
            source_index: right,
            weight: t,
        });
    }

    tab
}

fn compute_axis_weights(src_size: u32, dst_size: u32) -> Vec<InterpolationWeight> {
    if dst_size <= src_size {
        compute_area_weights(src_size, dst_size, src_size as f32 / dst_size as f32)
    } else {
        compute_bilinear_weights(src_size, dst_size)
    }
}

/// Check if we can use the integer scale optimization.
fn can_use_integer_scale(src_size: u32, dst_size: u32) -> bool {
    if dst_size >= src_size {
        return false;
    }

    let scale = src_size as f32 / dst_size as f32;
    let int_scale = scale.round() as u32;

    (scale - int_scale as f32).abs() < f32::EPSILON && int_scale >= 2
}

/// Block averaging when both axes shrink by an integer factor.
fn resize_integer_scale<I, P>(src: &I, dst_width: u32, dst_height: u32) -> Image<P>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel,
    P::Subpixel: Clamp<f32> + Into<f32> + Primitive,
{
    let (src_width, src_height) = src.dimensions();
    let scale_x = src_width / dst_width;
    let scale_y = src_height / dst_height;
    let inv_area = 1.0 / (scale_x * scale_y) as f32;
    let channels = P::CHANNEL_COUNT as usize;

    ImageBuffer::from_fn(dst_width, dst_height, |dx, dy| {
        let mut pixel_sum = vec![0.0f32; channels];

        let start_x = dx * scale_x;
        let start_y = dy * scale_y;

        for sy in start_y..start_y + scale_y {
            for sx in start_x..start_x + scale_x {
                let pixel = src.get_pixel(sx, sy);
                for (sum, &value) in pixel_sum.iter_mut().zip(pixel.channels()) {
                    *sum += value.into();
                }
            }
        }

        let output_channels: Vec<P::Subpixel> = pixel_sum
            .iter()
            .map(|&sum| round_to_subpixel(sum * inv_area))
            .collect();

        *P::from_slice(&output_channels)
    })
}

/// Separable two-pass resize driven by per-axis weight tables.
///
/// The row table must be grouped by destination row in ascending order.
fn resize_separable<I, P>(src: &I, dst_width: u32, dst_height: u32) -> Image<P>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel,
    P::Subpixel: Clamp<f32> + Into<f32> + Primitive,
{
    let (src_width, src_height) = src.dimensions();
    let x_weights = compute_axis_weights(src_width, dst_width);
    let y_weights = compute_axis_weights(src_height, dst_height);

    let channels = P::CHANNEL_COUNT as usize;
    let mut output = ImageBuffer::new(dst_width, dst_height);

    let mut buf = vec![0.0f32; dst_width as usize * channels];
    let mut sum = vec![0.0f32; dst_width as usize * channels];

    let flush_row = |output: &mut Image<P>, sum: &[f32], dy: u32| {
        for dx in 0..dst_width {
            let start = dx as usize * channels;
            let pixel_channels: Vec<P::Subpixel> = sum[start..start + channels]
                .iter()
                .map(|&value| round_to_subpixel(value))
                .collect();
            output.put_pixel(dx, dy, *P::from_slice(&pixel_channels));
        }
    };

    let mut prev_dy = None;

    for y_entry in &y_weights {
        let dy = y_entry.destination_index;

        if let Some(prev) = prev_dy {
            if prev != dy {
                flush_row(&mut output, &sum, prev);
                sum.fill(0.0);
            }
        }

        // Horizontal pass over one source row
        buf.fill(0.0);
        for x_entry in &x_weights {
            let src_pixel = src.get_pixel(x_entry.source_index, y_entry.source_index);
            let base = x_entry.destination_index as usize * channels;
            for (c, &value) in src_pixel.channels().iter().enumerate() {
                buf[base + c] += value.into() * x_entry.weight;
            }
        }

        // Vertical accumulation
        for (acc, &value) in sum.iter_mut().zip(&buf) {
            *acc += value * y_entry.weight;
        }

        prev_dy = Some(dy);
    }

    if let Some(last) = prev_dy {
        flush_row(&mut output, &sum, last);
    }

    output
}

impl FixedResize {
    /// Resize `src` to exactly `new_width` x `new_height`.
    pub fn resize<I, P>(&self, src: &I) -> Result<Image<P>, ResizeError>
    where
        I: GenericImageView<Pixel = P>,
        P: Pixel,
        P::Subpixel: Clamp<f32> + Into<f32> + Primitive,
    {
        let (src_width, src_height) = src.dimensions();

        if src_width == 0 || src_height == 0 {
            return Err(ResizeError::EmptyImage {
                width: src_width,
                height: src_height,
            });
        }

        if (src_width, src_height) == (self.new_width, self.new_height) {
            return Ok(ImageBuffer::from_fn(src_width, src_height, |x, y| {
                src.get_pixel(x, y)
            }));
        }

        if can_use_integer_scale(src_width, self.new_width)
            && can_use_integer_scale(src_height, self.new_height)
        {
            Ok(resize_integer_scale(src, self.new_width, self.new_height))
        } else {
            Ok(resize_separable(src, self.new_width, self.new_height))
        }
    }
}

/// Extension trait for `Image` to resize to an exact size.
pub trait ResizeExactExt<P>
where
    P: Pixel,
{
    /// Resize to exactly `new_width` x `new_height` without preserving aspect ratio.
    fn resize_exact(&self, new_width: u32, new_height: u32) -> Result<Image<P>, ResizeError>;
}

impl<P> ResizeExactExt<P> for Image<P>
where
    P: Pixel,
    P::Subpixel: Clamp<f32> + Into<f32> + Primitive,
{
    fn resize_exact(&self, new_width: u32, new_height: u32) -> Result<Image<P>, ResizeError> {
        FixedResize::new(new_width, new_height)?.resize(self)
    }
}
