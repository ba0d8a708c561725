use image::Rgb;

/// Two bits each of luminance, hue and lightness.
const BUCKETS: usize = 64;

/// Histogram bucket of a color.
///
/// The key packs the top two bits of the relative luminance, the HSL hue and
/// the HSL lightness (all on a 0..=255 scale) as `0bYYHHLL`.
pub(crate) fn bucket_index(color: Rgb<u8>) -> usize {
    let (hue, lightness) = hue_and_lightness(color);
    let luminance = relative_luminance(color);
    (usize::from(luminance >> 6) << 4) | (usize::from(hue >> 6) << 2) | usize::from(lightness >> 6)
}

/// Mean color and pixel count of every non-empty bucket, in bucket order.
pub(crate) fn bucket_means(pixels: &[Rgb<u8>]) -> Vec<(Rgb<u8>, u64)> {
    let mut sums = [[0u64; 3]; BUCKETS];
    let mut counts = [0u64; BUCKETS];

    for &pixel in pixels {
        let index = bucket_index(pixel);
        let Rgb([red, green, blue]) = pixel;
        sums[index][0] += u64::from(red);
        sums[index][1] += u64::from(green);
        sums[index][2] += u64::from(blue);
        counts[index] += 1;
    }

    sums.iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(sum, count)| {
            let mean = |channel: u64| ((channel + count / 2) / count) as u8;
            (Rgb([mean(sum[0]), mean(sum[1]), mean(sum[2])]), count)
        })
        .collect()
}

fn relative_luminance(Rgb([red, green, blue]): Rgb<u8>) -> u8 {
    let luminance =
        f32::from(red) * 0.2126 + f32::from(green) * 0.7152 + f32::from(blue) * 0.0722;
    luminance.clamp(0.0, 255.0) as u8
}

/// HSL hue and lightness, both scaled to 0..=255.
fn hue_and_lightness(Rgb([red, green, blue]): Rgb<u8>) -> (u8, u8) {
    let (r, g, b) = (i32::from(red), i32::from(green), i32::from(blue));
    let most = r.max(g).max(b);
    let least = r.min(g).min(b);
    let lightness = ((most + least) >> 1) as u8;

    if most == least {
        return (0, lightness);
    }

    let diff = most - least;
    // Six hue sectors of 255 each, wrapped into 0..1530
    let sector = if most == r {
        (g - b) * 255 / diff
    } else if most == g {
        (b - r) * 255 / diff + 510
    } else {
        (r - g) * 255 / diff + 1020
    };
    let hue = sector.rem_euclid(1530) / 6;

    (hue as u8, lightness)
}
