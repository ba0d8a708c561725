use std::collections::BTreeMap;

use image::Rgb;
use itertools::Itertools;
use kmeans_colors::{get_kmeans_hamerly, Sort};
use palette::{FromColor, Lab, Srgb};

const MAX_ITERATIONS: usize = 20;
const CONVERGENCE: f32 = 0.5;

/// Seeded k-means in CIE Lab; returns `(color, count)` groups in ascending RGB order.
///
/// Images with at most `k` distinct colors skip clustering and return the
/// exact colors. Centroids that round to the same RGB value are merged and
/// empty clusters are dropped, so fewer than `k` groups may come back.
pub(crate) fn cluster(pixels: &[Rgb<u8>], k: usize, runs: u8, seed: u64) -> Vec<(Rgb<u8>, u64)> {
    // Cluster indices are stored as u8
    let k = k.min(usize::from(u8::MAX));

    let distinct = pixels.iter().map(|pixel| pixel.0).counts();
    if distinct.len() <= k {
        return distinct
            .into_iter()
            .sorted()
            .map(|(color, count)| (Rgb(color), count as u64))
            .collect();
    }

    let lab: Vec<Lab> = pixels
        .iter()
        .map(|&Rgb([red, green, blue])| {
            Lab::from_color(Srgb::new(red, green, blue).into_format::<f32>())
        })
        .collect();

    let Some(best) = (0..runs.max(1))
        .map(|run| {
            get_kmeans_hamerly(
                k,
                MAX_ITERATIONS,
                CONVERGENCE,
                false,
                &lab,
                seed.wrapping_add(u64::from(run)),
            )
        })
        .min_by(|a, b| a.score.total_cmp(&b.score))
    else {
        return Vec::new();
    };

    let total = best.indices.len() as f32;
    let mut merged: BTreeMap<[u8; 3], u64> = BTreeMap::new();
    for data in Lab::sort_indexed_colors(&best.centroids, &best.indices) {
        // Shares are exact count / total ratios, so rounding recovers the count
        let count = (data.percentage * total).round() as u64;
        if count == 0 {
            continue;
        }
        let rgb = Srgb::<f32>::from_color(data.centroid).into_format::<u8>();
        *merged.entry([rgb.red, rgb.green, rgb.blue]).or_default() += count;
    }

    merged
        .into_iter()
        .map(|(color, count)| (Rgb(color), count))
        .collect()
}
