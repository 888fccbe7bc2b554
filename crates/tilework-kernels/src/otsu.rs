//! `otsu_threshold` — between-class variance maximization over a histogram.
//!
//! Not a tile task: it runs once over an already-reduced 256-bin histogram,
//! so there's nothing to split or parallelize.

use tilework_core::histogram::Histogram;

/// Computes the Otsu threshold for a 256-bin gray-level histogram.
///
/// When the histogram has exactly one nonzero bin (a perfectly uniform
/// image), every split has zero between-class variance and the classic
/// loop never finds a strictly-greater candidate to update its initial
/// threshold — so it would always report `0`. That's a degenerate
/// tie-break, not a meaningful threshold, so this case is special-cased to
/// return the image's one present value directly.
pub fn otsu_threshold(hist: &Histogram<u64>) -> u8 {
    let bins = hist.bins();
    let nonzero: Vec<usize> = bins
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(v, _)| v)
        .collect();
    if nonzero.len() <= 1 {
        return nonzero.first().copied().unwrap_or(0) as u8;
    }

    let total: u64 = bins.iter().sum();
    let sum_all: f64 = bins
        .iter()
        .enumerate()
        .map(|(v, &count)| v as f64 * count as f64)
        .sum();

    let mut weight_bg = 0u64;
    let mut sum_bg = 0f64;
    let mut best_variance = -1f64;
    let mut best_threshold = 0u8;

    for (t, &count) in bins.iter().enumerate() {
        weight_bg += count;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }
        sum_bg += t as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let variance = weight_bg as f64 * weight_fg as f64 * (mean_bg - mean_fg).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }
    best_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_histogram_returns_the_single_present_value() {
        let mut hist: Histogram<u64> = Histogram::new(256);
        hist.add(128, 64).unwrap();
        assert_eq!(otsu_threshold(&hist), 128);
    }

    #[test]
    fn bimodal_histogram_splits_between_the_two_modes() {
        let mut hist: Histogram<u64> = Histogram::new(256);
        hist.add(10, 100).unwrap();
        hist.add(200, 100).unwrap();
        let t = otsu_threshold(&hist);
        assert!(t > 10 && t < 200);
    }
}
