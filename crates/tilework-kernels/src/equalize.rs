//! `histogram_equalisation` — contrast stretch via a cumulative-histogram LUT.
//!
//! Two phases: reduce the whole image to a 256-bin histogram (tile-parallel,
//! via [`HistogramTask`]), then build a 256-entry lookup table from its
//! cumulative distribution and apply it per pixel (tile-parallel, via
//! [`LutApplyTask`]). The two phases can't be one `ImageTileTask` — the LUT
//! needs the *whole* image's histogram before any pixel can be remapped —
//! so the script compiler's handler for this operation runs both phases in
//! sequence rather than driving a single tile task.

use tilework_core::error::Result;
use tilework_core::histogram::Histogram;
use tilework_pool::CancellationToken;
use tilework_tiling::buffers::{TileDest, TileSources};
use tilework_tiling::engine::drive_reduce;
use tilework_tiling::params::{TileBounds, TileParams};
use tilework_tiling::task::ImageTileTask;

use crate::histogram::HistogramTask;

/// Builds the 256-entry equalization LUT from a gray-level histogram.
///
/// `lut[v] = round((cdf(v) - cdf_min) / (total - cdf_min) * 255)`, the
/// standard cumulative-histogram equalization formula. `cdf_min` is the
/// cumulative count through the first nonzero bin. If the image is a single
/// constant value (`total == cdf_min`), the LUT is the identity — there's
/// no contrast to stretch.
pub fn equalization_lut(hist: &Histogram<u64>) -> [u8; 256] {
    let bins = hist.bins();
    let total: u64 = bins.iter().sum();

    let mut lut = [0u8; 256];
    if total == 0 {
        return lut;
    }

    let mut cdf_min = None;
    let mut running = 0u64;
    let mut cdf = [0u64; 256];
    for (v, &count) in bins.iter().enumerate() {
        running += count;
        cdf[v] = running;
        if cdf_min.is_none() && count > 0 {
            cdf_min = Some(running);
        }
    }
    let cdf_min = cdf_min.unwrap_or(0);
    let denom = total.saturating_sub(cdf_min);
    if denom == 0 {
        for (v, slot) in lut.iter_mut().enumerate() {
            *slot = v as u8;
        }
        return lut;
    }

    for (v, slot) in lut.iter_mut().enumerate() {
        let numerator = cdf[v].saturating_sub(cdf_min) as f64;
        *slot = (numerator / denom as f64 * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Applies a precomputed 256-entry LUT to a gray image, tile by tile.
pub struct LutApplyTask {
    /// Per-gray-level output mapping.
    pub lut: [u8; 256],
}

impl ImageTileTask for LutApplyTask {
    fn tile(
        &self,
        src: &TileSources<'_>,
        dst: &TileDest<'_>,
        bounds: TileBounds,
        _params: &TileParams,
    ) -> Result<()> {
        let image = src.primary()?;
        for y in bounds.from_y..=bounds.to_y {
            for x in bounds.from_x..=bounds.to_x {
                let v = image.pixel(0, x, y);
                dst.set_pixel(0, x, y, self.lut[v as usize]);
            }
        }
        Ok(())
    }
}

/// Runs both phases: reduce to a histogram, build the LUT, apply it.
///
/// Used directly by tests and by `tilework-script`'s handler for
/// `histogram_equalisation`.
pub fn equalize(
    src: &tilework_core::image::Image,
    params: &TileParams,
    cancel: &CancellationToken,
) -> Result<tilework_core::image::Image> {
    let sources = TileSources::single(src);
    let bounds = TileBounds::whole_image(src.width(), src.height());
    let hist = drive_reduce(&HistogramTask, &sources, bounds, params, cancel)?;
    let lut = equalization_lut(&hist);
    let mut out = tilework_core::image::Image::new(src.width(), src.height(), 1)?;
    let dst = TileDest::from_image(&mut out);
    tilework_tiling::engine::drive_image(
        &LutApplyTask { lut },
        &sources,
        &dst,
        bounds,
        params,
        cancel,
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilework_core::image::Image;

    #[test]
    fn equalize_matches_hand_derived_lut_values() {
        let mut img = Image::new(8, 8, 1).unwrap();
        let values: [u8; 10] = [52, 55, 55, 55, 58, 58, 59, 59, 59, 60];
        {
            let buf = img.channel_mut(0);
            for (i, v) in values.iter().enumerate() {
                buf[i] = *v;
            }
            for b in buf.iter_mut().skip(10) {
                *b = 128;
            }
        }
        let params = TileParams::same_size(8, 8);
        let cancel = CancellationToken::new();
        let out = equalize(&img, &params, &cancel).unwrap();
        assert_eq!(out.pixel(0, 0, 0), 0);
        assert_eq!(out.pixel(0, 1, 0), 12);
        assert_eq!(out.pixel(0, 4, 0), 20);
        assert_eq!(out.pixel(0, 6, 0), 32);
    }

    #[test]
    fn constant_image_equalizes_to_identity() {
        let img = Image::new(4, 4, 1).unwrap();
        let params = TileParams::same_size(4, 4);
        let cancel = CancellationToken::new();
        let out = equalize(&img, &params, &cancel).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(out.pixel(0, x, y), 0);
            }
        }
    }
}
