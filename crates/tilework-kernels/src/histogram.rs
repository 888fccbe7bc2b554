//! `histogram` — 256-bin gray-level count, as a reduce tile task.

use tilework_core::error::Result;
use tilework_core::histogram::Histogram;
use tilework_tiling::buffers::TileSources;
use tilework_tiling::params::{TileBounds, TileParams};
use tilework_tiling::task::ReduceTileTask;

/// Counts occurrences of each gray value (channel 0) in `[0, 256)` bins.
pub struct HistogramTask;

impl ReduceTileTask<Histogram<u64>> for HistogramTask {
    fn tile(
        &self,
        src: &TileSources<'_>,
        bounds: TileBounds,
        _params: &TileParams,
    ) -> Result<Histogram<u64>> {
        let image = src.primary()?;
        let mut hist = Histogram::new(256);
        for y in bounds.from_y..=bounds.to_y {
            for x in bounds.from_x..=bounds.to_x {
                let v = image.pixel(0, x, y) as usize;
                hist.add(v, 1)?;
            }
        }
        Ok(hist)
    }

    fn merge(&self, a: Histogram<u64>, b: Histogram<u64>) -> Result<Histogram<u64>> {
        let mut a = a;
        a.merge(&b)?;
        Ok(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilework_core::image::Image;
    use tilework_pool::CancellationToken;
    use tilework_tiling::engine::drive_reduce;

    #[test]
    fn histogram_counts_uniform_image() {
        let mut img = Image::new(8, 8, 1).unwrap();
        img.channel_mut(0).iter_mut().for_each(|p| *p = 128);
        let src = TileSources::single(&img);
        let bounds = TileBounds::whole_image(8, 8);
        let params = TileParams::same_size(8, 8).with_cutoffs(2, 2);
        let cancel = CancellationToken::new();
        let hist = drive_reduce(&HistogramTask, &src, bounds, &params, &cancel).unwrap();
        assert_eq!(*hist.at(128).unwrap(), 64);
        assert_eq!(*hist.at(0).unwrap(), 0);
    }
}
