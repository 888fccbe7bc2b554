//! `threshold` — binary mask from a cutoff value.

use tilework_core::error::Result;
use tilework_tiling::buffers::{TileDest, TileSources};
use tilework_tiling::params::{TileBounds, TileParams};
use tilework_tiling::task::ImageTileTask;

/// Maps each gray pixel to `255` if it's `>= cutoff`, else `0`.
pub struct ThresholdTask {
    /// Inclusive lower bound for the "on" output.
    pub cutoff: u8,
}

impl ImageTileTask for ThresholdTask {
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
                dst.set_pixel(0, x, y, if v >= self.cutoff { 255 } else { 0 });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilework_core::image::Image;

    #[test]
    fn threshold_splits_at_cutoff() {
        let mut img = Image::new(3, 1, 1).unwrap();
        img.channel_mut(0).copy_from_slice(&[50, 128, 200]);
        let mut out = Image::new(3, 1, 1).unwrap();
        let dst = TileDest::from_image(&mut out);
        let src = TileSources::single(&img);
        let bounds = TileBounds::whole_image(3, 1);
        let params = TileParams::same_size(3, 1);
        ThresholdTask { cutoff: 128 }
            .tile(&src, &dst, bounds, &params)
            .unwrap();
        assert_eq!(out.pixel(0, 0, 0), 0);
        assert_eq!(out.pixel(0, 1, 0), 255);
        assert_eq!(out.pixel(0, 2, 0), 255);
    }
}
