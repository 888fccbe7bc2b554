//! `convert_to_gray` / `convert_to_rgb` tile tasks.

use tilework_core::error::Result;
use tilework_tiling::buffers::{TileDest, TileSources};
use tilework_tiling::params::{TileBounds, TileParams};
use tilework_tiling::task::ImageTileTask;

use crate::gray_mode::GrayMode;

/// Reduces a 3-channel RGB source to a 1-channel gray destination.
pub struct ConvertToGrayTask {
    /// Channel-combination strategy.
    pub mode: GrayMode,
}

impl ImageTileTask for ConvertToGrayTask {
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
                let r = image.pixel(0, x, y);
                let g = image.pixel(1, x, y);
                let b = image.pixel(2, x, y);
                dst.set_pixel(0, x, y, self.mode.apply(r, g, b));
            }
        }
        Ok(())
    }
}

/// Expands a 1-channel gray source into a 3-channel RGB destination by
/// duplicating the gray value into every channel.
///
/// `Image::expand_gray_to_rgb` already gives a zero-copy path for the exact
/// same result when no other transform is needed; this task exists for the
/// explicit `convert_to_rgb` script operation, where the plan compiler
/// always routes through a tile task rather than special-casing a no-op.
pub struct ConvertToRgbTask;

impl ImageTileTask for ConvertToRgbTask {
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
                dst.set_pixel(0, x, y, v);
                dst.set_pixel(1, x, y, v);
                dst.set_pixel(2, x, y, v);
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
    fn convert_to_gray_use_red_matches_red_channel() {
        let mut rgb = Image::new(2, 2, 3).unwrap();
        let reds = [10u8, 20, 30, 40];
        for (i, &v) in reds.iter().enumerate() {
            let (x, y) = ((i % 2) as u32, (i / 2) as u32);
            rgb.channel_mut(0)[rgb.pixel_offset(x, y)] = v;
        }
        let mut gray = Image::new(2, 2, 1).unwrap();
        let dst = TileDest::from_image(&mut gray);
        let src = TileSources::single(&rgb);
        let bounds = TileBounds::whole_image(2, 2);
        let params = TileParams::same_size(2, 2);
        let task = ConvertToGrayTask {
            mode: GrayMode::UseRed,
        };
        task.tile(&src, &dst, bounds, &params).unwrap();
        assert_eq!(gray.pixel(0, 0, 0), 10);
        assert_eq!(gray.pixel(0, 1, 0), 20);
        assert_eq!(gray.pixel(0, 0, 1), 30);
        assert_eq!(gray.pixel(0, 1, 1), 40);
    }

    #[test]
    fn convert_to_rgb_duplicates_gray_into_all_channels() {
        let mut gray = Image::new(1, 1, 1).unwrap();
        gray.channel_mut(0)[0] = 77;
        let mut rgb = Image::new(1, 1, 3).unwrap();
        let dst = TileDest::from_image(&mut rgb);
        let src = TileSources::single(&gray);
        let bounds = TileBounds::whole_image(1, 1);
        let params = TileParams::same_size(1, 1);
        ConvertToRgbTask.tile(&src, &dst, bounds, &params).unwrap();
        assert_eq!(rgb.pixel(0, 0, 0), 77);
        assert_eq!(rgb.pixel(1, 0, 0), 77);
        assert_eq!(rgb.pixel(2, 0, 0), 77);
    }
}
