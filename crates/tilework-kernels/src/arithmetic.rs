//! Two-source and parametric single-source arithmetic kernels: `diff`,
//! `mean`, `multiply_add`.

use tilework_core::error::Result;
use tilework_tiling::buffers::{TileDest, TileSources};
use tilework_tiling::params::{TileBounds, TileParams};
use tilework_tiling::task::ImageTileTask;

/// Per-pixel absolute difference of two same-size gray images.
pub struct DiffTask;

impl ImageTileTask for DiffTask {
    fn tile(
        &self,
        src: &TileSources<'_>,
        dst: &TileDest<'_>,
        bounds: TileBounds,
        _params: &TileParams,
    ) -> Result<()> {
        let a = src.get(0)?;
        let b = src.get(1)?;
        for y in bounds.from_y..=bounds.to_y {
            for x in bounds.from_x..=bounds.to_x {
                let va = a.pixel(0, x, y) as i32;
                let vb = b.pixel(0, x, y) as i32;
                dst.set_pixel(0, x, y, (va - vb).unsigned_abs() as u8);
            }
        }
        Ok(())
    }
}

/// Per-pixel average of two same-size gray images.
pub struct MeanTask;

impl ImageTileTask for MeanTask {
    fn tile(
        &self,
        src: &TileSources<'_>,
        dst: &TileDest<'_>,
        bounds: TileBounds,
        _params: &TileParams,
    ) -> Result<()> {
        let a = src.get(0)?;
        let b = src.get(1)?;
        for y in bounds.from_y..=bounds.to_y {
            for x in bounds.from_x..=bounds.to_x {
                let va = a.pixel(0, x, y) as u32;
                let vb = b.pixel(0, x, y) as u32;
                dst.set_pixel(0, x, y, ((va + vb) / 2) as u8);
            }
        }
        Ok(())
    }
}

/// `dst = clamp(src * factor + offset, 0, 255)`, driven from `params.reals[0]`/`reals[1]`.
pub struct MultiplyAddTask {
    /// Multiplicative factor.
    pub factor: f64,
    /// Additive offset, applied after the multiply.
    pub offset: f64,
}

impl ImageTileTask for MultiplyAddTask {
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
                let v = image.pixel(0, x, y) as f64;
                let out = (v * self.factor + self.offset).round().clamp(0.0, 255.0) as u8;
                dst.set_pixel(0, x, y, out);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilework_core::image::Image;

    fn single_pixel_gray(value: u8) -> Image {
        let mut img = Image::new(1, 1, 1).unwrap();
        img.channel_mut(0)[0] = value;
        img
    }

    #[test]
    fn diff_is_absolute_and_symmetric() {
        let a = single_pixel_gray(30);
        let b = single_pixel_gray(200);
        let mut out = Image::new(1, 1, 1).unwrap();
        let dst = TileDest::from_image(&mut out);
        let src = TileSources::pair(&a, &b);
        let bounds = TileBounds::whole_image(1, 1);
        let params = TileParams::same_size(1, 1);
        DiffTask.tile(&src, &dst, bounds, &params).unwrap();
        assert_eq!(out.pixel(0, 0, 0), 170);
    }

    #[test]
    fn mean_averages_two_images() {
        let a = single_pixel_gray(10);
        let b = single_pixel_gray(20);
        let mut out = Image::new(1, 1, 1).unwrap();
        let dst = TileDest::from_image(&mut out);
        let src = TileSources::pair(&a, &b);
        let bounds = TileBounds::whole_image(1, 1);
        let params = TileParams::same_size(1, 1);
        MeanTask.tile(&src, &dst, bounds, &params).unwrap();
        assert_eq!(out.pixel(0, 0, 0), 15);
    }

    #[test]
    fn multiply_add_clamps_to_byte_range() {
        let img = single_pixel_gray(200);
        let mut out = Image::new(1, 1, 1).unwrap();
        let dst = TileDest::from_image(&mut out);
        let src = TileSources::single(&img);
        let bounds = TileBounds::whole_image(1, 1);
        let params = TileParams::same_size(1, 1);
        MultiplyAddTask {
            factor: 2.0,
            offset: 0.0,
        }
        .tile(&src, &dst, bounds, &params)
        .unwrap();
        assert_eq!(out.pixel(0, 0, 0), 255);
    }
}
