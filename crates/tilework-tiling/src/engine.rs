//! Recursive tile splitting, grounded directly on spec.md §4.3: split along
//! x when width exceeds its cutoff, else along y when height exceeds its
//! cutoff, else the bounds are small enough to process as one leaf tile.
//!
//! Both halves of a split always run to completion via [`rayon::join`] —
//! there's no bookkeeping to "abort the other half early" on cancellation
//! or error. An unstarted split simply never gets scheduled once `?`
//! short-circuits the recursive call before the next `join`, which is
//! exactly the "await outstanding tasks, ignore their results" behavior
//! spec.md describes.

use tilework_pool::CancellationToken;

use tilework_core::error::Result;

use crate::buffers::{TileDest, TileSources};
use crate::params::{TileBounds, TileParams};
use crate::task::{ImageTileTask, ReduceTileTask};

fn split_x(bounds: TileBounds) -> (TileBounds, TileBounds) {
    let mid = bounds.from_x + bounds.width() / 2 - 1;
    (
        TileBounds {
            to_x: mid,
            ..bounds
        },
        TileBounds {
            from_x: mid + 1,
            ..bounds
        },
    )
}

fn split_y(bounds: TileBounds) -> (TileBounds, TileBounds) {
    let mid = bounds.from_y + bounds.height() / 2 - 1;
    (
        TileBounds {
            to_y: mid,
            ..bounds
        },
        TileBounds {
            from_y: mid + 1,
            ..bounds
        },
    )
}

enum Split {
    X(TileBounds, TileBounds),
    Y(TileBounds, TileBounds),
    Leaf,
}

fn choose_split(bounds: TileBounds, params: &TileParams) -> Split {
    if bounds.width() > params.cutoff_x.max(1) {
        let (a, b) = split_x(bounds);
        Split::X(a, b)
    } else if bounds.height() > params.cutoff_y.max(1) {
        let (a, b) = split_y(bounds);
        Split::Y(a, b)
    } else {
        Split::Leaf
    }
}

/// Drives an [`ImageTileTask`] over `bounds`, recursively splitting and
/// dispatching onto the rayon pool until each leaf tile is small enough per
/// `params.cutoff_x`/`cutoff_y`, then calling `task.tile` on it.
pub fn drive_image(
    task: &dyn ImageTileTask,
    src: &TileSources<'_>,
    dst: &TileDest<'_>,
    bounds: TileBounds,
    params: &TileParams,
    cancel: &CancellationToken,
) -> Result<()> {
    cancel.check()?;
    match choose_split(bounds, params) {
        Split::Leaf => task.tile(src, dst, bounds, params),
        Split::X(left, right) => {
            let (ra, rb) = rayon::join(
                || drive_image(task, src, dst, left, params, cancel),
                || drive_image(task, src, dst, right, params, cancel),
            );
            ra?;
            rb?;
            task.horizontal_merge(dst, dst, bounds, params)
        }
        Split::Y(top, bottom) => {
            let (ra, rb) = rayon::join(
                || drive_image(task, src, dst, top, params, cancel),
                || drive_image(task, src, dst, bottom, params, cancel),
            );
            ra?;
            rb?;
            task.vertical_merge(dst, dst, bounds, params)
        }
    }
}

/// Drives a [`ReduceTileTask`] over `bounds`, recursively splitting and
/// merging sibling results with `task.merge` as each pair of branches
/// completes.
pub fn drive_reduce<R: Send>(
    task: &dyn ReduceTileTask<R>,
    src: &TileSources<'_>,
    bounds: TileBounds,
    params: &TileParams,
    cancel: &CancellationToken,
) -> Result<R> {
    cancel.check()?;
    match choose_split(bounds, params) {
        Split::Leaf => task.tile(src, bounds, params),
        Split::X(left, right) | Split::Y(left, right) => {
            let (ra, rb) = rayon::join(
                || drive_reduce(task, src, left, params, cancel),
                || drive_reduce(task, src, right, params, cancel),
            );
            task.merge(ra?, rb?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilework_core::image::Image;

    struct FillTask;

    impl ImageTileTask for FillTask {
        fn tile(
            &self,
            _src: &TileSources<'_>,
            dst: &TileDest<'_>,
            bounds: TileBounds,
            _params: &TileParams,
        ) -> Result<()> {
            for y in bounds.from_y..=bounds.to_y {
                for x in bounds.from_x..=bounds.to_x {
                    dst.set_pixel(0, x, y, 7);
                }
            }
            Ok(())
        }
    }

    struct CountTask;

    impl ReduceTileTask<u64> for CountTask {
        fn tile(&self, _src: &TileSources<'_>, bounds: TileBounds, _params: &TileParams) -> Result<u64> {
            Ok((bounds.width() as u64) * (bounds.height() as u64))
        }

        fn merge(&self, a: u64, b: u64) -> Result<u64> {
            Ok(a + b)
        }
    }

    #[test]
    fn drive_image_fills_every_pixel_regardless_of_cutoff() {
        for cutoff in [1u32, 3, 100] {
            let mut dst_img = Image::new(10, 7, 1).unwrap();
            let src_img = Image::new(10, 7, 1).unwrap();
            let src = TileSources::single(&src_img);
            let dst = TileDest::from_image(&mut dst_img);
            let bounds = TileBounds::whole_image(10, 7);
            let params = TileParams::same_size(10, 7).with_cutoffs(cutoff, cutoff);
            let cancel = CancellationToken::new();
            drive_image(&FillTask, &src, &dst, bounds, &params, &cancel).unwrap();
            for y in 0..7 {
                for x in 0..10 {
                    assert_eq!(dst_img.pixel(0, x, y), 7);
                }
            }
        }
    }

    #[test]
    fn drive_reduce_total_is_cutoff_invariant() {
        let src_img = Image::new(16, 9, 1).unwrap();
        let src = TileSources::single(&src_img);
        let bounds = TileBounds::whole_image(16, 9);
        let cancel = CancellationToken::new();

        let small = TileParams::same_size(16, 9).with_cutoffs(1, 1);
        let large = TileParams::same_size(16, 9).with_cutoffs(1000, 1000);
        let total_small = drive_reduce(&CountTask, &src, bounds, &small, &cancel).unwrap();
        let total_large = drive_reduce(&CountTask, &src, bounds, &large, &cancel).unwrap();
        assert_eq!(total_small, 16 * 9);
        assert_eq!(total_small, total_large);
    }

    #[test]
    fn cancellation_short_circuits_before_leaf_work() {
        let src_img = Image::new(4, 4, 1).unwrap();
        let src = TileSources::single(&src_img);
        let bounds = TileBounds::whole_image(4, 4);
        let params = TileParams::same_size(4, 4).with_cutoffs(1, 1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = drive_reduce(&CountTask, &src, bounds, &params, &cancel);
        assert!(err.is_err());
    }
}
