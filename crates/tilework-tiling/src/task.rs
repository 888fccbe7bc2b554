//! The tileable-kernel contract: what a kernel must implement to be driven
//! by [`crate::engine::drive_image`] / [`crate::engine::drive_reduce`].
//!
//! Grounded on `original_source/.../functors/image.hpp` and
//! `.../functors/histogram.hpp`: an image-producing kernel writes directly
//! into disjoint destination regions (no merge step), while a
//! reduction kernel (histogram) produces an owned partial result per tile
//! that must be combined with its sibling's.

use tilework_core::error::Result;

use crate::buffers::{TileDest, TileSources};
use crate::params::{TileBounds, TileParams};

/// A kernel that writes pixels into a destination image, tile by tile.
pub trait ImageTileTask: Send + Sync {
    /// Processes one tile: read from `src` within `bounds`, write into `dst`
    /// within the same `bounds`.
    fn tile(
        &self,
        src: &TileSources<'_>,
        dst: &TileDest<'_>,
        bounds: TileBounds,
        params: &TileParams,
    ) -> Result<()>;

    /// Optional hook run after two horizontally-adjacent tiles (same `y`
    /// range, adjacent `x` ranges) have both completed. Most kernels write
    /// disjoint pixels with no cross-tile dependency and accept the
    /// default no-op.
    fn horizontal_merge(
        &self,
        _left: &TileDest<'_>,
        _right: &TileDest<'_>,
        _bounds: TileBounds,
        _params: &TileParams,
    ) -> Result<()> {
        Ok(())
    }

    /// Optional hook run after two vertically-adjacent tiles have both completed.
    fn vertical_merge(
        &self,
        _top: &TileDest<'_>,
        _bottom: &TileDest<'_>,
        _bounds: TileBounds,
        _params: &TileParams,
    ) -> Result<()> {
        Ok(())
    }
}

/// A kernel that reduces a tile to an owned value `R`, combined pairwise as
/// sibling tiles complete (e.g. a histogram).
pub trait ReduceTileTask<R>: Send + Sync {
    /// Computes the partial result for one tile.
    fn tile(&self, src: &TileSources<'_>, bounds: TileBounds, params: &TileParams) -> Result<R>;

    /// Combines two sibling tiles' partial results into one.
    fn merge(&self, a: R, b: R) -> Result<R>;
}
