//! Recursive tile splitting and the tileable-kernel contract: the engine
//! that drives [`task::ImageTileTask`]/[`task::ReduceTileTask`]
//! implementations over an image in parallel.

pub mod buffers;
pub mod engine;
pub mod params;
pub mod task;

pub mod prelude {
    //! Re-exports most callers need.
    pub use crate::buffers::{TileDest, TileSources};
    pub use crate::engine::{drive_image, drive_reduce};
    pub use crate::params::{TileBounds, TileParams, DEFAULT_CUTOFF};
    pub use crate::task::{ImageTileTask, ReduceTileTask};
}
