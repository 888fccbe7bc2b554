//! Core data model shared by every tilework crate: image buffers,
//! histograms, small multi-dimensional arrays, and the engine-wide error
//! taxonomy.

pub mod error;
pub mod histogram;
pub mod image;
pub mod multiarray;

pub mod prelude {
    //! Re-exports of the types most crates need.
    pub use crate::error::{Error, Result};
    pub use crate::histogram::Histogram;
    pub use crate::image::{Image, MetaValue};
    pub use crate::multiarray::MultiArray;
}
