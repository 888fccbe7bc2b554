//! Processing context and image processor: the per-evaluation item store
//! (C7) and the compile/evaluate facade that drives it (C8).

pub mod context;
pub mod processor;

pub mod prelude {
    //! Re-exports most callers need.
    pub use crate::context::Context;
    pub use crate::processor::ImageProcessor;
}
