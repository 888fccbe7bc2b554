//! Concrete tileable pixel kernels instancing the `tilework-tiling`
//! contract: color conversion, threshold, histogram, otsu, histogram
//! equalization, and simple two/one-source arithmetic.
//!
//! Each kernel here is deliberately a small, direct implementation rather
//! than an exhaustive filter library — spec.md treats specific per-filter
//! pixel kernels as external collaborators to the tileable-task contract,
//! not as the interesting part of the system. This crate exists to make
//! the engine runnable end to end and to back its test scenarios.

pub mod arithmetic;
pub mod convert;
pub mod equalize;
pub mod gray_mode;
pub mod histogram;
pub mod otsu;
pub mod threshold;

pub mod prelude {
    //! Re-exports the kernel types most callers need.
    pub use crate::arithmetic::{DiffTask, MeanTask, MultiplyAddTask};
    pub use crate::convert::{ConvertToGrayTask, ConvertToRgbTask};
    pub use crate::equalize::{equalization_lut, equalize, LutApplyTask};
    pub use crate::gray_mode::GrayMode;
    pub use crate::histogram::HistogramTask;
    pub use crate::otsu::otsu_threshold;
    pub use crate::threshold::ThresholdTask;
}
