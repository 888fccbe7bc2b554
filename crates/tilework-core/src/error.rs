//! Error taxonomy shared by every tilework crate.
//!
//! A single closed enum covers the whole engine: scripting, tiling, and video
//! pipeline failures all funnel through the same `Error` type. Unlike a
//! multi-domain workspace (codecs, color management, GPU backends), tilework
//! has one small failure surface, so per-crate error enums would only add
//! boilerplate conversions.

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur anywhere in the tilework engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad script argument type, out-of-range literal, or unknown mode string.
    #[error("invalid parameter for '{op}': {reason}")]
    InvalidParameter {
        /// Name of the operation/parameter that failed validation.
        op: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Histogram bin mismatch, or image dimensions that a kernel requires to be equal.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Image/video format the decoders reject.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Read/write failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Codec-level decode failure.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Codec-level encode failure.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Cooperative cancellation triggered mid-task.
    #[error("cancelled")]
    Cancelled,

    /// Wall-clock expiry at the top level.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Index out of range into a multi-array's leading dimension.
    #[error("index {index} out of range for dimension of size {size}")]
    IndexOutOfRange {
        /// Index that was requested.
        index: usize,
        /// Size of the dimension that was indexed.
        size: usize,
    },

    /// Invariant violation that should be unreachable in a correct implementation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Builds an [`Error::InvalidParameter`].
    pub fn invalid_parameter(op: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            op: op.into(),
            reason: reason.into(),
        }
    }

    /// Builds an [`Error::ShapeMismatch`].
    pub fn shape_mismatch(reason: impl Into<String>) -> Self {
        Self::ShapeMismatch(reason.into())
    }

    /// `true` for errors that a caller may reasonably retry (never automatically — see spec §7).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameter_carries_op_name() {
        let err = Error::invalid_parameter("convert_to_gray", "unknown mode 'mauve'");
        assert!(err.to_string().contains("convert_to_gray"));
        assert!(err.to_string().contains("mauve"));
    }

    #[test]
    fn shape_mismatch_formats_reason() {
        let err = Error::shape_mismatch("histogram bins 256 vs 128");
        assert!(err.to_string().contains("256"));
    }

    #[test]
    fn transient_errors_are_flagged() {
        assert!(Error::Cancelled.is_transient());
        assert!(!Error::Internal("oops".into()).is_transient());
    }
}
