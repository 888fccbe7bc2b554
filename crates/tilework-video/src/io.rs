//! `FrameSource`/`FrameSink` traits (§4.12): the narrow boundary the
//! demuxer/muxer would sit behind if this crate decoded real video
//! containers. spec.md scopes container decoding out ("any container
//! decodable by the external demuxer; only the per-frame interface matters
//! here"), so these traits are exactly that per-frame interface, with one
//! concrete, runnable adapter in [`crate::png_sequence`] rather than a mock.

use tilework_core::error::Result;
use tilework_core::image::Image;

/// One step of reading a video stream: either the next frame's image, or
/// the end-of-stream marker.
pub enum SourceFrame {
    /// A decoded frame.
    Data(Image),
    /// The stream has no more frames.
    Flush,
}

/// Reads a video stream one frame at a time, grounded on
/// `sources::file`/`sources::rtsp`'s decode loop (container parsing itself
/// is out of scope; a source only needs to hand over frames in order).
pub trait FrameSource {
    /// Reads the next frame, or `SourceFrame::Flush` once the stream ends.
    /// Must not be called again after returning `Flush`.
    fn read(&mut self) -> Result<SourceFrame>;
}

/// Writes a video stream one frame at a time, grounded on `sinks::file`.
pub trait FrameSink {
    /// Writes one data frame. Never called with a flush frame — the sink
    /// stage calls `finish` instead once it sees one.
    fn write(&mut self, image: &Image) -> Result<()>;

    /// Signals the stream is complete; no further `write` calls follow.
    fn finish(&mut self) -> Result<()>;
}
