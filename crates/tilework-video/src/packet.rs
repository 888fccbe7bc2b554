//! A batch of frames moved between pipeline stages, grounded on
//! `original_source/.../videoproc/packet.hpp`.

use crate::frame::Frame;

/// A numbered batch of [`Frame`]s. `flush()` is true iff any contained
/// frame is a flush marker — a packet can carry ordinary frames and the
/// stream's final flush marker together.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    number: u64,
    frames: Vec<Frame>,
    failed: bool,
}

impl Packet {
    /// An empty packet at position `number`.
    pub fn new(number: u64) -> Self {
        Self {
            number,
            frames: Vec::new(),
            failed: false,
        }
    }

    /// A packet marked as having failed upstream (no frames).
    pub fn failed(number: u64) -> Self {
        Self {
            number,
            frames: Vec::new(),
            failed: true,
        }
    }

    /// This packet's position.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Appends `frame` to this packet.
    pub fn add_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// The frames carried by this packet, in the order they were added.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Consumes the packet, taking ownership of its frames.
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// `true` iff any contained frame is a flush marker.
    pub fn flush(&self) -> bool {
        self.frames.iter().any(Frame::is_flush)
    }

    /// `true` if this packet represents a failed upstream operation.
    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilework_core::image::Image;

    #[test]
    fn flush_is_true_if_any_frame_is_flush() {
        let mut p = Packet::new(0);
        p.add_frame(Frame::new(0, Image::new(1, 1, 1).unwrap()));
        assert!(!p.flush());
        p.add_frame(Frame::flush(1));
        assert!(p.flush());
    }

    #[test]
    fn failed_packet_carries_no_frames() {
        let p = Packet::failed(3);
        assert!(p.is_failed());
        assert!(p.frames().is_empty());
    }
}
