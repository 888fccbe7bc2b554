//! A single image inside a video stream, grounded on
//! `original_source/.../videoproc/frame.hpp`.
//!
//! A frame is either a normal, numbered image or a "flush" marker with no
//! image that signals end-of-stream. Ordering is by `number` alone, exactly
//! as the original's free `operator<`/`operator>` compare only `m_number` —
//! this is what lets [`crate::stage_data_handler::StageDataHandler`] use a
//! plain min-heap to restore delivery order regardless of payload.

use std::cmp::Ordering;

use tilework_core::image::Image;

use crate::stage_data_handler::Numbered;

/// One frame of a video stream: either `number` data frames or a flush marker.
#[derive(Debug, Clone)]
pub struct Frame {
    number: u64,
    image: Option<Image>,
    flush: bool,
}

impl Frame {
    /// An invalid, empty frame at number 0 — the original's default constructor.
    pub fn invalid() -> Self {
        Self {
            number: 0,
            image: None,
            flush: false,
        }
    }

    /// A normal data frame carrying `image` at stream position `number`.
    pub fn new(number: u64, image: Image) -> Self {
        Self {
            number,
            image: Some(image),
            flush: false,
        }
    }

    /// An end-of-stream marker at stream position `number`.
    pub fn flush(number: u64) -> Self {
        Self {
            number,
            image: None,
            flush: true,
        }
    }

    /// This frame's position in the stream.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// The frame's image, if this isn't a flush marker.
    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    /// Consumes the frame, taking ownership of its image.
    pub fn into_image(self) -> Option<Image> {
        self.image
    }

    /// `true` for an end-of-stream marker.
    pub fn is_flush(&self) -> bool {
        self.flush
    }
}

impl Numbered for Frame {
    fn number(&self) -> u64 {
        self.number
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl Eq for Frame {}

impl PartialOrd for Frame {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frame {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number.cmp(&other.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_by_number_only() {
        let a = Frame::new(1, Image::new(1, 1, 1).unwrap());
        let b = Frame::flush(2);
        assert!(a < b);
        assert!(b > a);
    }

    #[test]
    fn flush_frame_has_no_image() {
        let f = Frame::flush(7);
        assert!(f.is_flush());
        assert!(f.image().is_none());
        assert_eq!(f.number(), 7);
    }

    #[test]
    fn invalid_frame_is_number_zero() {
        let f = Frame::invalid();
        assert_eq!(f.number(), 0);
        assert!(!f.is_flush());
    }
}
