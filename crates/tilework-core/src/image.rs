//! Image buffer type for tilework.
//!
//! # Memory layout
//!
//! Unlike an interleaved pixel buffer, an [`Image`] stores each channel as
//! its own contiguous `(W + 2P) * H` byte buffer behind an `Arc`. This gives
//! cheap, genuinely zero-copy gray→RGB expansion (the same channel `Arc` is
//! cloned three times) and RGB→gray reduction (one channel's `Arc` is
//! cloned once) — the "shared-lifetime" aliasing spec.md §3 requires. No
//! mutation is possible through a shared channel: a filter that wants to
//! write always allocates a fresh destination buffer via
//! [`Image::with_channels`].
//!
//! # Used by
//!
//! - `tilework-tiling` — tile kernels read/write raw channel slices
//! - `tilework-kernels` — concrete per-tile pixel functions
//! - `tilework-script` / `tilework-engine` — script items, processing context

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::multiarray::MultiArray;

/// Arbitrary metadata value attached to an image (e.g. detection boxes).
#[derive(Debug, Clone)]
pub enum MetaValue {
    /// Signed integer.
    Int(i64),
    /// Real number.
    Real(f64),
    /// Boolean flag.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Rank 1-3 tensor, e.g. a list of bounding boxes.
    Boxes(MultiArray<f32>),
}

/// Owned, channel-sharing image buffer.
///
/// `width` and `height` are fixed at construction. `padding` adds `P` extra
/// bytes on each side of every row within a channel's buffer (stride is
/// therefore `width + 2*padding`). Channel count is 1 (grayscale) or 3
/// (RGB) per spec.md §3.
#[derive(Clone)]
pub struct Image {
    width: u32,
    height: u32,
    padding: u32,
    channels: Vec<Arc<Vec<u8>>>,
    metadata: HashMap<String, MetaValue>,
}

impl Image {
    /// Creates a new image with freshly allocated, zero-filled channels.
    ///
    /// `channel_count` must be 1 or 3.
    pub fn new(width: u32, height: u32, channel_count: u8) -> Result<Self> {
        Self::with_padding(width, height, 0, channel_count)
    }

    /// Creates a new image with the given row padding.
    pub fn with_padding(width: u32, height: u32, padding: u32, channel_count: u8) -> Result<Self> {
        if channel_count != 1 && channel_count != 3 {
            return Err(Error::UnsupportedFormat(format!(
                "image channel count must be 1 or 3, got {channel_count}"
            )));
        }
        let stride = (width as usize + 2 * padding as usize) * height as usize;
        let channels = (0..channel_count)
            .map(|_| Arc::new(vec![0u8; stride]))
            .collect();
        Ok(Self {
            width,
            height,
            padding,
            channels,
            metadata: HashMap::new(),
        })
    }

    /// Builds an image from already-owned per-channel buffers.
    ///
    /// Each buffer must be exactly `(width + 2*padding) * height` bytes.
    pub fn from_channels(
        width: u32,
        height: u32,
        padding: u32,
        channels: Vec<Arc<Vec<u8>>>,
    ) -> Result<Self> {
        let expected = (width as usize + 2 * padding as usize) * height as usize;
        for ch in &channels {
            if ch.len() != expected {
                return Err(Error::shape_mismatch(format!(
                    "channel buffer length {} does not match {}x{} (padding {})",
                    ch.len(),
                    width,
                    height,
                    padding
                )));
            }
        }
        if channels.len() != 1 && channels.len() != 3 {
            return Err(Error::UnsupportedFormat(format!(
                "image channel count must be 1 or 3, got {}",
                channels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            padding,
            channels,
            metadata: HashMap::new(),
        })
    }

    /// Image width in pixels (excludes padding).
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row padding in bytes on each side.
    #[inline]
    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Row stride in bytes: `width + 2*padding`.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize + 2 * self.padding as usize
    }

    /// Number of channels (1 or 3).
    #[inline]
    pub fn channel_count(&self) -> u8 {
        self.channels.len() as u8
    }

    /// Raw read-only access to one channel's full buffer.
    pub fn channel(&self, index: u8) -> &[u8] {
        &self.channels[index as usize]
    }

    /// Shares (clones the `Arc` of) one channel's buffer, for cheap gray→rgb expansion.
    pub fn share_channel(&self, index: u8) -> Arc<Vec<u8>> {
        Arc::clone(&self.channels[index as usize])
    }

    /// Expands a single-channel (grayscale) image into a 3-channel image by
    /// sharing the same channel buffer three times. Zero-copy.
    ///
    /// Returns `self` unchanged if it already has 3 channels.
    pub fn expand_gray_to_rgb(&self) -> Result<Self> {
        if self.channel_count() == 3 {
            return Ok(self.clone());
        }
        if self.channel_count() != 1 {
            return Err(Error::shape_mismatch(format!(
                "expand_gray_to_rgb expects 1 channel, got {}",
                self.channel_count()
            )));
        }
        let shared = self.share_channel(0);
        Self::from_channels(
            self.width,
            self.height,
            self.padding,
            vec![shared.clone(), shared.clone(), shared],
        )
    }

    /// Returns a fresh, exclusively-owned buffer for the given channel.
    ///
    /// Used by kernels that need to write into a destination image: the
    /// tiling engine always allocates output images this way, never through
    /// a shared buffer.
    pub fn channel_mut(&mut self, index: u8) -> &mut Vec<u8> {
        Arc::make_mut(&mut self.channels[index as usize])
    }

    /// Attaches a metadata value under `key`.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: MetaValue) {
        self.metadata.insert(key.into(), value);
    }

    /// Reads a metadata value, if present.
    pub fn metadata(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    /// Returns the byte offset of pixel `(x, y)` in a channel buffer.
    #[inline]
    pub fn pixel_offset(&self, x: u32, y: u32) -> usize {
        (y as usize) * self.stride() + self.padding as usize + x as usize
    }

    /// Reads one pixel's value in the given channel.
    pub fn pixel(&self, channel: u8, x: u32, y: u32) -> u8 {
        let offset = self.pixel_offset(x, y);
        self.channels[channel as usize][offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_image_is_zero_filled() {
        let img = Image::new(4, 4, 1).unwrap();
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 4);
        assert_eq!(img.pixel(0, 0, 0), 0);
    }

    #[test]
    fn rejects_bad_channel_count() {
        assert!(Image::new(4, 4, 2).is_err());
        assert!(Image::new(4, 4, 4).is_err());
    }

    #[test]
    fn gray_to_rgb_expansion_shares_buffer() {
        let mut gray = Image::new(2, 2, 1).unwrap();
        gray.channel_mut(0)[0] = 42;
        let rgb = gray.expand_gray_to_rgb().unwrap();
        assert_eq!(rgb.channel_count(), 3);
        assert_eq!(rgb.pixel(0, 0, 0), 42);
        assert_eq!(rgb.pixel(1, 0, 0), 42);
        assert_eq!(rgb.pixel(2, 0, 0), 42);
        // Confirm it's truly shared: same Arc pointer for each channel.
        assert!(Arc::ptr_eq(&rgb.channels[0], &rgb.channels[1]));
    }

    #[test]
    fn channel_mut_copy_on_write_does_not_affect_sibling() {
        let mut gray = Image::new(2, 2, 1).unwrap();
        let rgb = gray.expand_gray_to_rgb().unwrap();
        let mut rgb2 = rgb.clone();
        rgb2.channel_mut(0)[0] = 9;
        assert_eq!(rgb.pixel(0, 0, 0), 0);
        assert_eq!(rgb2.pixel(0, 0, 0), 9);
    }

    #[test]
    fn from_channels_rejects_wrong_length() {
        let buf = Arc::new(vec![0u8; 3]);
        let err = Image::from_channels(4, 4, 0, vec![buf]);
        assert!(err.is_err());
    }

    #[test]
    fn metadata_roundtrip() {
        let mut img = Image::new(1, 1, 1).unwrap();
        img.set_metadata("score", MetaValue::Real(0.75));
        match img.metadata("score") {
            Some(MetaValue::Real(v)) => assert!((*v - 0.75).abs() < 1e-9),
            _ => panic!("expected metadata"),
        }
    }
}
