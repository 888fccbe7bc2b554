//! Tile-local views over source and destination image buffers.
//!
//! A tile task reads from one or two whole source images and writes into
//! one whole destination image, but only within its own [`TileBounds`].
//! Splitting the engine's recursion along the x-axis (spec.md §4.3 prefers
//! vertical cuts) produces column ranges, which are *not* contiguous byte
//! ranges in a row-major buffer — so they can't be expressed as two safe
//! `split_at_mut` slices the way a y-split could. [`TileDest`] instead holds
//! one raw pointer per channel, shared (by reference) across the whole
//! recursive tree; every task writes only inside the bounds it was handed,
//! and the engine's split logic is the single place responsible for keeping
//! those bounds disjoint between concurrent branches.

use std::marker::PhantomData;

use tilework_core::error::{Error, Result};
use tilework_core::image::Image;

/// Read-only access to the tile task's source image(s).
///
/// Most kernels take one source image; a few (diff, multiply_add) take two.
pub struct TileSources<'a> {
    images: Vec<&'a Image>,
}

impl<'a> TileSources<'a> {
    /// Wraps one source image.
    pub fn single(image: &'a Image) -> Self {
        Self {
            images: vec![image],
        }
    }

    /// Wraps two source images (e.g. for a binary kernel like `diff`).
    pub fn pair(a: &'a Image, b: &'a Image) -> Self {
        Self { images: vec![a, b] }
    }

    /// Number of source images available.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// `true` if there are no source images.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// The source image at `index`.
    pub fn get(&self, index: usize) -> Result<&'a Image> {
        self.images
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index,
                size: self.images.len(),
            })
    }

    /// The first (and usually only) source image.
    pub fn primary(&self) -> Result<&'a Image> {
        self.get(0)
    }
}

struct RawChannel {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: `TileDest` is only ever shared across threads that write to
// disjoint pixel ranges, an invariant the splitting engine in `engine.rs`
// maintains. No two concurrently running tasks are handed overlapping
// `TileBounds` over the same `TileDest`.
unsafe impl Send for RawChannel {}
unsafe impl Sync for RawChannel {}

/// A tile task's write target: the whole destination image, addressed
/// through raw per-channel pointers so disjoint tiles can be written from
/// different threads without a lock.
pub struct TileDest<'a> {
    channels: Vec<RawChannel>,
    width: u32,
    height: u32,
    padding: u32,
    _marker: PhantomData<&'a mut Image>,
}

impl<'a> TileDest<'a> {
    /// Builds a destination handle over every channel of `image`.
    ///
    /// `image` must not be read or written through any other handle for the
    /// lifetime of the returned `TileDest`.
    pub fn from_image(image: &'a mut Image) -> Self {
        let width = image.width();
        let height = image.height();
        let padding = image.padding();
        let channel_count = image.channel_count();
        let channels = (0..channel_count)
            .map(|c| {
                let buf = image.channel_mut(c);
                RawChannel {
                    ptr: buf.as_mut_ptr(),
                    len: buf.len(),
                }
            })
            .collect();
        Self {
            channels,
            width,
            height,
            padding,
            _marker: PhantomData,
        }
    }

    /// Destination image width (excludes padding).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Destination image height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of destination channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize + 2 * self.padding as usize
    }

    /// Writes one pixel's byte value into `channel` at `(x, y)`.
    ///
    /// Panics (in debug builds) if `channel` or the computed offset is out
    /// of range — an out-of-bounds write here is always a tiling-engine bug,
    /// not recoverable caller input, so this isn't a `Result`.
    pub fn set_pixel(&self, channel: usize, x: u32, y: u32, value: u8) {
        let offset = (y as usize) * self.stride() + self.padding as usize + x as usize;
        let chan = &self.channels[channel];
        debug_assert!(offset < chan.len, "tile write out of bounds");
        // SAFETY: caller-maintained disjointness, offset checked above in debug builds.
        unsafe {
            *chan.ptr.add(offset) = value;
        }
    }

    /// Reads one pixel's byte value from `channel` at `(x, y)`.
    ///
    /// Useful for in-place kernels that read back a value they just wrote
    /// to a neighboring destination pixel within the same tile.
    pub fn get_pixel(&self, channel: usize, x: u32, y: u32) -> u8 {
        let offset = (y as usize) * self.stride() + self.padding as usize + x as usize;
        let chan = &self.channels[channel];
        debug_assert!(offset < chan.len, "tile read out of bounds");
        unsafe { *chan.ptr.add(offset) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_single_and_pair() {
        let img = Image::new(2, 2, 1).unwrap();
        let s = TileSources::single(&img);
        assert_eq!(s.len(), 1);
        assert!(s.get(1).is_err());

        let img2 = Image::new(2, 2, 1).unwrap();
        let p = TileSources::pair(&img, &img2);
        assert_eq!(p.len(), 2);
        assert!(p.get(1).is_ok());
    }

    #[test]
    fn dest_set_and_get_pixel_roundtrip() {
        let mut img = Image::new(4, 4, 1).unwrap();
        let dest = TileDest::from_image(&mut img);
        dest.set_pixel(0, 1, 2, 200);
        assert_eq!(dest.get_pixel(0, 1, 2), 200);
        assert_eq!(img.pixel(0, 1, 2), 200);
    }
}
