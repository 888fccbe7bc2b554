//! A directory of numbered `frame_NNNNNN.png` files as a [`FrameSource`]/
//! [`FrameSink`] (§4.12): a real, runnable stand-in for the demuxer/muxer
//! spec.md scopes out, built on the same `png` crate idiom the teacher's
//! `vfx-io` PNG codec uses (`png::Decoder`/`read_info`/`next_frame` for
//! reading, `png::Encoder`/`write_header`/`write_image_data` for writing).
//!
//! Only 8-bit grayscale and RGB are accepted, matching spec.md §6's image
//! format rule; anything else fails with `UnsupportedFormat`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tilework_core::error::{Error, Result};
use tilework_core::image::Image;

use crate::io::{FrameSink, FrameSource, SourceFrame};

/// Reads `frame_000000.png`, `frame_000001.png`, … from a directory in
/// order, one at a time, until a number is missing.
pub struct PngSequenceSource {
    dir: PathBuf,
    next_number: u64,
    exhausted: bool,
}

impl PngSequenceSource {
    /// Opens a sequence rooted at `dir`. Does not read anything yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_number: 0,
            exhausted: false,
        }
    }

    fn path_for(&self, number: u64) -> PathBuf {
        self.dir.join(format!("frame_{number:06}.png"))
    }
}

impl FrameSource for PngSequenceSource {
    fn read(&mut self) -> Result<SourceFrame> {
        if self.exhausted {
            return Ok(SourceFrame::Flush);
        }
        let path = self.path_for(self.next_number);
        if !path.exists() {
            self.exhausted = true;
            return Ok(SourceFrame::Flush);
        }
        let image = read_png(&path)?;
        self.next_number += 1;
        Ok(SourceFrame::Data(image))
    }
}

/// Writes frames to `frame_000000.png`, `frame_000001.png`, … inside a directory.
pub struct PngSequenceSink {
    dir: PathBuf,
    next_number: u64,
}

impl PngSequenceSink {
    /// Creates (if needed) and opens `dir` for writing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, next_number: 0 })
    }

    fn path_for(&self, number: u64) -> PathBuf {
        self.dir.join(format!("frame_{number:06}.png"))
    }
}

impl FrameSink for PngSequenceSink {
    fn write(&mut self, image: &Image) -> Result<()> {
        let path = self.path_for(self.next_number);
        write_png(&path, image)?;
        self.next_number += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // The sequence is just the files already written; nothing to flush.
        Ok(())
    }
}

fn read_png(path: &Path) -> Result<Image> {
    let file = File::open(path)?;
    let decoder = png::Decoder::new(BufReader::new(file));
    let mut reader = decoder
        .read_info()
        .map_err(|e| Error::DecodeError(e.to_string()))?;
    let buf_size = reader
        .output_buffer_size()
        .ok_or_else(|| Error::DecodeError("cannot determine PNG buffer size".into()))?;
    let mut buf = vec![0u8; buf_size];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| Error::DecodeError(e.to_string()))?;

    let channel_count = match (info.color_type, info.bit_depth) {
        (png::ColorType::Grayscale, png::BitDepth::Eight) => 1,
        (png::ColorType::Rgb, png::BitDepth::Eight) => 3,
        (color_type, bit_depth) => {
            return Err(Error::UnsupportedFormat(format!(
                "PNG sequence only accepts 8-bit grayscale or RGB, got {color_type:?}/{bit_depth:?}"
            )))
        }
    };

    let width = info.width;
    let height = info.height;
    let interleaved = &buf[..info.buffer_size()];
    let mut image = Image::new(width, height, channel_count)?;
    for c in 0..channel_count {
        let plane = image.channel_mut(c);
        for pixel in 0..(width as usize * height as usize) {
            plane[pixel] = interleaved[pixel * channel_count as usize + c as usize];
        }
    }
    Ok(image)
}

fn write_png(path: &Path, image: &Image) -> Result<()> {
    let color_type = match image.channel_count() {
        1 => png::ColorType::Grayscale,
        3 => png::ColorType::Rgb,
        n => {
            return Err(Error::UnsupportedFormat(format!(
                "PNG sequence only accepts 1 or 3 channels, got {n}"
            )))
        }
    };

    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), image.width(), image.height());
    encoder.set_color(color_type);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| Error::EncodeError(e.to_string()))?;

    let channel_count = image.channel_count();
    let pixel_count = image.width() as usize * image.height() as usize;
    let mut interleaved = vec![0u8; pixel_count * channel_count as usize];
    for c in 0..channel_count {
        let plane = image.channel(c);
        for pixel in 0..pixel_count {
            interleaved[pixel * channel_count as usize + c as usize] = plane[pixel];
        }
    }
    writer
        .write_image_data(&interleaved)
        .map_err(|e| Error::EncodeError(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_then_reads_back_a_sequence_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngSequenceSink::new(dir.path()).unwrap();

        let mut a = Image::new(4, 4, 1).unwrap();
        a.channel_mut(0).iter_mut().for_each(|p| *p = 10);
        let mut b = Image::new(4, 4, 1).unwrap();
        b.channel_mut(0).iter_mut().for_each(|p| *p = 20);

        sink.write(&a).unwrap();
        sink.write(&b).unwrap();
        sink.finish().unwrap();

        let mut source = PngSequenceSource::new(dir.path());
        let first = source.read().unwrap();
        let second = source.read().unwrap();
        let third = source.read().unwrap();

        match first {
            SourceFrame::Data(img) => assert_eq!(img.pixel(0, 0, 0), 10),
            SourceFrame::Flush => panic!("expected a data frame"),
        }
        match second {
            SourceFrame::Data(img) => assert_eq!(img.pixel(0, 0, 0), 20),
            SourceFrame::Flush => panic!("expected a data frame"),
        }
        assert!(matches!(third, SourceFrame::Flush));
    }

    #[test]
    fn empty_directory_flushes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = PngSequenceSource::new(dir.path());
        assert!(matches!(source.read().unwrap(), SourceFrame::Flush));
    }

    #[test]
    fn rgb_round_trips_three_channels() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngSequenceSink::new(dir.path()).unwrap();
        let mut rgb = Image::new(2, 2, 3).unwrap();
        rgb.channel_mut(0).iter_mut().for_each(|p| *p = 1);
        rgb.channel_mut(1).iter_mut().for_each(|p| *p = 2);
        rgb.channel_mut(2).iter_mut().for_each(|p| *p = 3);
        sink.write(&rgb).unwrap();

        let mut source = PngSequenceSource::new(dir.path());
        match source.read().unwrap() {
            SourceFrame::Data(img) => {
                assert_eq!(img.channel_count(), 3);
                assert_eq!(img.pixel(0, 0, 0), 1);
                assert_eq!(img.pixel(1, 0, 0), 2);
                assert_eq!(img.pixel(2, 0, 0), 3);
            }
            SourceFrame::Flush => panic!("expected a data frame"),
        }
    }
}
