//! Single-image PNG read/write for the CLI, grounded on the same
//! `png` crate idiom as `tilework-video`'s `png_sequence` adapter (in turn
//! grounded on `vfx-io/src/png.rs`) — decode via `png::Decoder`/
//! `next_frame`, encode via `png::Encoder`/`write_image_data`. Kept as its
//! own small module rather than a dependency on `tilework-video`: this CLI
//! processes one standalone image per invocation, not a frame sequence.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tilework_core::error::{Error, Result};
use tilework_core::image::Image;

/// Reads an 8-bit grayscale or RGB PNG into a planar [`Image`].
pub fn read(path: &Path) -> Result<Image> {
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
                "only 8-bit grayscale or RGB PNG is supported, got {color_type:?}/{bit_depth:?}"
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

/// Writes a planar [`Image`] (1 or 3 channels) as an 8-bit PNG.
pub fn write(path: &Path, image: &Image) -> Result<()> {
    let color_type = match image.channel_count() {
        1 => png::ColorType::Grayscale,
        3 => png::ColorType::Rgb,
        n => {
            return Err(Error::UnsupportedFormat(format!(
                "only 1 or 3 channel images can be written as PNG, got {n}"
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
    fn gray_image_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let mut image = Image::new(3, 2, 1).unwrap();
        image.channel_mut(0).iter_mut().enumerate().for_each(|(i, p)| *p = i as u8);
        write(&path, &image).unwrap();
        let read_back = read(&path).unwrap();
        assert_eq!(read_back.width(), 3);
        assert_eq!(read_back.height(), 2);
        assert_eq!(read_back.channel_count(), 1);
        assert_eq!(read_back.pixel(0, 2, 1), 5);
    }

    #[test]
    fn rgb_image_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let mut image = Image::new(2, 2, 3).unwrap();
        image.channel_mut(0).iter_mut().for_each(|p| *p = 11);
        image.channel_mut(1).iter_mut().for_each(|p| *p = 22);
        image.channel_mut(2).iter_mut().for_each(|p| *p = 33);
        write(&path, &image).unwrap();
        let read_back = read(&path).unwrap();
        assert_eq!(read_back.channel_count(), 3);
        assert_eq!(read_back.pixel(0, 0, 0), 11);
        assert_eq!(read_back.pixel(1, 0, 0), 22);
        assert_eq!(read_back.pixel(2, 0, 0), 33);
    }
}
