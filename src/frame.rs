//! Decoded camera frames.
//!
//! - `Frame`: one decoded RGB raster, owned by the main loop for one iteration.
//!
//! Frames are never written to disk and never retained across iterations.
//! The timeout worker receives a clone for the duration of one classifier call.

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};

/// One decoded raster image from the camera stream.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Decode one JPEG extracted by the demuxer.
    pub fn decode(jpeg: &[u8]) -> Result<Self> {
        let image = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
            .context("decode jpeg")?;
        let frame = Self {
            image: image.into_rgb8(),
        };
        if frame.width() == 0 || frame.height() == 0 {
            return Err(anyhow!("decoded jpeg has no pixels"));
        }
        Ok(frame)
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Variance of the luma channel. Near zero for a blank or covered lens.
    pub fn luma_variance(&self) -> f64 {
        let count = self.image.width() as f64 * self.image.height() as f64;
        if count == 0.0 {
            return 0.0;
        }
        let (sum, sum_sq) = self.image.pixels().fold((0.0f64, 0.0f64), |(s, sq), p| {
            let luma = luma(p.0);
            (s + luma, sq + luma * luma)
        });
        let mean = sum / count;
        (sum_sq / count - mean * mean).max(0.0)
    }
}

fn luma([r, g, b]: [u8; 3]) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb};
    use std::io::Cursor;

    fn encode_jpeg(image: RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    #[test]
    fn decodes_jpeg_frames() -> Result<()> {
        let jpeg = encode_jpeg(RgbImage::from_pixel(32, 24, Rgb([200, 10, 10])));
        let frame = Frame::decode(&jpeg)?;
        assert_eq!(frame.width(), 32);
        assert_eq!(frame.height(), 24);
        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        assert!(Frame::decode(&[0xFF, 0xD8, 0x00, 0x01, 0xFF, 0xD9]).is_err());
    }

    #[test]
    fn blank_frames_have_no_variance() {
        let blank = Frame::from_rgb(RgbImage::from_pixel(8, 8, Rgb([90, 90, 90])));
        assert!(blank.luma_variance() < 1e-6);

        let striped = Frame::from_rgb(RgbImage::from_fn(8, 8, |x, _| {
            if x % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        assert!(striped.luma_variance() > 1000.0);
    }
}
