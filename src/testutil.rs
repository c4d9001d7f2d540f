// src/testutil.rs
use crate::codec::ImageCodec;
use crate::error::{ImgfsError, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// A deterministic gradient JPEG of the given size.
pub fn sample_jpeg(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, seed])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

/// Accepts any non-empty payload. Dimensions are `(len, 1)`; a resize is
/// the target box followed by the payload, so results are easy to assert on.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeCodec;

impl FakeCodec {
    pub fn resized(image: &[u8], width: u32, height: u32) -> Vec<u8> {
        let mut out = format!("{}x{}:", width, height).into_bytes();
        out.extend_from_slice(image);
        out
    }
}

impl ImageCodec for FakeCodec {
    fn dimensions(&self, image: &[u8]) -> Result<(u32, u32)> {
        if image.is_empty() {
            return Err(ImgfsError::ImageCodec("empty image".into()));
        }
        Ok((image.len() as u32, 1))
    }

    fn resize(&self, image: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        self.dimensions(image)?;
        Ok(Self::resized(image, width, height))
    }
}
