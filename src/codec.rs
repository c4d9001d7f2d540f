// src/codec.rs
use crate::error::{ImgfsError, Result};
use image::{DynamicImage, ImageFormat};
use log::debug;
use std::io::Cursor;

/// Image decoding/encoding capability the store relies on.
pub trait ImageCodec: Send {
    /// Width and height of an encoded original.
    fn dimensions(&self, image: &[u8]) -> Result<(u32, u32)>;

    /// Re-encode `image` so that it fits inside `width` x `height`,
    /// keeping the aspect ratio.
    fn resize(&self, image: &[u8], width: u32, height: u32) -> Result<Vec<u8>>;
}

/// JPEG in, JPEG out.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegCodec;

impl JpegCodec {
    fn load(image: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory_with_format(image, ImageFormat::Jpeg).map_err(ImgfsError::from)
    }
}

impl ImageCodec for JpegCodec {
    fn dimensions(&self, image: &[u8]) -> Result<(u32, u32)> {
        let img = Self::load(image)?;
        Ok((img.width(), img.height()))
    }

    fn resize(&self, image: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        if width == 0 || height == 0 {
            return Err(ImgfsError::InvalidResolution);
        }
        let img = Self::load(image)?;
        // JPEG has no alpha channel; normalize before encoding.
        let resized = DynamicImage::ImageRgb8(img.thumbnail(width, height).to_rgb8());

        let mut out = Cursor::new(Vec::new());
        resized.write_to(&mut out, ImageFormat::Jpeg)?;
        debug!(
            "codec: resized {}x{} -> {}x{} ({} bytes)",
            img.width(),
            img.height(),
            resized.width(),
            resized.height(),
            out.get_ref().len()
        );
        Ok(out.into_inner())
    }
}
