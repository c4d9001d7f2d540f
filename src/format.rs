// src/format.rs
//! On-disk records of an imgFS file.
//!
//! Layout: `[header][metadata; max_files][raw image bytes, append-only]`.
//! Both records are fixed-size and little-endian, padded exactly like the
//! `repr(C)` structs older tools wrote, so files stay interchangeable.

use crate::error::{ImgfsError, Result};
use bytes::{Buf, BufMut};
use std::str::FromStr;

pub const MAX_IMGFS_NAME: usize = 31;
pub const MAX_IMG_ID: usize = 127;
pub const SHA256_LEN: usize = 32;
pub const NB_RES: usize = 3;

pub const HEADER_SIZE: usize = 64;
pub const METADATA_SIZE: usize = 216;

pub const DEFAULT_IMGFS_NAME: &str = "ImgFS 1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Thumb = 0,
    Small = 1,
    Orig = 2,
}

impl Resolution {
    pub const ALL: [Resolution; NB_RES] = [Resolution::Thumb, Resolution::Small, Resolution::Orig];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_derived(self) -> bool {
        self != Resolution::Orig
    }

    /// File-name suffix used when the CLI extracts an image.
    pub fn suffix(self) -> &'static str {
        match self {
            Resolution::Thumb => "thumb",
            Resolution::Small => "small",
            Resolution::Orig => "orig",
        }
    }
}

impl FromStr for Resolution {
    type Err = ImgfsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "thumbnail" | "thumb" => Ok(Resolution::Thumb),
            "small" => Ok(Resolution::Small),
            "original" | "orig" => Ok(Resolution::Orig),
            _ => Err(ImgfsError::InvalidResolution),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u16,
    pub height: u16,
}

impl Dimensions {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImgfsHeader {
    pub name: String,
    pub version: u32,
    pub nb_files: u32,
    pub max_files: u32,
    /// Target box for the thumbnail (index 0) and small (index 1) variants.
    pub resized_res: [Dimensions; NB_RES - 1],
}

impl ImgfsHeader {
    pub fn new(max_files: u32, thumb: Dimensions, small: Dimensions) -> Self {
        Self {
            name: DEFAULT_IMGFS_NAME.to_string(),
            version: 0,
            nb_files: 0,
            max_files,
            resized_res: [thumb, small],
        }
    }

    /// Configured box for a derived resolution; `None` for the original.
    pub fn resized(&self, resolution: Resolution) -> Option<Dimensions> {
        if resolution.is_derived() {
            Some(self.resized_res[resolution.index()])
        } else {
            None
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        put_fixed_str(&mut out, &self.name, MAX_IMGFS_NAME + 1);
        out.put_u32_le(self.version);
        out.put_u32_le(self.nb_files);
        out.put_u32_le(self.max_files);
        for dims in &self.resized_res {
            out.put_u16_le(dims.width);
            out.put_u16_le(dims.height);
        }
        out.put_u32_le(0); // unused_32
        out.put_u64_le(0); // unused_64
        debug_assert_eq!(out.len(), HEADER_SIZE);
        out
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_SIZE {
            return Err(short_record("header", raw.len(), HEADER_SIZE));
        }
        let mut buf = &raw[..HEADER_SIZE];
        let name = get_fixed_str(&mut buf, MAX_IMGFS_NAME + 1);
        let version = buf.get_u32_le();
        let nb_files = buf.get_u32_le();
        let max_files = buf.get_u32_le();
        let mut resized_res = [Dimensions::default(); NB_RES - 1];
        for dims in resized_res.iter_mut() {
            dims.width = buf.get_u16_le();
            dims.height = buf.get_u16_le();
        }
        Ok(Self { name, version, nb_files, max_files, resized_res })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImgMetadata {
    pub img_id: String,
    pub sha: [u8; SHA256_LEN],
    /// Width and height of the original image.
    pub orig_res: [u32; 2],
    pub size: [u32; NB_RES],
    pub offset: [u64; NB_RES],
    pub is_valid: bool,
}

impl ImgMetadata {
    /// True once `resolution` has bytes in the content region.
    pub fn has(&self, resolution: Resolution) -> bool {
        let i = resolution.index();
        self.offset[i] != 0 && self.size[i] != 0
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(METADATA_SIZE);
        put_fixed_str(&mut out, &self.img_id, MAX_IMG_ID + 1);
        out.put_slice(&self.sha);
        out.put_u32_le(self.orig_res[0]);
        out.put_u32_le(self.orig_res[1]);
        for size in self.size {
            out.put_u32_le(size);
        }
        out.put_u32_le(0); // alignment of offset[]
        for offset in self.offset {
            out.put_u64_le(offset);
        }
        out.put_u16_le(u16::from(self.is_valid));
        out.put_u16_le(0); // unused_16
        out.put_u32_le(0); // trailing struct padding
        debug_assert_eq!(out.len(), METADATA_SIZE);
        out
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < METADATA_SIZE {
            return Err(short_record("metadata", raw.len(), METADATA_SIZE));
        }
        let mut buf = &raw[..METADATA_SIZE];
        let img_id = get_fixed_str(&mut buf, MAX_IMG_ID + 1);
        let mut sha = [0u8; SHA256_LEN];
        buf.copy_to_slice(&mut sha);
        let orig_res = [buf.get_u32_le(), buf.get_u32_le()];
        let mut size = [0u32; NB_RES];
        for s in size.iter_mut() {
            *s = buf.get_u32_le();
        }
        buf.advance(4);
        let mut offset = [0u64; NB_RES];
        for o in offset.iter_mut() {
            *o = buf.get_u64_le();
        }
        let is_valid = buf.get_u16_le() != 0;
        Ok(Self { img_id, sha, orig_res, size, offset, is_valid })
    }
}

/// Image ids are 1..=MAX_IMG_ID bytes and must fit a NUL-terminated slot.
pub fn validate_img_id(img_id: &str) -> Result<()> {
    if img_id.is_empty() || img_id.len() > MAX_IMG_ID || img_id.contains('\0') {
        return Err(ImgfsError::InvalidImgId);
    }
    Ok(())
}

/// Byte offset of slot `index` within the file.
pub fn metadata_offset(index: usize) -> u64 {
    (HEADER_SIZE + index * METADATA_SIZE) as u64
}

/// First byte past the metadata table, where content starts.
pub fn content_start(max_files: u32) -> u64 {
    metadata_offset(max_files as usize)
}

fn put_fixed_str(out: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = s.as_bytes();
    // Always keep one trailing NUL.
    let len = bytes.len().min(width - 1);
    out.put_slice(&bytes[..len]);
    out.put_bytes(0, width - len);
}

/// Decode a NUL-padded field. The last byte counts as the terminator even
/// when it is not NUL, so the result never outgrows what `put_fixed_str`
/// can write back.
fn get_fixed_str(buf: &mut &[u8], width: usize) -> String {
    let field = &buf[..width - 1];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let mut s = String::from_utf8_lossy(&field[..end]).into_owned();
    // Replacement characters are wider than the bytes they stand for.
    while s.len() > width - 1 {
        s.pop();
    }
    buf.advance(width);
    s
}

fn short_record(what: &str, got: usize, want: usize) -> ImgfsError {
    ImgfsError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("truncated {}: {} of {} bytes", what, got, want),
    ))
}
