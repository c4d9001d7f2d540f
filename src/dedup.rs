// src/dedup.rs
use crate::error::{ImgfsError, Result};
use crate::format::{ImgMetadata, Resolution, SHA256_LEN};
use sha2::{Digest, Sha256};

/// SHA-256 of an original's raw bytes.
pub fn content_digest(image: &[u8]) -> [u8; SHA256_LEN] {
    let mut sha = [0u8; SHA256_LEN];
    sha.copy_from_slice(&Sha256::digest(image));
    sha
}

/// Check slot `index` against every other valid slot.
///
/// A valid slot with the same id is a `DuplicateId` error. Otherwise the
/// first valid slot with the same digest donates its offsets and sizes for
/// all resolutions, and its index is returned. With no donor the original's
/// offset is cleared so the caller knows the bytes must be appended.
pub fn name_and_content_dedup(metadata: &mut [ImgMetadata], index: usize) -> Result<Option<usize>> {
    if index >= metadata.len() {
        return Err(ImgfsError::ImageNotFound);
    }
    let table: &[ImgMetadata] = metadata;
    let target = &table[index];
    let others = move || {
        table
            .iter()
            .enumerate()
            .filter(move |&(i, m)| i != index && m.is_valid)
    };

    if others().any(|(_, m)| m.img_id == target.img_id) {
        return Err(ImgfsError::DuplicateId);
    }

    let donor = others().find(|(_, m)| m.sha == target.sha).map(|(i, _)| i);

    match donor {
        Some(d) => {
            let (offset, size) = (metadata[d].offset, metadata[d].size);
            let slot = &mut metadata[index];
            slot.offset = offset;
            slot.size = size;
        }
        None => metadata[index].offset[Resolution::Orig.index()] = 0,
    }
    Ok(donor)
}
