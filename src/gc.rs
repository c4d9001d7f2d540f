// src/gc.rs
use crate::error::{ImgfsError, Result};
use crate::format::{ImgMetadata, Resolution};
use crate::imgfs::{ImgFs, OpenMode};
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactStats {
    pub kept: u32,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

impl CompactStats {
    pub fn reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Rewrite the store at `path` without unreferenced content.
///
/// Valid slots are packed from slot 0 in their current order. Each distinct
/// `(offset, size)` range is copied once, so shared content stays shared and
/// cached variants survive. The result is built in `tmp`, which must not
/// exist yet, and renamed over `path`; on failure `path` is untouched.
pub fn compact<P: AsRef<Path>, Q: AsRef<Path>>(path: P, tmp: Q) -> Result<CompactStats> {
    let (path, tmp) = (path.as_ref(), tmp.as_ref());
    if path == tmp {
        return Err(ImgfsError::InvalidArgument(
            "temporary file must differ from the imgFS file".into(),
        ));
    }

    let bytes_before = fs::metadata(path)?.len();
    let src = ImgFs::open(path, OpenMode::ReadOnly)?;
    // Refuses any existing file, including another name for `path`.
    let dst = ImgFs::create_new(tmp, src.header().clone())?;

    let kept = match copy_live(src, dst) {
        Ok(kept) => kept,
        Err(e) => {
            if let Err(rm) = fs::remove_file(tmp) {
                warn!("gc: could not remove {:?}: {}", tmp, rm);
            }
            return Err(e);
        }
    };
    fs::rename(tmp, path)?;

    let stats = CompactStats { kept, bytes_before, bytes_after: fs::metadata(path)?.len() };
    info!(
        "gc: kept {} image(s), {} -> {} bytes ({} reclaimed)",
        stats.kept,
        stats.bytes_before,
        stats.bytes_after,
        stats.reclaimed()
    );
    Ok(stats)
}

fn copy_live(mut src: ImgFs, mut dst: ImgFs) -> Result<u32> {
    let entries: Vec<ImgMetadata> = src.valid_entries().cloned().collect();
    let mut copied: HashMap<(u64, u32), u64> = HashMap::new();

    for (index, entry) in entries.iter().enumerate() {
        let mut slot = entry.clone();
        for res in Resolution::ALL {
            let i = res.index();
            if !entry.has(res) {
                slot.offset[i] = 0;
                slot.size[i] = 0;
                continue;
            }
            let range = (entry.offset[i], entry.size[i]);
            slot.offset[i] = match copied.get(&range) {
                Some(&offset) => offset,
                None => {
                    let bytes = src.read_range(range.0, range.1)?;
                    let offset = dst.append(&bytes)?;
                    copied.insert(range, offset);
                    offset
                }
            };
        }
        *dst.slot_mut(index) = slot;
        dst.write_metadata(index)?;
    }

    let kept = entries.len() as u32;
    let header = dst.header_mut();
    header.nb_files = kept;
    header.version = src.header().version;
    dst.write_header()?;

    dst.close();
    src.close();
    Ok(kept)
}
