// src/resize.rs
use crate::error::{ImgfsError, Result};
use crate::format::Resolution;
use crate::imgfs::ImgFs;
use log::info;

impl ImgFs {
    /// Make sure slot `index` has bytes for `resolution`.
    ///
    /// The original is a no-op, as is a variant that already exists.
    /// Otherwise the original is read back, shrunk into the box configured
    /// in the header, appended, and the slot is rewritten to point at it.
    pub fn lazily_resize(&mut self, resolution: Resolution, index: usize) -> Result<()> {
        let slot = self
            .metadata()
            .get(index)
            .filter(|m| m.is_valid)
            .ok_or(ImgfsError::InvalidImgId)?;

        let Some(target) = self.header().resized(resolution) else {
            return Ok(());
        };
        if slot.has(resolution) {
            return Ok(());
        }

        let orig = Resolution::Orig.index();
        let (orig_offset, orig_size) = (slot.offset[orig], slot.size[orig]);

        let original = self.read_range(orig_offset, orig_size)?;
        let resized = self
            .codec()
            .resize(&original, u32::from(target.width), u32::from(target.height))?;
        let size = u32::try_from(resized.len())
            .map_err(|_| ImgfsError::InvalidArgument("resized image larger than 4 GiB".into()))?;
        let offset = self.append(&resized)?;

        let i = resolution.index();
        let slot = self.slot_mut(index);
        let previous = (slot.offset[i], slot.size[i]);
        slot.offset[i] = offset;
        slot.size[i] = size;

        if let Err(e) = self.write_metadata(index) {
            let slot = self.slot_mut(index);
            (slot.offset[i], slot.size[i]) = previous;
            return Err(e);
        }

        info!(
            "Cached {} variant of '{}' ({} bytes at {})",
            resolution.suffix(),
            self.metadata()[index].img_id,
            size,
            offset
        );
        Ok(())
    }
}
