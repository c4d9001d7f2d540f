// src/imgfs.rs
use crate::codec::{ImageCodec, JpegCodec};
use crate::dedup::{content_digest, name_and_content_dedup};
use crate::error::{ImgfsError, Result};
use crate::format::{
    metadata_offset, validate_img_id, ImgMetadata, ImgfsHeader, Resolution, HEADER_SIZE,
    MAX_IMGFS_NAME, METADATA_SIZE,
};
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::mem;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// An open imgFS file.
///
/// The header and the whole metadata table live in memory and are the
/// source of truth; every mutation writes the touched records back before
/// returning, so memory and disk agree at each operation boundary.
pub struct ImgFs {
    file: File,
    header: ImgfsHeader,
    metadata: Vec<ImgMetadata>,
    codec: Box<dyn ImageCodec>,
}

impl ImgFs {
    /// Create a new store at `path` from `template` (name, capacity and
    /// derived resolutions). Any existing file is truncated.
    pub fn create<P: AsRef<Path>>(path: P, template: ImgfsHeader) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true);
        Self::create_with(path.as_ref(), template, &options)
    }

    /// Like [`ImgFs::create`], but an existing file at `path` (under any
    /// name) is an `AlreadyExists` error and is never opened for writing.
    pub fn create_new<P: AsRef<Path>>(path: P, template: ImgfsHeader) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create_new(true);
        Self::create_with(path.as_ref(), template, &options)
    }

    fn create_with(path: &Path, template: ImgfsHeader, options: &OpenOptions) -> Result<Self> {
        if template.max_files == 0 {
            return Err(ImgfsError::MaxFiles);
        }
        if template.name.len() > MAX_IMGFS_NAME {
            return Err(ImgfsError::InvalidArgument(format!(
                "imgFS name longer than {} bytes",
                MAX_IMGFS_NAME
            )));
        }

        let mut header = template;
        header.version = 0;
        header.nb_files = 0;

        let slots = header.max_files as usize;
        let mut metadata = Vec::new();
        metadata.try_reserve_exact(slots)?;
        metadata.resize(slots, ImgMetadata::default());

        let mut file = options.open(path)?;

        file.write_all(&header.encode())?;

        let mut table = Vec::new();
        table.try_reserve_exact(slots * METADATA_SIZE)?;
        for slot in &metadata {
            table.extend_from_slice(&slot.encode());
        }
        file.write_all(&table)?;

        info!("Created {:?}: {} item(s) written", path, 1 + slots);

        Ok(Self { file, header, metadata, codec: Box::new(JpegCodec) })
    }

    /// Open an existing store, loading the header and all `max_files` slots.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path)?;

        let mut raw = [0u8; HEADER_SIZE];
        file.read_exact(&mut raw)?;
        let header = ImgfsHeader::decode(&raw)?;
        if header.nb_files > header.max_files {
            return Err(ImgfsError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("header claims {} of {} files", header.nb_files, header.max_files),
            )));
        }

        let slots = header.max_files as usize;
        let mut table = Vec::new();
        table.try_reserve_exact(slots * METADATA_SIZE)?;
        table.resize(slots * METADATA_SIZE, 0);
        file.read_exact(&mut table)?;

        let mut metadata = Vec::new();
        metadata.try_reserve_exact(slots)?;
        for raw in table.chunks_exact(METADATA_SIZE) {
            metadata.push(ImgMetadata::decode(raw)?);
        }

        debug!(
            "Opened {:?} ({:?}): {}/{} files, version {}",
            path, mode, header.nb_files, header.max_files, header.version
        );

        Ok(Self { file, header, metadata, codec: Box::new(JpegCodec) })
    }

    /// Swap the image codec used by insert and the resize cache.
    pub fn with_codec(mut self, codec: Box<dyn ImageCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Release the file and the in-memory table.
    pub fn close(self) {
        debug!("Closing imgFS '{}'", self.header.name);
    }

    pub fn header(&self) -> &ImgfsHeader {
        &self.header
    }

    pub fn metadata(&self) -> &[ImgMetadata] {
        &self.metadata
    }

    /// Lowest-index valid slot holding `img_id`.
    pub fn find(&self, img_id: &str) -> Option<usize> {
        self.metadata
            .iter()
            .position(|m| m.is_valid && m.img_id == img_id)
    }

    /// Lowest-index free slot; this is the reuse policy after deletes.
    fn free_slot(&self) -> Option<usize> {
        self.metadata.iter().position(|m| !m.is_valid)
    }

    /// Insert `image` under `img_id`.
    ///
    /// Identical content already present under another id is shared rather
    /// than appended again. On any error the slot and header are left as
    /// they were.
    pub fn insert(&mut self, image: &[u8], img_id: &str) -> Result<()> {
        validate_img_id(img_id)?;
        if self.header.nb_files >= self.header.max_files {
            return Err(ImgfsError::ImgfsFull);
        }
        let index = self.free_slot().ok_or(ImgfsError::ImgfsFull)?;
        let size = u32::try_from(image.len())
            .map_err(|_| ImgfsError::InvalidArgument("image larger than 4 GiB".into()))?;

        let (width, height) = self.codec.dimensions(image)?;

        let mut candidate = ImgMetadata {
            img_id: img_id.to_string(),
            sha: content_digest(image),
            orig_res: [width, height],
            ..ImgMetadata::default()
        };
        candidate.size[Resolution::Orig.index()] = size;

        let previous_slot = mem::replace(&mut self.metadata[index], candidate);
        let previous_header = self.header.clone();

        if let Err(e) = self.commit_insert(index, image) {
            self.metadata[index] = previous_slot;
            self.header = previous_header;
            return Err(e);
        }

        info!(
            "Inserted '{}' into slot {} ({} bytes, {}x{})",
            img_id, index, size, width, height
        );
        Ok(())
    }

    fn commit_insert(&mut self, index: usize, image: &[u8]) -> Result<()> {
        let orig = Resolution::Orig.index();

        if let Some(donor) = name_and_content_dedup(&mut self.metadata, index)? {
            debug!("Slot {} shares content with slot {}", index, donor);
        }

        if self.metadata[index].offset[orig] == 0 {
            let offset = self.append(image)?;
            let slot = &mut self.metadata[index];
            slot.offset = [0, 0, offset];
        }

        self.metadata[index].is_valid = true;
        self.header.nb_files += 1;
        self.header.version = self.header.version.wrapping_add(1);

        // Slot first: a failure in between leaves nb_files short, never ahead.
        self.write_metadata(index)?;
        self.write_header()
    }

    /// Read `img_id` at `resolution`, materializing a derived resolution
    /// on first access.
    pub fn read(&mut self, img_id: &str, resolution: Resolution) -> Result<Vec<u8>> {
        validate_img_id(img_id)?;
        let index = self.find(img_id).ok_or(ImgfsError::ImageNotFound)?;

        if resolution.is_derived() && !self.metadata[index].has(resolution) {
            self.lazily_resize(resolution, index)?;
        }

        let slot = &self.metadata[index];
        let i = resolution.index();
        self.read_range(slot.offset[i], slot.size[i])
    }

    /// Invalidate `img_id`'s slot. Content bytes stay where they are, since
    /// other slots may share them.
    pub fn delete(&mut self, img_id: &str) -> Result<()> {
        validate_img_id(img_id)?;
        let index = self.find(img_id).ok_or(ImgfsError::ImageNotFound)?;

        self.metadata[index].is_valid = false;
        if let Err(e) = self.write_metadata(index) {
            self.metadata[index].is_valid = true;
            return Err(e);
        }

        self.header.nb_files = self.header.nb_files.saturating_sub(1);
        self.header.version = self.header.version.wrapping_add(1);
        self.write_header()?;

        info!("Deleted '{}' from slot {}", img_id, index);
        Ok(())
    }

    // --- Record I/O ---

    pub(crate) fn write_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.encode())?;
        Ok(())
    }

    pub(crate) fn write_metadata(&mut self, index: usize) -> Result<()> {
        let raw = self.metadata[index].encode();
        self.file.seek(SeekFrom::Start(metadata_offset(index)))?;
        self.file.write_all(&raw)?;
        Ok(())
    }

    /// Append raw bytes at end-of-file and return their offset.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(bytes)?;
        Ok(offset)
    }

    pub(crate) fn read_range(&mut self, offset: u64, size: u32) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size as usize)?;
        buf.resize(size as usize, 0);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn codec(&self) -> &dyn ImageCodec {
        self.codec.as_ref()
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut ImgMetadata {
        &mut self.metadata[index]
    }

    pub(crate) fn header_mut(&mut self) -> &mut ImgfsHeader {
        &mut self.header
    }
}
