//! Random access to any archive of a memory-mapped Whisper file.
//!
//! The sequential path in [`crate::latest`] only ever needs the first
//! archive, which directly follows the descriptor table. Inspecting a coarser
//! archive means jumping to the absolute offset its descriptor records. This
//! module maps the file read-only and serves each archive's slots straight
//! from the mapping.
//!
//! Every descriptor is bounds-checked against the file size when the file is
//! opened, so iterating an archive afterwards cannot run past the mapping.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{DecodeResult, FileError, Result};
use crate::format::{ArchiveInfo, DataPoint, Header, decode_archives, decode_header, decode_point};
use crate::latest::newer;
use crate::reader::BinaryReader;

/// A Whisper file mapped into memory with its layout decoded.
#[derive(Debug)]
pub struct MappedWhisper {
    mmap: Mmap,
    path: PathBuf,
    header: Header,
    archives: Vec<ArchiveInfo>,
}

impl MappedWhisper {
    /// Maps `path`, decodes its header and descriptors, and validates that
    /// every archive lies within the file.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Open`] or [`FileError::MemoryMap`] if the file
    /// cannot be mapped, [`FileError::Decode`] if the header or descriptor
    /// table is short, or [`FileError::BoundsViolation`] if an archive
    /// extends past the end of the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| FileError::Open {
            path: path.clone(),
            source: e,
        })?;

        // SAFETY: The mapping is read-only and the file is assumed not to be
        // truncated or rewritten while mapped. Truncation by another process
        // would fault on access; offsets are checked against the mapped
        // length below.
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| FileError::MemoryMap {
                path: path.clone(),
                source: e,
            })?
        };

        let (header, archives) = decode_layout(&mmap).map_err(|e| FileError::Decode {
            path: path.clone(),
            source: e,
        })?;

        let file_size = mmap.len() as u64;
        for (index, archive) in (0u32..).zip(&archives) {
            if archive.end_offset() > file_size {
                return Err(FileError::BoundsViolation {
                    path,
                    archive: index,
                    offset: u64::from(archive.offset),
                    end: archive.end_offset(),
                    file_size,
                }
                .into());
            }
        }

        Ok(Self {
            mmap,
            path,
            header,
            archives,
        })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the decoded header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the archive descriptors in file order.
    pub fn archives(&self) -> &[ArchiveInfo] {
        &self.archives
    }

    /// Returns the file size in bytes.
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Returns `true` if the file is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    fn archive(&self, index: u32) -> Result<&ArchiveInfo> {
        self.archives
            .get(index as usize)
            .ok_or_else(|| {
                FileError::ArchiveOutOfRange {
                    path: self.path.clone(),
                    index,
                    count: self.header.archive_count,
                }
                .into()
            })
    }

    /// Returns an iterator over every slot of archive `index`, in slot order.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::ArchiveOutOfRange`] if the archive does not exist.
    #[allow(clippy::cast_possible_truncation)] // Bounded by the mapped length
    pub fn points(&self, index: u32) -> Result<ArchivePoints<'_>> {
        let archive = self.archive(index)?;
        // Bounds were validated in `open`.
        let start = archive.offset as usize;
        let end = start + archive.byte_size() as usize;
        Ok(ArchivePoints {
            reader: BinaryReader::with_offset(&self.mmap[start..end], u64::from(archive.offset)),
            archive: index,
            slot: 0,
            count: archive.points,
        })
    }

    /// Returns the newest point of archive `index`, or `None` if it holds no
    /// samples.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::ArchiveOutOfRange`] if the archive does not exist.
    pub fn latest(&self, index: u32) -> Result<Option<DataPoint>> {
        let latest = self.points(index)?.fold(DataPoint::EMPTY, newer);
        Ok((!latest.is_empty()).then_some(latest))
    }
}

fn decode_layout(bytes: &[u8]) -> DecodeResult<(Header, Vec<ArchiveInfo>)> {
    let mut reader = BinaryReader::new(bytes);
    let header = decode_header(&mut reader)?;
    let archives = decode_archives(&mut reader, header.archive_count)?;
    Ok((header, archives))
}

/// Iterator over the slots of one mapped archive.
#[derive(Debug)]
pub struct ArchivePoints<'a> {
    reader: BinaryReader<&'a [u8]>,
    archive: u32,
    slot: u32,
    count: u32,
}

impl Iterator for ArchivePoints<'_> {
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        if self.slot >= self.count {
            return None;
        }
        let point = decode_point(&mut self.reader, self.archive, self.slot).ok()?;
        self.slot += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count - self.slot) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ArchivePoints<'_> {}
