//! Whisper file format decoding.
//!
//! A Whisper file is a fixed-size, packed, big-endian structure:
//!
//! # File Format
//!
//! ```text
//! [0..16)                Header: aggregation type, max retention, xFilesFactor, archive count
//! [16..16+12*A)          Archive descriptors: byte offset, seconds per point, point count
//! [16+12*A..)            Point arrays, one per archive in descriptor order:
//!                        (u32 interval, f64 value) x point count
//! ```
//!
//! Archives are ordered from highest resolution to lowest. Each point array
//! is a circular buffer: slot order is not time order, and slots that were
//! never written hold an interval of zero.
//!
//! Every function here is a single sequential step over a [`BinaryReader`].
//! Because each array length is known before the array is read, a file can
//! be decoded top to bottom without seeking.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;

use crate::error::{DecodeResult, DecodeStage, FileError, Result};
use crate::reader::BinaryReader;

/// Size of the metadata header in bytes.
pub const HEADER_SIZE: u64 = 16;

/// Size of one archive descriptor in bytes.
pub const ARCHIVE_INFO_SIZE: u64 = 12;

/// Size of one data point in bytes.
pub const POINT_SIZE: u64 = 12;

/// File-level metadata at the start of every Whisper file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    /// Aggregation method code. Carried, not interpreted.
    pub aggregation_type: u32,
    /// Longest retention of any archive, in seconds.
    pub max_retention: u32,
    /// Raw bit pattern of the `f32` xFilesFactor.
    pub x_files_factor_bits: u32,
    /// Number of archive descriptors that follow.
    pub archive_count: u32,
}

impl Header {
    /// Returns the xFilesFactor as the fraction it encodes.
    pub fn x_files_factor(&self) -> f32 {
        f32::from_bits(self.x_files_factor_bits)
    }

    /// Returns the offset of the first byte after the descriptor table.
    pub fn data_offset(&self) -> u64 {
        HEADER_SIZE + u64::from(self.archive_count) * ARCHIVE_INFO_SIZE
    }
}

/// Descriptor of one retention archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveInfo {
    /// Absolute file offset of this archive's point array.
    pub offset: u32,
    /// Sampling resolution.
    pub seconds_per_point: u32,
    /// Number of slots in the circular buffer.
    pub points: u32,
}

impl ArchiveInfo {
    /// Returns the time span covered by this archive, in seconds.
    pub fn retention(&self) -> u64 {
        u64::from(self.seconds_per_point) * u64::from(self.points)
    }

    /// Returns the size of the point array in bytes.
    pub fn byte_size(&self) -> u64 {
        u64::from(self.points) * POINT_SIZE
    }

    /// Returns the offset one past the end of the point array.
    pub fn end_offset(&self) -> u64 {
        u64::from(self.offset) + self.byte_size()
    }
}

/// A single timestamped sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DataPoint {
    /// Unix timestamp in seconds; zero marks an empty slot.
    pub interval: u32,
    /// Sample value.
    pub value: f64,
}

impl DataPoint {
    /// The all-zero point an empty slot decodes to.
    pub const EMPTY: Self = Self {
        interval: 0,
        value: 0.0,
    };

    /// Returns `true` if this slot holds no sample.
    pub fn is_empty(&self) -> bool {
        self.interval == 0
    }
}

/// Decodes the metadata header.
///
/// # Errors
///
/// Returns a [`crate::error::DecodeError`] at stage [`DecodeStage::Header`]
/// if the input is short or unreadable.
pub fn decode_header<R: Read>(reader: &mut BinaryReader<R>) -> DecodeResult<Header> {
    let stage = DecodeStage::Header;
    Ok(Header {
        aggregation_type: reader.read_u32(stage)?,
        max_retention: reader.read_u32(stage)?,
        x_files_factor_bits: reader.read_u32(stage)?,
        archive_count: reader.read_u32(stage)?,
    })
}

/// Decodes one archive descriptor. `index` is used only for error reporting.
///
/// # Errors
///
/// Returns a [`crate::error::DecodeError`] if the input is short or unreadable.
pub fn decode_archive<R: Read>(
    reader: &mut BinaryReader<R>,
    index: u32,
) -> DecodeResult<ArchiveInfo> {
    let stage = DecodeStage::ArchiveDescriptor { index };
    Ok(ArchiveInfo {
        offset: reader.read_u32(stage)?,
        seconds_per_point: reader.read_u32(stage)?,
        points: reader.read_u32(stage)?,
    })
}

/// Decodes `count` archive descriptors in file order.
///
/// # Errors
///
/// Returns the first descriptor's decode error.
pub fn decode_archives<R: Read>(
    reader: &mut BinaryReader<R>,
    count: u32,
) -> DecodeResult<Vec<ArchiveInfo>> {
    // Capacity is not taken from `count`: a corrupt header must not drive a huge allocation.
    let mut archives = Vec::new();
    for index in 0..count {
        archives.push(decode_archive(reader, index)?);
    }
    Ok(archives)
}

/// Decodes one data point. `archive` and `slot` are used only for error reporting.
///
/// # Errors
///
/// Returns a [`crate::error::DecodeError`] if the input is short or unreadable.
pub fn decode_point<R: Read>(
    reader: &mut BinaryReader<R>,
    archive: u32,
    slot: u32,
) -> DecodeResult<DataPoint> {
    let stage = DecodeStage::Point { archive, slot };
    Ok(DataPoint {
        interval: reader.read_u32(stage)?,
        value: reader.read_f64_bits(stage)?,
    })
}

/// A fully materialized Whisper file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhisperDump {
    /// File metadata.
    pub header: Header,
    /// Archive descriptors in file order.
    pub archives: Vec<ArchiveInfo>,
    /// Every slot of every archive, indexed like `archives`.
    pub points: Vec<Vec<DataPoint>>,
}

impl WhisperDump {
    /// Opens `path` and decodes the whole file.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Open`] if the file cannot be opened, or
    /// [`FileError::Decode`] naming the stage at which decoding failed.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FileError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut reader = BinaryReader::new(BufReader::new(file));
        let dump = decode_dump(&mut reader).map_err(|e| FileError::Decode {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(dump)
    }
}

/// Decodes header, descriptors, and every archive's points in file order.
///
/// # Errors
///
/// Returns the first decode error encountered.
pub fn decode_dump<R: Read>(reader: &mut BinaryReader<R>) -> DecodeResult<WhisperDump> {
    let header = decode_header(reader)?;
    let archives = decode_archives(reader, header.archive_count)?;

    let mut points = Vec::with_capacity(archives.len());
    for (index, archive) in (0u32..).zip(&archives) {
        let mut slots = Vec::new();
        for slot in 0..archive.points {
            slots.push(decode_point(reader, index, slot)?);
        }
        points.push(slots);
    }

    Ok(WhisperDump {
        header,
        archives,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    fn be(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    fn point_bytes(interval: u32, value: f64) -> Vec<u8> {
        let mut out = interval.to_be_bytes().to_vec();
        out.extend_from_slice(&value.to_bits().to_be_bytes());
        out
    }

    #[test]
    fn test_decode_header_field_order() {
        let bytes = be(&[1, 86400, 0.5f32.to_bits(), 2]);
        let mut reader = BinaryReader::new(bytes.as_slice());
        let header = decode_header(&mut reader).unwrap();

        assert_eq!(header.aggregation_type, 1);
        assert_eq!(header.max_retention, 86400);
        assert_eq!(header.x_files_factor(), 0.5);
        assert_eq!(header.archive_count, 2);
        assert_eq!(header.data_offset(), 40);
    }

    #[test]
    fn test_decode_archives_zero_count() {
        let bytes: [u8; 0] = [];
        let mut reader = BinaryReader::new(&bytes[..]);
        assert!(decode_archives(&mut reader, 0).unwrap().is_empty());
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn test_decode_archive_derived_sizes() {
        let bytes = be(&[40, 60, 1440]);
        let mut reader = BinaryReader::new(bytes.as_slice());
        let archive = decode_archive(&mut reader, 0).unwrap();

        assert_eq!(archive.offset, 40);
        assert_eq!(archive.seconds_per_point, 60);
        assert_eq!(archive.points, 1440);
        assert_eq!(archive.retention(), 86400);
        assert_eq!(archive.byte_size(), 17280);
        assert_eq!(archive.end_offset(), 17320);
    }

    #[test]
    fn test_decode_point() {
        let bytes = point_bytes(1_700_000_040, -3.25);
        let mut reader = BinaryReader::new(bytes.as_slice());
        let point = decode_point(&mut reader, 0, 0).unwrap();
        assert_eq!(point.interval, 1_700_000_040);
        assert_eq!(point.value, -3.25);
        assert!(!point.is_empty());
    }

    #[test]
    fn test_truncated_descriptor_names_index() {
        let mut bytes = be(&[1, 120, 0, 2]);
        bytes.extend(be(&[40, 1, 60]));
        bytes.extend(be(&[760]));

        let mut reader = BinaryReader::new(bytes.as_slice());
        let header = decode_header(&mut reader).unwrap();
        let err = decode_archives(&mut reader, header.archive_count).unwrap_err();

        match err {
            DecodeError::TruncatedInput { stage, offset, .. } => {
                assert_eq!(stage, DecodeStage::ArchiveDescriptor { index: 1 });
                assert_eq!(offset, 32);
            }
            other => panic!("expected TruncatedInput, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_dump_materializes_all_archives() {
        let mut bytes = be(&[1, 20, 0, 2]);
        bytes.extend(be(&[40, 1, 2]));
        bytes.extend(be(&[64, 10, 1]));
        bytes.extend(point_bytes(101, 1.0));
        bytes.extend(point_bytes(100, 2.0));
        bytes.extend(point_bytes(100, 1.5));

        let mut reader = BinaryReader::new(bytes.as_slice());
        let dump = decode_dump(&mut reader).unwrap();

        assert_eq!(dump.archives.len(), 2);
        assert_eq!(dump.points[0].len(), 2);
        assert_eq!(dump.points[1].len(), 1);
        assert_eq!(dump.points[0][0], DataPoint { interval: 101, value: 1.0 });
        assert_eq!(dump.points[1][0], DataPoint { interval: 100, value: 1.5 });
        assert_eq!(reader.offset(), bytes.len() as u64);
    }

    #[test]
    fn test_decode_dump_truncated_point_names_archive_and_slot() {
        let mut bytes = be(&[1, 3, 0, 1]);
        bytes.extend(be(&[28, 1, 3]));
        bytes.extend(point_bytes(1, 1.0));
        bytes.extend(&[0, 0, 0, 2, 0x40]);

        let mut reader = BinaryReader::new(bytes.as_slice());
        let err = decode_dump(&mut reader).unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Point { archive: 0, slot: 1 });
    }
}
