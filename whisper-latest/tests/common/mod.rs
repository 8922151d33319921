//! Synthetic Whisper file encoding for integration tests.
//!
//! The library is read-only, so tests build their fixtures byte by byte here.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// One archive of a synthetic file: resolution and raw slot contents.
pub struct ArchiveSpec {
    pub seconds_per_point: u32,
    pub slots: Vec<(u32, f64)>,
}

impl ArchiveSpec {
    pub fn new(seconds_per_point: u32, slots: &[(u32, f64)]) -> Self {
        Self {
            seconds_per_point,
            slots: slots.to_vec(),
        }
    }

    /// An archive of `count` never-written slots.
    pub fn empty(seconds_per_point: u32, count: usize) -> Self {
        Self {
            seconds_per_point,
            slots: vec![(0, 0.0); count],
        }
    }
}

/// Encodes a complete Whisper file with correct descriptor offsets.
pub fn encode(aggregation_type: u32, x_files_factor: f32, archives: &[ArchiveSpec]) -> Vec<u8> {
    let archive_count = u32::try_from(archives.len()).unwrap();
    let max_retention = archives
        .iter()
        .map(|a| a.seconds_per_point * u32::try_from(a.slots.len()).unwrap())
        .max()
        .unwrap_or(0);

    let mut out = Vec::new();
    for word in [aggregation_type, max_retention, x_files_factor.to_bits(), archive_count] {
        out.extend_from_slice(&word.to_be_bytes());
    }

    let mut offset = 16 + 12 * archive_count;
    for archive in archives {
        let points = u32::try_from(archive.slots.len()).unwrap();
        for word in [offset, archive.seconds_per_point, points] {
            out.extend_from_slice(&word.to_be_bytes());
        }
        offset += 12 * points;
    }

    for archive in archives {
        for (interval, value) in &archive.slots {
            out.extend_from_slice(&interval.to_be_bytes());
            out.extend_from_slice(&value.to_bits().to_be_bytes());
        }
    }
    out
}

/// Encodes a single-archive file at 60 seconds per point.
pub fn single_archive(slots: &[(u32, f64)]) -> Vec<u8> {
    encode(1, 0.5, &[ArchiveSpec::new(60, slots)])
}

/// Writes `bytes` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}
