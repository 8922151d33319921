//! Latest-value extraction from the highest-resolution archive.
//!
//! The first archive of a Whisper file is a circular buffer, so the newest
//! sample can sit in any slot. [`extract_latest`] folds over the slots as they
//! stream past, keeping the point with the greatest interval; nothing beyond
//! the first archive's point array is ever read.
//!
//! Empty slots hold interval zero and can never beat the all-zero starting
//! point, so an archive with no samples yields [`DataPoint::EMPTY`]. A sample
//! genuinely written at the Unix epoch is indistinguishable from an empty
//! slot; that ambiguity belongs to the file format and is kept as is.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;

use crate::error::{DecodeResult, FileError, Result};
use crate::format::{DataPoint, decode_archives, decode_header, decode_point};
use crate::reader::BinaryReader;

/// Streams `point_count` slots of archive 0 and returns the newest point.
///
/// A slot replaces the running best only if its interval is strictly greater,
/// so among duplicate intervals the first in slot order wins.
///
/// # Errors
///
/// Returns the decode error of the first slot that cannot be read.
pub fn extract_latest<R: Read>(
    reader: &mut BinaryReader<R>,
    point_count: u32,
) -> DecodeResult<DataPoint> {
    let mut latest = DataPoint::EMPTY;
    for slot in 0..point_count {
        latest = newer(latest, decode_point(reader, 0, slot)?);
    }
    Ok(latest)
}

/// Returns `candidate` if its interval is strictly greater than `current`'s.
///
/// Folding a point array with this from [`DataPoint::EMPTY`] yields its
/// newest sample.
pub fn newer(current: DataPoint, candidate: DataPoint) -> DataPoint {
    if candidate.interval > current.interval {
        candidate
    } else {
        current
    }
}

/// Decodes header and descriptors from `reader`, then extracts the newest
/// point of the first archive.
///
/// Returns `None` if the file has no archives or the first archive holds no
/// samples.
///
/// # Errors
///
/// Returns the first decode error encountered.
pub fn read_latest<R: Read>(reader: &mut BinaryReader<R>) -> DecodeResult<Option<DataPoint>> {
    let header = decode_header(reader)?;
    let archives = decode_archives(reader, header.archive_count)?;
    let Some(first) = archives.first() else {
        return Ok(None);
    };
    let latest = extract_latest(reader, first.points)?;
    Ok((!latest.is_empty()).then_some(latest))
}

/// Opens `path` and returns the newest point of its first archive.
///
/// The file handle is released before returning, on success and on error.
///
/// # Errors
///
/// Returns [`FileError::Open`] if the file cannot be opened, or
/// [`FileError::Decode`] naming the stage at which decoding failed.
pub fn latest_in_file<P: AsRef<Path>>(path: P) -> Result<Option<DataPoint>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| FileError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BinaryReader::new(BufReader::new(file));
    let latest = read_latest(&mut reader).map_err(|e| FileError::Decode {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(
        path = %path.display(),
        interval = latest.map(|p| p.interval),
        bytes_read = reader.offset(),
        "decoded latest point"
    );
    Ok(latest)
}

/// The newest sample of one file, named for emission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSample {
    /// Dotted metric name derived from the file path.
    pub metric: String,
    /// Unix timestamp in seconds.
    pub interval: u32,
    /// Sample value.
    pub value: f64,
}

impl FileSample {
    /// Pairs a metric name with a decoded point.
    pub fn new(metric: impl Into<String>, point: DataPoint) -> Self {
        Self {
            metric: metric.into(),
            interval: point.interval,
            value: point.value,
        }
    }
}

/// Formats as `<interval>,<metric>,<value rounded to zero decimals>`.
///
/// Infinities are written `+Inf` and `-Inf`, NaN as `NaN`, matching the
/// records other Graphite tooling produces.
impl fmt::Display for FileSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},", self.interval, self.metric)?;
        if self.value.is_infinite() {
            f.write_str(if self.value > 0.0 { "+Inf" } else { "-Inf" })
        } else {
            write!(f, "{:.0}", self.value)
        }
    }
}
