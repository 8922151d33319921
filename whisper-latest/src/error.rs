//! Error types for Whisper decoding, scanning, and scheduling.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all whisper-latest operations.
///
/// Low-level decoding reports [`DecodeError`], which carries no file context.
/// Everything that touches the filesystem wraps it with the offending path
/// before it reaches this type.
#[derive(Error, Debug)]
pub enum WhisperError {
    /// Error opening, mapping, or decoding a single Whisper file.
    #[error("file error: {0}")]
    File(#[from] FileError),

    /// Error matching files or emitting records during a scan cycle.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// Error loading or validating configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl WhisperError {
    /// Returns `true` if the error is confined to a single file.
    ///
    /// Only these errors are eligible for the skip-and-continue scan policy.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

/// The part of a Whisper file being decoded when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// The fixed 16-byte metadata header.
    Header,
    /// One retention archive descriptor.
    ArchiveDescriptor {
        /// Zero-based descriptor index.
        index: u32,
    },
    /// One slot of an archive's point array.
    Point {
        /// Zero-based archive index.
        archive: u32,
        /// Zero-based slot index within the archive.
        slot: u32,
    },
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "header"),
            Self::ArchiveDescriptor { index } => write!(f, "archive descriptor {index}"),
            Self::Point { archive, slot } => write!(f, "point {slot} of archive {archive}"),
        }
    }
}

/// Errors produced while decoding the Whisper byte layout.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Fewer bytes were available than the format requires.
    #[error("truncated input in {stage}: needed {needed} bytes at offset {offset}")]
    TruncatedInput {
        /// Where decoding stopped.
        stage: DecodeStage,
        /// Byte offset of the field that could not be read.
        offset: u64,
        /// Width of the field in bytes.
        needed: usize,
    },

    /// The underlying byte source failed.
    #[error("read failed in {stage} at offset {offset}: {source}")]
    Io {
        /// Where decoding stopped.
        stage: DecodeStage,
        /// Byte offset of the field that could not be read.
        offset: u64,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl DecodeError {
    /// Returns the decode stage at which the error occurred.
    pub fn stage(&self) -> DecodeStage {
        match self {
            Self::TruncatedInput { stage, .. } | Self::Io { stage, .. } => *stage,
        }
    }
}

/// Errors tied to one Whisper file on disk.
#[derive(Error, Debug)]
pub enum FileError {
    /// The file could not be opened.
    #[error("failed to open '{}': {source}", path.display())]
    Open {
        /// The file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file contents could not be decoded.
    #[error("failed to decode '{}': {source}", path.display())]
    Decode {
        /// The file path.
        path: PathBuf,
        /// Where and why decoding failed.
        #[source]
        source: DecodeError,
    },

    /// Memory mapping failed.
    #[error("memory mapping failed for '{}': {source}", path.display())]
    MemoryMap {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A descriptor points outside the file.
    #[error("'{}': archive {archive} spans {offset}..{end} but file is {file_size} bytes", path.display())]
    BoundsViolation {
        /// The file path.
        path: PathBuf,
        /// The archive whose point array is out of bounds.
        archive: u32,
        /// Start of the archive's point array.
        offset: u64,
        /// End of the archive's point array.
        end: u64,
        /// Actual file size.
        file_size: u64,
    },

    /// The requested archive does not exist in the file.
    #[error("'{}' has {count} archives, no archive {index}", path.display())]
    ArchiveOutOfRange {
        /// The file path.
        path: PathBuf,
        /// The requested archive index.
        index: u32,
        /// Number of archives in the file.
        count: u32,
    },
}

/// Errors that can occur while matching files or emitting records.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The glob pattern is malformed.
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        /// The pattern as given.
        pattern: String,
        /// The underlying parse error.
        #[source]
        source: globset::Error,
    },

    /// Directory traversal failed.
    #[error("failed to walk '{}': {source}", root.display())]
    Walk {
        /// The scan root.
        root: PathBuf,
        /// The underlying traversal error.
        #[source]
        source: walkdir::Error,
    },

    /// A matched path cannot be expressed relative to the scan root.
    #[error("'{}' is not under root '{}'", path.display(), root.display())]
    PathResolution {
        /// The scan root.
        root: PathBuf,
        /// The matched path.
        path: PathBuf,
    },

    /// Writing a record to the sink failed.
    #[error("failed to emit record: {source}")]
    Emit {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The scan cadence is zero.
    #[error("interval must be greater than zero")]
    ZeroInterval,

    /// A required setting is absent or empty.
    #[error("missing required setting: {field}")]
    MissingField {
        /// The setting name.
        field: &'static str,
    },

    /// The config file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Load {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`crate::config::WatchConfig`].
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A duration string could not be parsed.
    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration {
        /// The string as given.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Type alias for `Result<T, WhisperError>`.
pub type Result<T> = std::result::Result<T, WhisperError>;

/// Type alias for results of the low-level decoder.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_stage_display() {
        assert_eq!(DecodeStage::Header.to_string(), "header");
        assert_eq!(
            DecodeStage::ArchiveDescriptor { index: 2 }.to_string(),
            "archive descriptor 2"
        );
        assert_eq!(
            DecodeStage::Point { archive: 0, slot: 17 }.to_string(),
            "point 17 of archive 0"
        );
    }

    #[test]
    fn test_file_error_names_path_and_stage() {
        let err: WhisperError = FileError::Decode {
            path: PathBuf::from("/data/whisper/cpu.wsp"),
            source: DecodeError::TruncatedInput {
                stage: DecodeStage::ArchiveDescriptor { index: 1 },
                offset: 28,
                needed: 4,
            },
        }
        .into();

        let msg = format!("{err}");
        assert!(msg.contains("/data/whisper/cpu.wsp"), "{msg}");
        assert!(msg.contains("archive descriptor 1"), "{msg}");
        assert!(err.is_per_file());
    }

    #[test]
    fn test_scan_errors_are_not_per_file() {
        let err: WhisperError = ScanError::PathResolution {
            root: PathBuf::from("/a"),
            path: PathBuf::from("/b/c.wsp"),
        }
        .into();
        assert!(!err.is_per_file());
    }
}
