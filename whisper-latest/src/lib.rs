//! # whisper-latest
//!
//! Streaming reader for Graphite Whisper files and a clock-aligned sampler
//! that reports the newest value of every file in a Whisper tree.
//!
//! A Whisper file holds a small big-endian header, one descriptor per
//! retention archive, and then each archive's fixed-size circular buffer of
//! `(interval, value)` points. The newest sample of a file is the point with
//! the greatest interval in its first (highest-resolution) archive; slots
//! with interval zero were never written.
//!
//! ## Key Properties
//!
//! - Sequential decoding: header, descriptors, and the first archive are read
//!   top to bottom through a buffered stream, nothing else is touched
//! - Bit-exact values: NaN payloads, infinities, and negative zero survive
//! - Drift-free scheduling: every wake-up is re-derived from the wall clock
//! - Fail loud: a corrupt file aborts the cycle unless skipping is requested
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whisper_latest::{ErrorPolicy, LineSink, Scanner};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scanner = Scanner::new("/var/lib/graphite/whisper", "servers/**/*.wsp", ErrorPolicy::Abort)?;
//! let mut sink = LineSink::new(std::io::stdout().lock());
//! let report = scanner.scan(&mut sink)?;
//! eprintln!("{} files, {} records", report.matched, report.emitted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`reader`] — Big-endian primitive decoding over any `Read`
//! - [`format`] — Header, descriptor, and point decoding; full-file dumps
//! - [`latest`] — Streaming newest-point extraction and [`FileSample`]
//! - [`mapped`] — Memory-mapped random access to any archive
//! - [`metric`] — File path to dotted metric name
//! - [`scan`] — Glob matching and one sampling cycle
//! - [`schedule`] — Wall-clock-aligned cadence and scheduler loop
//! - [`config`] — Watcher configuration
//! - [`error`] — Error types

pub mod config;
pub mod error;
pub mod format;
pub mod latest;
pub mod mapped;
pub mod metric;
pub mod reader;
pub mod scan;
pub mod schedule;

// Re-export primary API types at crate root for convenience.
pub use config::{ErrorPolicy, WatchConfig};
pub use error::{DecodeError, DecodeStage, Result, WhisperError};
pub use format::{ArchiveInfo, DataPoint, Header, WhisperDump};
pub use latest::{FileSample, latest_in_file};
pub use mapped::MappedWhisper;
pub use metric::path_to_metric;
pub use scan::{LineSink, SampleSink, ScanReport, Scanner};
pub use schedule::{Cadence, Clock, Scheduler, SystemClock};
