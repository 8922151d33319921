//! One scan cycle over a Whisper tree.
//!
//! A [`Scanner`] walks the Whisper root, matches every regular file against a
//! glob evaluated relative to the root, and for each match in enumeration
//! order decodes the newest point and emits one [`FileSample`]. Directory
//! entries are visited in file-name order, so a cycle's output order is
//! stable between runs.
//!
//! Glob syntax follows Graphite tooling: `*` stays within one directory and
//! `**` crosses directories, so `servers/**/*.wsp` matches every Whisper file
//! below `servers/`.
//!
//! Files that cannot be opened or decoded abort the cycle under
//! [`ErrorPolicy::Abort`]. Under [`ErrorPolicy::Skip`] they are logged,
//! counted, and passed over. Errors that are not confined to one file (a
//! broken walk, an unwritable sink) abort the cycle under either policy.

use std::io::Write;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::{ErrorPolicy, WatchConfig};
use crate::error::{Result, ScanError};
use crate::latest::{FileSample, latest_in_file};
use crate::metric::path_to_metric;

/// Destination for extracted samples.
pub trait SampleSink {
    /// Emits one sample.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Emit`] if the sample cannot be written.
    fn emit(&mut self, sample: &FileSample) -> Result<()>;

    /// Called once at the end of every cycle.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Emit`] if buffered output cannot be written.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes one `<interval>,<metric>,<value>` line per sample.
#[derive(Debug)]
pub struct LineSink<W> {
    writer: W,
}

impl<W: Write> LineSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SampleSink for LineSink<W> {
    fn emit(&mut self, sample: &FileSample) -> Result<()> {
        writeln!(self.writer, "{sample}").map_err(|e| ScanError::Emit { source: e })?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| ScanError::Emit { source: e })?;
        Ok(())
    }
}

impl SampleSink for Vec<FileSample> {
    fn emit(&mut self, sample: &FileSample) -> Result<()> {
        self.push(sample.clone());
        Ok(())
    }
}

/// Counters for one scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Files matched by the glob.
    pub matched: usize,
    /// Samples emitted.
    pub emitted: usize,
    /// Files whose first archive holds no sample.
    pub empty: usize,
    /// Files passed over under [`ErrorPolicy::Skip`].
    pub skipped: usize,
}

/// Matches and samples the files of one Whisper tree.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    pattern: String,
    matcher: GlobMatcher,
    policy: ErrorPolicy,
}

impl Scanner {
    /// Compiles `pattern` for matching paths relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Pattern`] if the glob is malformed.
    pub fn new<P: Into<PathBuf>>(root: P, pattern: &str, policy: ErrorPolicy) -> Result<Self> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ScanError::Pattern {
                pattern: pattern.to_string(),
                source: e,
            })?
            .compile_matcher();
        Ok(Self {
            root: root.into(),
            pattern: pattern.to_string(),
            matcher,
            policy,
        })
    }

    /// Builds a scanner from a watcher configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Pattern`] if the configured glob is malformed.
    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        Self::new(config.whisper_dir.clone(), &config.glob, config.on_error)
    }

    /// Returns the Whisper root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the glob as given.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns every matching regular file under the root, in walk order.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Walk`] if a directory cannot be read.
    pub fn matches(&self) -> Result<Vec<PathBuf>> {
        let mut matches = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| ScanError::Walk {
                root: self.root.clone(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if self.matcher.is_match(relative) {
                matches.push(entry.into_path());
            }
        }
        Ok(matches)
    }

    /// Runs one cycle, emitting the newest sample of every matching file.
    ///
    /// # Errors
    ///
    /// Returns the first walk, path-resolution, or sink error. Per-file open
    /// and decode errors are returned under [`ErrorPolicy::Abort`] and
    /// skipped under [`ErrorPolicy::Skip`].
    pub fn scan<S: SampleSink + ?Sized>(&self, sink: &mut S) -> Result<ScanReport> {
        let files = self.matches()?;
        tracing::info!(
            root = %self.root.display(),
            files = files.len(),
            "reading whisper files"
        );

        let mut report = ScanReport {
            matched: files.len(),
            ..ScanReport::default()
        };
        for path in &files {
            let metric = path_to_metric(&self.root, path)?;
            match latest_in_file(path) {
                Ok(Some(point)) => {
                    sink.emit(&FileSample::new(metric, point))?;
                    report.emitted += 1;
                }
                Ok(None) => report.empty += 1,
                Err(e) if self.policy == ErrorPolicy::Skip && e.is_per_file() => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable whisper file");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        sink.flush()?;

        tracing::info!(
            emitted = report.emitted,
            empty = report.empty,
            skipped = report.skipped,
            "scan finished"
        );
        Ok(report)
    }
}

/// Compiles `pattern` and runs a single cycle over `root`.
///
/// # Errors
///
/// See [`Scanner::new`] and [`Scanner::scan`].
pub fn scan_once<S: SampleSink + ?Sized>(
    root: &Path,
    pattern: &str,
    policy: ErrorPolicy,
    sink: &mut S,
) -> Result<ScanReport> {
    Scanner::new(root, pattern, policy)?.scan(sink)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::error::WhisperError;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn relative_matches(scanner: &Scanner) -> Vec<String> {
        scanner
            .matches()
            .unwrap()
            .iter()
            .map(|p| p.strip_prefix(scanner.root()).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_star_stays_in_one_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.wsp");
        touch(dir.path(), "sub/b.wsp");

        let scanner = Scanner::new(dir.path(), "*.wsp", ErrorPolicy::Abort).unwrap();
        assert_eq!(relative_matches(&scanner), vec!["a.wsp"]);
    }

    #[test]
    fn test_double_star_crosses_directories_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "servers/web2/cpu.wsp");
        touch(dir.path(), "servers/web1/mem.wsp");
        touch(dir.path(), "servers/web1/cpu.wsp");
        touch(dir.path(), "servers/web1/notes.txt");
        touch(dir.path(), "other/disk.wsp");

        let scanner = Scanner::new(dir.path(), "servers/**/*.wsp", ErrorPolicy::Abort).unwrap();
        assert_eq!(
            relative_matches(&scanner),
            vec![
                "servers/web1/cpu.wsp",
                "servers/web1/mem.wsp",
                "servers/web2/cpu.wsp",
            ]
        );
    }

    #[test]
    fn test_directories_are_not_matched() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("looks_like.wsp")).unwrap();

        let scanner = Scanner::new(dir.path(), "*.wsp", ErrorPolicy::Abort).unwrap();
        assert!(relative_matches(&scanner).is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Scanner::new("/data", "servers/[web", ErrorPolicy::Abort).unwrap_err();
        assert!(matches!(err, WhisperError::Scan(ScanError::Pattern { .. })));
    }

    #[test]
    fn test_missing_root_is_walk_error() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::new(dir.path().join("absent"), "*.wsp", ErrorPolicy::Skip).unwrap();
        let mut sink = Vec::new();
        let err = scanner.scan(&mut sink).unwrap_err();
        assert!(matches!(err, WhisperError::Scan(ScanError::Walk { .. })));
    }

    #[test]
    fn test_line_sink_format() {
        let mut sink = LineSink::new(Vec::new());
        let point = crate::format::DataPoint {
            interval: 1000,
            value: 42.0,
        };
        sink.emit(&FileSample::new("a.b", point)).unwrap();
        sink.emit(&FileSample::new("c", point)).unwrap();
        sink.flush().unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "1000,a.b,42\n1000,c,42\n");
    }
}
