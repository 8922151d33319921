//! Mapping Whisper file paths to dotted metric names.
//!
//! Graphite stores `servers.web1.cpu` at `<root>/servers/web1/cpu.wsp`. The
//! mapping here is the inverse: strip the root and the `.wsp` suffix, then
//! turn every path separator into a dot. It works on path text only and
//! never touches the filesystem.

use std::path::{self, Path};

use crate::error::{Result, ScanError};

/// File suffix used by Whisper files.
pub const WHISPER_SUFFIX: &str = ".wsp";

/// Returns the metric name for `path`, which must lie under `root`.
///
/// # Errors
///
/// Returns [`ScanError::PathResolution`] if `path` is not under `root`.
///
/// # Examples
///
/// ```rust
/// use whisper_latest::metric::path_to_metric;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let name = path_to_metric("/data/whisper", "/data/whisper/servers/web1/cpu.wsp")?;
/// assert_eq!(name, "servers.web1.cpu");
/// # Ok(())
/// # }
/// ```
pub fn path_to_metric<R: AsRef<Path>, P: AsRef<Path>>(root: R, path: P) -> Result<String> {
    let (root, path) = (root.as_ref(), path.as_ref());
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ScanError::PathResolution {
            root: root.to_path_buf(),
            path: path.to_path_buf(),
        })?;
    Ok(metric_from_relative(relative))
}

/// Returns the metric name for a path already relative to the Whisper root.
pub fn metric_from_relative<P: AsRef<Path>>(relative: P) -> String {
    let text = relative.as_ref().to_string_lossy();
    let stem = text.strip_suffix(WHISPER_SUFFIX).unwrap_or(&text);
    stem.chars()
        .map(|c| if path::is_separator(c) { '.' } else { c })
        .collect()
}
