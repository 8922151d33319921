//! Watcher configuration.
//!
//! A [`WatchConfig`] names the Whisper root, the glob selecting files under
//! it, and the cadence at which they are sampled. It can be loaded from a
//! JSON file and then overridden field by field from the command line.
//!
//! ```json
//! {
//!   "whisper_dir": "/var/lib/graphite/whisper",
//!   "glob": "servers/**/*.wsp",
//!   "interval": { "secs": 60, "nanos": 0 },
//!   "offset": { "secs": 5, "nanos": 0 },
//!   "on_error": "abort"
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::schedule::Cadence;

/// Default scan cadence.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Default phase offset from the cadence boundary.
pub const DEFAULT_OFFSET: Duration = Duration::from_secs(5);

/// What a scan cycle does when one file fails to open or decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Abort the cycle and the run.
    #[default]
    Abort,
    /// Log the failure, count the file as skipped, and continue.
    Skip,
}

/// Configuration for a periodic latest-value scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Root of the Whisper tree; metric names are relative to it.
    pub whisper_dir: PathBuf,
    /// Glob matched against paths relative to `whisper_dir`.
    pub glob: String,
    /// Time between scans.
    pub interval: Duration,
    /// Shift of each scan from the interval boundary.
    pub offset: Duration,
    /// Per-file failure handling.
    pub on_error: ErrorPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            whisper_dir: PathBuf::new(),
            glob: String::new(),
            interval: DEFAULT_INTERVAL,
            offset: DEFAULT_OFFSET,
            on_error: ErrorPolicy::Abort,
        }
    }
}

impl WatchConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is not valid JSON for this type.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(config)
    }

    /// Checks that every required setting is present and usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for an empty directory or glob,
    /// or [`ConfigError::ZeroInterval`] for a zero interval.
    pub fn validate(&self) -> Result<()> {
        if self.whisper_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField { field: "whisper_dir" }.into());
        }
        if self.glob.is_empty() {
            return Err(ConfigError::MissingField { field: "glob" }.into());
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval.into());
        }
        Ok(())
    }

    /// Returns the validated scan cadence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroInterval`] if the interval is zero.
    pub fn cadence(&self) -> Result<Cadence> {
        Cadence::new(self.interval, self.offset)
    }
}

/// Parses a human-readable duration such as `500ms`, `5s`, `1m30s`, `2h`,
/// or `1d`. Terms may be combined.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDuration`] for an empty string, a missing
/// or unknown unit, or a malformed amount.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidDuration {
            input: s.to_string(),
            reason: "empty duration string".to_string(),
        }
        .into());
    }
    humantime::parse_duration(trimmed).map_err(|e| {
        ConfigError::InvalidDuration {
            input: s.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}
