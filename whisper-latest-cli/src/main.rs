//! CLI for sampling and inspecting Graphite Whisper files.
//!
//! Provides a clock-aligned watcher that prints the newest value of every
//! file in a Whisper tree, plus one-shot commands for inspecting single files.
//! Records go to stdout; logs go to stderr and are filtered with `RUST_LOG`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use whisper_latest::config::parse_duration;
use whisper_latest::format::DataPoint;
use whisper_latest::metric::metric_from_relative;
use whisper_latest::{
    ErrorPolicy, FileSample, LineSink, MappedWhisper, SampleSink, Scanner, Scheduler,
    WatchConfig, WhisperDump, latest_in_file, path_to_metric,
};

/// whisper-latest — Sample and inspect Graphite Whisper files.
#[derive(Parser)]
#[command(name = "whisper-latest", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Periodically print the newest value of every matching Whisper file.
    Watch {
        /// Root of the Whisper tree; metric names are relative to it.
        #[arg(long)]
        whisper_dir: Option<PathBuf>,

        /// Glob relative to the root (e.g. "servers/**/*.wsp").
        #[arg(long)]
        glob: Option<String>,

        /// Time between scans (e.g. "1m", "1m30s").
        #[arg(long, value_parser = parse_duration_arg)]
        interval: Option<Duration>,

        /// Shift of each scan from the interval boundary (e.g. "5s").
        #[arg(long, value_parser = parse_duration_arg)]
        offset: Option<Duration>,

        /// Log and skip files that cannot be read instead of stopping.
        #[arg(long)]
        skip_errors: bool,

        /// JSON config file; flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many scans instead of running forever.
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Print the newest value of one file, or of every matching file, now.
    Latest {
        /// A single Whisper file.
        #[arg(required_unless_present = "glob")]
        file: Option<PathBuf>,

        /// Root of the Whisper tree.
        #[arg(long)]
        whisper_dir: Option<PathBuf>,

        /// Glob relative to the root; scans the tree once.
        #[arg(long, requires = "whisper_dir", conflicts_with = "file")]
        glob: Option<String>,

        /// Log and skip files that cannot be read instead of stopping.
        #[arg(long)]
        skip_errors: bool,
    },

    /// Print the header, archive descriptors, and every point of a file.
    Dump {
        /// Path to the Whisper file.
        file: PathBuf,

        /// Only print the points of this archive (0 = highest resolution).
        #[arg(long)]
        archive: Option<u32>,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Display the header and archive layout of a file.
    Info {
        /// Path to the Whisper file.
        file: PathBuf,
    },
}

/// Output format for dumps.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One line per field, header first.
    Text,
    /// A single JSON document.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Watch {
            whisper_dir,
            glob,
            interval,
            offset,
            skip_errors,
            config,
            cycles,
        } => {
            let overrides = WatchOverrides {
                whisper_dir,
                glob,
                interval,
                offset,
                skip_errors,
            };
            cmd_watch(config.as_deref(), overrides, cycles)
        }
        Commands::Latest {
            file,
            whisper_dir,
            glob,
            skip_errors,
        } => cmd_latest(file.as_deref(), whisper_dir.as_deref(), glob.as_deref(), skip_errors),
        Commands::Dump {
            file,
            archive,
            format,
        } => cmd_dump(&file, archive, &format),
        Commands::Info { file } => cmd_info(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Watch settings given on the command line.
struct WatchOverrides {
    whisper_dir: Option<PathBuf>,
    glob: Option<String>,
    interval: Option<Duration>,
    offset: Option<Duration>,
    skip_errors: bool,
}

impl WatchOverrides {
    fn apply(self, config: &mut WatchConfig) {
        if let Some(dir) = self.whisper_dir {
            config.whisper_dir = dir;
        }
        if let Some(glob) = self.glob {
            config.glob = glob;
        }
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(offset) = self.offset {
            config.offset = offset;
        }
        if self.skip_errors {
            config.on_error = ErrorPolicy::Skip;
        }
    }
}

/// Implements `whisper-latest watch`.
fn cmd_watch(
    config_path: Option<&Path>,
    overrides: WatchOverrides,
    cycles: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => WatchConfig::load(path)?,
        None => WatchConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;

    let scanner = Scanner::from_config(&config)?;
    let scheduler = Scheduler::new(config.cadence()?);
    tracing::info!(
        whisper_dir = %config.whisper_dir.display(),
        glob = %config.glob,
        interval = ?config.interval,
        offset = ?config.offset,
        on_error = ?config.on_error,
        "starting watch"
    );

    let mut sink = LineSink::new(io::stdout());
    let cycle = || scanner.scan(&mut sink).map(|_| ());
    match cycles {
        Some(n) => scheduler.run_for(n, cycle)?,
        None => scheduler.run(cycle)?,
    }
    Ok(())
}

/// Implements `whisper-latest latest`.
fn cmd_latest(
    file: Option<&Path>,
    whisper_dir: Option<&Path>,
    glob: Option<&str>,
    skip_errors: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sink = LineSink::new(io::stdout());

    if let (Some(root), Some(glob)) = (whisper_dir, glob) {
        let policy = if skip_errors {
            ErrorPolicy::Skip
        } else {
            ErrorPolicy::Abort
        };
        Scanner::new(root, glob, policy)?.scan(&mut sink)?;
        return Ok(());
    }

    let file = file.ok_or("either a file or --whisper-dir with --glob is required")?;
    let metric = match whisper_dir {
        Some(root) => path_to_metric(root, file)?,
        None => metric_from_relative(file.file_name().map(Path::new).unwrap_or(file)),
    };
    if let Some(point) = latest_in_file(file)? {
        sink.emit(&FileSample::new(metric, point))?;
        sink.flush()?;
    }
    Ok(())
}

/// Implements `whisper-latest dump`.
fn cmd_dump(
    file: &Path,
    archive: Option<u32>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(index) = archive {
        let mapped = MappedWhisper::open(file)?;
        let points: Vec<DataPoint> = mapped.points(index)?.collect();
        match format {
            OutputFormat::Text => {
                println!("{}", file.display());
                for (slot, point) in points.iter().enumerate() {
                    println!("{}", format_point(index as usize, slot, point));
                }
            }
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "file": file.display().to_string(),
                    "archive": index,
                    "info": mapped.archives().get(index as usize),
                    "points": points,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
        return Ok(());
    }

    let dump = WhisperDump::read(file)?;
    match format {
        OutputFormat::Text => {
            println!("{}", file.display());
            let h = &dump.header;
            println!(
                "metadata: aggregation_type={} max_retention={} x_files_factor={} archive_count={}",
                h.aggregation_type,
                h.max_retention,
                h.x_files_factor(),
                h.archive_count
            );
            for (i, a) in dump.archives.iter().enumerate() {
                println!(
                    "i={i}, archive: offset={} seconds_per_point={} points={}",
                    a.offset, a.seconds_per_point, a.points
                );
            }
            for (i, points) in dump.points.iter().enumerate() {
                for (j, point) in points.iter().enumerate() {
                    println!("{}", format_point(i, j, point));
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
    }
    Ok(())
}

/// Implements `whisper-latest info`.
fn cmd_info(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mapped = MappedWhisper::open(file)?;
    let header = mapped.header();

    println!("File: {}", mapped.path().display());
    println!("Size: {} ({} bytes)", format_bytes(mapped.len()), mapped.len());
    println!("Aggregation type: {}", header.aggregation_type);
    println!(
        "Max retention: {}",
        format_duration_secs(u64::from(header.max_retention))
    );
    println!("xFilesFactor: {}", header.x_files_factor());
    println!("Archives: {}", header.archive_count);
    println!("Data offset: {}", header.data_offset());
    println!();

    for (index, archive) in (0u32..).zip(mapped.archives()) {
        println!(
            "  Archive {index}: {} per point, {} points, retention={}",
            format_duration_secs(u64::from(archive.seconds_per_point)),
            archive.points,
            format_duration_secs(archive.retention())
        );
        println!(
            "    Offset: {} ({})",
            archive.offset,
            format_bytes(archive.byte_size())
        );
        match mapped.latest(index)? {
            Some(point) => println!("    Latest: interval={} value={}", point.interval, point.value),
            None => println!("    Latest: no data"),
        }
    }

    Ok(())
}

/// Parses a duration flag for clap.
fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

/// Formats one slot of a dump, with the interval also rendered in UTC.
fn format_point(archive: usize, slot: usize, point: &DataPoint) -> String {
    let time = UNIX_EPOCH + Duration::from_secs(u64::from(point.interval));
    format!(
        "i={archive}, j={slot}, interval={} {}, value={}",
        point.interval,
        humantime::format_rfc3339_seconds(time),
        point.value
    )
}

/// Formats seconds as a human-readable duration.
fn format_duration_secs(secs: u64) -> String {
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// Formats a byte count as a human-readable string.
#[allow(clippy::cast_precision_loss)] // Byte counts are display-only
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
