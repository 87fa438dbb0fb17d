//! Tracing setup for the server binary.
//!
//! Events are printed to stdout and mirrored to a log file without ANSI colours. The file is
//! `DOCUQUERY_LOG_FILE` when set, `logs/docuquery.log` otherwise, and is appended to across
//! restarts. Writes go through a non-blocking worker whose guard lives for the whole process.
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Overrides the log file location.
pub const LOG_FILE_ENV: &str = "DOCUQUERY_LOG_FILE";

const DEFAULT_LOG_PATH: &str = "logs/docuquery.log";
const DEFAULT_FILTER: &str = "info,docuquery=debug,lopdf=warn";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where the file layer writes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogTarget {
    directory: PathBuf,
    file_name: String,
}

impl LogTarget {
    /// Resolve the configured path, falling back to the default for unset or empty values.
    fn resolve(configured: Option<OsString>) -> Self {
        let path = configured
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "docuquery.log".to_string());
        Self {
            directory,
            file_name,
        }
    }

    fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter. If the log file cannot be opened the server keeps
/// running with stdout only. A second call leaves the first subscriber in place.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let target = LogTarget::resolve(std::env::var_os(LOG_FILE_ENV));
    let file_layer = open_file_writer(&target).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .try_init();

    match installed {
        Ok(()) => tracing::debug!(log_file = %target.path().display(), "Tracing initialized"),
        Err(error) => eprintln!("Tracing already initialized: {error}"),
    }
}

fn open_file_writer(target: &LogTarget) -> Option<NonBlocking> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(target.file_name.clone())
        .build(&target.directory);
    match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            Some(writer)
        }
        Err(error) => {
            eprintln!(
                "Logging to stdout only, cannot open {}: {error}",
                target.path().display()
            );
            None
        }
    }
}
