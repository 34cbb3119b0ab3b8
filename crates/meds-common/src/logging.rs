//! `tracing` setup for hosts that drive fitting, training and encoding runs.
//!
//! The library crates only emit events. A host calls [`init_logging`] once
//! to route them; every `meds_*` crate follows the chosen level while other
//! crates (polars in particular) stay at `warn` unless `RUST_LOG` says
//! otherwise. Subject-level values pass through [`redact_value`] and are
//! hidden unless [`LoggingOptions::log_data`] is set.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Level;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

static LOG_DATA_ENABLED: AtomicBool = AtomicBool::new(false);

pub const REDACTED_VALUE: &str = "[REDACTED]";

const MEDS_CRATES: [&str; 5] = [
    "meds_common",
    "meds_ingest",
    "meds_model",
    "meds_tokenize",
    "meds_transform",
];

pub fn log_data_enabled() -> bool {
    LOG_DATA_ENABLED.load(Ordering::Relaxed)
}

/// The value itself when subject-level logging is on, otherwise [`REDACTED_VALUE`].
pub fn redact_value(value: &str) -> &str {
    if log_data_enabled() {
        value
    } else {
        REDACTED_VALUE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingOptions {
    pub level: Level,
    /// One JSON object per event instead of human-readable lines.
    pub json: bool,
    /// Allow subject ids and raw values into the log.
    pub log_data: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            log_data: false,
        }
    }
}

impl LoggingOptions {
    /// 0 is info, 1 debug, anything higher trace.
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Self::default()
        }
    }
}

/// Filter string used when `RUST_LOG` is unset, e.g. `warn,meds_common=debug,...`.
pub fn default_filter_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    std::iter::once("warn".to_string())
        .chain(MEDS_CRATES.iter().map(|name| format!("{name}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the global subscriber writing to `writer` (e.g. `std::io::stderr`).
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging<W>(options: LoggingOptions, writer: W) -> Result<(), TryInitError>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    LOG_DATA_ENABLED.store(options.log_data, Ordering::Release);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter_directives(options.level)));

    let layer = if options.json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer().compact().with_ansi(false).with_writer(writer).boxed()
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
}
