//! Process-wide logging setup.
//!
//! The first call to [`init_logging`] or [`init_logging_with`] installs a
//! global `tracing` subscriber. Both the level filter and the output layer sit
//! behind reload handles, so later calls swap the level and the format in
//! place. `log` records from the client crates are bridged into the same
//! subscriber.
//!
//! Environment variables override the `[logging]` table:
//! - `LOG_LEVEL`: filter directive, default `info`
//! - `KEYRELAY_LOG_FORMAT`: `pretty` (default) or `json`

use std::sync::{Mutex, OnceLock};

use tracing::{debug, info, warn};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

use crate::config::{LogFormat, LoggingSettings};
use crate::error::{CoreError, Result};

pub const LEVEL_ENV: &str = "LOG_LEVEL";
pub const FORMAT_ENV: &str = "KEYRELAY_LOG_FORMAT";
pub const DEFAULT_LEVEL: &str = "info";

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type OutputLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

struct Handles {
    filter: reload::Handle<EnvFilter, Registry>,
    output: reload::Handle<OutputLayer, FilteredRegistry>,
    format: Mutex<LogFormat>,
}

/// `None` once set means another subscriber owns the process.
static LOGGING: OnceLock<Option<Handles>> = OnceLock::new();

/// Initializes logging from the environment alone.
///
/// # Errors
///
/// Returns `CoreError::Logging` if `LOG_LEVEL` is not a valid filter directive.
pub fn init_logging() -> Result<()> {
    init_logging_with(&LoggingSettings::default())
}

/// Initializes logging, or reconfigures level and format if already initialized.
///
/// If a global subscriber was installed by someone else, this call leaves it
/// in place and succeeds; later calls are then no-ops.
///
/// # Errors
///
/// Returns `CoreError::Logging` if the level is not a valid filter directive
/// or the running subscriber cannot be updated.
pub fn init_logging_with(settings: &LoggingSettings) -> Result<()> {
    let resolved = resolve(
        std::env::var(LEVEL_ENV).ok(),
        std::env::var(FORMAT_ENV).ok(),
        settings,
    );

    let result = configure(&resolved.level, resolved.format);
    if let Some(e) = resolved.format_error {
        warn!("Ignoring {FORMAT_ENV}: {e}");
    }
    result
}

/// Whether logging setup has run in this process.
#[must_use]
pub fn is_initialized() -> bool {
    LOGGING.get().is_some()
}

/// The filter directive currently applied by the keyrelay subscriber.
#[must_use]
pub fn active_level() -> Option<String> {
    let handles = LOGGING.get()?.as_ref()?;
    handles.filter.with_current(ToString::to_string).ok()
}

/// The output format currently applied by the keyrelay subscriber.
#[must_use]
pub fn active_format() -> Option<LogFormat> {
    let handles = LOGGING.get()?.as_ref()?;
    handles.format.lock().ok().map(|format| *format)
}

struct Resolved {
    level: String,
    format: LogFormat,
    format_error: Option<CoreError>,
}

/// Effective level directive and format: environment, then settings, then defaults.
fn resolve(
    env_level: Option<String>,
    env_format: Option<String>,
    settings: &LoggingSettings,
) -> Resolved {
    let level = env_level
        .filter(|level| !level.trim().is_empty())
        .or_else(|| settings.level.clone())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());

    let (format, format_error) = match env_format.map(|format| format.parse::<LogFormat>()) {
        Some(Ok(format)) => (format, None),
        Some(Err(e)) => (settings.format.unwrap_or_default(), Some(e)),
        None => (settings.format.unwrap_or_default(), None),
    };

    Resolved {
        level,
        format,
        format_error,
    }
}

fn configure(level: &str, format: LogFormat) -> Result<()> {
    let mut pending = Some(parse_filter(level)?);
    let handles = LOGGING.get_or_init(|| {
        pending
            .take()
            .and_then(|filter| install(filter, format))
    });

    let Some(handles) = handles else {
        debug!("Logging owned by an external subscriber; ignoring configuration");
        return Ok(());
    };

    let Some(filter) = pending else {
        info!("Logging configured with level {level}");
        return Ok(());
    };

    handles.apply(filter, format)?;
    debug!("Logging reconfigured with level {level} and {format} output");
    Ok(())
}

impl Handles {
    fn apply(&self, filter: EnvFilter, format: LogFormat) -> Result<()> {
        self.filter
            .reload(filter)
            .map_err(|e| CoreError::Logging(format!("Failed to update log level: {e}")))?;

        let mut current = self
            .format
            .lock()
            .map_err(|_| CoreError::Logging("Logging state lock poisoned".to_string()))?;
        if *current != format {
            self.output
                .reload(output_layer(format))
                .map_err(|e| CoreError::Logging(format!("Failed to update log format: {e}")))?;
            *current = format;
        }

        Ok(())
    }
}

fn parse_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level.trim().to_lowercase())
        .map_err(|e| CoreError::Logging(format!("Invalid log level '{level}': {e}")))
}

fn output_layer(format: LogFormat) -> OutputLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
    }
}

fn install(filter: EnvFilter, format: LogFormat) -> Option<Handles> {
    let (filter, filter_handle) = reload::Layer::new(filter);
    let (output, output_handle) = reload::Layer::new(output_layer(format));

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .ok()?;

    Some(Handles {
        filter: filter_handle,
        output: output_handle,
        format: Mutex::new(format),
    })
}
