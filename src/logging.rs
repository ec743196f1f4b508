use crate::models::LauncherSettings;
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// How the launcher core should log.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Directory for the daily rotating log files
    pub log_dir: Utf8PathBuf,
    /// File name prefix, e.g. "ftll" -> ftll.2026-10-19
    pub log_prefix: String,
    pub debug_mode: bool,
    /// Also log to stderr with colors
    pub console_output: bool,
    /// Write the file log as JSON lines
    pub json: bool,
}

impl LoggingOptions {
    pub fn from_settings(settings: &LauncherSettings, log_dir: Utf8PathBuf) -> Self {
        Self {
            log_dir,
            log_prefix: crate::APP_NAME.to_string(),
            debug_mode: settings.debug_mode,
            console_output: settings.console_logging,
            json: settings.json_logs,
        }
    }

    /// `RUST_LOG` wins; otherwise debug or info depending on debug mode.
    pub fn env_filter(&self) -> EnvFilter {
        let default_level = if self.debug_mode { "debug" } else { "info" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    }
}

fn ensure_log_dir(options: &LoggingOptions) -> Result<()> {
    if !options.log_dir.exists() {
        fs::create_dir_all(&options.log_dir)
            .with_context(|| format!("Failed to create log directory: {}", options.log_dir))?;
    }
    Ok(())
}

/// Install the global tracing subscriber.
///
/// Returns the guard of the non-blocking file writer; keep it alive for as
/// long as logs should be flushed. Fails if a global subscriber is already
/// installed.
pub fn setup_logging(options: &LoggingOptions) -> Result<WorkerGuard> {
    ensure_log_dir(options)?;

    let file_appender = rolling::daily(&options.log_dir, &options.log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if options.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false) // No ANSI codes in log files
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let console_layer = options.console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(options.env_filter())
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        options.log_dir,
        options.log_prefix,
        options.debug_mode,
        options.console_output,
        options.json
    );

    Ok(guard)
}
