//! Logging setup
//!
//! The binary installs one global console subscriber. Each crawl session additionally
//! runs under a scoped [`Dispatch`] that writes to the console and to the run's own log
//! file.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const DEFAULT_DIRECTIVE: &str = "reddit_harvest=info,warn";
const RUN_LOG_DIRECTIVE: &str = "reddit_harvest=info,warn";

static CONSOLE_DIRECTIVE: OnceLock<String> = OnceLock::new();

/// Maps CLI verbosity to a filter directive
pub fn directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => DEFAULT_DIRECTIVE,
        1 => "reddit_harvest=debug,info",
        2 => "reddit_harvest=trace,debug",
        _ => "trace",
    }
}

fn console_directive() -> &'static str {
    CONSOLE_DIRECTIVE
        .get()
        .map(String::as_str)
        .unwrap_or(DEFAULT_DIRECTIVE)
}

/// Installs the global console subscriber
///
/// Calling it again is harmless; the first subscriber stays in place.
pub fn init(verbose: u8, quiet: bool) {
    let directive = directive(verbose, quiet);
    let _ = CONSOLE_DIRECTIVE.set(directive.to_string());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .try_init();
}

/// Builds the dispatcher for one run: console plus `log_path` (appended, no ANSI)
///
/// # Arguments
///
/// * `log_path` - Run log file; created if missing
///
/// # Returns
///
/// * `Ok(Dispatch)` - Dispatcher to scope the session under
/// * `Err(io::Error)` - The log file could not be opened
pub fn run_dispatch(log_path: &Path) -> io::Result<Dispatch> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let console = fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::new(console_directive()));
    let run_log = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .with_filter(EnvFilter::new(RUN_LOG_DIRECTIVE));

    Ok(Dispatch::new(Registry::default().with(console).with(run_log)))
}
