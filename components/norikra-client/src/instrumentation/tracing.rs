// External crates
use anyhow::Context;
use std::panic;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    filter::{Directive, EnvFilter},
    fmt,
    prelude::*,
    registry::Registry,
};

/// Filter used when `RUST_LOG` is unset. Stdout carries event data and stderr
/// the one-line error report, diagnostics only appear when asked for.
const DEFAULT_FILTER: &str = "off";

/// Install the global subscriber.
///
/// The returned guard flushes buffered diagnostics when dropped and must be
/// held for the lifetime of the process.
pub fn init_tracing() -> anyhow::Result<WorkerGuard> {
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // hyper's connection pool is noisy at debug
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some()
        && let Ok(hyper_directive) = "hyper_util=info".parse::<Directive>()
    {
        filter = filter.add_directive(hyper_directive);
    }

    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking_writer)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let error_layer = ErrorLayer::default();

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt_layer)
        .with(error_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;

    Ok(guard)
}

/// Log panics through tracing and print a single line to stderr.
pub fn init_panic_handler() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info.payload();
        let msg = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("Unknown panic");

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            message = %msg,
            location = %location,
            "Application panicked!"
        );
        eprintln!("norikra-client panicked at {location}: {msg}");
    }));
}
