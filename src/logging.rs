//! Structured logging setup.
//!
//! Console layer on stderr plus a daily-rolling file in the daemon's
//! log directory. `RUST_LOG` overrides the default `info` filter.

use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config;

/// Initialize tracing. The returned guard must stay alive for the
/// process lifetime or buffered file output is lost.
pub fn init() -> Option<WorkerGuard> {
    let log_dir = config::log_dir();
    let _ = fs::create_dir_all(&log_dir);

    let file_layer = match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("hweventd")
        .filename_suffix("log")
        .max_log_files(5)
        .build(&log_dir)
    {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            Some((layer, guard))
        }
        Err(e) => {
            eprintln!("log file unavailable ({}), console only", e);
            None
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match file_layer {
        Some((layer, guard)) => {
            let console_layer = fmt::layer().with_writer(std::io::stderr).compact();
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .with(console_layer)
                .init();
            Some(guard)
        }
        None => {
            let console_layer = fmt::layer().with_writer(std::io::stderr).compact();
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .init();
            None
        }
    }
}
