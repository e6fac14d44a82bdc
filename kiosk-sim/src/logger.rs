//! Logging setup for the simulator

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initialize the logger
///
/// `RUST_LOG` wins over `log_level`. With `log_dir` set (and existing) the
/// output goes to a daily rolling file instead of stdout.
pub fn init_logger(log_level: &str, json: bool, log_dir: Option<&Path>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    match (log_dir.filter(|dir| dir.exists()), json) {
        (Some(dir), true) => builder
            .json()
            .with_writer(tracing_appender::rolling::daily(dir, "kiosk-sim"))
            .init(),
        (Some(dir), false) => builder
            .with_ansi(false)
            .with_writer(tracing_appender::rolling::daily(dir, "kiosk-sim"))
            .init(),
        (None, true) => builder.json().init(),
        (None, false) => builder.init(),
    }
}
