//! File logging. The terminal belongs to the UI, so everything goes to
//! `menu-roulette.log` in the configuration directory.

use std::path::Path;

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter, e.g. `menu_roulette=debug`.
pub const LOG_ENV: &str = "MENU_ROULETTE_LOG";
const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init(dir: &Path, file_name: &str) -> Result<WorkerGuard> {
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("Unable to install the log subscriber: {err}"))?;
    Ok(guard)
}
