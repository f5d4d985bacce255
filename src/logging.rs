use std::{fs::OpenOptions, io, path::Path, sync::Mutex};

use tracing_subscriber::EnvFilter;

use crate::error::{MonitorError, Result};

/// Stdout is the screen, so logs only ever go to `log_file` (or nowhere).
pub fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    // RUST_LOG=nixtop=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| MonitorError::LogFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init(),
    }
    .map_err(MonitorError::Logging)
}
