use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("cannot read account database {}", path.display())]
    AccountDatabase {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("terminal i/o failed")]
    Terminal(#[from] io::Error),

    #[error("cannot open log file {}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot install log subscriber")]
    Logging(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("cannot install interrupt handler")]
    Interrupt(#[from] ctrlc::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
