use std::{path::PathBuf, time::Duration};

use clap::Parser;

pub const DEFAULT_USER_PREFIX: &str = "nixbld";

/// Live view of what every Nix build user is currently building.
#[derive(Parser, Debug)]
#[command(name = "nixtop", version, about)]
pub struct Cli {
    /// Seconds between screen refreshes
    #[arg(short, long, default_value = "0.5", value_parser = parse_delay)]
    delay: Duration,

    /// Draw a single screen and exit
    #[arg(short, long)]
    once: bool,

    /// Account name prefix of the build slots (followed by the slot number)
    #[arg(long, default_value = DEFAULT_USER_PREFIX)]
    user_prefix: String,

    /// Shared temporary directory the build sandboxes are created in
    #[arg(long, default_value = "/tmp")]
    tmp_dir: PathBuf,

    /// Account database to read the build users from
    #[arg(long, default_value = "/etc/passwd")]
    passwd: PathBuf,

    /// Append diagnostic logs to this file (filtered by RUST_LOG)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub delay: Duration,
    pub once: bool,
    pub user_prefix: String,
    pub tmp_dir: PathBuf,
    pub passwd: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            delay: cli.delay,
            once: cli.once,
            user_prefix: cli.user_prefix,
            tmp_dir: cli.tmp_dir,
            passwd: cli.passwd,
            log_file: cli.log_file,
        }
    }
}

fn parse_delay(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("`{raw}` is not a number of seconds"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("delay must be a positive number of seconds, got {raw}"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}
