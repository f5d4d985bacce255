mod app;
mod config;
mod error;
mod host;
mod input;
mod logging;
mod monitor;
mod render;
mod resolver;
mod sampler;
mod screen;
mod users;

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use clap::Parser;
use color_eyre::Result;
use tracing::info;

use crate::{
    app::App,
    config::{Cli, Config},
    error::MonitorError,
    host::LiveSystem,
    input::{TerminalDiscipline, TerminalKeyboard},
    monitor::Monitor,
    users::BuildUserDirectory,
};

fn main() -> Result<()> {
    color_eyre::install()?;
    let config = Config::from(Cli::parse());
    logging::init_tracing(config.log_file.as_deref())?;
    info!(?config, "starting");

    let host = LiveSystem::new(config.passwd.clone(), config.tmp_dir.clone());
    let mut monitor = Monitor::new(host, BuildUserDirectory::new(config.user_prefix.as_str()));
    monitor.check_accounts()?;

    // SIGINT and SIGTERM only raise the flag. The refresh loop notices it while
    // idle; a one-shot pass finishes its screen and exits normally.
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)).map_err(MonitorError::from)?;

    let mut app = App::new(
        monitor,
        TerminalKeyboard,
        io::stdout(),
        config.delay,
        &interrupted,
    );

    if config.once {
        app.run_once()?;
    } else {
        app.run_interactive(TerminalDiscipline)?;
    }

    info!("exiting");
    Ok(())
}
