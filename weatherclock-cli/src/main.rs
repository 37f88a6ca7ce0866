//! Binary crate for the `weatherclock` kiosk.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Driving the kiosk screen from the terminal

use clap::Parser;
use tracing::{info, warn};
use weatherclock_core::Config;

mod cli;
mod clock;
mod kiosk;
mod logging;
mod render;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    init_tracing(&cmd);
    cmd.run().await
}

fn init_tracing(cmd: &cli::Cli) {
    if !cmd.logs_to_file() {
        logging::init_stderr(cmd.debug);
        return;
    }

    let path = match &cmd.log_file {
        Some(path) => Ok(path.clone()),
        None => Config::log_file_path(),
    };
    let opened = path.and_then(|p| logging::init_file(cmd.debug, &p).map(|()| p));

    match opened {
        Ok(path) => info!(path = %path.display(), "Logging initialized"),
        Err(e) => {
            logging::init_stderr(cmd.debug);
            warn!("Logging to stderr: {e:#}");
        }
    }
}
