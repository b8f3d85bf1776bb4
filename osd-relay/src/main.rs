//! osd-relay binary
//!
//! `osd-relay render` turns DisplayPort frames arriving over UDP into a PNG
//! overlay; `osd-relay forward` polls a flight controller on a serial device
//! and sends its replies to the renderer.

use std::process::ExitCode;

use clap::Parser;
use osd_relay::config::{Cli, Command};
use osd_relay::{logging, tasks, RelayError};
use tracing::error;

fn run(cli: Cli) -> Result<(), RelayError> {
    match cli.command {
        Command::Render(args) => {
            let config = args.resolve()?;
            tasks::render::run(&config, None)?;
        }
        Command::Forward(args) => {
            let config = args.resolve()?;
            tasks::forward::run(&config, None)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "osd-relay failed");
            ExitCode::FAILURE
        }
    }
}
