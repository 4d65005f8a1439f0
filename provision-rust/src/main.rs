mod installer;
mod logging;
mod paths;
mod shortcuts;
mod wheel;

use clap::Parser;
use std::{path::PathBuf, process::ExitCode};

use installer::ProvisionRequest;

/// RAUX provisioning stage (Windows-only). Installs the application wheel
/// into the bundled Python runtime and creates a desktop shortcut.
#[derive(Debug, Parser)]
#[command(name = "raux-provision", version)]
struct Args {
    /// Installation directory (defaults to %LOCALAPPDATA%\RAUX)
    #[arg(long)]
    install_dir: Option<PathBuf>,

    /// Skip confirmation prompts
    #[arg(long)]
    yes: bool,

    /// Force installation
    #[arg(long)]
    force: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let install_dir = match args.install_dir {
        Some(dir) => dir,
        None => match paths::default_install_dir() {
            Ok(dir) => dir,
            Err(err) => {
                eprintln!("error: {err:#}");
                return ExitCode::from(1);
            }
        },
    };

    let request = ProvisionRequest {
        install_dir,
        yes: args.yes,
        force: args.force,
        debug: args.debug,
    };

    match installer::run(&request) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}
