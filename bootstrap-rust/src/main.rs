mod archive;
mod installer;
mod logging;
mod paths;
mod release;

use clap::Parser;
use std::{path::PathBuf, process::ExitCode};

use installer::InstallRequest;

/// RAUX bootstrap installer (Windows-only). Downloads or copies a release
/// archive, extracts it, and dispatches the provisioning stage against the
/// bundled Python runtime.
///
/// `--version` selects the release to install, so clap's own version flag
/// stays disabled.
#[derive(Debug, Parser)]
#[command(name = "raux-bootstrap")]
struct Args {
    /// Installation directory
    #[arg(long)]
    install_dir: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Custom log file path
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Specific version to install (e.g. "v0.6.5+raux.0.1.0.ab30cdb")
    #[arg(long)]
    version: Option<String>,

    /// Path to a local release archive to use instead of downloading
    #[arg(long)]
    local_release: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let request = InstallRequest {
        install_dir: args.install_dir,
        debug: args.debug,
        log_file: args.log_file,
        version: args.version,
        local_release: args.local_release,
    };

    // The provisioning stage's exit code is relayed as our own.
    match installer::run(&request) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn version_flag_takes_a_release_tag() {
        let args = Args::try_parse_from([
            "raux-bootstrap",
            "--install-dir",
            r"C:\Apps\RAUX",
            "--version",
            "v1.2.3",
        ])
        .unwrap();

        assert_eq!(args.install_dir, PathBuf::from(r"C:\Apps\RAUX"));
        assert_eq!(args.version.as_deref(), Some("v1.2.3"));
    }

    #[test]
    fn install_dir_is_required() {
        assert!(Args::try_parse_from(["raux-bootstrap"]).is_err());
    }
}
