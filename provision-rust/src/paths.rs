use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const PRODUCT_NAME: &str = "RAUX";
pub const LOG_FILE_NAME: &str = "raux_install.log";
pub const TEMP_DIR_NAME: &str = "temp";
pub const LAUNCHER_CMD_NAME: &str = "launch_raux.cmd";
pub const ICON_FILE_NAME: &str = "raux.ico";

const PYTHON_DIR: &str = "python";

/// Bundled runtime binary. Staged by the bootstrap distribution before this
/// stage runs; never installed here.
pub fn python_exe(install_dir: &Path) -> PathBuf {
    install_dir.join(PYTHON_DIR).join("python.exe")
}

pub fn temp_dir(install_dir: &Path) -> PathBuf {
    install_dir.join(TEMP_DIR_NAME)
}

pub fn log_file(install_dir: &Path) -> PathBuf {
    install_dir.join(LOG_FILE_NAME)
}

pub fn default_install_dir() -> Result<PathBuf> {
    let local = std::env::var("LOCALAPPDATA").context("LOCALAPPDATA not set")?;
    Ok(PathBuf::from(local).join(PRODUCT_NAME))
}
