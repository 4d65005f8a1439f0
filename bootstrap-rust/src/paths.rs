use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const ARCHIVE_FILE_NAME: &str = "raux.zip";
pub const EXTRACT_DIR_NAME: &str = "extracted_files";
pub const DEFAULT_LOG_FILE_NAME: &str = "raux_install.log";
pub const INSTALL_SCRIPT_NAME: &str = "install.py";
pub const INSTALL_SCRIPT_PREFERRED_DIR: &str = "ux_installer";
pub const ENV_EXAMPLE_NAME: &str = ".env.example";
pub const LAUNCHER_PS1_NAME: &str = "launch_raux.ps1";
pub const LAUNCHER_CMD_NAME: &str = "launch_raux.cmd";

const PYTHON_DIR: &str = "python";

/// Bundled runtime binary expected under the install directory. The runtime
/// itself is staged by the surrounding distribution, not by this installer.
pub fn python_exe(install_dir: &Path) -> PathBuf {
    install_dir.join(PYTHON_DIR).join("python.exe")
}

/// Destination for the release's `.env.example`.
pub fn env_dest(install_dir: &Path) -> PathBuf {
    install_dir.join(PYTHON_DIR).join("Lib").join(".env")
}

pub fn default_log_file(install_dir: &Path) -> PathBuf {
    install_dir.join(DEFAULT_LOG_FILE_NAME)
}

pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("current_dir")?;
    Ok(cwd.join(path))
}
