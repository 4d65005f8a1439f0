use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};

use crate::{logging::LogSink, paths, shortcuts, wheel};

#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub install_dir: PathBuf,
    pub yes: bool,
    pub force: bool,
    pub debug: bool,
}

pub fn run(request: &ProvisionRequest) -> Result<()> {
    fs::create_dir_all(&request.install_dir)
        .with_context(|| format!("create {}", request.install_dir.display()))?;
    let mut log = LogSink::open(&paths::log_file(&request.install_dir), request.debug)?;
    run_with_deps(
        request,
        &mut log,
        wheel::fetch_latest,
        wheel::download_file,
        exec_capture,
        |install_dir: &Path| {
            let desktop = shortcuts::desktop_dir()?;
            shortcuts::create_desktop_shortcut(
                &desktop,
                paths::PRODUCT_NAME,
                &install_dir.join(paths::LAUNCHER_CMD_NAME),
                install_dir,
                Some(&install_dir.join(paths::ICON_FILE_NAME)),
            )
        },
    )
}

/// Provisioning pipeline: runtime precondition, wheel download, wheel
/// install, then a best-effort desktop shortcut. Network and subprocess
/// calls are injected for tests.
pub fn run_with_deps(
    request: &ProvisionRequest,
    log: &mut LogSink,
    fetch_latest: impl FnOnce() -> Result<wheel::Release>,
    mut download: impl FnMut(&str, &Path) -> Result<()>,
    mut exec: impl FnMut(&mut Command) -> Result<Output>,
    create_shortcut: impl FnOnce(&Path) -> Result<PathBuf>,
) -> Result<()> {
    let install_dir = &request.install_dir;

    log.info("====================");
    log.info(&format!("{} Installation", paths::PRODUCT_NAME));
    log.info("====================");
    log.info(&format!("Installation directory: {}", install_dir.display()));
    if request.yes {
        log.debug("Confirmation prompts skipped (--yes)");
    }
    if request.force {
        log.debug("Force installation requested (--force)");
    }

    // Runtime check comes first; a missing runtime must fail without any
    // network access.
    let python = paths::python_exe(install_dir);
    if !python.exists() {
        log.error(&format!("Python not found at: {}", python.display()));
        bail!("bundled Python runtime not found at {}", python.display());
    }

    let temp_dir = paths::temp_dir(install_dir);
    fs::create_dir_all(&temp_dir)
        .with_context(|| format!("create {}", temp_dir.display()))?;

    log.info("------------------");
    log.info("- Download Wheel -");
    log.info("------------------");
    log.info("Fetching latest release information...");
    let release = fetch_latest().context("failed to fetch latest release info")?;
    let Some(asset) = wheel::select_wheel_asset(&release) else {
        log.error("No wheel file found in the latest release");
        bail!("no wheel file found in the latest release");
    };

    let wheel_path = temp_dir.join(&asset.name);
    log.info(&format!("Downloading wheel from: {}", asset.browser_download_url));
    log.info(&format!("Saving to: {}", wheel_path.display()));
    download(&asset.browser_download_url, &wheel_path)
        .context("failed to download wheel")?;
    log.info("Wheel downloaded successfully");

    log.info("-----------------");
    log.info("- Install Wheel -");
    log.info("-----------------");
    install_wheel(&python, &wheel_path, log, &mut exec)?;

    // Shortcut creation is best-effort; provisioning still succeeds without
    // one.
    log.info("--------------------");
    log.info("- Create Shortcuts -");
    log.info("--------------------");
    match create_shortcut(install_dir) {
        Ok(lnk) => log.info(&format!("Created shortcut at: {}", lnk.display())),
        Err(err) => log.warn(&format!("Error creating shortcuts: {err:#}")),
    }

    log.info("Installation completed successfully");
    // The temp download directory stays behind; deleting a wheel the runtime
    // may still hold open causes spurious failures.
    Ok(())
}

fn install_wheel(
    python: &Path,
    wheel_path: &Path,
    log: &mut LogSink,
    exec: &mut impl FnMut(&mut Command) -> Result<Output>,
) -> Result<()> {
    log.info(&format!("Installing wheel: {}", wheel_path.display()));
    let mut cmd = Command::new(python);
    cmd.arg("-m")
        .arg("pip")
        .arg("install")
        .arg("--no-deps")
        .arg(wheel_path)
        .stdin(Stdio::null());

    let output = exec(&mut cmd).context("failed to run pip install")?;
    if !output.stdout.is_empty() {
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            log.info(&format!("  {line}"));
        }
    }
    if !output.status.success() {
        let code = output.status.code().unwrap_or(1);
        log.error(&format!("Failed to install wheel. Exit code: {code}"));
        log.error(&format!(
            "Error output: {}",
            String::from_utf8_lossy(&output.stderr).trim_end()
        ));
        bail!("pip install failed with exit code {code}");
    }

    log.info("Wheel installed successfully");
    Ok(())
}

fn exec_capture(cmd: &mut Command) -> Result<Output> {
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    let program = cmd.get_program().to_string_lossy().to_string();
    cmd.output().with_context(|| format!("run {program}"))
}
