use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};

use crate::{archive, logging::LogSink, paths, release};

/// External input for one bootstrap run. Built once from the CLI and
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub install_dir: PathBuf,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub version: Option<String>,
    pub local_release: Option<PathBuf>,
}

pub fn run(request: &InstallRequest) -> Result<i32> {
    let log_path = resolve_log_path(request)?;
    let mut log = LogSink::open(&log_path, request.debug)?;
    let work_dir = std::env::current_dir().context("current_dir")?;
    run_with_deps(
        request,
        &work_dir,
        &mut log,
        release::fetch_latest,
        release::download_file,
        exec_capture,
    )
}

/// Orchestrates the whole bootstrap stage. Network fetch, download, and
/// subprocess execution are injected so tests can observe the call order
/// and substitute doubles.
pub fn run_with_deps(
    request: &InstallRequest,
    work_dir: &Path,
    log: &mut LogSink,
    fetch_latest: impl FnOnce() -> Result<release::Release>,
    mut download: impl FnMut(&str, &Path) -> Result<()>,
    mut exec: impl FnMut(&mut Command) -> Result<Output>,
) -> Result<i32> {
    if log.resumed() {
        log.info("===== RAUX INSTALLER CONTINUING =====");
    } else {
        log.info("===== RAUX INSTALLER =====");
    }
    log.info(&format!(
        "Start time: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    log.info(&format!("Current directory: {}", work_dir.display()));
    log.info(&format!("Using log file: {}", log.path().display()));
    if let Some(version) = &request.version {
        log.info(&format!("Requested specific version: {version}"));
    }

    let install_dir = &request.install_dir;
    log.info(&format!("INSTALL_DIR set to: {}", install_dir.display()));
    validate_install_dir(install_dir, log)?;

    log.info("Starting RAUX download and installation...");
    log.info(&format!(
        "Using current directory for installation: {}",
        work_dir.display()
    ));

    let archive_path = work_dir.join(paths::ARCHIVE_FILE_NAME);
    obtain_archive(request, &archive_path, log, fetch_latest, &mut download)?;
    if !archive_path.exists() {
        log.error("Failed to obtain RAUX release archive");
        bail!("failed to obtain RAUX release archive");
    }

    let extract_dir = work_dir.join(paths::EXTRACT_DIR_NAME);
    fs::create_dir_all(&extract_dir)
        .with_context(|| format!("create {}", extract_dir.display()))?;
    log.info("Extracting files...");
    archive::extract_zip(&archive_path, &extract_dir)
        .context("failed to extract RAUX release archive")?;

    if request.debug {
        log.debug("Listing extracted files:");
        for entry in walkdir::WalkDir::new(&extract_dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if entry.file_type().is_file() {
                log.debug(&format!("  {}", entry.path().display()));
            }
        }
    }

    copy_env_example(&extract_dir, install_dir, log);

    let install_script =
        match archive::find_file_preferring(
            &extract_dir,
            paths::INSTALL_SCRIPT_NAME,
            paths::INSTALL_SCRIPT_PREFERRED_DIR,
        ) {
            Some(script) => script,
            None => {
                log.error("Could not find install.py in extracted files");
                bail!("could not find install.py in extracted files");
            }
        };
    log.info(&format!("Found install script: {}", install_script.display()));

    // Release the log handle before the child process starts writing to the
    // same file, then take it back.
    log.reopen()?;
    log.info("===== RAUX INSTALLER CONTINUING AFTER HANDLER RESET =====");

    let exit_code = run_install_script(request, &install_script, log, &mut exec)?;

    let launchers = copy_launchers(&extract_dir, work_dir, install_dir, log)?;

    log.info(&format!("Installation completed with exit code: {exit_code}"));
    if exit_code != 0 {
        log.error(&format!("Installation failed with error code: {exit_code}"));
        log.error("Please ensure all RAUX applications are closed and try again.");
    } else {
        log.info("Installation completed successfully.");
        log.info("You can start RAUX by using the desktop shortcut if created.");
    }

    log.info("===== INSTALLATION SUMMARY =====");
    log.info(&format!("Installation directory: {}", install_dir.display()));
    log.info(&format!(
        "Launcher scripts copied: PS1={}, CMD={}",
        launchers.ps1_found, launchers.cmd_found
    ));
    log.info(&format!("Final exit code: {exit_code}"));
    log.info(&format!(
        "End time: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    log.info("===============================");

    // The archive and extraction directory stay on disk; removing them here
    // races against the application the child process may have started.
    log.info("Temporary files will not be cleaned up to prevent file-in-use errors");

    Ok(exit_code)
}

fn resolve_log_path(request: &InstallRequest) -> Result<PathBuf> {
    match &request.log_file {
        Some(path) if !path.as_os_str().is_empty() => paths::absolutize(path),
        _ => Ok(paths::default_log_file(&request.install_dir)),
    }
}

/// Install-dir validation runs before any network work.
fn validate_install_dir(install_dir: &Path, log: &mut LogSink) -> Result<()> {
    log.info(&format!(
        "Checking if installation directory exists and is writable: {}",
        install_dir.display()
    ));
    if install_dir.as_os_str().is_empty() {
        log.error("Installation directory parameter is missing");
        bail!("installation directory parameter is missing");
    }
    if !install_dir.exists() {
        log.error(&format!(
            "Installation directory does not exist: {}",
            install_dir.display()
        ));
        bail!(
            "installation directory does not exist: {}",
            install_dir.display()
        );
    }

    log.info("Testing write permissions in installation directory...");
    let probe = install_dir.join("write_test.txt");
    let wrote = fs::write(&probe, "Test");
    let removed = wrote.is_ok().then(|| fs::remove_file(&probe));
    if let Err(err) = wrote {
        log.error(&format!(
            "Cannot write to installation directory: {}",
            install_dir.display()
        ));
        return Err(err).with_context(|| {
            format!(
                "cannot write to installation directory: {}",
                install_dir.display()
            )
        });
    }
    if let Some(Err(err)) = removed {
        log.warn(&format!("Failed to remove write probe: {err}"));
    }
    Ok(())
}

fn obtain_archive(
    request: &InstallRequest,
    archive_path: &Path,
    log: &mut LogSink,
    fetch_latest: impl FnOnce() -> Result<release::Release>,
    download: &mut impl FnMut(&str, &Path) -> Result<()>,
) -> Result<()> {
    log.info("Determining download URL...");

    if let Some(local) = &request.local_release {
        log.info(&format!("Using local release file: {}", local.display()));
        if !local.exists() {
            log.error(&format!(
                "Local release file does not exist: {}",
                local.display()
            ));
            bail!("local release file does not exist: {}", local.display());
        }
        fs::copy(local, archive_path).with_context(|| {
            format!(
                "copy {} -> {}",
                local.display(),
                archive_path.display()
            )
        })?;
        let size = fs::metadata(archive_path).map(|m| m.len()).unwrap_or(0);
        log.info(&format!(
            "Copied local release file to {} ({size} bytes)",
            archive_path.display()
        ));
        return Ok(());
    }

    let url = match &request.version {
        Some(version) => release::versioned_url(version),
        None => {
            log.info("Fetching latest release information...");
            let latest = fetch_latest().context("failed to fetch latest release info")?;
            release::select_archive_url(&latest)
        }
    };
    log.info(&format!("Downloading from {url}"));
    download(&url, archive_path).context("failed to download RAUX release archive")?;
    Ok(())
}

/// Best-effort: a release without `.env.example` still installs.
fn copy_env_example(extract_dir: &Path, install_dir: &Path, log: &mut LogSink) {
    log.info("Looking for .env.example file...");
    let Some(found) = archive::find_file(extract_dir, paths::ENV_EXAMPLE_NAME) else {
        log.warn("Could not find .env.example in the extracted files");
        return;
    };
    log.info(&format!("Found .env.example at: {}", found.display()));

    let dest = paths::env_dest(install_dir);
    let copied = dest
        .parent()
        .map(fs::create_dir_all)
        .unwrap_or(Ok(()))
        .and_then(|()| fs::copy(&found, &dest).map(|_| ()));
    match copied {
        Ok(()) => log.info(&format!("Copied .env.example to {}", dest.display())),
        Err(err) => log.warn(&format!(
            "Failed to copy .env.example to {}: {err}",
            dest.display()
        )),
    }
}

fn run_install_script(
    request: &InstallRequest,
    install_script: &Path,
    log: &mut LogSink,
    exec: &mut impl FnMut(&mut Command) -> Result<Output>,
) -> Result<i32> {
    let python = paths::python_exe(&request.install_dir);
    let mut cmd = Command::new(&python);
    cmd.arg(install_script)
        .arg("--install-dir")
        .arg(&request.install_dir)
        .arg("--yes")
        .arg("--force")
        .stdin(Stdio::null());
    if request.debug {
        cmd.arg("--debug");
    }

    log.info(&format!("Running: {}", format_command(&cmd)));
    let output = exec(&mut cmd).context("failed to run installation script")?;

    if !output.stdout.is_empty() {
        log.info("Installation script output:");
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            log.info(&format!("  {line}"));
        }
    }
    if !output.stderr.is_empty() {
        log.warn("Installation script errors:");
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            log.warn(&format!("  {line}"));
        }
    }

    let exit_code = output.status.code().unwrap_or(1);
    log.info(&format!("Exit code from install.py: {exit_code}"));
    Ok(exit_code)
}

struct LauncherCopies {
    ps1_found: bool,
    cmd_found: bool,
}

/// Launchers come from the extracted tree, or failing that the work
/// directory. A launcher found but not copyable is an error; a launcher
/// absent everywhere is only a warning.
fn copy_launchers(
    extract_dir: &Path,
    work_dir: &Path,
    install_dir: &Path,
    log: &mut LogSink,
) -> Result<LauncherCopies> {
    log.info("Copying launcher scripts to the installation directory...");
    let ps1_found =
        copy_launcher(extract_dir, work_dir, install_dir, paths::LAUNCHER_PS1_NAME, log)?;
    let cmd_found =
        copy_launcher(extract_dir, work_dir, install_dir, paths::LAUNCHER_CMD_NAME, log)?;
    Ok(LauncherCopies { ps1_found, cmd_found })
}

fn copy_launcher(
    extract_dir: &Path,
    work_dir: &Path,
    install_dir: &Path,
    name: &str,
    log: &mut LogSink,
) -> Result<bool> {
    let source = archive::find_file(extract_dir, name).or_else(|| {
        let local = work_dir.join(name);
        local.exists().then_some(local)
    });
    let Some(source) = source else {
        log.warn(&format!("Could not find {name} in the extracted files"));
        return Ok(false);
    };

    log.info(&format!("Found {name} at: {}", source.display()));
    let dest = install_dir.join(name);
    fs::copy(&source, &dest).with_context(|| {
        format!("copy {} -> {}", source.display(), dest.display())
    })?;
    log.info(&format!("Copied {name} to {}", install_dir.display()));
    Ok(true)
}

fn exec_capture(cmd: &mut Command) -> Result<Output> {
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd.output()
        .with_context(|| format!("run {}", format_command(cmd)))
}

fn format_command(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args = cmd
        .get_args()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {args}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_log_path_defaults_to_install_dir() {
        let request = InstallRequest {
            install_dir: PathBuf::from(r"C:\Apps\RAUX"),
            debug: false,
            log_file: None,
            version: None,
            local_release: None,
        };
        assert_eq!(
            resolve_log_path(&request).unwrap(),
            PathBuf::from(r"C:\Apps\RAUX").join("raux_install.log")
        );
    }

    #[test]
    fn resolve_log_path_treats_empty_as_default() {
        let request = InstallRequest {
            install_dir: PathBuf::from(r"C:\Apps\RAUX"),
            debug: false,
            log_file: Some(PathBuf::new()),
            version: None,
            local_release: None,
        };
        assert_eq!(
            resolve_log_path(&request).unwrap(),
            PathBuf::from(r"C:\Apps\RAUX").join("raux_install.log")
        );
    }

    #[test]
    fn format_command_joins_program_and_args() {
        let mut cmd = Command::new("python");
        cmd.arg("install.py").arg("--yes");
        assert_eq!(format_command(&cmd), "python install.py --yes");
    }

    #[test]
    fn validate_install_dir_rejects_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("raux_install.log");
        let mut log = LogSink::open(&log_path, false).unwrap();

        let missing = tmp.path().join("not-there");
        let err = validate_install_dir(&missing, &mut log).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn validate_install_dir_accepts_writable_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("raux_install.log");
        let mut log = LogSink::open(&log_path, false).unwrap();

        validate_install_dir(tmp.path(), &mut log).unwrap();
        assert!(!tmp.path().join("write_test.txt").exists());
    }
}
