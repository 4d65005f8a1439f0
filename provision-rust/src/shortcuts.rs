use anyhow::{bail, Context, Result};
use std::{
    path::{Path, PathBuf},
    process::Command,
};

pub fn desktop_dir() -> Result<PathBuf> {
    let profile = std::env::var("USERPROFILE").context("USERPROFILE not set")?;
    Ok(PathBuf::from(profile).join("Desktop"))
}

pub fn shortcut_path(desktop_dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() {
        bail!("shortcut name is empty");
    }
    Ok(desktop_dir.join(format!("{name}.lnk")))
}

/// Writes a `.lnk` via the WScript.Shell COM object through PowerShell.
pub fn create_desktop_shortcut(
    desktop_dir: &Path,
    name: &str,
    target: &Path,
    working_dir: &Path,
    icon: Option<&Path>,
) -> Result<PathBuf> {
    let lnk_path = shortcut_path(desktop_dir, name)?;
    std::fs::create_dir_all(desktop_dir)
        .with_context(|| format!("create {}", desktop_dir.display()))?;

    let lnk = ps_quote(&lnk_path.display().to_string());
    let tgt = ps_quote(&target.display().to_string());
    let wd = ps_quote(&working_dir.display().to_string());
    let icon = icon.map(|p| ps_quote(&p.display().to_string()));

    let mut script = format!(
        "$WshShell = New-Object -ComObject WScript.Shell; \
         $Shortcut = $WshShell.CreateShortcut({lnk}); \
         $Shortcut.TargetPath = {tgt}; \
         $Shortcut.WorkingDirectory = {wd}; "
    );
    if let Some(icon_path) = icon {
        script.push_str(&format!("$Shortcut.IconLocation = {icon_path}; "));
    }
    script.push_str("$Shortcut.Save();");

    let mut cmd = Command::new("powershell");
    cmd.arg("-NoProfile").arg("-Command").arg(script);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    let status = cmd.status().context("run powershell")?;

    if !status.success() {
        bail!("failed to create shortcut (exit {:?})", status.code());
    }

    Ok(lnk_path)
}

fn ps_quote(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    format!("'{}'", escaped)
}
