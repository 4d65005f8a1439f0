use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, io, path::Path, time::Duration};

pub const LATEST_RELEASE_API: &str =
    "https://api.github.com/repos/aigdat/raux/releases/latest";
pub const FALLBACK_ARCHIVE_URL: &str =
    "https://github.com/aigdat/raux/archive/refs/heads/main.zip";
const RELEASE_DOWNLOAD_BASE: &str = "https://github.com/aigdat/raux/releases/download";

const USER_AGENT: &str = "raux-installer";
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub zipball_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

/// Archive selection priority: Windows-tagged zip asset, then any zip
/// asset, then the source zipball, then the fixed branch archive.
pub fn select_archive_url(release: &Release) -> String {
    for asset in &release.assets {
        let name = asset.name.to_lowercase();
        if name.ends_with(".zip") && name.contains("win") {
            return asset.browser_download_url.clone();
        }
    }
    for asset in &release.assets {
        if asset.name.to_lowercase().ends_with(".zip") {
            return asset.browser_download_url.clone();
        }
    }
    if let Some(url) = &release.zipball_url {
        return url.clone();
    }
    FALLBACK_ARCHIVE_URL.to_string()
}

/// Deterministic download URL for an explicit version. The tag segment keeps
/// the version string verbatim; the filename segment drops a leading `v`.
pub fn versioned_url(version: &str) -> String {
    let file_version = version.strip_prefix('v').unwrap_or(version);
    format!("{RELEASE_DOWNLOAD_BASE}/{version}/raux-{file_version}-setup.zip")
}

pub fn parse_release(body: &str) -> Result<Release> {
    serde_json::from_str(body).context("parse release JSON")
}

pub fn fetch_latest() -> Result<Release> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(METADATA_TIMEOUT)
        .build()
        .context("build http client")?;
    let body = client
        .get(LATEST_RELEASE_API)
        .send()
        .with_context(|| format!("fetch {LATEST_RELEASE_API}"))?
        .error_for_status()
        .context("latest release request failed")?
        .text()
        .context("read release metadata body")?;
    parse_release(&body)
}

/// Archive downloads bound the connect phase and per-read stalls rather
/// than total transfer time, so a large release on a slow link can still
/// finish.
pub fn download_file(url: &str, dest: &Path) -> Result<()> {
    download_with_timeouts(url, dest, CONNECT_TIMEOUT, READ_TIMEOUT)
}

fn download_with_timeouts(
    url: &str,
    dest: &Path,
    connect: Duration,
    read: Duration,
) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(connect)
        .timeout(read)
        .build()
        .context("build http client")?;
    let mut resp = client
        .get(url)
        .send()
        .with_context(|| format!("fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("download request failed for {url}"))?;
    let mut file = fs::File::create(dest)
        .with_context(|| format!("create {}", dest.display()))?;
    io::copy(&mut resp, &mut file)
        .with_context(|| format!("write {}", dest.display()))?;
    Ok(())
}
