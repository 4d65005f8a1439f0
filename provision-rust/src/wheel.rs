use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, io, path::Path, time::Duration};

pub const LATEST_RELEASE_API: &str =
    "https://api.github.com/repos/aigdat/raux/releases/latest";

const USER_AGENT: &str = "raux-installer";
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

/// First asset carrying the wheel suffix. The provisioning stage always
/// installs from the latest release; there is no explicit-version selection
/// here.
pub fn select_wheel_asset(release: &Release) -> Option<&Asset> {
    release.assets.iter().find(|asset| asset.name.ends_with(".whl"))
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

/// Wheel downloads bound the connect phase and per-read stalls rather than
/// total transfer time, so a slow link does not abort a progressing install.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_wheel_asset_picks_first_whl() {
        let release = parse_release(
            r#"{
                "assets": [
                    {"name": "raux-1.0.0-setup.zip",
                     "browser_download_url": "https://example.com/setup.zip"},
                    {"name": "raux-1.0.0-py3-none-any.whl",
                     "browser_download_url": "https://example.com/first.whl"},
                    {"name": "raux-extra-py3-none-any.whl",
                     "browser_download_url": "https://example.com/second.whl"}
                ]
            }"#,
        )
        .unwrap();

        let asset = select_wheel_asset(&release).unwrap();
        assert_eq!(asset.name, "raux-1.0.0-py3-none-any.whl");
        assert_eq!(asset.browser_download_url, "https://example.com/first.whl");
    }

    #[test]
    fn select_wheel_asset_none_without_whl() {
        let release = parse_release(r#"{"assets": [{"name": "raux.zip", "browser_download_url": "u"}]}"#)
            .unwrap();
        assert!(select_wheel_asset(&release).is_none());

        let empty = parse_release("{}").unwrap();
        assert!(select_wheel_asset(&empty).is_none());
    }

    /// One-shot HTTP server that writes the body in paced chunks so the
    /// transfer as a whole outlives any single read.
    fn serve_paced_body(chunks: usize, gap: Duration) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 512];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                chunks * 5
            )
            .unwrap();
            stream.flush().unwrap();
            for _ in 0..chunks {
                stream.write_all(b"wheel").unwrap();
                stream.flush().unwrap();
                std::thread::sleep(gap);
            }
        });
        format!("http://{addr}/raux.whl")
    }

    #[test]
    fn download_survives_slow_wheel_transfers() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("raux.whl");

        // ~600ms total, but no read gap comes near the 400ms read timeout.
        let url = serve_paced_body(4, Duration::from_millis(150));
        download_with_timeouts(
            &url,
            &dest,
            Duration::from_secs(5),
            Duration::from_millis(400),
        )
        .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"wheelwheelwheelwheel");
    }
}
