use anyhow::{Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::Path,
};

const LOG_TAG: &str = "RAUX-Installer";

/// Append-only log sink for the provisioning stage. Opened once and passed
/// by reference; never truncates an existing log.
pub struct LogSink {
    file: File,
    debug: bool,
}

impl LogSink {
    pub fn open(path: &Path, debug: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open {}", path.display()))?;
        Ok(Self { file, debug })
    }

    pub fn info(&mut self, msg: &str) {
        self.line(msg);
    }

    pub fn warn(&mut self, msg: &str) {
        self.line(&format!("WARNING: {msg}"));
    }

    pub fn error(&mut self, msg: &str) {
        self.line(&format!("ERROR: {msg}"));
    }

    pub fn debug(&mut self, msg: &str) {
        if self.debug {
            self.line(msg);
        }
    }

    fn line(&mut self, msg: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let formatted = format!("[{timestamp}] [{LOG_TAG}] {msg}");
        println!("{formatted}");
        if let Err(err) = writeln!(self.file, "{formatted}") {
            eprintln!("warning: failed to write to log file: {err}");
        }
    }
}
