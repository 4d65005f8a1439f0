use anyhow::{Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const LOG_TAG: &str = "RAUX-Installer";
const RECREATED_HEADER: &str = "=== RAUX Installer Log (Recreated) ===";
const EMPTY_HEADER: &str = "=== RAUX Installer Log ===";

/// Append-only log sink. Never truncates an existing log, timestamps every
/// line, and echoes each line to stdout. The handle can be dropped and
/// re-acquired mid-run with [`LogSink::reopen`] so a child process can write
/// to the same file without lock contention.
pub struct LogSink {
    path: PathBuf,
    file: Option<File>,
    resumed: bool,
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
        let resumed = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        let file = open_append(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            resumed,
            debug,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the log already had content before this run.
    pub fn resumed(&self) -> bool {
        self.resumed
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

    /// Drops the current handle and re-acquires it in append mode. If the
    /// file vanished underneath us it is recreated with a header; if it
    /// exists but is empty a header is written before continuing.
    pub fn reopen(&mut self) -> Result<()> {
        self.file = None;
        let header = match fs::metadata(&self.path) {
            Ok(meta) if meta.len() == 0 => Some(EMPTY_HEADER),
            Ok(_) => None,
            Err(_) => Some(RECREATED_HEADER),
        };
        let mut file = open_append(&self.path)?;
        if let Some(header) = header {
            writeln!(file, "{header}")
                .with_context(|| format!("write {}", self.path.display()))?;
        }
        self.file = Some(file);
        Ok(())
    }

    fn line(&mut self, msg: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let formatted = format!("[{timestamp}] [{LOG_TAG}] {msg}");
        println!("{formatted}");
        if let Some(file) = self.file.as_mut() {
            if let Err(err) = writeln!(file, "{formatted}") {
                eprintln!("warning: failed to write to log file: {err}");
            }
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))
}
