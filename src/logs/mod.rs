use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::ui::{Marker, report_line};

/// `output_YYYY-MM-DD_HH-MM-SS.txt`
pub fn output_file_name(at: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    let stamp = at
        .format(&fmt)
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("output_{stamp}.txt")
}

pub fn output_path(dir: &Path, at: OffsetDateTime) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))
        .map_err(crate::exit::output_err)?;
    Ok(dir.join(output_file_name(at)))
}

/// Append-only report file mirrored line by line to a console writer.
///
/// The file is reopened for every line so that everything emitted before a
/// fatal error is already on disk.
pub struct ReportSink {
    path: PathBuf,
    console: Option<Box<dyn Write>>,
}

impl ReportSink {
    /// Truncates `path` and writes its file name as the header line.
    pub fn create(path: &Path, console: Option<Box<dyn Write>>) -> Result<Self> {
        let header = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        std::fs::write(path, format!("{header}\n"))
            .with_context(|| format!("failed to create report file: {}", path.display()))
            .map_err(crate::exit::output_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            console,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, line: &str) -> Result<()> {
        self.write_line(line).map_err(crate::exit::output_err)
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open report file: {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to report file: {}", self.path.display()))?;

        if let Some(console) = self.console.as_mut() {
            match writeln!(console, "{line}") {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => self.console = None,
                Err(err) => return Err(err).context("failed to write to console"),
            }
        }
        Ok(())
    }

    pub fn emit(&mut self, marker: Marker, message: &str) -> Result<()> {
        self.line(&report_line(marker, message))
    }

    pub fn info(&mut self, message: &str) -> Result<()> {
        self.emit(Marker::Info, message)
    }

    pub fn warn(&mut self, message: &str) -> Result<()> {
        self.emit(Marker::Warn, message)
    }

    pub fn lines(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            self.line(line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn temp_dir(prefix: &str) -> PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};

    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("{prefix}-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}
