//! Append-only session log.
//!
//! Every event is written as one line to the text log. Every event except the
//! timer's `end` is also written as one row to the CSV mirror, which lives next
//! to the text log with a `.csv` extension. A CSV file gets its header before
//! its first row. Existing lines are never rewritten.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use toolgate_core::config::LoggingConfig;
use tracing::{debug, trace};

use crate::error::StorageResult;
use crate::models::{CSV_HEADER, EventRecord, LoggedRow};

/// Text and CSV mirrors of the session log.
#[derive(Debug, Clone)]
pub struct EventLog {
    text_path: PathBuf,
    csv_path: PathBuf,
}

impl EventLog {
    /// Log at `text_path`, mirrored to the same path with a `.csv` extension.
    pub fn new(text_path: impl Into<PathBuf>) -> Self {
        let text_path = text_path.into();
        let csv_path = text_path.with_extension("csv");
        Self {
            text_path,
            csv_path,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            text_path: config.log_file_path.clone(),
            csv_path: config.csv_log_path(),
        }
    }

    pub fn text_path(&self) -> &Path {
        &self.text_path
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Create parent directories and give a new CSV file its header.
    ///
    /// Safe to call on every start; existing files are left as they are.
    pub fn initialize(&self) -> StorageResult<()> {
        for path in [&self.text_path, &self.csv_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }
        let file = open_append(&self.csv_path)?;
        write_header_if_empty(file)?;
        debug!(text = %self.text_path.display(), csv = %self.csv_path.display(), "Event log ready");
        Ok(())
    }

    /// Append one event to both mirrors.
    pub fn append(&self, record: &EventRecord) -> StorageResult<()> {
        let mut text = open_append(&self.text_path)?;
        writeln!(text, "{}", record.text_line())?;
        text.flush()?;

        if record.action.in_csv() {
            let file = open_append(&self.csv_path)?;
            let mut writer = write_header_if_empty(file)?;
            writer.write_record(record.csv_row())?;
            writer.flush()?;
        }

        trace!(action = %record.action, "Event appended");
        Ok(())
    }

    /// All rows of the CSV mirror, oldest first. A missing file has no rows.
    pub fn read_rows(&self) -> StorageResult<Vec<LoggedRow>> {
        if !self.csv_path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.csv_path)?;
        reader
            .deserialize()
            .collect::<Result<Vec<LoggedRow>, csv::Error>>()
            .map_err(Into::into)
    }

    /// All lines of the text mirror, oldest first. A missing file has no lines.
    pub fn read_text_lines(&self) -> StorageResult<Vec<String>> {
        match fs::read_to_string(&self.text_path) {
            Ok(text) => Ok(text.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn write_header_if_empty(file: File) -> StorageResult<csv::Writer<File>> {
    let empty = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if empty {
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;
    }
    Ok(writer)
}
