//! Tabular experiment report (CSV)

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::run::{PipelineRun, ReportRow};

/// How an existing report file is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Truncate and write a fresh header
    Create,
    /// Append rows; a header is written only into a missing or empty file
    Append,
}

/// Incremental CSV writer, one row per completed run
///
/// Every row is flushed as it is written so a crash mid-sweep keeps the
/// rows finished so far.
pub struct ReportWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows_written: usize,
}

impl ReportWriter {
    pub fn open(path: impl AsRef<Path>, mode: ReportMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let (file, needs_header) = match mode {
            ReportMode::Create => (File::create(&path)?, true),
            ReportMode::Append => {
                let empty = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                (file, empty)
            }
        };

        tracing::debug!("Writing report to {} ({:?})", path.display(), mode);

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(ReportRow::COLUMNS)?;
            writer.flush()?;
        }

        Ok(Self {
            writer,
            path,
            rows_written: 0,
        })
    }

    /// Append one run
    pub fn write(&mut self, run: &PipelineRun) -> Result<()> {
        self.writer.serialize(run.to_row())?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a report back
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<ReportRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
