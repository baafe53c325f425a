//! Append-only JSONL failure log.
//!
//! Records prompts whose answer step failed. Drained (read then truncated)
//! once at the start of each run; entries that fail again are re-appended,
//! so each entry gets exactly one replay attempt per run.

use crate::models::{FailedPrompt, QagenError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all records, then truncate the file to empty.
    ///
    /// A missing file yields an empty set.
    pub fn drain(&self) -> Result<Vec<FailedPrompt>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(QagenError::io("opening failure log", e)),
        };

        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| QagenError::io("reading failure log", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: FailedPrompt = serde_json::from_str(&line).map_err(|e| {
                QagenError::ParseError(format!("Failure log line {}: {}", line_num + 1, e))
            })?;
            records.push(record);
        }

        // Truncate so a crash mid-run cannot replay the same entries twice.
        File::create(&self.path).map_err(|e| QagenError::io("truncating failure log", e))?;

        if !records.is_empty() {
            info!(count = records.len(), "Drained failure log for replay");
        }
        Ok(records)
    }

    /// Append records for replay on the next run.
    pub fn append(&self, records: &[FailedPrompt]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| QagenError::io("creating failure log dir", e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| QagenError::io("opening failure log for append", e))?;
        let mut writer = BufWriter::new(file);

        for record in records {
            let json = serde_json::to_string(record)
                .map_err(|e| QagenError::Internal(format!("Serializing failed prompt: {e}")))?;
            writeln!(writer, "{json}").map_err(|e| QagenError::io("writing failure log", e))?;
        }

        writer
            .flush()
            .map_err(|e| QagenError::io("flushing failure log", e))?;

        debug!(count = records.len(), "Logged failed prompts");
        Ok(())
    }
}
