//! EvaluationLog - JSON-lines record of every dispatched event
//!
//! One line per event with the outcome of each sink, for offline evaluation
//! of a run.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};
use contracts::{ContractError, FusedEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

/// Result of one sink attempt as written to the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum SinkOutcome {
    Ok,
    Failed(String),
}

impl SinkOutcome {
    pub fn from_result(result: &Result<(), ContractError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// One line of the evaluation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub dispatched_at: DateTime<FixedOffset>,
    pub event: FusedEvent,
    pub outcomes: BTreeMap<String, SinkOutcome>,
}

/// Append-only JSON-lines writer
pub struct EvaluationLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    records: u64,
}

impl EvaluationLog {
    /// Open `path` for appending, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        debug!(path = %path.display(), "Evaluation log opened");
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written since opening
    pub fn records(&self) -> u64 {
        self.records
    }

    #[instrument(name = "evaluation_log_record", skip_all, fields(path = %self.path.display()))]
    pub fn record(
        &mut self,
        event: &FusedEvent,
        outcomes: BTreeMap<String, SinkOutcome>,
    ) -> Result<(), ContractError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ContractError::Other("evaluation log closed".into()))?;

        let record = EvaluationRecord {
            dispatched_at: Local::now().fixed_offset(),
            event: event.clone(),
            outcomes,
        };
        serde_json::to_writer(&mut *writer, &record)
            .map_err(|e| ContractError::Io(std::io::Error::other(e)))?;
        writer.write_all(b"\n")?;

        self.records += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Flush and release the file; later calls are no-ops
    pub fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                error!(path = %self.path.display(), error = %e, "Evaluation log flush failed");
                ContractError::Io(e)
            })?;
            debug!(path = %self.path.display(), records = self.records, "Evaluation log closed");
        }
        Ok(())
    }
}

impl Drop for EvaluationLog {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
