use crate::transfer::{TransferReport, TransferStatus};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    CompletedWithLoss,
    TerminatedByFault,
    Failed,
}

impl From<TransferStatus> for RunStatus {
    fn from(status: TransferStatus) -> Self {
        match status {
            TransferStatus::Completed => RunStatus::Completed,
            TransferStatus::CompletedWithLoss => RunStatus::CompletedWithLoss,
            TransferStatus::TerminatedByFault => RunStatus::TerminatedByFault,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TransferLogEntry {
    pub timestamp: String,
    pub run_id: String,
    pub source: String,
    pub output: PathBuf,
    pub status: RunStatus,
    pub expected_bytes: Option<u32>,
    pub bytes_transferred: u64,
    pub chunks: u64,
    pub elapsed_secs: f64,
    pub error: Option<String>,
}

impl TransferLogEntry {
    /// Entry for a transfer that produced a report.
    pub fn from_report(run_id: &str, source: &str, output: &Path, report: &TransferReport) -> Self {
        TransferLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id: run_id.to_string(),
            source: source.to_string(),
            output: output.to_path_buf(),
            status: report.status().into(),
            expected_bytes: Some(report.expected),
            bytes_transferred: report.bytes_read,
            chunks: report.chunks,
            elapsed_secs: report.elapsed.as_secs_f64(),
            error: report
                .fault()
                .map(|e| e.to_string())
                .or_else(|| report.data_loss().map(|l| l.to_string())),
        }
    }

    /// Entry for a run that aborted before producing a report.
    pub fn failed(run_id: &str, source: &str, output: &Path, error: &str) -> Self {
        TransferLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id: run_id.to_string(),
            source: source.to_string(),
            output: output.to_path_buf(),
            status: RunStatus::Failed,
            expected_bytes: None,
            bytes_transferred: 0,
            chunks: 0,
            elapsed_secs: 0.0,
            error: Some(error.to_string()),
        }
    }
}

pub struct TransferLog {
    log_file_path: PathBuf,
}

impl TransferLog {
    pub fn new(path: &Path) -> Self {
        TransferLog {
            log_file_path: path.to_path_buf(),
        }
    }

    pub fn add_entry(&self, entry: &TransferLogEntry) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .context("Failed to open transfer log file")?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_log(&self) -> Result<Vec<TransferLogEntry>> {
        if !self.log_file_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_file_path)
            .context("Failed to open transfer log file for reading")?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: TransferLogEntry = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::Termination;
    use std::time::Duration;

    #[test]
    fn journal_appends_one_entry_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransferLog::new(&dir.path().join("dumps.jsonl"));
        assert!(log.read_log().unwrap().is_empty());

        let report = TransferReport {
            expected: 4096,
            bytes_read: 1024,
            chunks: 2,
            elapsed: Duration::from_millis(1500),
            termination: Termination::EndOfStream,
        };
        let out = Path::new("sdcard.img");
        log.add_entry(&TransferLogEntry::from_report("run-1", "/dev/ttyACM0", out, &report))
            .unwrap();
        log.add_entry(&TransferLogEntry::failed("run-2", "/dev/ttyACM0", out, "header truncated"))
            .unwrap();

        let entries = log.read_log().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, RunStatus::CompletedWithLoss);
        assert_eq!(entries[0].expected_bytes, Some(4096));
        assert_eq!(entries[0].bytes_transferred, 1024);
        assert!(entries[0].error.as_deref().unwrap().contains("3072 missing"));
        assert_eq!(entries[1].status, RunStatus::Failed);
        assert_eq!(entries[1].run_id, "run-2");
    }
}
