use crate::transfer::TransferReport;
use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn start(&self, _source: &str, _output: &Path) {}
    fn header(&self, _expected: u32) {}
    fn chunk(&self, _len: usize, _total: u64) {}
    fn fault(&self, _bytes: u64, _chunks: u64, _msg: &str) {}
    fn error(&self, _context: &str, _msg: &str) {}
    fn done(&self, _report: &TransferReport) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn start(&self, source: &str, output: &Path) {
        self.line(&format!("START source={} output={}", source, output.display()));
    }
    fn header(&self, expected: u32) {
        self.line(&format!("HEADER expected={expected}"));
    }
    fn chunk(&self, len: usize, total: u64) {
        self.line(&format!("CHUNK bytes={len} total={total}"));
    }
    fn fault(&self, bytes: u64, chunks: u64, msg: &str) {
        self.line(&format!("FAULT bytes={bytes} good_chunks={chunks} msg={msg}"));
    }
    fn error(&self, context: &str, msg: &str) {
        self.line(&format!("ERROR ctx={context} msg={msg}"));
    }
    fn done(&self, report: &TransferReport) {
        self.line(&format!(
            "DONE status={:?} bytes={} expected={} chunks={} seconds={:.3}",
            report.status(),
            report.bytes_read,
            report.expected,
            report.chunks,
            report.elapsed.as_secs_f64()
        ));
        if let Some(loss) = report.data_loss() {
            self.line(&format!("WARN {loss}"));
        }
    }
}
