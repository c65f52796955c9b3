//! Chunked transfer of the payload that follows the length header.
//!
//! The loop pulls bounded chunks from a [`ChunkSource`], appends each one to the sink in the
//! order received, and emits a [`ProgressEvent`] per chunk. It ends on an empty chunk (end of
//! stream), on a transport fault (kept as a value, never escalated), or, when asked to, once
//! the declared length has arrived. Whatever was received stays in the sink.

use crate::error::{DumpError, Result};
use crate::logger::Logger;
use crate::meter::{self, Clock, SystemClock, ThroughputMeter};
use crate::protocol::DEFAULT_CHUNK_SIZE;
use crate::source::{ChunkRead, ChunkSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Knobs for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    /// Largest number of bytes requested per read.
    pub chunk_size: usize,
    /// Stop as soon as `bytes_read >= expected` instead of waiting for an empty chunk.
    pub stop_at_length: bool,
    /// Chunks averaged for the instantaneous rate.
    pub meter_window: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            stop_at_length: false,
            meter_window: meter::DEFAULT_WINDOW,
        }
    }
}

/// Snapshot emitted after every chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub bytes_read: u64,
    pub expected: u32,
    pub chunk_len: usize,
    pub chunks: u64,
    /// Percentage of `expected`, rounded to two decimals.
    pub percent: f64,
    pub elapsed: Duration,
    pub instant_kbps: Option<f64>,
    pub average_kbps: Option<f64>,
}

/// Receives progress events; rendering is up to the implementor.
pub trait ProgressObserver {
    fn on_progress(&mut self, event: &ProgressEvent);
}

impl<F: FnMut(&ProgressEvent)> ProgressObserver for F {
    fn on_progress(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// Observer that drops every event.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _event: &ProgressEvent) {}
}

/// Why the loop stopped.
#[derive(Debug)]
pub enum Termination {
    /// The header declared zero bytes; no read was attempted.
    NothingExpected,
    /// An empty chunk arrived.
    EndOfStream,
    /// The declared length arrived (only with `stop_at_length`).
    LengthReached,
    /// The transport failed mid-transfer.
    Fault(io::Error),
}

/// Terminal state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Completed,
    CompletedWithLoss,
    TerminatedByFault,
}

/// Received byte count differs from the declared length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataLoss {
    pub expected: u64,
    pub received: u64,
}

impl fmt::Display for DataLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.received < self.expected {
            write!(
                f,
                "data loss: received {} of {} bytes ({} missing)",
                self.received,
                self.expected,
                self.expected - self.received
            )
        } else {
            write!(
                f,
                "length mismatch: received {} bytes but header declared {} ({} extra)",
                self.received,
                self.expected,
                self.received - self.expected
            )
        }
    }
}

/// Outcome of a finished transfer.
#[derive(Debug)]
pub struct TransferReport {
    pub expected: u32,
    pub bytes_read: u64,
    /// Non-empty chunks received; the last known good position when a transfer stalls.
    pub chunks: u64,
    pub elapsed: Duration,
    pub termination: Termination,
}

impl TransferReport {
    pub fn status(&self) -> TransferStatus {
        match self.termination {
            Termination::Fault(_) => TransferStatus::TerminatedByFault,
            _ if self.data_loss().is_some() => TransferStatus::CompletedWithLoss,
            _ => TransferStatus::Completed,
        }
    }

    pub fn data_loss(&self) -> Option<DataLoss> {
        let expected = u64::from(self.expected);
        (self.bytes_read != expected).then_some(DataLoss {
            expected,
            received: self.bytes_read,
        })
    }

    pub fn percent(&self) -> f64 {
        percent(self.bytes_read, self.expected)
    }

    pub fn average_kbps(&self) -> Option<f64> {
        meter::kbps(self.bytes_read, self.elapsed)
    }

    pub fn fault(&self) -> Option<&io::Error> {
        match &self.termination {
            Termination::Fault(e) => Some(e),
            _ => None,
        }
    }
}

/// `bytes / expected * 100` rounded to two decimals; an empty transfer is complete.
pub fn percent(bytes: u64, expected: u32) -> f64 {
    if expected == 0 {
        return 100.0;
    }
    let raw = bytes as f64 / f64::from(expected) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Per-transfer mutable state; lives only inside [`TransferLoop::run`].
struct TransferState {
    bytes_read: u64,
    chunks: u64,
    start: Instant,
}

impl TransferState {
    fn new(start: Instant) -> Self {
        Self {
            bytes_read: 0,
            chunks: 0,
            start,
        }
    }

    fn advance(&mut self, len: usize) {
        self.bytes_read += len as u64;
        self.chunks += 1;
    }

    fn event(&self, expected: u32, chunk_len: usize, now: Instant, meter: &ThroughputMeter) -> ProgressEvent {
        let elapsed = now.saturating_duration_since(self.start);
        ProgressEvent {
            bytes_read: self.bytes_read,
            expected,
            chunk_len,
            chunks: self.chunks,
            percent: percent(self.bytes_read, expected),
            elapsed,
            instant_kbps: meter.instantaneous_kbps(),
            average_kbps: meter::kbps(self.bytes_read, elapsed),
        }
    }

    fn finish(self, expected: u32, now: Instant, termination: Termination) -> TransferReport {
        TransferReport {
            expected,
            bytes_read: self.bytes_read,
            chunks: self.chunks,
            elapsed: now.saturating_duration_since(self.start),
            termination,
        }
    }
}

/// Reads the header and the chunked payload that follows it.
pub struct TransferLoop<'a> {
    options: TransferOptions,
    clock: &'a dyn Clock,
    logger: &'a dyn Logger,
}

impl<'a> TransferLoop<'a> {
    pub fn new(options: TransferOptions, logger: &'a dyn Logger) -> Self {
        Self {
            options,
            clock: &SystemClock,
            logger,
        }
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Transfer `expected` bytes from `source` into `sink`.
    ///
    /// Transport faults end the transfer and are returned inside the report. Only sink
    /// failures are errors; the sink is flushed on every exit path.
    pub fn run<S, W>(
        &self,
        source: &mut S,
        sink: &mut W,
        expected: u32,
        progress: &mut dyn ProgressObserver,
    ) -> Result<TransferReport>
    where
        S: ChunkSource + ?Sized,
        W: Write + ?Sized,
    {
        let start = self.clock.now();
        let mut state = TransferState::new(start);

        if expected == 0 {
            flush(sink, 0)?;
            let report = state.finish(expected, self.clock.now(), Termination::NothingExpected);
            self.logger.done(&report);
            return Ok(report);
        }

        let mut meter = ThroughputMeter::new(start, self.options.meter_window);
        let mut buf = vec![0u8; self.options.chunk_size.max(1)];

        let termination = loop {
            if self.options.stop_at_length && state.bytes_read >= u64::from(expected) {
                break Termination::LengthReached;
            }
            match source.read_chunk(&mut buf) {
                ChunkRead::Data(n) => {
                    if let Err(e) = sink.write_all(&buf[..n]) {
                        self.logger.error("write", &e.to_string());
                        if let Err(flush_err) = sink.flush() {
                            self.logger.error("flush", &flush_err.to_string());
                        }
                        return Err(DumpError::Sink {
                            written: state.bytes_read,
                            source: e,
                        });
                    }
                    state.advance(n);
                    let now = self.clock.now();
                    meter.record(n as u64, now);
                    self.logger.chunk(n, state.bytes_read);
                    progress.on_progress(&state.event(expected, n, now, &meter));
                }
                ChunkRead::Timeout => break Termination::EndOfStream,
                ChunkRead::Fault(e) => {
                    self.logger.fault(state.bytes_read, state.chunks, &e.to_string());
                    break Termination::Fault(e);
                }
            }
        };

        flush(sink, state.bytes_read)?;
        let report = state.finish(expected, self.clock.now(), termination);
        self.logger.done(&report);
        Ok(report)
    }
}

fn flush<W: Write + ?Sized>(sink: &mut W, written: u64) -> Result<()> {
    sink.flush()
        .map_err(|source| DumpError::Sink { written, source })
}
