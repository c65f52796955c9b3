//! Shared CLI helpers and small reusable Clap fragments

use crate::config::PartialConfig;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Serial connection options
#[derive(Clone, Debug, Default, Parser)]
pub struct SerialOpts {
    /// Serial device path [default: /dev/ttyACM0]
    #[arg(short = 'd', long)]
    pub device: Option<String>,

    /// Baud rate [default: 115200]
    #[arg(short = 'b', long)]
    pub baud: Option<u32>,

    /// Per-read timeout in milliseconds [default: 1000]
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,
}

/// Transfer tuning options
#[derive(Clone, Debug, Default, Parser)]
pub struct TransferOpts {
    /// Chunk size in 512-byte blocks [default: 420]
    #[arg(long = "chunk-blocks")]
    pub chunk_blocks: Option<usize>,

    /// Replay a captured stream from this file instead of the serial device
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Stop once the declared length has arrived instead of waiting for the device to go quiet
    #[arg(long = "stop-at-length", action = ArgAction::SetTrue)]
    pub stop_at_length: bool,
}

impl SerialOpts {
    /// CLI layer of the configuration; flags that were not given stay unset
    pub fn to_partial(&self, transfer: &TransferOpts, output: Option<PathBuf>) -> PartialConfig {
        PartialConfig {
            device: self.device.clone(),
            baud: self.baud,
            timeout_ms: self.timeout_ms,
            chunk_blocks: transfer.chunk_blocks,
            output,
            input: transfer.input.clone(),
            stop_at_length: transfer.stop_at_length.then_some(true),
        }
    }
}
