//! Run configuration: CLI flags over an optional TOML file over built-in defaults.

use crate::error::{DumpError, Result};
use crate::protocol::{chunk_size_for_blocks, defaults, timeouts, DEFAULT_CHUNK_BLOCKS, MAX_CHUNK_BLOCKS};
use crate::serial::{self, SerialSettings};
use crate::source::{ChunkSource, ReadSource};
use crate::transfer::TransferOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One layer of settings; unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    pub device: Option<String>,
    pub baud: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub chunk_blocks: Option<usize>,
    pub output: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub stop_at_length: Option<bool>,
}

impl PartialConfig {
    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        toml::from_str(&data)
            .map_err(|e| DumpError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Fill unset fields of `self` from `lower`.
    pub fn or(self, lower: PartialConfig) -> PartialConfig {
        PartialConfig {
            device: self.device.or(lower.device),
            baud: self.baud.or(lower.baud),
            timeout_ms: self.timeout_ms.or(lower.timeout_ms),
            chunk_blocks: self.chunk_blocks.or(lower.chunk_blocks),
            output: self.output.or(lower.output),
            input: self.input.or(lower.input),
            stop_at_length: self.stop_at_length.or(lower.stop_at_length),
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpConfig {
    pub device: String,
    pub baud: u32,
    pub timeout: Duration,
    pub chunk_blocks: usize,
    pub output: PathBuf,
    /// Replay a captured stream instead of opening the device.
    pub input: Option<PathBuf>,
    pub stop_at_length: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            device: defaults::DEVICE.to_string(),
            baud: defaults::BAUD,
            timeout: Duration::from_millis(timeouts::READ_MS),
            chunk_blocks: DEFAULT_CHUNK_BLOCKS,
            output: PathBuf::from(defaults::OUTPUT),
            input: None,
            stop_at_length: false,
        }
    }
}

impl DumpConfig {
    /// Merge CLI values over file values over defaults, then validate.
    pub fn from_sources(file: PartialConfig, cli: PartialConfig) -> Result<Self> {
        let merged = cli.or(file);
        let base = DumpConfig::default();

        let baud = merged.baud.unwrap_or(base.baud);
        if baud == 0 {
            return Err(DumpError::Config("baud must be greater than zero".into()));
        }
        let timeout_ms = merged.timeout_ms.unwrap_or(timeouts::READ_MS);
        if timeout_ms == 0 {
            return Err(DumpError::Config("timeout_ms must be greater than zero".into()));
        }
        let chunk_blocks = merged.chunk_blocks.unwrap_or(base.chunk_blocks);
        if chunk_blocks == 0 {
            return Err(DumpError::Config("chunk_blocks must be at least 1".into()));
        }
        if chunk_blocks > MAX_CHUNK_BLOCKS {
            return Err(DumpError::Config(format!(
                "chunk_blocks must be at most {MAX_CHUNK_BLOCKS}, got {chunk_blocks}"
            )));
        }

        Ok(DumpConfig {
            device: merged.device.unwrap_or(base.device),
            baud,
            timeout: Duration::from_millis(timeout_ms),
            chunk_blocks,
            output: merged.output.unwrap_or(base.output),
            input: merged.input,
            stop_at_length: merged.stop_at_length.unwrap_or(base.stop_at_length),
        })
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            device: self.device.clone(),
            baud: self.baud,
            timeout: self.timeout,
        }
    }

    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            chunk_size: chunk_size_for_blocks(self.chunk_blocks),
            stop_at_length: self.stop_at_length,
            ..TransferOptions::default()
        }
    }

    /// Open the replay file if one is configured, otherwise the serial device.
    pub fn open_source(&self) -> Result<Box<dyn ChunkSource>> {
        match &self.input {
            Some(path) => {
                let file = std::fs::File::open(path)?;
                Ok(Box::new(ReadSource::new(file, path.display().to_string())))
            }
            None => serial::open(&self.serial_settings()),
        }
    }

    /// Where the bytes come from, for logs and summaries.
    pub fn source_name(&self) -> String {
        match &self.input {
            Some(path) => path.display().to_string(),
            None => self.device.clone(),
        }
    }
}
