//! serialdump library
//!
//! Receives a length-prefixed raw image (typically an SD card dump) from a serial-attached
//! device and writes it to a file, reporting progress and throughput as it goes.

pub mod cli;
pub mod config;
pub mod error;
pub mod log;
pub mod logger;
pub mod meter;
pub mod progress;
pub mod protocol;
pub mod protocol_core;
pub mod serial;
pub mod source;
pub mod transfer;

pub use error::{DumpError, Result};
