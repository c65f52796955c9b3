pub mod fake;
#[cfg(unix)]
pub mod port;

pub use fake::{FakeSource, FakeStep};
#[cfg(unix)]
pub use port::SerialPort;

use std::time::Duration;

/// Connection settings for the serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub device: String,
    pub baud: u32,
    pub timeout: Duration,
}

/// Open the configured device as a chunk source.
#[cfg(unix)]
pub fn open(settings: &SerialSettings) -> crate::Result<Box<dyn crate::source::ChunkSource>> {
    Ok(Box::new(SerialPort::open(settings)?))
}

#[cfg(not(unix))]
pub fn open(settings: &SerialSettings) -> crate::Result<Box<dyn crate::source::ChunkSource>> {
    Err(crate::DumpError::Config(format!(
        "serial devices are only supported on unix targets (requested {}); use --input to replay a capture",
        settings.device
    )))
}
