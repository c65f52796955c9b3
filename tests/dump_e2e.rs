use anyhow::Result;
use serialdump::config::{DumpConfig, PartialConfig};
use serialdump::log::{RunStatus, TransferLog, TransferLogEntry};
use serialdump::logger::{Logger, NoopLogger, TextLogger};
use serialdump::protocol_core::{build_length_header, read_header};
use serialdump::serial::{FakeSource, FakeStep};
use serialdump::source::{ChunkSource, ReadSource};
use serialdump::transfer::{
    NoProgress, ProgressEvent, ProgressObserver, TransferLoop, TransferOptions, TransferReport,
    TransferStatus,
};
use serialdump::DumpError;
use std::io::{self, Read, Write};

fn write_capture(path: &std::path::Path, declared: u32, size: usize) -> Result<Vec<u8>> {
    let mut f = std::fs::File::create(path)?;
    f.write_all(&build_length_header(declared))?;
    let mut payload = Vec::with_capacity(size);
    let mut val: u8 = 0;
    for _ in 0..size {
        payload.push(val);
        val = val.wrapping_add(1);
    }
    f.write_all(&payload)?;
    Ok(payload)
}

/// Header, then payload: the same sequence the binary runs.
fn dump_stream<S: ChunkSource + ?Sized, W: Write>(
    options: TransferOptions,
    logger: &dyn Logger,
    source: &mut S,
    sink: &mut W,
    progress: &mut dyn ProgressObserver,
) -> serialdump::Result<TransferReport> {
    let expected = read_header(source)?;
    logger.header(expected);
    TransferLoop::new(options, logger).run(source, sink, expected, progress)
}

#[test]
fn replay_capture_into_image_file() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let capture = tmp.path().join("capture.bin");
    let image = tmp.path().join("sdcard.img");
    let payload = write_capture(&capture, 300_000, 300_000)?;

    let cli = PartialConfig {
        input: Some(capture.clone()),
        output: Some(image.clone()),
        ..PartialConfig::default()
    };
    let config = DumpConfig::from_sources(PartialConfig::default(), cli)?;
    let mut source = config.open_source()?;
    let mut out = std::fs::File::create(&config.output)?;

    let log_path = tmp.path().join("run.log");
    let logger = TextLogger::new(&log_path)?;
    let mut events: Vec<ProgressEvent> = Vec::new();
    let mut observer = |e: &ProgressEvent| events.push(e.clone());
    let report = dump_stream(
        config.transfer_options(),
        &logger,
        &mut source,
        &mut out,
        &mut observer,
    )?;
    drop(out);

    assert_eq!(report.status(), TransferStatus::Completed);
    assert_eq!(std::fs::read(&image)?, payload);
    // 300,000 bytes in 215,040-byte chunks
    let lens: Vec<usize> = events.iter().map(|e| e.chunk_len).collect();
    assert_eq!(lens, vec![215_040, 84_960]);
    assert_eq!(events.last().map(|e| e.percent), Some(100.0));

    let log = std::fs::read_to_string(&log_path)?;
    assert!(log.contains("HEADER expected=300000"));
    assert!(log.contains("DONE status=Completed"));
    Ok(())
}

#[test]
fn short_capture_keeps_partial_image_and_records_loss() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let capture = tmp.path().join("capture.bin");
    let image = tmp.path().join("partial.img");
    let payload = write_capture(&capture, 10_000, 4_000)?;

    let mut source = ReadSource::new(std::fs::File::open(&capture)?, "capture");
    let mut out = std::fs::File::create(&image)?;
    let report = dump_stream(
        TransferOptions::default(),
        &NoopLogger,
        &mut source,
        &mut out,
        &mut NoProgress,
    )?;
    drop(out);

    assert_eq!(report.status(), TransferStatus::CompletedWithLoss);
    assert_eq!(std::fs::read(&image)?, payload);

    let journal = TransferLog::new(&tmp.path().join("runs.jsonl"));
    journal.add_entry(&TransferLogEntry::from_report("r1", "capture", &image, &report))?;
    let entries = journal.read_log()?;
    assert_eq!(entries[0].status, RunStatus::CompletedWithLoss);
    assert_eq!(entries[0].bytes_transferred, 4_000);
    Ok(())
}

/// Streams its data, then reports the device as gone.
struct UnpluggedDevice {
    data: io::Cursor<Vec<u8>>,
}

impl Read for UnpluggedDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected")),
            n => Ok(n),
        }
    }
}

#[test]
fn disconnect_mid_transfer_keeps_received_bytes() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let image = tmp.path().join("sdcard.img");

    let mut stream = build_length_header(5000).to_vec();
    stream.extend(std::iter::repeat(0xab).take(1000));
    let mut source = ReadSource::new(
        UnpluggedDevice {
            data: io::Cursor::new(stream),
        },
        "unplugged",
    );
    let mut out = std::fs::File::create(&image)?;
    let report = dump_stream(
        TransferOptions::default(),
        &NoopLogger,
        &mut source,
        &mut out,
        &mut NoProgress,
    )?;
    drop(out);

    assert_eq!(report.status(), TransferStatus::TerminatedByFault);
    assert_eq!(report.bytes_read, 1000);
    let loss = report.data_loss().expect("loss expected");
    assert_eq!((loss.expected, loss.received), (5000, 1000));
    assert_eq!(std::fs::read(&image)?, vec![0xab; 1000]);
    Ok(())
}

#[test]
fn truncated_header_writes_nothing() {
    let mut source = FakeSource::new(vec![FakeStep::Data(vec![0x10, 0x00])]);
    let mut sink = Vec::new();
    let err = dump_stream(
        TransferOptions::default(),
        &NoopLogger,
        &mut source,
        &mut sink,
        &mut NoProgress,
    )
    .unwrap_err();
    assert!(matches!(err, DumpError::Framing { got: 2, .. }));
    assert!(sink.is_empty());
}

#[test]
fn zero_length_header_never_reads_payload() {
    let mut source = FakeSource::with_header(0, vec![FakeStep::pattern(64, 0)]);
    let mut sink = Vec::new();
    let report = dump_stream(
        TransferOptions::default(),
        &NoopLogger,
        &mut source,
        &mut sink,
        &mut NoProgress,
    )
    .unwrap();
    assert_eq!(report.status(), TransferStatus::Completed);
    assert_eq!(source.reads(), 1);
    assert!(!source.is_exhausted());
    assert!(sink.is_empty());
}
