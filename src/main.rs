//! serialdump - pull a length-prefixed raw image off a serial-attached device
//!
//! Wire format: 4-byte little-endian length, then the raw payload.
//! - One length header, then bounded chunk reads until the device goes quiet or drops
//! - Every chunk goes straight to the output file in arrival order
//! - Short or faulted transfers keep their partial output and warn

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{cursor, ExecutableCommand};
use serialdump::cli::{SerialOpts, TransferOpts};
use serialdump::config::{DumpConfig, PartialConfig};
use serialdump::log::{TransferLog, TransferLogEntry};
use serialdump::logger::{Logger, NoopLogger, TextLogger};
use serialdump::progress::{ConsoleProgress, PlainProgress};
use serialdump::protocol_core::read_header;
use serialdump::transfer::{TransferLoop, TransferReport};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

/// Exit status when `--fail-on-loss` is set and the byte count is off
const EXIT_DATA_LOSS: i32 = 3;

/// 128 + SIGINT
const EXIT_INTERRUPTED: i32 = 130;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "serialdump - dump a length-prefixed raw image (e.g. an SD card) from a serial device to a file"
)]
struct Args {
    /// Output image file, truncated on every run [default: sdcard.img]
    output: Option<PathBuf>,

    #[command(flatten)]
    serial: SerialOpts,

    #[command(flatten)]
    transfer: TransferOpts,

    /// TOML configuration file (CLI flags take precedence)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a line for every chunk received
    #[arg(short, long)]
    verbose: bool,

    /// Plain status lines instead of a progress bar
    #[arg(long)]
    plain: bool,

    /// Exit with status 3 when fewer (or more) bytes arrive than the header declared
    #[arg(long = "fail-on-loss")]
    fail_on_loss: bool,

    /// Write a timestamped text log of the run
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Append a JSONL record of the run to this file
    #[arg(long)]
    record: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let file_cfg = match &args.config {
        Some(p) => PartialConfig::load(p)
            .with_context(|| format!("failed to load config {}", p.display()))?,
        None => PartialConfig::default(),
    };
    let cli_cfg = args.serial.to_partial(&args.transfer, args.output.clone());
    let config = DumpConfig::from_sources(file_cfg, cli_cfg)?;

    // Choose logger once; zero overhead in hot paths with NoopLogger
    let logger: Arc<dyn Logger> = match args.log_file {
        Some(ref p) => match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(e) => {
                eprintln!("warning: cannot open log file {}: {e}", p.display());
                Arc::new(NoopLogger)
            }
        },
        None => Arc::new(NoopLogger),
    };
    let journal = args.record.as_deref().map(TransferLog::new);
    let run_id = uuid::Uuid::new_v4().to_string();
    let source_name = config.source_name();

    // Set up Ctrl-C handler
    {
        let record = args.record.clone();
        let run_id = run_id.clone();
        let source_name = source_name.clone();
        let output = config.output.clone();
        ctrlc::set_handler(move || {
            // The progress bar hides the cursor; process::exit skips its Drop
            let _ = std::io::stdout().execute(cursor::Show);
            eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
            if let Some(path) = &record {
                let entry = TransferLogEntry::failed(&run_id, &source_name, &output, "interrupted");
                let _ = TransferLog::new(path).add_entry(&entry);
            }
            // Chunks already written are in the file; exit with 130 (128 + SIGINT)
            std::process::exit(EXIT_INTERRUPTED);
        })
        .context("Error setting Ctrl-C handler")?;
    }

    if args.verbose {
        println!("serialdump {}", env!("CARGO_PKG_VERSION"));
        println!("Source: {}", source_name);
        if config.input.is_none() {
            println!("Baud: {}  Timeout: {:?}", config.baud, config.timeout);
        }
        println!("Output: {}", config.output.display());
        println!("Chunk: {} bytes", config.transfer_options().chunk_size);
    }
    logger.start(&source_name, &config.output);

    let fail = |msg: String| {
        logger.error("run", &msg);
        if let Some(j) = &journal {
            let entry = TransferLogEntry::failed(&run_id, &source_name, &config.output, &msg);
            if let Err(e) = j.add_entry(&entry) {
                eprintln!("warning: failed to write transfer record: {e:#}");
            }
        }
    };

    let mut source = match config.open_source() {
        Ok(s) => s,
        Err(e) => {
            fail(e.to_string());
            return Err(e).with_context(|| format!("failed to open {}", source_name));
        }
    };

    // Header first: a truncated header aborts before the output file is touched
    let expected = match read_header(&mut source) {
        Ok(n) => n,
        Err(e) => {
            fail(e.to_string());
            return Err(e).context("no usable length header");
        }
    };
    logger.header(expected);
    if args.verbose {
        println!("Expecting {} bytes", expected);
    }

    let mut output = match File::create(&config.output) {
        Ok(f) => f,
        Err(e) => {
            fail(e.to_string());
            return Err(e).with_context(|| format!("failed to create {}", config.output.display()));
        }
    };

    let transfer = TransferLoop::new(config.transfer_options(), logger.as_ref());
    let result = if args.plain {
        let mut display = PlainProgress::new(std::io::stdout(), args.verbose);
        let result = transfer.run(&mut source, &mut output, expected, &mut display);
        if let Ok(report) = &result {
            display.finish(report);
        }
        result
    } else {
        let mut display = ConsoleProgress::new(expected, args.verbose);
        let result = transfer.run(&mut source, &mut output, expected, &mut display);
        match &result {
            Ok(report) => display.finish(report),
            Err(e) => display.finish_error(&e.to_string()),
        }
        result
    };

    // Make sure what arrived is on disk whichever way the loop ended
    let synced = output.sync_all();

    let report = match result {
        Ok(r) => r,
        Err(e) => {
            fail(e.to_string());
            return Err(e).context("transfer aborted");
        }
    };
    synced.with_context(|| format!("failed to sync {}", config.output.display()))?;

    if let Some(j) = &journal {
        let entry = TransferLogEntry::from_report(&run_id, &source_name, &config.output, &report);
        if let Err(e) = j.add_entry(&entry) {
            eprintln!("warning: failed to write transfer record: {e:#}");
        }
    }

    exit_for(&report, args.fail_on_loss);
    Ok(())
}

/// Data loss is a warning unless the caller asked for it to fail the run
fn exit_for(report: &TransferReport, fail_on_loss: bool) {
    if fail_on_loss && report.data_loss().is_some() {
        std::process::exit(EXIT_DATA_LOSS);
    }
}
