//! Terminal progress display
//!
//! - Per-chunk lines (verbose) scroll above
//! - Progress bar with percentage and live throughput stays fixed at bottom
//! - Final summary line with elapsed time and average throughput

use crate::protocol::timeouts::PROGRESS_TICK_MS;
use crate::transfer::{ProgressEvent, ProgressObserver, TransferReport, TransferStatus};
use crossterm::{
    cursor,
    style::{Color, Stylize},
    ExecutableCommand,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

/// Status text for one progress event: `42.17% @ 11.3 KB/s`
pub fn status_line(event: &ProgressEvent) -> String {
    match event.instant_kbps {
        Some(kbps) => format!("{:.2}% @ {:.1} KB/s", event.percent, kbps),
        None => format!("{:.2}%", event.percent),
    }
}

/// Summary lines for a finished transfer, uncoloured.
pub fn summary_lines(report: &TransferReport) -> Vec<String> {
    let headline = match report.status() {
        TransferStatus::Completed => "Completed",
        TransferStatus::CompletedWithLoss => "Completed with data loss",
        TransferStatus::TerminatedByFault => "Connection finished",
    };
    let rate = report
        .average_kbps()
        .map(|k| format!(" ({:.1} KB/s)", k))
        .unwrap_or_default();
    let mut lines = vec![format!(
        "{} {} of {} bytes ({:.2}%) in {:.1}s{}",
        headline,
        report.bytes_read,
        report.expected,
        report.percent(),
        report.elapsed.as_secs_f64(),
        rate
    )];
    if let Some(err) = report.fault() {
        lines.push(format!("transport fault after {} good chunks: {}", report.chunks, err));
    }
    if let Some(loss) = report.data_loss() {
        lines.push(format!("warning: {loss}"));
    }
    lines
}

/// Bar-style display sized to the expected payload.
pub struct ConsoleProgress {
    bar: ProgressBar,
    show_chunks: bool,
}

impl ConsoleProgress {
    pub fn new(expected: u32, verbose: bool) -> Self {
        let _ = io::stdout().execute(cursor::Hide);

        let bar = ProgressBar::new(u64::from(expected));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        bar.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));

        Self {
            bar,
            show_chunks: verbose,
        }
    }

    /// Finish the bar and print the coloured summary
    pub fn finish(&self, report: &TransferReport) {
        self.bar.finish_and_clear();
        print_summary(report);
        self.cleanup();
    }

    /// Finish with error
    pub fn finish_error(&self, msg: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", "Failed".with(Color::Red).bold(), msg);
        self.cleanup();
    }

    fn cleanup(&self) {
        let _ = io::stdout().execute(cursor::Show);
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_progress(&mut self, event: &ProgressEvent) {
        if self.show_chunks {
            // Print above the bar (cargo-style)
            self.bar.suspend(|| {
                println!(
                    "  {} {} bytes",
                    "Wrote".with(Color::Green).bold(),
                    event.chunk_len
                );
            });
        }
        // Overrun past the declared length grows the bar instead of pinning it at 100%
        if event.bytes_read > self.bar.length().unwrap_or(0) {
            self.bar.set_length(event.bytes_read);
        }
        self.bar.set_position(event.bytes_read);
        self.bar.set_message(status_line(event));
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Line-oriented display for dumb terminals and logs: status lines overwrite in place.
pub struct PlainProgress<W: Write> {
    out: W,
    verbose: bool,
}

impl<W: Write> PlainProgress<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self { out, verbose }
    }

    pub fn finish(&mut self, report: &TransferReport) {
        let _ = writeln!(self.out);
        for line in summary_lines(report) {
            let _ = writeln!(self.out, "{line}");
        }
        let _ = self.out.flush();
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressObserver for PlainProgress<W> {
    fn on_progress(&mut self, event: &ProgressEvent) {
        if self.verbose {
            let _ = writeln!(self.out, "\rWrote {} bytes", event.chunk_len);
        }
        let _ = write!(
            self.out,
            "\r{} ({}/{} bytes)",
            status_line(event),
            event.bytes_read,
            event.expected
        );
        let _ = self.out.flush();
    }
}

/// Print the coloured summary on stdout (warnings on stderr)
pub fn print_summary(report: &TransferReport) {
    let lines = summary_lines(report);
    let Some((head, rest)) = lines.split_first() else {
        return;
    };
    let colour = match report.status() {
        TransferStatus::Completed => Color::Green,
        TransferStatus::CompletedWithLoss => Color::Yellow,
        TransferStatus::TerminatedByFault => Color::Yellow,
    };
    // Headline word(s) coloured, the figures plain
    match head.find(char::is_numeric) {
        Some(idx) => println!("{} {}", head[..idx].trim_end().with(colour).bold(), &head[idx..]),
        None => println!("{}", head.as_str().with(colour).bold()),
    }
    for line in rest {
        eprintln!("{}", line.as_str().with(Color::Yellow));
    }
}
