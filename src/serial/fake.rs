use crate::source::{ChunkRead, ChunkSource};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// One scripted response of a [`FakeSource`].
pub enum FakeStep {
    /// Deliver these bytes (truncated to the requested chunk size; the rest stays queued).
    Data(Vec<u8>),
    /// Nothing arrives within the timeout.
    Timeout,
    /// The transport faults with this error.
    Fault(io::Error),
    /// Sleep before handling the next step.
    Delay(Duration),
}

impl FakeStep {
    /// `len` bytes of a counting pattern starting at `seed`.
    pub fn pattern(len: usize, seed: u8) -> Self {
        FakeStep::Data((0..len).map(|i| seed.wrapping_add(i as u8)).collect())
    }

    pub fn disconnect() -> Self {
        FakeStep::Fault(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"))
    }
}

/// Minimal fake device used in tests to script chunk reads.
///
/// Once the script is exhausted every further read times out.
#[derive(Default)]
pub struct FakeSource {
    script: VecDeque<FakeStep>,
    reads: usize,
}

impl FakeSource {
    pub fn new(script: Vec<FakeStep>) -> Self {
        Self {
            script: script.into(),
            reads: 0,
        }
    }

    /// A source that sends the little-endian length header followed by `steps`.
    pub fn with_header(expected: u32, steps: Vec<FakeStep>) -> Self {
        let mut script = vec![FakeStep::Data(expected.to_le_bytes().to_vec())];
        script.extend(steps);
        Self::new(script)
    }

    /// Number of `read_chunk` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn is_exhausted(&self) -> bool {
        self.script.is_empty()
    }
}

impl ChunkSource for FakeSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> ChunkRead {
        self.reads += 1;
        loop {
            match self.script.pop_front() {
                Some(FakeStep::Delay(d)) => std::thread::sleep(d),
                Some(FakeStep::Data(mut bytes)) => {
                    if bytes.is_empty() {
                        return ChunkRead::Timeout;
                    }
                    if bytes.len() > buf.len() {
                        let rest = bytes.split_off(buf.len());
                        self.script.push_front(FakeStep::Data(rest));
                    }
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    return ChunkRead::Data(bytes.len());
                }
                Some(FakeStep::Timeout) | None => return ChunkRead::Timeout,
                Some(FakeStep::Fault(err)) => return ChunkRead::Fault(err),
            }
        }
    }

    fn describe(&self) -> String {
        String::from("fake")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn fake_source_scripts_reads() {
        let mut fake = FakeSource::new(vec![
            FakeStep::Data(vec![1, 2, 3]),
            FakeStep::Timeout,
            FakeStep::disconnect(),
        ]);
        let mut buf = [0u8; 8];
        assert!(matches!(fake.read_chunk(&mut buf), ChunkRead::Data(3)));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert!(matches!(fake.read_chunk(&mut buf), ChunkRead::Timeout));
        assert!(matches!(fake.read_chunk(&mut buf), ChunkRead::Fault(_)));
        assert!(matches!(fake.read_chunk(&mut buf), ChunkRead::Timeout));
        assert_eq!(fake.reads(), 4);
    }

    #[test]
    fn oversized_step_is_split_across_reads() {
        let mut fake = FakeSource::with_header(6, vec![FakeStep::pattern(6, 0)]);
        let mut header = [0u8; 4];
        assert!(matches!(fake.read_chunk(&mut header), ChunkRead::Data(4)));
        assert_eq!(u32::from_le_bytes(header), 6);

        let mut buf = [0u8; 4];
        assert!(matches!(fake.read_chunk(&mut buf), ChunkRead::Data(4)));
        assert_eq!(buf, [0, 1, 2, 3]);
        assert!(matches!(fake.read_chunk(&mut buf), ChunkRead::Data(2)));
        assert_eq!(&buf[..2], &[4, 5]);
        assert!(fake.is_exhausted());
    }

    #[test]
    fn scripted_delay_respected() {
        let mut fake = FakeSource::new(vec![
            FakeStep::Delay(Duration::from_millis(5)),
            FakeStep::Data(vec![42]),
        ]);
        let mut buf = [0u8; 1];
        let start = Instant::now();
        assert!(matches!(fake.read_chunk(&mut buf), ChunkRead::Data(1)));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
