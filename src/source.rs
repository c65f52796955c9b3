//! Chunk-level view of the input stream.
//!
//! A read either returns data, returns nothing because the timeout expired, or faults.
//! Faults that happen after some bytes were collected are deferred to the next call so the
//! bytes already received always reach the sink first.

use std::io::{self, ErrorKind, Read};

/// Result of one bounded read request.
#[derive(Debug)]
pub enum ChunkRead {
    /// `n` bytes were placed at the start of the buffer (`n > 0`).
    Data(usize),
    /// Nothing arrived before the timeout, or the stream reached its natural end.
    Timeout,
    /// The transport failed (device unplugged, descriptor closed).
    Fault(io::Error),
}

/// Anything that can hand out bounded chunks of the dump stream.
pub trait ChunkSource {
    /// Fill as much of `buf` as arrives within one read timeout.
    fn read_chunk(&mut self, buf: &mut [u8]) -> ChunkRead;

    /// Human-readable name for logs and summaries.
    fn describe(&self) -> String {
        String::from("stream")
    }
}

impl<S: ChunkSource + ?Sized> ChunkSource for &mut S {
    fn read_chunk(&mut self, buf: &mut [u8]) -> ChunkRead {
        (**self).read_chunk(buf)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> ChunkRead {
        (**self).read_chunk(buf)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Holds a fault seen mid-fill until the caller has consumed the bytes before it.
#[derive(Debug, Default)]
pub(crate) struct DeferredFault(Option<io::Error>);

impl DeferredFault {
    pub(crate) fn take(&mut self) -> Option<io::Error> {
        self.0.take()
    }

    /// Resolve a fault: report it now if nothing was filled, else stash it and return the data.
    pub(crate) fn settle(&mut self, filled: usize, err: io::Error) -> ChunkRead {
        if filled == 0 {
            ChunkRead::Fault(err)
        } else {
            self.0 = Some(err);
            ChunkRead::Data(filled)
        }
    }
}

/// Adapts any [`Read`] (replay files, pipes, sockets with read timeouts) to [`ChunkSource`].
///
/// `Ok(0)` is end of data; `TimedOut`/`WouldBlock` end the current chunk; any other error
/// is a transport fault.
pub struct ReadSource<R> {
    inner: R,
    name: String,
    deferred: DeferredFault,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
            deferred: DeferredFault::default(),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ChunkSource for ReadSource<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> ChunkRead {
        if let Some(err) = self.deferred.take() {
            return ChunkRead::Fault(err);
        }

        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => break,
                Err(e) => return self.deferred.settle(filled, e),
            }
        }

        if filled == 0 {
            ChunkRead::Timeout
        } else {
            ChunkRead::Data(filled)
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
