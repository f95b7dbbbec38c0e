//! Stream buffer trait
//!
//! The buffering collaborator a stream processor is driven by. It keeps
//! undecided bytes between calls and guarantees the lookahead window.

use bytes::BytesMut;
use std::io;

pub trait StreamBuffer {
    /// Reads until at least `lookahead` bytes are buffered or the stream ends
    ///
    /// Returns `true` once the underlying stream is exhausted.
    fn fill(&mut self, lookahead: usize) -> io::Result<bool>;

    /// Buffered bytes not yet consumed by the processor
    fn buffer(&mut self) -> &mut BytesMut;

    /// Total bytes read from the underlying stream
    fn bytes_read(&self) -> u64;
}
