//! Lookahead reader
//!
//! Adapts any `Read` into the buffer a stream processor is driven with.

use crate::domain::repositories::StreamBuffer;
use bytes::BytesMut;
use std::io::{self, Read};

/// Default read size
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Buffers a reader so that undecided bytes survive between calls
pub struct LookaheadReader<R> {
    inner: R,
    buffer: BytesMut,
    chunk_size: usize,
    bytes_read: u64,
    eof: bool,
}

impl<R: Read> LookaheadReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(inner: R, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            inner,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
            bytes_read: 0,
            eof: false,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_chunk(&mut self) -> io::Result<()> {
        let start = self.buffer.len();
        self.buffer.resize(start + self.chunk_size, 0);

        let result = loop {
            match self.inner.read(&mut self.buffer[start..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        let n = match result {
            Ok(n) => n,
            Err(e) => {
                self.buffer.truncate(start);
                return Err(e);
            }
        };
        self.buffer.truncate(start + n);
        self.bytes_read += n as u64;
        if n == 0 {
            self.eof = true;
        }
        Ok(())
    }
}

impl<R: Read> StreamBuffer for LookaheadReader<R> {
    fn fill(&mut self, lookahead: usize) -> io::Result<bool> {
        if !self.eof {
            self.read_chunk()?;
        }
        while !self.eof && self.buffer.len() < lookahead {
            self.read_chunk()?;
        }
        Ok(self.eof)
    }

    fn buffer(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Buf;
    use std::io::Cursor;

    /// Reader that hands out at most one byte per call
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((&byte, rest)), Some(slot)) => {
                    *slot = byte;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn test_fill_reaches_lookahead() {
        let mut reader = LookaheadReader::with_chunk_size(Trickle(b"abcdefgh"), 4);
        let eof = reader.fill(5).unwrap();

        assert!(!eof);
        assert_eq!(&reader.buffer()[..], b"abcde");
        assert_eq!(reader.bytes_read(), 5);
    }

    #[test]
    fn test_unconsumed_bytes_are_kept() {
        let mut reader = LookaheadReader::with_chunk_size(Cursor::new(b"0123456789".to_vec()), 4);
        reader.fill(1).unwrap();
        reader.buffer().advance(3);
        reader.fill(1).unwrap();

        assert_eq!(&reader.buffer()[..], b"34567");
    }

    #[test]
    fn test_eof_reported() {
        let mut reader = LookaheadReader::with_chunk_size(Cursor::new(b"xy".to_vec()), 16);
        let mut eof = reader.fill(8).unwrap();
        while !eof {
            eof = reader.fill(8).unwrap();
        }

        assert!(reader.is_eof());
        assert_eq!(&reader.buffer()[..], b"xy");
        assert_eq!(reader.bytes_read(), 2);
    }
}
