//! Stream buffering

mod lookahead_reader;

pub use lookahead_reader::{LookaheadReader, DEFAULT_CHUNK_SIZE};
