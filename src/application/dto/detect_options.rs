//! Detect options DTO

use crate::domain::entities::Metadata;
use crate::infrastructure::buffering::DEFAULT_CHUNK_SIZE;
use serde::Deserialize;

/// Options for detecting the content signature of a stream
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectOptions {
    /// Bytes requested from the reader per read
    pub chunk_size: usize,
    /// Stop after this many bytes without a decision
    pub scan_limit: Option<u64>,
    /// Metadata present before detection; never overwritten by the stream
    pub seed_metadata: Metadata,
    /// Record the decision nodes visited
    pub trace: bool,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            scan_limit: None,
            seed_metadata: Metadata::new(),
            trace: false,
        }
    }
}

impl DetectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the read size
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Caps the bytes examined per stream
    pub fn with_scan_limit(mut self, limit: u64) -> Self {
        self.scan_limit = Some(limit);
        self
    }

    /// Adds a caller-supplied metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.seed_metadata.insert(key.into(), value.into());
        self
    }

    pub fn traced(mut self) -> Self {
        self.trace = true;
        self
    }
}
