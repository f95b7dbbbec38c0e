//! Detect content use case
//!
//! Drives stream processors over byte slices, readers and files.

use crate::application::dto::{DetectOptions, DetectionOutcome, DetectionReport};
use crate::domain::entities::Metadata;
use crate::domain::repositories::StreamBuffer;
use crate::domain::services::{ProcessorFactory, ProcessorStatus, StreamProcessor};
use crate::infrastructure::buffering::LookaheadReader;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Detect content use case
///
/// Classifies streams against one compiled catalog. The factory is shared,
/// so a single use case can serve many threads.
#[derive(Debug, Clone)]
pub struct DetectContentUseCase {
    factory: ProcessorFactory,
    options: DetectOptions,
}

impl DetectContentUseCase {
    pub fn new(factory: ProcessorFactory, options: DetectOptions) -> Self {
        Self { factory, options }
    }

    pub fn factory(&self) -> &ProcessorFactory {
        &self.factory
    }

    pub fn options(&self) -> &DetectOptions {
        &self.options
    }

    fn processor(&self) -> StreamProcessor {
        let processor = self.factory.create_processor();
        if self.options.trace {
            processor.with_trace()
        } else {
            processor
        }
    }

    /// Classifies an in-memory buffer
    pub fn detect_bytes(&self, data: &[u8]) -> DetectionReport {
        let limit = self
            .options
            .scan_limit
            .map_or(data.len(), |l| data.len().min(usize::try_from(l).unwrap_or(usize::MAX)));
        let mut window = &data[..limit];
        let end_of_stream = limit == data.len();

        let mut processor = self.processor();
        let mut metadata = self.options.seed_metadata.clone();
        processor.detect(&mut window, &mut metadata, end_of_stream);

        self.report(&processor, metadata, limit as u64)
    }

    /// Classifies everything a stream buffer provides, reading only as far
    /// as detection needs
    pub fn detect_stream<S: StreamBuffer>(&self, stream: &mut S) -> Result<DetectionReport> {
        let lookahead = self.factory.lookahead_count();
        let mut processor = self.processor();
        let mut metadata = self.options.seed_metadata.clone();

        loop {
            let end_of_stream = stream.fill(lookahead).context("Failed to read stream")?;
            processor.detect(stream.buffer(), &mut metadata, end_of_stream);

            if processor.is_finished() || end_of_stream {
                break;
            }
            if self
                .options
                .scan_limit
                .is_some_and(|limit| stream.bytes_read() >= limit)
            {
                tracing::debug!(
                    bytes_read = stream.bytes_read(),
                    "scan limit reached before a decision"
                );
                break;
            }
        }

        Ok(self.report(&processor, metadata, stream.bytes_read()))
    }

    pub fn detect_reader<R: Read>(&self, reader: R) -> Result<DetectionReport> {
        let mut stream = LookaheadReader::with_chunk_size(reader, self.options.chunk_size);
        self.detect_stream(&mut stream)
    }

    pub fn detect_path(&self, path: &Path) -> Result<DetectionReport> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let report = self
            .detect_reader(file)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(report.with_source(path.display().to_string()))
    }

    /// Classifies many files in parallel, preserving input order
    pub fn detect_paths(&self, paths: &[PathBuf]) -> Vec<Result<DetectionReport>> {
        paths.par_iter().map(|path| self.detect_path(path)).collect()
    }

    fn report(&self, processor: &StreamProcessor, metadata: Metadata, bytes_read: u64) -> DetectionReport {
        let signature = processor.content_signature();
        let outcome = match processor.status() {
            ProcessorStatus::Detecting => DetectionOutcome::Indeterminate,
            _ if signature.is_generic() => DetectionOutcome::NoMatch,
            _ => DetectionOutcome::Matched,
        };

        let mut report = DetectionReport::new(signature, outcome, metadata);
        report.bytes_examined = processor.position();
        report.bytes_read = bytes_read;
        report.trail = processor.trail().map(<[_]>::to_vec);
        report
    }
}
