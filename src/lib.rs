//! Streaming content-signature detection
//!
//! Signatures describe binary formats as trees of segments. The
//! [`AutomatonCompiler`](domain::services::AutomatonCompiler) merges a whole
//! catalog into one decision graph, and each stream is classified by a
//! [`StreamProcessor`](domain::services::StreamProcessor) fed whatever bytes
//! are available, without seeking or re-reading.

pub mod application;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::{Result, SignatureDefinitionError};
pub use application::dto::{DetectOptions, DetectionOutcome, DetectionReport};
pub use application::DetectContentUseCase;
pub use domain::entities::{ContentSignature, Length, Metadata, Segment};
pub use domain::services::{
    CompilerOptions, DefinitionPolicy, ProcessorFactory, SignatureCatalog, StreamProcessor,
};
