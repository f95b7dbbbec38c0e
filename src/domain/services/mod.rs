//! Domain services
//!
//! Compilation of signatures into the shared decision graph, and the
//! per-stream matching that walks it.

mod compiler;
mod decision;
mod matcher;
mod processor;
mod signature_catalog;

pub use compiler::{AutomatonCompiler, CompilerOptions, DefinitionPolicy, MAX_BODY_LOOKAHEAD};
pub use decision::{DecisionGraph, DecisionNode, Edge, NodeId, SpanKind, Step};
pub use matcher::{MatchState, Transition, MAX_CAPTURE_BYTES};
pub use processor::{ProcessorFactory, ProcessorStatus, StreamProcessor};
pub use signature_catalog::SignatureCatalog;
