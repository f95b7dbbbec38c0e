//! Stream processors
//!
//! A [`ProcessorFactory`] owns the compiled graph and hands out one
//! [`StreamProcessor`] per stream.

use crate::core::Result;
use crate::domain::entities::{ContentSignature, Metadata};
use crate::domain::services::compiler::{AutomatonCompiler, CompilerOptions};
use crate::domain::services::decision::{DecisionGraph, NodeId};
use crate::domain::services::matcher::{MatchState, Transition};
use bytes::Buf;
use std::sync::Arc;

/// Lifecycle of a stream processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorStatus {
    /// More input may refine the classification
    Detecting,
    /// A signature definition matched to its end
    Complete,
    /// No deeper signature can match
    Rejected,
}

/// Detects the content signature of a single stream
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use sigstream::domain::entities::{ContentSignature, Metadata, Segment};
/// use sigstream::domain::services::{CompilerOptions, ProcessorFactory};
/// use std::sync::Arc;
///
/// let gif = ContentSignature::new("gif", "image/gif", vec![
///     Segment::constant("GIF8"),
///     Segment::any(2),
/// ]);
/// let factory = ProcessorFactory::from_signatures(&[Arc::new(gif)], &CompilerOptions::default()).unwrap();
///
/// let mut processor = factory.create_processor();
/// let mut buffer = BytesMut::from(&b"GIF89a"[..]);
/// let mut metadata = Metadata::new();
/// let signature = processor.detect(&mut buffer, &mut metadata, true);
/// assert_eq!(signature.id(), "gif");
/// ```
#[derive(Debug)]
pub struct StreamProcessor {
    graph: Arc<DecisionGraph>,
    state: MatchState,
    status: ProcessorStatus,
}

impl StreamProcessor {
    fn new(graph: Arc<DecisionGraph>) -> Self {
        Self {
            graph,
            state: MatchState::new(),
            status: ProcessorStatus::Detecting,
        }
    }

    /// Records every decision node this processor enters
    pub fn with_trace(mut self) -> Self {
        if self.state.position() == 0 && self.state.trail().is_none() {
            self.state = MatchState::traced();
        }
        self
    }

    /// Advances detection with newly buffered bytes
    ///
    /// Consumed bytes are removed from `buffer`; the rest must be presented
    /// again with more input appended. Once detection is finished further
    /// calls leave the buffer untouched.
    pub fn detect<B: Buf>(
        &mut self,
        buffer: &mut B,
        metadata: &mut Metadata,
        end_of_stream: bool,
    ) -> &ContentSignature {
        if self.status == ProcessorStatus::Detecting {
            let transition = self
                .state
                .detect(&self.graph, buffer, metadata, end_of_stream);

            self.status = match transition {
                Transition::Complete => ProcessorStatus::Complete,
                Transition::Rejected => ProcessorStatus::Rejected,
                // nothing left to decide with
                Transition::Stalled | Transition::Advanced if end_of_stream && !buffer.has_remaining() => {
                    ProcessorStatus::Rejected
                }
                Transition::Stalled | Transition::Advanced => ProcessorStatus::Detecting,
            };

            if self.is_finished() {
                tracing::debug!(
                    status = ?self.status,
                    signature = self.content_signature().id(),
                    position = self.state.position(),
                    "detection finished"
                );
            }
        }
        self.content_signature()
    }

    /// Most specific signature reached so far
    ///
    /// While detecting this may be an abstract classification; once
    /// finished it is the deepest concrete one.
    pub fn content_signature(&self) -> &ContentSignature {
        match self.status {
            ProcessorStatus::Detecting => self.state.signature(&self.graph),
            _ => self.state.concrete_signature(&self.graph),
        }
    }

    /// Label reached so far, abstract or not
    pub fn classification(&self) -> &ContentSignature {
        self.state.signature(&self.graph)
    }

    pub fn status(&self) -> ProcessorStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status != ProcessorStatus::Detecting
    }

    /// Stream bytes consumed so far
    pub fn position(&self) -> u64 {
        self.state.position()
    }

    pub fn current_node(&self) -> NodeId {
        self.state.node()
    }

    /// Visited nodes, when tracing was requested
    pub fn trail(&self) -> Option<&[NodeId]> {
        self.state.trail()
    }
}

/// Creates stream processors sharing one compiled graph
#[derive(Debug, Clone)]
pub struct ProcessorFactory {
    graph: Arc<DecisionGraph>,
}

impl ProcessorFactory {
    pub fn new(graph: Arc<DecisionGraph>) -> Self {
        Self { graph }
    }

    /// Compiles `signatures` and wraps the resulting graph
    pub fn from_signatures(signatures: &[Arc<ContentSignature>], options: &CompilerOptions) -> Result<Self> {
        let graph = AutomatonCompiler::new(options.clone()).compile(signatures)?;
        Ok(Self::new(Arc::new(graph)))
    }

    /// Contiguous bytes callers must buffer before each call to `detect`,
    /// except at end of stream
    pub fn lookahead_count(&self) -> usize {
        self.graph.lookahead_count()
    }

    pub fn create_processor(&self) -> StreamProcessor {
        StreamProcessor::new(Arc::clone(&self.graph))
    }

    pub fn graph(&self) -> &Arc<DecisionGraph> {
        &self.graph
    }
}
