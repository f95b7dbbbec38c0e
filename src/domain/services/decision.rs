//! Decision graph
//!
//! The compiled, immutable automaton shared by every stream. Nodes live in
//! an arena and refer to each other by [`NodeId`]; repeat bodies and choice
//! alternatives are sub-graphs inside the same arena whose last node is
//! flagged as an exit.

use crate::domain::entities::{ContentSignature, Length};
use std::cmp::Reverse;
use std::sync::Arc;

/// Index of a node in the decision graph arena
pub type NodeId = usize;

/// What a span does with the bytes it consumes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Bytes are discarded
    Any,
    /// Bytes name a metadata key. An unpaired key records its bytes under
    /// `name` directly.
    Key { name: String, paired: bool },
    /// Bytes are recorded under the pending key
    Value,
}

/// The test an edge performs before its target node is entered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Constant(Vec<u8>),
    Range { min: Vec<u8>, max: Vec<u8> },
    EndOfStream,
    /// Entry nodes of the alternatives, in declaration order
    Choice(Vec<NodeId>),
    Repeat {
        entry: NodeId,
        min: u64,
        max: Option<u64>,
    },
    Span {
        kind: SpanKind,
        min: u64,
        max: Length,
    },
}

impl Step {
    /// Contiguous bytes this step examines in a single test
    pub fn width(&self) -> usize {
        match self {
            Step::Constant(bytes) => bytes.len(),
            Step::Range { min, .. } => min.len(),
            _ => 0,
        }
    }

    /// Ordering key for edges leaving the same node
    pub(crate) fn rank(&self) -> (u8, Reverse<usize>) {
        match self {
            Step::Constant(bytes) => (0, Reverse(bytes.len())),
            Step::Range { min, .. } => (1, Reverse(min.len())),
            Step::EndOfStream => (2, Reverse(0)),
            Step::Choice(_) => (3, Reverse(0)),
            Step::Repeat { .. } => (4, Reverse(0)),
            Step::Span { .. } => (5, Reverse(0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub step: Step,
    pub target: NodeId,
}

/// One state of the compiled automaton
#[derive(Debug, Clone, Default)]
pub struct DecisionNode {
    pub(crate) edges: Vec<Edge>,
    /// Most specific signature whose definition ends here
    pub(crate) label: Option<usize>,
    /// Last node of a repeat body or choice alternative
    pub(crate) exit: bool,
}

impl DecisionNode {
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_exit(&self) -> bool {
        self.exit
    }

    /// True for nodes where a signature definition ends with nothing after it
    pub fn is_leaf(&self) -> bool {
        self.edges.is_empty() && !self.exit
    }

    pub(crate) fn label(&self) -> Option<usize> {
        self.label
    }
}

/// The shared decision automaton for a whole signature catalog
#[derive(Debug)]
pub struct DecisionGraph {
    nodes: Vec<DecisionNode>,
    /// Index 0 is the generic signature labelling the root
    signatures: Vec<Arc<ContentSignature>>,
    lookahead: usize,
}

impl DecisionGraph {
    pub const ROOT: NodeId = 0;

    pub(crate) fn new(
        nodes: Vec<DecisionNode>,
        signatures: Vec<Arc<ContentSignature>>,
        lookahead: usize,
    ) -> Self {
        Self {
            nodes,
            signatures,
            lookahead,
        }
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    pub fn node(&self, id: NodeId) -> &DecisionNode {
        &self.nodes[id]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Widest contiguous window any single edge test needs
    pub fn lookahead_count(&self) -> usize {
        self.lookahead
    }

    /// The signature reported when nothing more specific matched
    pub fn generic(&self) -> &Arc<ContentSignature> {
        &self.signatures[0]
    }

    pub(crate) fn signature(&self, index: usize) -> &Arc<ContentSignature> {
        &self.signatures[index]
    }

    /// All compiled signatures, generic first
    pub fn signatures(&self) -> &[Arc<ContentSignature>] {
        &self.signatures
    }

    /// Signature labelling a node, if any definition ends there
    pub fn label_of(&self, id: NodeId) -> Option<&Arc<ContentSignature>> {
        self.nodes[id].label.map(|index| &self.signatures[index])
    }

    /// Node where the given signature's definition ends
    pub fn terminal_of(&self, signature_id: &str) -> Option<NodeId> {
        self.nodes.iter().position(|node| {
            node.label
                .is_some_and(|index| index != 0 && self.signatures[index].id() == signature_id)
        })
    }

    /// Follows constant edges from `from` spelling exactly `bytes`
    ///
    /// Returns the node reached, or `None` if the bytes stop in the middle
    /// of an edge or leave the graph.
    pub fn follow_constant(&self, from: NodeId, mut bytes: &[u8]) -> Option<NodeId> {
        let mut at = from;
        while !bytes.is_empty() {
            let edge = self.nodes[at].edges.iter().find(|edge| match &edge.step {
                Step::Constant(label) => bytes.starts_with(label),
                _ => false,
            })?;
            bytes = &bytes[edge.step.width()..];
            at = edge.target;
        }
        Some(at)
    }
}
