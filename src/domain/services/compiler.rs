//! Automaton compiler
//!
//! Merges every registered signature into one [`DecisionGraph`]. Shared
//! leading structure is factored so that formats beginning with the same
//! bytes are tested once: constants are inserted radix-style and other
//! segments merge on structural equality at the same node.

use crate::core::{Result, SignatureDefinitionError};
use crate::domain::entities::{key_is_paired, ContentSignature, Length, Segment};
use crate::domain::services::decision::{DecisionGraph, DecisionNode, Edge, NodeId, SpanKind, Step};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Cap on the lookahead a repeat body adds
pub const MAX_BODY_LOOKAHEAD: usize = 64 * 1024;

/// What to do with a signature that fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionPolicy {
    /// Reject the whole catalog
    #[default]
    Strict,
    /// Log and skip the faulty signature
    Lenient,
}

#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    pub policy: DefinitionPolicy,
}

impl CompilerOptions {
    pub fn lenient() -> Self {
        Self {
            policy: DefinitionPolicy::Lenient,
        }
    }
}

/// Builds the shared decision graph from a set of signatures
#[derive(Debug, Clone, Default)]
pub struct AutomatonCompiler {
    options: CompilerOptions,
}

impl AutomatonCompiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    /// Compiles the signatures into one graph
    ///
    /// The graph's root is labelled with the generic signature; every
    /// accepted signature labels the node where its definition ends.
    pub fn compile(&self, signatures: &[Arc<ContentSignature>]) -> Result<DecisionGraph> {
        let accepted = self.accept(signatures)?;
        let depths = parent_depths(&accepted);

        let mut order: Vec<usize> = (0..accepted.len()).collect();
        order.sort_by(|&a, &b| {
            let (sa, sb) = (&accepted[a], &accepted[b]);
            sb.min_length()
                .cmp(&sa.min_length())
                .then(sa.max_length().cmp(&sb.max_length()))
                .then(a.cmp(&b))
        });

        let mut labelled: Vec<Arc<ContentSignature>> = vec![Arc::new(ContentSignature::generic())];
        let mut builder = GraphBuilder::new();
        builder.nodes[DecisionGraph::ROOT].label = Some(0);

        for index in order {
            let signature = &accepted[index];
            let end = builder.insert_sequence(DecisionGraph::ROOT, signature.format());
            labelled.push(Arc::clone(signature));
            let candidate = labelled.len() - 1;

            let replace = match builder.nodes[end].label {
                None | Some(0) => true,
                Some(current) => {
                    let current_sig = &labelled[current];
                    let ours = specificity(signature, &depths);
                    let theirs = specificity(current_sig, &depths);
                    if ours == theirs {
                        tracing::warn!(
                            signature = signature.id(),
                            shadowed_by = current_sig.id(),
                            "signature definition is identical to an earlier one"
                        );
                    }
                    ours > theirs
                }
            };
            if replace {
                builder.nodes[end].label = Some(candidate);
            }

            tracing::debug!(
                signature = signature.id(),
                node = end,
                min_length = signature.min_length(),
                "inserted signature"
            );
        }

        let (nodes, lookahead) = builder.finish();
        tracing::info!(
            signatures = labelled.len() - 1,
            nodes = nodes.len(),
            lookahead,
            "compiled decision graph"
        );
        Ok(DecisionGraph::new(nodes, labelled, lookahead))
    }

    /// Validates signatures according to the definition policy
    fn accept(&self, signatures: &[Arc<ContentSignature>]) -> Result<Vec<Arc<ContentSignature>>> {
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(signatures.len());

        for signature in signatures {
            let check = if seen.contains(signature.id()) {
                Err(SignatureDefinitionError::DuplicateSignature(
                    signature.id().to_string(),
                ))
            } else {
                signature.validate()
            };

            match (check, self.options.policy) {
                (Ok(()), _) => {
                    seen.insert(signature.id().to_string());
                    accepted.push(Arc::clone(signature));
                }
                (Err(e), DefinitionPolicy::Strict) => return Err(e),
                (Err(e), DefinitionPolicy::Lenient) => {
                    tracing::warn!(signature = signature.id(), error = %e, "skipping signature");
                }
            }
        }
        Ok(accepted)
    }
}

/// Concrete signatures beat abstract ones, then deeper technical children
fn specificity(signature: &ContentSignature, depths: &HashMap<String, usize>) -> (bool, usize) {
    (
        !signature.is_abstract(),
        depths.get(signature.id()).copied().unwrap_or(0),
    )
}

fn parent_depths(signatures: &[Arc<ContentSignature>]) -> HashMap<String, usize> {
    let parents: HashMap<&str, Option<&str>> = signatures
        .iter()
        .map(|s| (s.id(), s.parent()))
        .collect();

    signatures
        .iter()
        .map(|signature| {
            let mut depth = 0;
            let mut current = signature.parent();
            while let Some(parent) = current {
                if depth >= signatures.len() {
                    break;
                }
                depth += 1;
                current = parents.get(parent).copied().flatten();
            }
            (signature.id().to_string(), depth)
        })
        .collect()
}

/// Structural key used to merge edges leaving the same node
#[derive(Debug, PartialEq, Eq, Hash)]
enum EdgeKey {
    /// Constants are keyed by their first byte; see `insert_constant`
    Constant(u8),
    Range(Vec<u8>, Vec<u8>),
    EndOfStream,
    Span(SpanKind, u64, Length),
    Compound(Segment),
}

struct GraphBuilder {
    nodes: Vec<DecisionNode>,
    index: Vec<HashMap<EdgeKey, usize>>,
}

impl GraphBuilder {
    fn new() -> Self {
        let mut builder = Self {
            nodes: Vec::new(),
            index: Vec::new(),
        };
        builder.add_node();
        builder
    }

    fn add_node(&mut self) -> NodeId {
        self.nodes.push(DecisionNode::default());
        self.index.push(HashMap::new());
        self.nodes.len() - 1
    }

    fn push_edge(&mut self, from: NodeId, key: EdgeKey, step: Step, target: NodeId) {
        let position = self.nodes[from].edges.len();
        self.nodes[from].edges.push(Edge { step, target });
        self.index[from].insert(key, position);
    }

    /// Returns the target of the edge keyed `key`, creating it if needed
    fn edge(&mut self, from: NodeId, key: EdgeKey, build: impl FnOnce(&mut Self) -> Step) -> NodeId {
        if let Some(&position) = self.index[from].get(&key) {
            return self.nodes[from].edges[position].target;
        }
        let step = build(self);
        let target = self.add_node();
        self.push_edge(from, key, step, target);
        target
    }

    fn insert_sequence(&mut self, from: NodeId, children: &[Segment]) -> NodeId {
        let mut at = from;
        for (index, child) in children.iter().enumerate() {
            at = match child {
                Segment::Sequence(inner) => self.insert_sequence(at, inner),
                Segment::Constant(bytes) => self.insert_constant(at, bytes),
                Segment::Range { min, max } => {
                    self.edge(at, EdgeKey::Range(min.clone(), max.clone()), |_| Step::Range {
                        min: min.clone(),
                        max: max.clone(),
                    })
                }
                Segment::EndOfStream => self.edge(at, EdgeKey::EndOfStream, |_| Step::EndOfStream),
                Segment::Any { min, max } => self.insert_span(at, SpanKind::Any, *min, *max),
                Segment::Key { prefix, min, max } => {
                    let at = self.insert_constant(at, prefix.as_bytes());
                    let kind = SpanKind::Key {
                        name: prefix.clone(),
                        paired: key_is_paired(children, index),
                    };
                    self.insert_span(at, kind, *min, *max)
                }
                Segment::Value { min, max } => self.insert_span(at, SpanKind::Value, *min, *max),
                Segment::Repeat { sequence, min, max } => {
                    self.edge(at, EdgeKey::Compound(child.clone()), |builder| {
                        let entry = builder.add_node();
                        let end = builder.insert_sequence(entry, sequence);
                        builder.nodes[end].exit = true;
                        Step::Repeat {
                            entry,
                            min: (*min).max(0) as u64,
                            max: max.map(|m| m.max(0) as u64),
                        }
                    })
                }
                Segment::Choice(alternatives) => {
                    self.edge(at, EdgeKey::Compound(child.clone()), |builder| {
                        let entries = alternatives
                            .iter()
                            .map(|alternative| {
                                let entry = builder.add_node();
                                let end =
                                    builder.insert_sequence(entry, std::slice::from_ref(alternative));
                                builder.nodes[end].exit = true;
                                entry
                            })
                            .collect();
                        Step::Choice(entries)
                    })
                }
            };
        }
        at
    }

    fn insert_span(&mut self, from: NodeId, kind: SpanKind, min: u64, max: Length) -> NodeId {
        let key = EdgeKey::Span(kind.clone(), min, max);
        self.edge(from, key, |_| Step::Span { kind, min, max })
    }

    /// Inserts constant bytes, splitting an existing constant edge at the
    /// longest common prefix
    ///
    /// Invariant: no two constant edges leaving a node share a first byte.
    fn insert_constant(&mut self, from: NodeId, mut bytes: &[u8]) -> NodeId {
        let mut at = from;
        while let Some(&first) = bytes.first() {
            let existing = self.index[at]
                .get(&EdgeKey::Constant(first))
                .copied()
                .and_then(|position| match &self.nodes[at].edges[position] {
                    Edge {
                        step: Step::Constant(label),
                        target,
                    } => Some((position, label.clone(), *target)),
                    _ => None,
                });

            let Some((position, label, target)) = existing else {
                let target = self.add_node();
                self.push_edge(at, EdgeKey::Constant(first), Step::Constant(bytes.to_vec()), target);
                return target;
            };

            let common = label
                .iter()
                .zip(bytes)
                .take_while(|(a, b)| a == b)
                .count();

            if common < label.len() {
                let middle = self.add_node();
                let tail = label[common..].to_vec();
                self.push_edge(middle, EdgeKey::Constant(tail[0]), Step::Constant(tail), target);
                self.nodes[at].edges[position] = Edge {
                    step: Step::Constant(label[..common].to_vec()),
                    target: middle,
                };
                at = middle;
            } else {
                at = target;
            }
            bytes = &bytes[common..];
        }
        at
    }

    /// Orders edges and computes the lookahead requirement
    ///
    /// Deciding whether a repeat iterates looks at its body's fixed-width
    /// prefix at once, so a repeat needs its body width on top of the
    /// widest single edge.
    fn finish(mut self) -> (Vec<DecisionNode>, usize) {
        let mut widest = 1;
        for node in &mut self.nodes {
            node.edges.sort_by_key(|edge| edge.step.rank());
            for edge in &node.edges {
                widest = widest.max(edge.step.width());
            }
        }

        let mut lookahead = widest;
        for node in &self.nodes {
            for edge in &node.edges {
                if let Step::Repeat { entry, .. } = edge.step {
                    let body = body_width(&self.nodes, entry).saturating_add(widest as u64);
                    lookahead = lookahead.max(body.min(MAX_BODY_LOOKAHEAD as u64) as usize);
                }
            }
        }
        (self.nodes, lookahead)
    }
}

/// Bytes a repeat body may inspect before its first unbounded span
fn body_width(nodes: &[DecisionNode], id: NodeId) -> u64 {
    nodes[id]
        .edges
        .iter()
        .map(|edge| match &edge.step {
            Step::Constant(bytes) => (bytes.len() as u64).saturating_add(body_width(nodes, edge.target)),
            Step::Range { min, .. } => (min.len() as u64).saturating_add(body_width(nodes, edge.target)),
            Step::Span { max, .. } => max
                .get()
                .map_or(0, |max| max.saturating_add(body_width(nodes, edge.target))),
            Step::Repeat { entry, .. } => body_width(nodes, *entry),
            Step::Choice(entries) => entries
                .iter()
                .map(|&entry| body_width(nodes, entry))
                .max()
                .unwrap_or(0),
            Step::EndOfStream => 0,
        })
        .max()
        .unwrap_or(0)
}
