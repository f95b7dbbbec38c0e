//! Incremental matcher
//!
//! A [`MatchState`] is one stream's position in the shared
//! [`DecisionGraph`]. Each call to [`MatchState::detect`] consumes as much
//! of the supplied buffer as can be decided and leaves the rest in place.
//!
//! Decisions are made only on bytes that are actually present: an edge test
//! that would need more bytes than are buffered stalls the state instead of
//! guessing, so the outcome does not depend on how the stream is chunked.

use crate::domain::entities::{ContentSignature, Length, Metadata};
use crate::domain::services::decision::{DecisionGraph, Edge, NodeId, SpanKind, Step};
use bytes::Buf;
use std::collections::HashSet;
use std::sync::Arc;

/// Bytes of a key or value span kept for the metadata map
pub const MAX_CAPTURE_BYTES: usize = 64 * 1024;

/// Recursion limit when peeking through nested containers
///
/// Validation caps container nesting at
/// [`MAX_NESTING_DEPTH`](crate::domain::entities::MAX_NESTING_DEPTH), which
/// keeps valid signatures well below this bound.
const MAX_PEEK_DEPTH: u8 = 64;

/// Result of advancing a match state against new input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing could be decided; the state is unchanged
    Stalled,
    /// Some input was decided; more is needed to continue
    Advanced,
    /// A signature definition has been matched to its end
    Complete,
    /// No deeper signature can match; the classification reached so far
    /// stands
    Rejected,
}

/// Local answer to "does this edge match at the current position"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Peek {
    Match,
    NoMatch,
    NeedMore,
    /// Nothing follows: the signature definition ends here
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    Direct,
    Alternative(usize),
    Iterate,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Take(Branch),
    NoMatch,
    NeedMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Repeat {
        entry: NodeId,
        min: u64,
        max: Option<u64>,
        count: u64,
        started_at: u64,
        resume: NodeId,
    },
    Choice {
        resume: NodeId,
    },
}

impl Frame {
    fn resume(&self) -> NodeId {
        match self {
            Frame::Repeat { resume, .. } | Frame::Choice { resume } => *resume,
        }
    }
}

/// Frames visible to a peek: the live stack, possibly extended with
/// frames of containers the peek is looking into
#[derive(Clone, Copy)]
enum Scope<'a> {
    Stack(&'a [Frame]),
    Nested(&'a Frame, &'a Scope<'a>),
}

impl<'a> Scope<'a> {
    fn pop(self) -> Option<(&'a Frame, Scope<'a>)> {
        match self {
            Scope::Stack(frames) => frames
                .split_last()
                .map(|(last, rest)| (last, Scope::Stack(rest))),
            Scope::Nested(frame, parent) => Some((frame, *parent)),
        }
    }
}

/// Bytes visible to a peek, anchored at a stream position
#[derive(Clone, Copy)]
struct Look<'w> {
    window: &'w [u8],
    at_end: bool,
    /// Stream position of `window[0]`
    position: u64,
}

impl<'w> Look<'w> {
    fn skip(self, n: usize) -> Self {
        Look {
            window: &self.window[n..],
            at_end: self.at_end,
            position: self.position + n as u64,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveSpan {
    from: NodeId,
    edge: usize,
    consumed: u64,
    captured: Vec<u8>,
}

enum Flow {
    Continue,
    Stall,
    Complete,
    Reject,
}

enum Action {
    Take(usize, Branch),
    Iterate,
    Resume,
    Stall,
    Complete,
    Reject,
}

enum SpanAction {
    Consume(usize),
    Finish,
    Stall,
    Reject,
}

/// One stream's position in the decision graph
#[derive(Debug, Clone)]
pub struct MatchState {
    node: NodeId,
    frames: Vec<Frame>,
    span: Option<ActiveSpan>,
    pending_key: Option<String>,
    /// Metadata keys written by this stream, as opposed to caller-seeded
    derived: HashSet<String>,
    position: u64,
    moves: u64,
    label: usize,
    concrete: usize,
    trail: Option<Vec<NodeId>>,
}

impl MatchState {
    /// A state positioned at the root of the graph
    pub fn new() -> Self {
        Self {
            node: DecisionGraph::ROOT,
            frames: Vec::new(),
            span: None,
            pending_key: None,
            derived: HashSet::new(),
            position: 0,
            moves: 0,
            label: 0,
            concrete: 0,
            trail: None,
        }
    }

    /// Records every node entered, starting with the root
    pub fn traced() -> Self {
        let mut state = Self::new();
        state.trail = Some(vec![DecisionGraph::ROOT]);
        state
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Bytes consumed from the stream so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn trail(&self) -> Option<&[NodeId]> {
        self.trail.as_deref()
    }

    /// Most specific signature reached, abstract or not
    pub fn signature<'g>(&self, graph: &'g DecisionGraph) -> &'g Arc<ContentSignature> {
        graph.signature(self.label)
    }

    /// Most specific concrete signature reached
    pub fn concrete_signature<'g>(&self, graph: &'g DecisionGraph) -> &'g Arc<ContentSignature> {
        graph.signature(self.concrete)
    }

    /// Advances against the buffered bytes
    ///
    /// Consumed bytes are advanced out of `buffer`; undecided bytes stay
    /// there and must be presented again, followed by more input, on the
    /// next call. `buffer.chunk()` must expose all remaining bytes.
    pub fn detect<B: Buf>(
        &mut self,
        graph: &DecisionGraph,
        buffer: &mut B,
        metadata: &mut Metadata,
        end_of_stream: bool,
    ) -> Transition {
        let before = self.moves;
        loop {
            let flow = if self.span.is_some() {
                self.advance_span(graph, buffer, metadata, end_of_stream)
            } else {
                self.advance_node(graph, buffer, end_of_stream)
            };

            match flow {
                Flow::Continue => {}
                Flow::Stall if self.moves == before => return Transition::Stalled,
                Flow::Stall => return Transition::Advanced,
                Flow::Complete => return Transition::Complete,
                Flow::Reject => return Transition::Rejected,
            }
        }
    }

    fn look<'w, B: Buf>(&self, buffer: &'w B, end_of_stream: bool) -> Look<'w> {
        let window = buffer.chunk();
        Look {
            window,
            at_end: end_of_stream && window.len() == buffer.remaining(),
            position: self.position,
        }
    }

    fn advance_node<B: Buf>(&mut self, graph: &DecisionGraph, buffer: &mut B, end_of_stream: bool) -> Flow {
        let action = self.decide(graph, self.look(buffer, end_of_stream));

        match action {
            Action::Take(index, branch) => self.take_edge(graph, buffer, index, branch),
            Action::Iterate => {
                let position = self.position;
                let entry = match self.frames.last_mut() {
                    Some(Frame::Repeat {
                        entry,
                        count,
                        started_at,
                        ..
                    }) => {
                        *count += 1;
                        *started_at = position;
                        *entry
                    }
                    _ => return Flow::Reject,
                };
                self.enter(graph, entry);
                Flow::Continue
            }
            Action::Resume => match self.frames.pop() {
                Some(frame) => {
                    self.enter(graph, frame.resume());
                    Flow::Continue
                }
                None => Flow::Reject,
            },
            Action::Stall => Flow::Stall,
            Action::Complete => Flow::Complete,
            Action::Reject => Flow::Reject,
        }
    }

    fn decide(&self, graph: &DecisionGraph, look: Look<'_>) -> Action {
        let node = graph.node(self.node);
        if node.edges().is_empty() && self.frames.is_empty() {
            return Action::Complete;
        }

        let scope = Scope::Stack(&self.frames);
        for (index, edge) in node.edges().iter().enumerate() {
            match self.peek_edge(graph, edge, look, scope, 0) {
                Outcome::Take(branch) => return Action::Take(index, branch),
                Outcome::NeedMore => return Action::Stall,
                Outcome::NoMatch => {}
            }
        }

        if !node.is_exit() {
            return Action::Reject;
        }

        match self.frames.split_last() {
            None => Action::Reject,
            Some((Frame::Choice { .. }, _)) => Action::Resume,
            Some((
                Frame::Repeat {
                    entry,
                    min,
                    max,
                    count,
                    started_at,
                    resume,
                },
                rest,
            )) => {
                let next = count + 1;
                // an iteration that consumed nothing would loop forever
                let progressed = self.position > *started_at;

                if progressed && max.is_none_or(|m| next < m) {
                    let frame = Frame::Repeat {
                        entry: *entry,
                        min: *min,
                        max: *max,
                        count: next,
                        started_at: self.position,
                        resume: *resume,
                    };
                    let outer = Scope::Stack(rest);
                    match self.peek_body(graph, *entry, look, Scope::Nested(&frame, &outer), 0) {
                        Peek::Match | Peek::Open => return Action::Iterate,
                        Peek::NeedMore => return Action::Stall,
                        Peek::NoMatch => {}
                    }
                }

                // an empty iteration can be repeated up to any minimum
                if next >= *min || !progressed {
                    Action::Resume
                } else {
                    Action::Reject
                }
            }
        }
    }

    fn take_edge<B: Buf>(&mut self, graph: &DecisionGraph, buffer: &mut B, index: usize, branch: Branch) -> Flow {
        let edge = &graph.node(self.node).edges()[index];
        let target = edge.target;

        match (&edge.step, branch) {
            (Step::Constant(bytes), _) => {
                self.consume(buffer, bytes.len());
                self.enter(graph, target);
            }
            (Step::Range { min, .. }, _) => {
                self.consume(buffer, min.len());
                self.enter(graph, target);
            }
            (Step::EndOfStream, _) => self.enter(graph, target),
            (Step::Span { .. }, _) => {
                self.span = Some(ActiveSpan {
                    from: self.node,
                    edge: index,
                    consumed: 0,
                    captured: Vec::new(),
                });
                self.moves += 1;
            }
            (Step::Choice(entries), Branch::Alternative(alternative)) => {
                self.frames.push(Frame::Choice { resume: target });
                self.enter(graph, entries[alternative]);
            }
            (Step::Repeat { entry, min, max }, Branch::Iterate) => {
                self.frames.push(Frame::Repeat {
                    entry: *entry,
                    min: *min,
                    max: *max,
                    count: 0,
                    started_at: self.position,
                    resume: target,
                });
                self.enter(graph, *entry);
            }
            (Step::Repeat { .. }, Branch::Skip) => self.enter(graph, target),
            _ => return Flow::Reject,
        }
        Flow::Continue
    }

    fn advance_span<B: Buf>(
        &mut self,
        graph: &DecisionGraph,
        buffer: &mut B,
        metadata: &mut Metadata,
        end_of_stream: bool,
    ) -> Flow {
        let Some(span) = self.span.as_ref() else {
            return Flow::Continue;
        };
        let edge = &graph.node(span.from).edges()[span.edge];
        let Step::Span { min, max, .. } = &edge.step else {
            return Flow::Reject;
        };
        let (min, max, target, consumed) = (*min, *max, edge.target, span.consumed);

        let action = {
            let look = self.look(buffer, end_of_stream);
            let window = look.window;

            if consumed < min {
                let take = (min - consumed).min(window.len() as u64) as usize;
                match take {
                    0 if look.at_end => SpanAction::Reject,
                    0 => SpanAction::Stall,
                    n => SpanAction::Consume(n),
                }
            } else if max.reached_by(consumed) {
                SpanAction::Finish
            } else {
                let peek = self.peek_node(graph, target, look, Scope::Stack(&self.frames), 0);
                match peek {
                    Peek::Match => SpanAction::Finish,
                    Peek::NeedMore => SpanAction::Stall,
                    Peek::NoMatch | Peek::Open if window.is_empty() => {
                        if look.at_end {
                            SpanAction::Finish
                        } else {
                            SpanAction::Stall
                        }
                    }
                    Peek::NoMatch | Peek::Open => {
                        let room = max.get().map_or(u64::MAX, |m| m - consumed);
                        let wanted = if peek == Peek::Open {
                            window.len()
                        } else {
                            skip_hint(graph, target, window)
                        };
                        SpanAction::Consume((wanted as u64).min(room) as usize)
                    }
                }
            }
        };

        match action {
            SpanAction::Consume(n) => {
                if let Some(span) = self.span.as_mut() {
                    let keep = matches!(
                        edge.step,
                        Step::Span {
                            kind: SpanKind::Key { .. } | SpanKind::Value,
                            ..
                        }
                    );
                    if keep {
                        let room = MAX_CAPTURE_BYTES.saturating_sub(span.captured.len());
                        span.captured.extend_from_slice(&buffer.chunk()[..n.min(room)]);
                    }
                    span.consumed += n as u64;
                }
                self.consume(buffer, n);
                Flow::Continue
            }
            SpanAction::Finish => {
                self.finish_span(graph, metadata);
                Flow::Continue
            }
            SpanAction::Stall => Flow::Stall,
            SpanAction::Reject => Flow::Reject,
        }
    }

    fn finish_span(&mut self, graph: &DecisionGraph, metadata: &mut Metadata) {
        let Some(span) = self.span.take() else {
            return;
        };
        let edge = &graph.node(span.from).edges()[span.edge];

        if let Step::Span { kind, .. } = &edge.step {
            let text = || String::from_utf8_lossy(&span.captured).into_owned();
            match kind {
                SpanKind::Any => {}
                SpanKind::Key { name, paired: true } => {
                    self.pending_key = Some(format!("{}{}", name, text()));
                }
                SpanKind::Key { name, paired: false } => self.record(metadata, name.clone(), text()),
                SpanKind::Value => {
                    if let Some(key) = self.pending_key.take() {
                        self.record(metadata, key, text());
                    }
                }
            }
        }
        self.enter(graph, edge.target);
    }

    /// Stream-derived values overwrite each other; caller-seeded ones stay
    fn record(&mut self, metadata: &mut Metadata, key: String, value: String) {
        if metadata.contains_key(&key) && !self.derived.contains(&key) {
            tracing::trace!(key = %key, "keeping caller-supplied metadata value");
            return;
        }
        tracing::trace!(key = %key, value = %value, "extracted metadata");
        self.derived.insert(key.clone());
        metadata.insert(key, value);
    }

    fn peek_edge(&self, graph: &DecisionGraph, edge: &Edge, look: Look<'_>, scope: Scope<'_>, depth: u8) -> Outcome {
        let direct = |peek: Peek| match peek {
            Peek::Match | Peek::Open => Outcome::Take(Branch::Direct),
            Peek::NoMatch => Outcome::NoMatch,
            Peek::NeedMore => Outcome::NeedMore,
        };
        let window = look.window;

        match &edge.step {
            Step::Constant(bytes) => direct(compare_constant(bytes, window, look.at_end)),
            Step::Range { min, max } => direct(compare_range(min, max, window, look.at_end)),
            Step::EndOfStream => match (window.is_empty(), look.at_end) {
                (false, _) => Outcome::NoMatch,
                (true, true) => Outcome::Take(Branch::Direct),
                (true, false) => Outcome::NeedMore,
            },
            Step::Span { min, .. } => {
                if look.at_end && (window.len() as u64) < *min {
                    Outcome::NoMatch
                } else if look.at_end && window.is_empty() {
                    // only an empty span is possible; it fits if what follows does
                    direct(self.peek_node(graph, edge.target, look, scope, depth + 1))
                } else {
                    Outcome::Take(Branch::Direct)
                }
            }
            Step::Choice(entries) => {
                let frame = Frame::Choice {
                    resume: edge.target,
                };
                for (alternative, entry) in entries.iter().enumerate() {
                    match self.peek_node(graph, *entry, look, Scope::Nested(&frame, &scope), depth + 1) {
                        Peek::Match | Peek::Open => {
                            return Outcome::Take(Branch::Alternative(alternative));
                        }
                        Peek::NeedMore => return Outcome::NeedMore,
                        Peek::NoMatch => {}
                    }
                }
                Outcome::NoMatch
            }
            Step::Repeat { entry, min, max } => {
                if *max != Some(0) {
                    let frame = Frame::Repeat {
                        entry: *entry,
                        min: *min,
                        max: *max,
                        count: 0,
                        started_at: look.position,
                        resume: edge.target,
                    };
                    match self.peek_body(graph, *entry, look, Scope::Nested(&frame, &scope), depth + 1) {
                        Peek::Match | Peek::Open => return Outcome::Take(Branch::Iterate),
                        Peek::NeedMore => return Outcome::NeedMore,
                        Peek::NoMatch => {}
                    }
                }
                if *min > 0 {
                    return Outcome::NoMatch;
                }
                match self.peek_node(graph, edge.target, look, scope, depth + 1) {
                    Peek::Match | Peek::Open => Outcome::Take(Branch::Skip),
                    Peek::NoMatch => Outcome::NoMatch,
                    Peek::NeedMore => Outcome::NeedMore,
                }
            }
        }
    }

    /// Peeks the first edge that can be taken from a node
    fn peek_node(&self, graph: &DecisionGraph, id: NodeId, look: Look<'_>, scope: Scope<'_>, depth: u8) -> Peek {
        if depth > MAX_PEEK_DEPTH {
            return Peek::NoMatch;
        }

        let node = graph.node(id);
        for edge in node.edges() {
            match self.peek_edge(graph, edge, look, scope, depth) {
                Outcome::Take(_) => return Peek::Match,
                Outcome::NeedMore => return Peek::NeedMore,
                Outcome::NoMatch => {}
            }
        }

        if node.is_exit() {
            self.peek_exit(graph, look, scope, depth)
        } else if node.edges().is_empty() {
            Peek::Open
        } else {
            Peek::NoMatch
        }
    }

    /// Peeks a repeat body from `id` through its fixed-width and bounded
    /// segments, up to the first unbounded span or nested container
    ///
    /// A body matched to its exit node is a match; what follows the body is
    /// decided when the iteration ends.
    fn peek_body(&self, graph: &DecisionGraph, id: NodeId, look: Look<'_>, scope: Scope<'_>, depth: u8) -> Peek {
        if depth > MAX_PEEK_DEPTH {
            return Peek::NoMatch;
        }

        let node = graph.node(id);
        for edge in node.edges() {
            let peek = match &edge.step {
                Step::Constant(bytes) => match compare_constant(bytes, look.window, look.at_end) {
                    Peek::Match => self.peek_body(graph, edge.target, look.skip(bytes.len()), scope, depth),
                    other => other,
                },
                Step::Range { min, max } => match compare_range(min, max, look.window, look.at_end) {
                    Peek::Match => self.peek_body(graph, edge.target, look.skip(min.len()), scope, depth),
                    other => other,
                },
                Step::Span { min, max, .. } if !max.is_infinite() => {
                    self.peek_span(graph, edge.target, *min, *max, look, scope, depth)
                }
                _ => match self.peek_edge(graph, edge, look, scope, depth) {
                    Outcome::Take(_) => Peek::Match,
                    Outcome::NeedMore => Peek::NeedMore,
                    Outcome::NoMatch => Peek::NoMatch,
                },
            };
            match peek {
                Peek::Match | Peek::Open => return Peek::Match,
                Peek::NeedMore => return Peek::NeedMore,
                Peek::NoMatch => {}
            }
        }

        if node.is_exit() { Peek::Match } else { Peek::NoMatch }
    }

    /// Follows a bounded span the way the matcher would: it ends at the
    /// first position where what follows matches, or at its maximum
    fn peek_span(
        &self,
        graph: &DecisionGraph,
        target: NodeId,
        min: u64,
        max: Length,
        look: Look<'_>,
        scope: Scope<'_>,
        depth: u8,
    ) -> Peek {
        let available = look.window.len() as u64;
        let mut length = min;

        loop {
            if length > available {
                return if look.at_end { Peek::NoMatch } else { Peek::NeedMore };
            }
            let rest = look.skip(length as usize);
            if max.reached_by(length) {
                return self.peek_body(graph, target, rest, scope, depth);
            }

            match self.peek_node(graph, target, rest, scope, depth + 1) {
                Peek::Match | Peek::Open => return self.peek_body(graph, target, rest, scope, depth),
                Peek::NeedMore => return Peek::NeedMore,
                Peek::NoMatch if rest.window.is_empty() => {
                    return if look.at_end {
                        self.peek_body(graph, target, rest, scope, depth)
                    } else {
                        Peek::NeedMore
                    };
                }
                Peek::NoMatch => length += 1,
            }
        }
    }

    /// Peeks what follows the end of the innermost container in `scope`
    fn peek_exit(&self, graph: &DecisionGraph, look: Look<'_>, scope: Scope<'_>, depth: u8) -> Peek {
        let Some((frame, rest)) = scope.pop() else {
            return Peek::Open;
        };

        if let Frame::Repeat {
            entry,
            min,
            max,
            count,
            started_at,
            resume,
        } = frame
        {
            let next = count + 1;
            let progressed = look.position > *started_at;
            if progressed && max.is_none_or(|m| next < m) {
                let again = Frame::Repeat {
                    entry: *entry,
                    min: *min,
                    max: *max,
                    count: next,
                    started_at: look.position,
                    resume: *resume,
                };
                match self.peek_node(graph, *entry, look, Scope::Nested(&again, &rest), depth + 1) {
                    Peek::Match | Peek::Open => return Peek::Match,
                    Peek::NeedMore => return Peek::NeedMore,
                    Peek::NoMatch => {}
                }
            }
            if progressed && next < *min {
                return Peek::NoMatch;
            }
        }

        self.peek_node(graph, frame.resume(), look, rest, depth + 1)
    }

    fn consume<B: Buf>(&mut self, buffer: &mut B, n: usize) {
        buffer.advance(n);
        self.position += n as u64;
        self.moves += 1;
    }

    fn enter(&mut self, graph: &DecisionGraph, id: NodeId) {
        self.node = id;
        self.moves += 1;
        if let Some(trail) = self.trail.as_mut() {
            trail.push(id);
        }
        if let Some(label) = graph.node(id).label() {
            self.label = label;
            if !graph.signature(label).is_abstract() {
                self.concrete = label;
            }
        }
        tracing::trace!(node = id, position = self.position, "entered decision node");
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

/// Constant test; a prefix that already differs is rejected early
fn compare_constant(expected: &[u8], window: &[u8], at_end: bool) -> Peek {
    let n = expected.len().min(window.len());
    if expected[..n] != window[..n] {
        Peek::NoMatch
    } else if n == expected.len() {
        Peek::Match
    } else if at_end {
        Peek::NoMatch
    } else {
        Peek::NeedMore
    }
}

/// Big-endian range test; equal-width slices compare lexicographically
/// in numeric order
fn compare_range(min: &[u8], max: &[u8], window: &[u8], at_end: bool) -> Peek {
    let width = min.len();
    if window.len() >= width {
        let value = &window[..width];
        return if value >= min && value <= max {
            Peek::Match
        } else {
            Peek::NoMatch
        };
    }

    let n = window.len();
    let prefix = &window[..n];
    if at_end || prefix < &min[..n] || prefix > &max[..n] {
        Peek::NoMatch
    } else {
        Peek::NeedMore
    }
}

/// Bytes a span may skip without missing a possible match of what follows
///
/// When every way forward begins with a constant, no position before the
/// next occurrence of one of their first bytes can match.
fn skip_hint(graph: &DecisionGraph, target: NodeId, window: &[u8]) -> usize {
    let mut firsts = Vec::with_capacity(3);
    if !leading_bytes(graph, target, &mut firsts, 0) {
        return 1;
    }

    let rest = &window[1..];
    let found = match firsts.as_slice() {
        [] => None,
        [a] => memchr::memchr(*a, rest),
        [a, b] => memchr::memchr2(*a, *b, rest),
        [a, b, c] => memchr::memchr3(*a, *b, *c, rest),
        set => rest.iter().position(|byte| set.contains(byte)),
    };
    found.map_or(window.len(), |p| p + 1)
}

/// Collects the first byte of every way forward from `id`
///
/// Returns false when some way forward can start with an arbitrary byte.
/// End of stream contributes no byte: it never matches inside a window.
fn leading_bytes(graph: &DecisionGraph, id: NodeId, firsts: &mut Vec<u8>, depth: u8) -> bool {
    let node = graph.node(id);
    if node.is_exit() || node.edges().is_empty() || depth > MAX_PEEK_DEPTH {
        return false;
    }

    node.edges().iter().all(|edge| match &edge.step {
        Step::Constant(bytes) => match bytes.first() {
            Some(&first) => {
                if !firsts.contains(&first) {
                    firsts.push(first);
                }
                true
            }
            None => false,
        },
        Step::EndOfStream => true,
        Step::Choice(entries) => entries
            .iter()
            .all(|&entry| leading_bytes(graph, entry, firsts, depth + 1)),
        _ => false,
    })
}
