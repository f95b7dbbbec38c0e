//! Segment model
//!
//! A segment is one constraint on a span of bytes. Signatures are built
//! from a tree of segments rooted in a single sequence.

use crate::core::{Result, SignatureDefinitionError};
use encoding_rs::Encoding;
use std::fmt;

/// Deepest allowed nesting of repeat and choice segments
pub const MAX_NESTING_DEPTH: usize = 8;

/// Length of a byte span, possibly unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Length(u64);

impl Length {
    /// Sentinel for spans without an upper bound
    pub const INFINITE: Length = Length(u64::MAX);
    pub const ZERO: Length = Length(0);

    /// Creates a finite length, saturating just below the infinite sentinel
    pub fn finite(n: u64) -> Self {
        Self(n.min(u64::MAX - 1))
    }

    /// Returns true if this length has no upper bound
    pub fn is_infinite(self) -> bool {
        self.0 == u64::MAX
    }

    /// Returns the finite value, or `None` when unbounded
    pub fn get(self) -> Option<u64> {
        (!self.is_infinite()).then_some(self.0)
    }

    /// Returns true if `n` bytes fit within this length
    pub fn admits(self, n: u64) -> bool {
        self.is_infinite() || n <= self.0
    }

    /// Returns true if a span of `n` bytes has reached this bound
    pub fn reached_by(self, n: u64) -> bool {
        !self.is_infinite() && n >= self.0
    }

    pub fn saturating_add(self, other: Length) -> Length {
        if self.is_infinite() || other.is_infinite() {
            Length::INFINITE
        } else {
            Length::finite(self.0.saturating_add(other.0))
        }
    }

    /// Multiplies by an occurrence count (`None` meaning unbounded)
    pub fn times(self, count: Option<u64>) -> Length {
        match count {
            _ if self.0 == 0 => Length::ZERO,
            Some(0) => Length::ZERO,
            None => Length::INFINITE,
            Some(_) if self.is_infinite() => Length::INFINITE,
            Some(n) => Length::finite(self.0.saturating_mul(n)),
        }
    }
}

impl From<u64> for Length {
    fn from(n: u64) -> Self {
        Length::finite(n)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(n) => write!(f, "{}", n),
            None => write!(f, "inf"),
        }
    }
}

/// One constraint on a byte range within a signature
///
/// Containers (`Sequence`, `Repeat`, `Choice`) own their children; every
/// child belongs to exactly one container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Arbitrary bytes of `min..=max` length, discarded
    Any { min: u64, max: Length },
    /// Exact byte sequence
    Constant(Vec<u8>),
    /// Fixed-width big-endian unsigned value within `[min, max]`
    Range { min: Vec<u8>, max: Vec<u8> },
    /// Literal prefix followed by a variable-length name span
    Key { prefix: String, min: u64, max: Length },
    /// Variable-length span recorded under the preceding key
    Value { min: u64, max: Length },
    /// Matches only when the stream has no further bytes
    EndOfStream,
    /// All children, in order
    Sequence(Vec<Segment>),
    /// Inner sequence repeated between `min` and `max` times (inclusive)
    Repeat {
        sequence: Vec<Segment>,
        min: i64,
        max: Option<i64>,
    },
    /// Exactly one of the alternatives
    Choice(Vec<Segment>),
}

impl Segment {
    /// Fixed-length span of arbitrary bytes
    pub fn any(length: u64) -> Self {
        Segment::Any {
            min: length,
            max: Length::finite(length),
        }
    }

    /// Bounded (or unbounded) span of arbitrary bytes
    pub fn any_between(min: u64, max: Length) -> Self {
        Segment::Any { min, max }
    }

    pub fn constant(bytes: impl Into<Vec<u8>>) -> Self {
        Segment::Constant(bytes.into())
    }

    /// Constant from hex digits; whitespace between digits is ignored
    pub fn constant_hex(hex: &str) -> Result<Self> {
        Ok(Segment::Constant(decode_hex(hex)?))
    }

    /// Constant from text in the given encoding (UTF-8 when `None`)
    pub fn constant_text(text: &str, encoding: Option<&str>) -> Result<Self> {
        Ok(Segment::Constant(encode_text(text, encoding)?))
    }

    pub fn range(min: impl Into<Vec<u8>>, max: impl Into<Vec<u8>>) -> Self {
        Segment::Range {
            min: min.into(),
            max: max.into(),
        }
    }

    pub fn range_hex(min: &str, max: &str) -> Result<Self> {
        Ok(Segment::Range {
            min: decode_hex(min)?,
            max: decode_hex(max)?,
        })
    }

    /// Key with an unbounded name span
    pub fn key(prefix: impl Into<String>) -> Self {
        Segment::Key {
            prefix: prefix.into(),
            min: 0,
            max: Length::INFINITE,
        }
    }

    pub fn key_between(prefix: impl Into<String>, min: u64, max: Length) -> Self {
        Segment::Key {
            prefix: prefix.into(),
            min,
            max,
        }
    }

    /// Value with an unbounded span
    pub fn value() -> Self {
        Segment::Value {
            min: 0,
            max: Length::INFINITE,
        }
    }

    pub fn value_between(min: u64, max: Length) -> Self {
        Segment::Value { min, max }
    }

    pub fn eos() -> Self {
        Segment::EndOfStream
    }

    pub fn sequence(children: Vec<Segment>) -> Self {
        Segment::Sequence(children)
    }

    pub fn repeat(sequence: Vec<Segment>, min: i64, max: Option<i64>) -> Self {
        Segment::Repeat { sequence, min, max }
    }

    pub fn choice(alternatives: Vec<Segment>) -> Self {
        Segment::Choice(alternatives)
    }

    /// Declarative tag name of this segment kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Segment::Any { .. } => "any",
            Segment::Constant(_) => "constant",
            Segment::Range { .. } => "range",
            Segment::Key { .. } => "key",
            Segment::Value { .. } => "value",
            Segment::EndOfStream => "eos",
            Segment::Sequence(_) => "sequence",
            Segment::Repeat { .. } => "repeat",
            Segment::Choice(_) => "choice",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Segment::Sequence(_) | Segment::Repeat { .. } | Segment::Choice(_)
        )
    }

    /// Children of a container; empty for leaf segments
    pub fn children(&self) -> &[Segment] {
        match self {
            Segment::Sequence(children) | Segment::Choice(children) => children,
            Segment::Repeat { sequence, .. } => sequence,
            _ => &[],
        }
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    pub fn child_at(&self, index: usize) -> Option<&Segment> {
        self.children().get(index)
    }

    /// Minimum number of bytes this segment can match
    pub fn min_length(&self) -> u64 {
        match self {
            Segment::Any { min, .. } | Segment::Value { min, .. } => *min,
            Segment::Constant(bytes) => bytes.len() as u64,
            Segment::Range { min, .. } => min.len() as u64,
            Segment::Key { prefix, min, .. } => (prefix.len() as u64).saturating_add(*min),
            Segment::EndOfStream => 0,
            Segment::Sequence(children) => sum_min(children),
            Segment::Repeat { sequence, min, .. } => {
                sum_min(sequence).saturating_mul((*min).max(0) as u64)
            }
            Segment::Choice(alternatives) => alternatives
                .iter()
                .map(Segment::min_length)
                .min()
                .unwrap_or(0),
        }
    }

    /// Maximum number of bytes this segment can match
    pub fn max_length(&self) -> Length {
        match self {
            Segment::Any { max, .. } | Segment::Value { max, .. } => *max,
            Segment::Constant(bytes) => Length::finite(bytes.len() as u64),
            Segment::Range { max, .. } => Length::finite(max.len() as u64),
            Segment::Key { prefix, max, .. } => {
                Length::finite(prefix.len() as u64).saturating_add(*max)
            }
            Segment::EndOfStream => Length::ZERO,
            Segment::Sequence(children) => sum_max(children),
            Segment::Repeat { sequence, max, .. } => {
                sum_max(sequence).times(max.map(|m| m.max(0) as u64))
            }
            Segment::Choice(alternatives) => alternatives
                .iter()
                .map(Segment::max_length)
                .max()
                .unwrap_or(Length::ZERO),
        }
    }

    /// Number of repeat and choice segments on the deepest path through
    /// this segment; sequences do not count
    pub fn nesting_depth(&self) -> usize {
        let deepest = |children: &[Segment]| {
            children.iter().map(Segment::nesting_depth).max().unwrap_or(0)
        };
        match self {
            Segment::Sequence(children) => deepest(children),
            Segment::Repeat { sequence, .. } => 1 + deepest(sequence),
            Segment::Choice(alternatives) => 1 + deepest(alternatives),
            _ => 0,
        }
    }

    /// Checks the internal invariants of this segment and all children
    pub fn validate(&self) -> Result<()> {
        self.validate_at(self.kind_name())
    }

    pub(crate) fn validate_at(&self, path: &str) -> Result<()> {
        if matches!(self, Segment::Repeat { .. } | Segment::Choice(_))
            && self.nesting_depth() > MAX_NESTING_DEPTH
        {
            return Err(SignatureDefinitionError::NestingTooDeep {
                path: path.to_string(),
                limit: MAX_NESTING_DEPTH,
            });
        }

        match self {
            Segment::Any { min, max }
            | Segment::Key { min, max, .. }
            | Segment::Value { min, max } => check_bounds(path, *min, *max)?,
            Segment::Constant(bytes) => {
                if bytes.is_empty() {
                    return Err(SignatureDefinitionError::EmptyConstant {
                        path: path.to_string(),
                    });
                }
            }
            Segment::Range { min, max } => {
                if min.is_empty() || max.is_empty() {
                    return Err(SignatureDefinitionError::EmptyRange {
                        path: path.to_string(),
                    });
                }
                if min.len() != max.len() {
                    return Err(SignatureDefinitionError::RangeLengthMismatch {
                        path: path.to_string(),
                        min_len: min.len(),
                        max_len: max.len(),
                    });
                }
                // equal width, so lexicographic order is numeric order
                if min > max {
                    return Err(SignatureDefinitionError::RangeInverted {
                        path: path.to_string(),
                    });
                }
            }
            Segment::EndOfStream => {}
            Segment::Sequence(children) => {
                non_empty(path, "sequence", children)?;
                validate_children(path, children)?;
            }
            Segment::Repeat { sequence, min, max } => {
                if *min < 0 {
                    return Err(SignatureDefinitionError::NegativeOccurrence {
                        path: path.to_string(),
                        value: *min,
                    });
                }
                if let Some(max) = max {
                    if *max < 0 {
                        return Err(SignatureDefinitionError::NegativeOccurrence {
                            path: path.to_string(),
                            value: *max,
                        });
                    }
                    if max < min {
                        return Err(SignatureDefinitionError::InvertedOccurrence {
                            path: path.to_string(),
                            min: *min,
                            max: *max,
                        });
                    }
                }
                non_empty(path, "repeat", sequence)?;
                validate_children(path, sequence)?;
            }
            Segment::Choice(alternatives) => {
                non_empty(path, "choice", alternatives)?;
                for (index, alternative) in alternatives.iter().enumerate() {
                    alternative.validate_at(&child_path(path, alternative, index))?;
                }
            }
        }

        let (min, max) = (self.min_length(), self.max_length());
        if !max.admits(min) {
            return Err(SignatureDefinitionError::InvertedLength {
                path: path.to_string(),
                min,
                max: max.get().unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }
}

/// Returns true if the key at `index` is followed by a value before the
/// next key of the same sequence
pub(crate) fn key_is_paired(children: &[Segment], index: usize) -> bool {
    children[index + 1..]
        .iter()
        .take_while(|s| !matches!(s, Segment::Key { .. }))
        .any(|s| matches!(s, Segment::Value { .. }))
}

fn validate_children(path: &str, children: &[Segment]) -> Result<()> {
    let mut key_open = false;
    for (index, child) in children.iter().enumerate() {
        let child_path = child_path(path, child, index);
        match child {
            Segment::Key { .. } => key_open = true,
            Segment::Value { .. } if !key_open => {
                return Err(SignatureDefinitionError::UnpairedValue { path: child_path });
            }
            Segment::Value { .. } => key_open = false,
            _ => {}
        }
        child.validate_at(&child_path)?;
    }
    Ok(())
}

fn child_path(path: &str, child: &Segment, index: usize) -> String {
    format!("{}/{}[{}]", path, child.kind_name(), index)
}

fn non_empty(path: &str, kind: &'static str, children: &[Segment]) -> Result<()> {
    if children.is_empty() {
        return Err(SignatureDefinitionError::EmptyContainer {
            path: path.to_string(),
            kind,
        });
    }
    Ok(())
}

fn check_bounds(path: &str, min: u64, max: Length) -> Result<()> {
    if !max.admits(min) {
        return Err(SignatureDefinitionError::InvertedLength {
            path: path.to_string(),
            min,
            max: max.get().unwrap_or(u64::MAX),
        });
    }
    Ok(())
}

fn sum_min(children: &[Segment]) -> u64 {
    children
        .iter()
        .fold(0u64, |acc, s| acc.saturating_add(s.min_length()))
}

fn sum_max(children: &[Segment]) -> Length {
    children
        .iter()
        .fold(Length::ZERO, |acc, s| acc.saturating_add(s.max_length()))
}

fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let digits: String = value.split_whitespace().collect();
    hex::decode(&digits).map_err(|e| SignatureDefinitionError::InvalidHex {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn encode_text(text: &str, label: Option<&str>) -> Result<Vec<u8>> {
    let label = label.unwrap_or("UTF-8");

    // encoding_rs only decodes UTF-16, so encode it by hand
    match label.to_ascii_uppercase().as_str() {
        "UTF-16LE" => return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        "UTF-16BE" | "UTF-16" => {
            return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
        }
        _ => {}
    }

    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| SignatureDefinitionError::UnknownEncoding(label.to_string()))?;
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(SignatureDefinitionError::UnencodableText {
            text: text.to_string(),
            encoding: encoding.name().to_string(),
        });
    }
    Ok(bytes.into_owned())
}
