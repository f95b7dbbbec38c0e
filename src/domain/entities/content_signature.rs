//! Content signature entity
//!
//! A content signature names a binary format and describes its byte-level
//! shape as one root sequence of segments.

use crate::core::Result;
use crate::domain::entities::{Length, Segment};
use std::fmt;

/// Identifier of the generic signature that labels the automaton root
pub const GENERIC_SIGNATURE_ID: &str = "application/octet-stream";

/// A declaratively described binary format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSignature {
    id: String,
    title: String,
    mimetype: String,
    is_abstract: bool,
    /// Technical parent id, used for is-a queries only
    parent: Option<String>,
    /// Children of the root sequence
    format: Vec<Segment>,
}

impl ContentSignature {
    /// Creates a concrete signature with the given root sequence children
    pub fn new(id: impl Into<String>, mimetype: impl Into<String>, format: Vec<Segment>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            mimetype: mimetype.into(),
            is_abstract: false,
            parent: None,
            format,
        }
    }

    /// The signature reported when nothing more specific matches
    pub fn generic() -> Self {
        Self::new(GENERIC_SIGNATURE_ID, GENERIC_SIGNATURE_ID, Vec::new())
            .with_title("Binary data")
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Marks the signature as an intermediate classification
    pub fn into_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_generic(&self) -> bool {
        self.id == GENERIC_SIGNATURE_ID
    }

    /// Children of the root sequence
    pub fn format(&self) -> &[Segment] {
        &self.format
    }

    /// The root sequence as a segment
    pub fn root(&self) -> Segment {
        Segment::Sequence(self.format.clone())
    }

    pub fn min_length(&self) -> u64 {
        self.format
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.min_length()))
    }

    pub fn max_length(&self) -> Length {
        self.format
            .iter()
            .fold(Length::ZERO, |acc, s| acc.saturating_add(s.max_length()))
    }

    /// Validates the root sequence, naming this signature in any error
    pub fn validate(&self) -> Result<()> {
        self.root()
            .validate_at("format")
            .map_err(|e| e.in_signature(&self.id))
    }
}

impl fmt::Display for ContentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.mimetype)
    }
}
