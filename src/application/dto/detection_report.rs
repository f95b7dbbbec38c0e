//! Detection report DTO

use crate::domain::entities::{ContentSignature, Metadata};
use crate::domain::services::NodeId;
use serde::Serialize;
use std::fmt;

/// How detection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionOutcome {
    /// A known signature was recognised
    Matched,
    /// No known signature matches the stream
    NoMatch,
    /// The scan limit was reached before a decision
    Indeterminate,
}

impl fmt::Display for DetectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionOutcome::Matched => write!(f, "matched"),
            DetectionOutcome::NoMatch => write!(f, "no match"),
            DetectionOutcome::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// Result of detecting one stream
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    /// Where the stream came from, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Signature id
    pub signature: String,
    pub title: String,
    pub mimetype: String,
    pub outcome: DetectionOutcome,
    pub metadata: Metadata,
    /// Bytes the matcher consumed
    pub bytes_examined: u64,
    /// Bytes read from the stream, including lookahead
    pub bytes_read: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail: Option<Vec<NodeId>>,
}

impl DetectionReport {
    pub fn new(signature: &ContentSignature, outcome: DetectionOutcome, metadata: Metadata) -> Self {
        Self {
            source: None,
            signature: signature.id().to_string(),
            title: signature.title().to_string(),
            mimetype: signature.mimetype().to_string(),
            outcome,
            metadata,
            bytes_examined: 0,
            bytes_read: 0,
            trail: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_match(&self) -> bool {
        self.outcome == DetectionOutcome::Matched
    }
}

impl fmt::Display for DetectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{}: ", source)?;
        }
        write!(f, "{} ({})", self.title, self.mimetype)?;
        if self.outcome != DetectionOutcome::Matched {
            write!(f, " [{}]", self.outcome)?;
        }
        for (key, value) in &self.metadata {
            write!(f, " {}={:?}", key, value)?;
        }
        Ok(())
    }
}
