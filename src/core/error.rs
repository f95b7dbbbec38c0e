use thiserror::Error;

/// Errors raised while building or validating signature definitions
///
/// These are configuration faults: they surface when a catalog is loaded
/// or compiled, never while a stream is being matched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureDefinitionError {
    #[error("Constant segment at {path} has no bytes")]
    EmptyConstant { path: String },

    #[error("Invalid hex value {value:?}: {reason}")]
    InvalidHex { value: String, reason: String },

    #[error("Unknown character encoding: {0}")]
    UnknownEncoding(String),

    #[error("Text {text:?} cannot be represented in {encoding}")]
    UnencodableText { text: String, encoding: String },

    #[error("Range segment at {path} has empty bounds")]
    EmptyRange { path: String },

    #[error("Range segment at {path} has bounds of different length ({min_len} vs {max_len})")]
    RangeLengthMismatch {
        path: String,
        min_len: usize,
        max_len: usize,
    },

    #[error("Range segment at {path} has a minimum greater than its maximum")]
    RangeInverted { path: String },

    #[error("Segment at {path} has minimum length {min} greater than maximum {max}")]
    InvertedLength { path: String, min: u64, max: u64 },

    #[error("Repeat segment at {path} has negative occurrence bound {value}")]
    NegativeOccurrence { path: String, value: i64 },

    #[error("Repeat segment at {path} has maximum occurrences {max} below minimum {min}")]
    InvertedOccurrence { path: String, min: i64, max: i64 },

    #[error("{kind} segment at {path} has no children")]
    EmptyContainer { path: String, kind: &'static str },

    #[error("{path} nests repeat and choice segments deeper than {limit} levels")]
    NestingTooDeep { path: String, limit: usize },

    #[error("Value segment at {path} is not preceded by a key in its sequence")]
    UnpairedValue { path: String },

    #[error("Signature '{0}' is registered more than once")]
    DuplicateSignature(String),

    #[error("Signature '{id}' names unknown technical parent '{parent}'")]
    UnknownParent { id: String, parent: String },

    #[error("Signature '{0}' is part of a technical-parent cycle")]
    ParentCycle(String),

    #[error("Signature '{id}': {source}")]
    InvalidSignature {
        id: String,
        #[source]
        source: Box<SignatureDefinitionError>,
    },
}

impl SignatureDefinitionError {
    /// Attaches the id of the signature being defined
    pub fn in_signature(self, id: &str) -> Self {
        match self {
            Self::InvalidSignature { .. } => self,
            other => Self::InvalidSignature {
                id: id.to_string(),
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SignatureDefinitionError>;
