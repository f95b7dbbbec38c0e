//! Domain entities
//!
//! The declarative vocabulary of the detector: segments, the signatures
//! built from them, and the metadata extracted while matching.

mod content_signature;
mod segment;

pub(crate) use segment::key_is_paired;

pub use content_signature::{ContentSignature, GENERIC_SIGNATURE_ID};
pub use segment::{Length, Segment, MAX_NESTING_DEPTH};

/// Key/value fields extracted from a stream
pub type Metadata = std::collections::BTreeMap<String, String>;
