//! Crate-wide error definitions

mod error;

pub use error::{Result, SignatureDefinitionError};
