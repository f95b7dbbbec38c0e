//! Catalog source trait
//!
//! Where signature definitions come from: a declarative file, an embedded
//! document, or anything else that can produce signatures.

use crate::core::SignatureDefinitionError;
use crate::domain::entities::ContentSignature;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog {source_name}: {message}")]
    Parse { source_name: String, message: String },

    #[error("Signature '{id}' is malformed: {message}")]
    Schema { id: String, message: String },

    #[error(transparent)]
    Definition(#[from] SignatureDefinitionError),
}

/// Provider of signature definitions
pub trait CatalogSource {
    /// Name used in log messages and errors
    fn name(&self) -> &str;

    /// Produces the signatures in declaration order
    fn load(&self) -> Result<Vec<ContentSignature>, CatalogError>;
}
