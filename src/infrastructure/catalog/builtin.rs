//! Built-in catalog
//!
//! A small catalog of common formats embedded in the binary.

use crate::domain::repositories::{CatalogError, CatalogSource};
use crate::domain::services::{DefinitionPolicy, SignatureCatalog};
use crate::infrastructure::catalog::JsonCatalog;

/// The embedded catalog document
pub const BUILTIN_CATALOG: &str = include_str!("../../../catalogs/builtin.json");

pub fn builtin_source() -> JsonCatalog {
    JsonCatalog::from_text("builtin", BUILTIN_CATALOG)
}

impl SignatureCatalog {
    /// Catalog holding the embedded signatures
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        catalog.load_from(&builtin_source(), DefinitionPolicy::Strict)?;
        Ok(catalog)
    }
}
