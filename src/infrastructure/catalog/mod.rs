//! Catalog sources
//!
//! Declarative signature catalogs: JSON files and the embedded built-in set.

mod builtin;
mod json_catalog;

pub use builtin::{builtin_source, BUILTIN_CATALOG};
pub use json_catalog::JsonCatalog;

use crate::domain::repositories::CatalogError;
use crate::domain::services::{DefinitionPolicy, SignatureCatalog};
use std::path::PathBuf;

/// Builds a catalog from JSON files, optionally preceded by the built-in set
pub fn load_catalog(
    paths: &[PathBuf],
    include_builtin: bool,
    policy: DefinitionPolicy,
) -> Result<SignatureCatalog, CatalogError> {
    let mut catalog = SignatureCatalog::new();
    if include_builtin {
        catalog.load_from(&builtin_source(), policy)?;
    }
    for path in paths {
        catalog.load_from(&JsonCatalog::from_path(path).with_policy(policy), policy)?;
    }
    Ok(catalog)
}
