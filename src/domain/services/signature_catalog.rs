//! Signature catalog service
//!
//! Holds the registered signatures by id, answers technical-parent
//! queries, and compiles the set into a processor factory.

use crate::core::{Result, SignatureDefinitionError};
use crate::domain::entities::ContentSignature;
use crate::domain::repositories::{CatalogError, CatalogSource};
use crate::domain::services::compiler::{CompilerOptions, DefinitionPolicy};
use crate::domain::services::processor::ProcessorFactory;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Registered signatures, in registration order
#[derive(Debug, Clone, Default)]
pub struct SignatureCatalog {
    signatures: Vec<Arc<ContentSignature>>,
    index: HashMap<String, usize>,
}

impl SignatureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and adds a signature
    pub fn register(&mut self, signature: ContentSignature) -> Result<()> {
        if self.index.contains_key(signature.id()) {
            return Err(SignatureDefinitionError::DuplicateSignature(
                signature.id().to_string(),
            ));
        }
        signature.validate()?;

        self.index
            .insert(signature.id().to_string(), self.signatures.len());
        self.signatures.push(Arc::new(signature));
        Ok(())
    }

    /// Registers everything a source provides
    ///
    /// Under the lenient policy, signatures that fail registration are
    /// logged and skipped. Returns the number registered.
    pub fn load_from(
        &mut self,
        source: &dyn CatalogSource,
        policy: DefinitionPolicy,
    ) -> std::result::Result<usize, CatalogError> {
        let mut registered = 0;
        for signature in source.load()? {
            let id = signature.id().to_string();
            match (self.register(signature), policy) {
                (Ok(()), _) => registered += 1,
                (Err(e), DefinitionPolicy::Strict) => return Err(e.into()),
                (Err(e), DefinitionPolicy::Lenient) => {
                    tracing::warn!(source = source.name(), signature = %id, error = %e, "skipping signature");
                }
            }
        }

        tracing::info!(source = source.name(), registered, "loaded signature catalog");
        Ok(registered)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ContentSignature>> {
        self.index.get(id).map(|&i| &self.signatures[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ContentSignature>> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Registered technical parent of `id`
    pub fn parent_of(&self, id: &str) -> Option<&Arc<ContentSignature>> {
        self.get(id)?.parent().and_then(|parent| self.get(parent))
    }

    /// Technical parents of `id`, nearest first
    ///
    /// Stops at the first unregistered parent or repeated id.
    pub fn ancestors(&self, id: &str) -> Vec<&Arc<ContentSignature>> {
        let mut seen = HashSet::from([id]);
        let mut chain = Vec::new();
        let mut current = self.parent_of(id);

        while let Some(parent) = current {
            if !seen.insert(parent.id()) {
                break;
            }
            chain.push(parent);
            current = self.parent_of(parent.id());
        }
        chain
    }

    /// True if `id` is `ancestor` or descends from it
    pub fn is_a(&self, id: &str, ancestor: &str) -> bool {
        id == ancestor || self.ancestors(id).iter().any(|s| s.id() == ancestor)
    }

    /// Checks that every technical parent is registered and acyclic
    pub fn validate_parents(&self) -> Result<()> {
        for signature in &self.signatures {
            let Some(parent) = signature.parent() else {
                continue;
            };
            if !self.contains(parent) {
                return Err(SignatureDefinitionError::UnknownParent {
                    id: signature.id().to_string(),
                    parent: parent.to_string(),
                });
            }

            let mut seen = HashSet::from([signature.id()]);
            let mut current = Some(parent);
            while let Some(id) = current {
                if !seen.insert(id) {
                    return Err(SignatureDefinitionError::ParentCycle(
                        signature.id().to_string(),
                    ));
                }
                current = self.get(id).and_then(|s| s.parent());
            }
        }
        Ok(())
    }

    /// Compiles every registered signature into a processor factory
    pub fn compile(&self, options: &CompilerOptions) -> Result<ProcessorFactory> {
        match (self.validate_parents(), options.policy) {
            (Ok(()), _) => {}
            (Err(e), DefinitionPolicy::Strict) => return Err(e),
            (Err(e), DefinitionPolicy::Lenient) => {
                tracing::warn!(error = %e, "technical parents are inconsistent");
            }
        }
        ProcessorFactory::from_signatures(&self.signatures, options)
    }
}
