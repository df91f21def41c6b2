//! Content model providers: one per grammar language.
//!
//! A provider says whether it can bind a document (through its standard
//! association or an internal subset), lists the external references the
//! document makes, and builds a [`CMDocument`] from grammar text.

mod dtd;
mod xsd;

pub use dtd::DtdContentModelProvider;
pub use xsd::XsdContentModelProvider;

use std::collections::HashSet;

use xmlls_dom::Document;
use xmlls_source_map::Span;

use crate::entity_manager::{EntityManager, LoadedEntity};
use crate::error::GrammarError;
use crate::grammar::{GrammarDescription, GrammarType};
use crate::model::CMDocument;
use crate::resolver::{ResourceIdentifier, ResourceKind};

pub trait ContentModelProvider: Send + Sync {
    fn grammar_type(&self) -> GrammarType;

    /// Whether the document is bound to this grammar language by its
    /// standard association (`internal == false`) or declares an internal
    /// grammar (`internal == true`).
    fn adapt_for_document(&self, doc: &Document, internal: bool) -> bool;

    /// Whether the resource at `uri` is written in this grammar language.
    fn adapt_for_uri(&self, uri: &str) -> bool;

    /// External grammar references of `doc` that apply to `namespace`.
    fn identifiers(&self, doc: &Document, namespace: Option<&str>) -> Vec<ResourceIdentifier>;

    /// Build the content model of the grammar at `uri`. Resources the grammar
    /// references are read through `context`.
    fn create_cm_document(
        &self,
        uri: &str,
        content: &str,
        context: &mut LoadContext<'_, '_>,
    ) -> Result<CMDocument, GrammarError>;

    /// The content model declared inside `doc` itself.
    fn create_internal_cm_document(&self, doc: &Document) -> Option<CMDocument>;
}

/// Loading state for one grammar: guards against include cycles and
/// records every resource the grammar was assembled from.
pub struct LoadContext<'a, 'm> {
    entities: &'a mut EntityManager<'m>,
    visited: HashSet<String>,
    sources: Vec<GrammarDescription>,
    origin: Option<Span>,
}

impl<'a, 'm> LoadContext<'a, 'm> {
    /// `origin` is where the document references the grammar being built;
    /// failures of nested resources are reported there.
    pub fn new(entities: &'a mut EntityManager<'m>, uri: &str, origin: Option<Span>) -> Self {
        Self {
            entities,
            visited: HashSet::from([uri.to_string()]),
            sources: Vec::new(),
            origin,
        }
    }

    /// Load a resource referenced from inside the grammar. Returns `None`
    /// when it was already loaded for this grammar or could not be read.
    pub fn load(&mut self, identifier: ResourceIdentifier) -> Option<LoadedEntity> {
        let identifier = identifier.with_origin(self.origin);
        if let Ok(uri) = self.entities.resolver().resolve(&identifier) {
            if !self.visited.insert(uri) {
                return None;
            }
        }
        let entity = self.entities.load_entity(&identifier);
        if entity.substituted {
            return None;
        }
        if let Some(uri) = &entity.uri {
            let grammar_type = match identifier.kind {
                ResourceKind::Dtd | ResourceKind::ExternalEntity => GrammarType::Dtd,
                ResourceKind::Schema => GrammarType::Xsd,
            };
            self.sources.push(
                GrammarDescription::new(grammar_type, uri.clone())
                    .with_namespace(identifier.namespace.clone())
                    .with_public_id(identifier.public_id.clone()),
            );
        }
        Some(entity)
    }

    /// Descriptions of the nested resources loaded so far.
    pub fn sources(&self) -> &[GrammarDescription] {
        &self.sources
    }

    pub fn into_sources(self) -> Vec<GrammarDescription> {
        self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryResourceLoader;
    use crate::resolver::ResolverExtensionManager;

    #[test]
    fn test_load_context_skips_visited_and_records_sources() {
        let resolver = ResolverExtensionManager::new();
        let loader = MemoryResourceLoader::new();
        loader.insert("file:///s/common.xsd", "<schema/>");
        let mut entities = EntityManager::new(&resolver, &loader);
        let mut context = LoadContext::new(&mut entities, "file:///s/main.xsd", None);

        let common = ResourceIdentifier::new(ResourceKind::Schema, Some("common.xsd".into()))
            .with_base(Some("file:///s/main.xsd".into()));
        assert!(context.load(common.clone()).is_some());
        assert!(context.load(common).is_none());

        let main = ResourceIdentifier::new(ResourceKind::Schema, Some("main.xsd".into()))
            .with_base(Some("file:///s/common.xsd".into()));
        assert!(context.load(main).is_none());

        assert_eq!(
            context.into_sources(),
            vec![GrammarDescription::new(GrammarType::Xsd, "file:///s/common.xsd")]
        );
        assert!(!entities.has_failures());
    }
}
