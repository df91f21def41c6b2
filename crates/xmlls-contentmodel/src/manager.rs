//! Content Model Manager: binds documents to their grammars and caches the
//! resulting content models.
//!
//! A document is bound in three steps, in this order:
//!
//! 1. its standard association (DOCTYPE external id, `xsi:schemaLocation`,
//!    `xsi:noNamespaceSchemaLocation`);
//! 2. its internal subset;
//! 3. a file association from the settings, only when step 1 found
//!    nothing.
//!
//! Within a step the providers are asked in registration order and the
//! first one that yields a content model wins. Built models are kept in a
//! cache keyed by where they came from, and the grammars themselves in the
//! shared [`XmlGrammarPool`], until evicted.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use xmlls_dom::{Attr, Document, Node, Parented};

use crate::entity_manager::EntityManager;
use crate::error::SettingsError;
use crate::grammar::{Grammar, GrammarDescription, GrammarType};
use crate::loader::{FileSystemLoader, ResourceLoader};
use crate::model::{
    CMAttributeDeclaration, CMDocument, CMElementDeclaration, ElementDeclId, dtd_attributes,
    find_attribute_in,
};
use crate::pool::{GrammarPool, GrammarPoolWrapper, XmlGrammarPool};
use crate::provider::{
    ContentModelProvider, DtdContentModelProvider, LoadContext, XsdContentModelProvider,
};
use crate::resolver::{
    CatalogResolver, FileAssociationResolver, ResolverExtensionManager, ResourceIdentifier,
    ResourceKind,
};
use crate::settings::ContentModelSettings;

/// Where a cached content model came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Doctype {
        public_id: Option<String>,
        system_id: String,
    },
    Schema {
        namespace: Option<String>,
        location: String,
    },
    /// The internal subset of one document, identified by its text.
    Internal {
        document_uri: String,
        fingerprint: u64,
    },
    FileAssociation {
        system_id: String,
    },
}

impl CacheKey {
    fn external(
        binding: Binding,
        grammar_type: GrammarType,
        identifier: &ResourceIdentifier,
        uri: Option<&str>,
    ) -> Self {
        let system_id = uri
            .map(str::to_string)
            .or_else(|| identifier.literal_system_id.clone())
            .unwrap_or_default();
        match (binding, grammar_type) {
            (Binding::FileAssociation, _) => CacheKey::FileAssociation { system_id },
            (_, GrammarType::Dtd) => CacheKey::Doctype {
                public_id: identifier.public_id.clone(),
                system_id,
            },
            _ => CacheKey::Schema {
                namespace: identifier.namespace.clone(),
                location: system_id,
            },
        }
    }

    fn internal(doc: &Document) -> Option<Self> {
        let doctype = doc.doctype()?;
        let subset = doctype.doctype_data()?.internal_subset?;
        let mut hasher = DefaultHasher::new();
        subset.start.hash(&mut hasher);
        doctype.slice(subset).hash(&mut hasher);
        Some(CacheKey::Internal {
            document_uri: doc.uri().unwrap_or_default().to_string(),
            fingerprint: hasher.finish(),
        })
    }
}

/// How a document is bound to a grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    External,
    Internal,
    FileAssociation,
}

/// A content model bound to a document.
#[derive(Debug, Clone)]
pub struct BoundGrammar {
    pub binding: Binding,
    pub key: CacheKey,
    pub document: Arc<CMDocument>,
}

impl BoundGrammar {
    pub fn grammar_type(&self) -> GrammarType {
        self.document.grammar_type()
    }
}

/// An element declaration together with the model that owns it.
#[derive(Debug, Clone)]
pub struct CMElementRef {
    pub document: Arc<CMDocument>,
    pub id: ElementDeclId,
}

impl CMElementRef {
    pub fn declaration(&self) -> CMElementDeclaration<'_> {
        self.document.element(self.id)
    }
}

struct CacheEntry {
    document: Arc<CMDocument>,
    /// The pool entry backing this model; internal subsets have none.
    description: Option<GrammarDescription>,
}

pub struct ContentModelManager {
    providers: Vec<Arc<dyn ContentModelProvider>>,
    resolver: Arc<ResolverExtensionManager>,
    loader: Arc<dyn ResourceLoader>,
    pool: Arc<XmlGrammarPool>,
    cache: RwLock<HashMap<CacheKey, CacheEntry>>,
    /// Bumped by every eviction, under the cache write lock. A load that
    /// started before an eviction must not publish what it read.
    epoch: AtomicU64,
    settings: RwLock<ContentModelSettings>,
}

impl Default for ContentModelManager {
    fn default() -> Self {
        Self::new(Arc::new(FileSystemLoader))
    }
}

impl ContentModelManager {
    /// A manager with the DTD and XML Schema providers.
    pub fn new(loader: Arc<dyn ResourceLoader>) -> Self {
        Self::with_providers(
            vec![
                Arc::new(DtdContentModelProvider),
                Arc::new(XsdContentModelProvider),
            ],
            loader,
        )
    }

    /// Providers are consulted in the order given.
    pub fn with_providers(
        providers: Vec<Arc<dyn ContentModelProvider>>,
        loader: Arc<dyn ResourceLoader>,
    ) -> Self {
        Self {
            providers,
            resolver: Arc::new(ResolverExtensionManager::new()),
            loader,
            pool: Arc::new(XmlGrammarPool::new()),
            cache: RwLock::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            settings: RwLock::new(ContentModelSettings::default()),
        }
    }

    pub fn resolver(&self) -> &Arc<ResolverExtensionManager> {
        &self.resolver
    }

    pub fn loader(&self) -> &Arc<dyn ResourceLoader> {
        &self.loader
    }

    pub fn pool(&self) -> &Arc<XmlGrammarPool> {
        &self.pool
    }

    pub fn settings(&self) -> ContentModelSettings {
        self.settings.read().clone()
    }

    /// Apply new settings: reload catalogs and file associations, then drop
    /// every cached model since resolution may now differ.
    pub fn set_settings(&self, settings: ContentModelSettings) -> Result<(), SettingsError> {
        let associations = FileAssociationResolver::new(&settings.file_associations)?;
        let catalogs = (!settings.catalogs.is_empty())
            .then(|| CatalogResolver::load(&settings.catalogs, self.loader.as_ref()));
        self.resolver.set_catalogs(catalogs);
        self.resolver
            .set_file_associations((!associations.is_empty()).then_some(associations));
        *self.settings.write() = settings;
        self.evict_cache();
        Ok(())
    }

    // ====== Queries ======

    /// The content models that can declare `element`: zero, one or several.
    pub fn find_cm_document(&self, element: Node<'_>) -> Vec<Arc<CMDocument>> {
        self.find_cm_documents(element.document(), element.namespace_uri())
    }

    /// The content models bound to `doc` that cover `namespace`.
    pub fn find_cm_documents(&self, doc: &Document, namespace: Option<&str>) -> Vec<Arc<CMDocument>> {
        self.bind_for_lookup(doc)
            .into_iter()
            .map(|bound| bound.document)
            .filter(|document| document.covers_namespace(namespace))
            .collect()
    }

    /// Bind `doc` outside a validation pass, with the same failure policy.
    fn bind_for_lookup(&self, doc: &Document) -> Vec<BoundGrammar> {
        let pool = GrammarPoolWrapper::new(self.pool.clone());
        let mut entities = EntityManager::new(&self.resolver, self.loader.as_ref());
        let bound = self.bind_document(doc, &mut entities, &pool, &GrammarType::ALL);
        entities.dispose(&pool);
        bound
    }

    pub fn find_cm_element(&self, element: Node<'_>) -> Option<CMElementRef> {
        self.find_cm_document(element).into_iter().find_map(|document| {
            let id = document.find_cm_element(element)?.id();
            Some(CMElementRef { document, id })
        })
    }

    /// The declaration of `attr`. For DTDs the attribute lists of both
    /// subsets count, the internal subset's first.
    pub fn find_cm_attribute(&self, attr: Attr<'_>) -> Option<CMAttributeDeclaration> {
        let owner = attr.parent()?;
        let bound = self.bind_for_lookup(owner.document());
        let subsets = documents_of(&bound, GrammarType::Dtd);
        let from_dtd = owner.name().and_then(|element| {
            find_attribute_in(dtd_attributes(&subsets, element).into_iter(), attr.name())
        });
        if let Some(declared) = from_dtd {
            return Some(declared.clone());
        }
        let namespace = owner.namespace_uri();
        bound
            .iter()
            .map(|grammar| grammar.document.as_ref())
            .filter(|document| document.grammar_type() != GrammarType::Dtd)
            .filter(|document| document.covers_namespace(namespace))
            .find_map(|document| document.find_cm_attribute(attr).cloned())
    }

    // ====== Binding ======

    /// Bind `doc` to its grammars of the given types. Resources are read
    /// through `entities` and grammars shared through `pool`, so the caller
    /// decides what happens to failures.
    pub fn bind_document(
        &self,
        doc: &Document,
        entities: &mut EntityManager<'_>,
        pool: &dyn GrammarPool,
        types: &[GrammarType],
    ) -> Vec<BoundGrammar> {
        let mut bound = Vec::new();
        let mut seen = HashSet::new();
        let providers: Vec<&Arc<dyn ContentModelProvider>> = self
            .providers
            .iter()
            .filter(|provider| types.contains(&provider.grammar_type()))
            .collect();

        for namespace in candidate_namespaces(doc) {
            for provider in providers.iter().copied().filter(|p| p.adapt_for_document(doc, false)) {
                let before = bound.len();
                for identifier in provider.identifiers(doc, namespace.as_deref()) {
                    bound.extend(self.bind_external(
                        provider.as_ref(),
                        identifier,
                        Binding::External,
                        entities,
                        pool,
                        &mut seen,
                    ));
                }
                if bound.len() > before {
                    break;
                }
            }
        }

        for provider in providers.iter().copied().filter(|p| p.adapt_for_document(doc, true)) {
            if let Some(internal) = self.bind_internal(provider.as_ref(), doc) {
                bound.push(internal);
                break;
            }
        }

        if !bound.iter().any(|b| b.binding == Binding::External) {
            if let Some(association) = self.file_association(doc, &providers) {
                let (provider, identifier) = association;
                bound.extend(self.bind_external(
                    provider.as_ref(),
                    identifier,
                    Binding::FileAssociation,
                    entities,
                    pool,
                    &mut seen,
                ));
            }
        }
        tracing::trace!(uri = ?doc.uri(), grammars = bound.len(), "bound document");
        bound
    }

    fn file_association<'p>(
        &self,
        doc: &Document,
        providers: &[&'p Arc<dyn ContentModelProvider>],
    ) -> Option<(&'p Arc<dyn ContentModelProvider>, ResourceIdentifier)> {
        let uri = doc.uri()?;
        let system_id = self.resolver.file_association_for(uri)?;
        let provider = *providers.iter().find(|p| p.adapt_for_uri(&system_id))?;
        let identifier = ResourceIdentifier::new(resource_kind(provider.grammar_type()), Some(system_id))
            .with_namespace(doc.root_namespace().map(str::to_string))
            .with_base(Some(uri.to_string()));
        Some((provider, identifier))
    }

    fn bind_external(
        &self,
        provider: &dyn ContentModelProvider,
        identifier: ResourceIdentifier,
        binding: Binding,
        entities: &mut EntityManager<'_>,
        pool: &dyn GrammarPool,
        seen: &mut HashSet<CacheKey>,
    ) -> Option<BoundGrammar> {
        let grammar_type = provider.grammar_type();
        let uri = self.resolver.resolve(&identifier).ok();
        let key = CacheKey::external(binding, grammar_type, &identifier, uri.as_deref());
        if !seen.insert(key.clone()) {
            return None;
        }
        let bound = |document: Arc<CMDocument>| BoundGrammar {
            binding,
            key: key.clone(),
            document,
        };

        let epoch = self.epoch.load(Ordering::Acquire);
        let cached = self.cache.read().get(&key).map(|entry| entry.document.clone());
        if let Some(document) = cached {
            return Some(bound(document));
        }
        let description = uri.as_ref().map(|uri| {
            GrammarDescription::new(grammar_type, uri.clone())
                .with_namespace(identifier.namespace.clone())
                .with_public_id(identifier.public_id.clone())
        });
        if let Some(grammar) = description.as_ref().and_then(|d| pool.retrieve_grammar(d)) {
            let document = grammar.cm_document().clone();
            let mut cache = self.cache.write();
            if self.epoch.load(Ordering::Acquire) == epoch {
                cache.insert(
                    key.clone(),
                    CacheEntry {
                        document: document.clone(),
                        description,
                    },
                );
            }
            return Some(bound(document));
        }

        let failures = entities.failures().len();
        let entity = entities.load_entity(&identifier);
        let grammar_uri = entity
            .uri
            .clone()
            .or_else(|| identifier.literal_system_id.clone())
            .unwrap_or_default();
        if entity.substituted {
            return Some(bound(Arc::new(CMDocument::new(grammar_uri, grammar_type))));
        }

        let mut context = LoadContext::new(entities, &grammar_uri, identifier.origin);
        let result = provider.create_cm_document(&grammar_uri, &entity.text, &mut context);
        let sources = context.into_sources();
        let document = match result {
            Ok(document) => Arc::new(document),
            Err(err) => {
                tracing::debug!(uri = %grammar_uri, error = %err, "grammar could not be built");
                entities.report_unusable(&identifier, &grammar_uri, &err);
                return Some(bound(Arc::new(CMDocument::new(grammar_uri, grammar_type))));
            }
        };

        // A model assembled around a missing include stays out of the caches.
        if entities.failures().len() == failures {
            if let Some(description) = description {
                let mut cache = self.cache.write();
                if self.epoch.load(Ordering::Acquire) != epoch {
                    tracing::debug!(uri = %grammar_uri, "cache evicted during load, not caching");
                    return Some(bound(document));
                }
                let grammar = sources
                    .into_iter()
                    .fold(Grammar::new(description.clone(), document.clone()), Grammar::with_source);
                pool.cache_grammars(grammar_type, &[Arc::new(grammar)]);
                cache.insert(
                    key.clone(),
                    CacheEntry {
                        document: document.clone(),
                        description: Some(description),
                    },
                );
                tracing::debug!(uri = %grammar_uri, %grammar_type, "cached grammar");
            }
        }
        Some(bound(document))
    }

    fn bind_internal(&self, provider: &dyn ContentModelProvider, doc: &Document) -> Option<BoundGrammar> {
        let key = CacheKey::internal(doc)?;
        let epoch = self.epoch.load(Ordering::Acquire);
        let cached = self.cache.read().get(&key).map(|entry| entry.document.clone());
        let document = match cached {
            Some(document) => document,
            None => {
                let document = Arc::new(provider.create_internal_cm_document(doc)?);
                let mut cache = self.cache.write();
                if self.epoch.load(Ordering::Acquire) != epoch {
                    return Some(BoundGrammar {
                        binding: Binding::Internal,
                        key,
                        document,
                    });
                }
                // Earlier versions of this document's subset are dead.
                if let CacheKey::Internal { document_uri, .. } = &key {
                    cache.retain(|existing, _| {
                        !matches!(existing, CacheKey::Internal { document_uri: uri, .. } if uri == document_uri)
                    });
                }
                cache.insert(
                    key.clone(),
                    CacheEntry {
                        document: document.clone(),
                        description: None,
                    },
                );
                document
            }
        };
        Some(BoundGrammar {
            binding: Binding::Internal,
            key,
            document,
        })
    }

    // ====== Eviction ======

    /// Forget every model `doc` is bound to, and the grammars behind them.
    pub fn evict_cache_for(&self, doc: &Document) {
        let keys = self.document_keys(doc);
        let mut cache = self.cache.write();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        for (key, description) in keys {
            let removed = cache.remove(&key).and_then(|entry| entry.description);
            if let Some(description) = removed.or(description) {
                self.pool.remove_grammar(&description);
            }
            tracing::debug!(?key, "evicted content model");
        }
    }

    /// Forget every cached model and grammar.
    pub fn evict_cache(&self) {
        let mut cache = self.cache.write();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        cache.clear();
        self.pool.clear();
        tracing::debug!("evicted all content models");
    }

    /// The cache keys `doc` binds to, computed without loading anything.
    fn document_keys(&self, doc: &Document) -> Vec<(CacheKey, Option<GrammarDescription>)> {
        let mut keys = Vec::new();
        let mut external = false;
        for namespace in candidate_namespaces(doc) {
            for provider in self.providers.iter().filter(|p| p.adapt_for_document(doc, false)) {
                for identifier in provider.identifiers(doc, namespace.as_deref()) {
                    external = true;
                    keys.push(self.external_key(provider.as_ref(), &identifier, Binding::External));
                }
            }
        }
        keys.extend(CacheKey::internal(doc).map(|key| (key, None)));
        if !external {
            let providers: Vec<&Arc<dyn ContentModelProvider>> = self.providers.iter().collect();
            if let Some((provider, identifier)) = self.file_association(doc, &providers) {
                keys.push(self.external_key(
                    provider.as_ref(),
                    &identifier,
                    Binding::FileAssociation,
                ));
            }
        }
        keys
    }

    fn external_key(
        &self,
        provider: &dyn ContentModelProvider,
        identifier: &ResourceIdentifier,
        binding: Binding,
    ) -> (CacheKey, Option<GrammarDescription>) {
        let grammar_type = provider.grammar_type();
        let uri = self.resolver.resolve(identifier).ok();
        let key = CacheKey::external(binding, grammar_type, identifier, uri.as_deref());
        let description = uri.map(|uri| {
            GrammarDescription::new(grammar_type, uri)
                .with_namespace(identifier.namespace.clone())
                .with_public_id(identifier.public_id.clone())
        });
        (key, description)
    }
}

fn resource_kind(grammar_type: GrammarType) -> ResourceKind {
    match grammar_type {
        GrammarType::Dtd => ResourceKind::Dtd,
        GrammarType::Xsd | GrammarType::RelaxNg => ResourceKind::Schema,
    }
}

/// The bound models of one language; internal subsets first.
pub(crate) fn documents_of(bound: &[BoundGrammar], grammar_type: GrammarType) -> Vec<&CMDocument> {
    let mut matching: Vec<&BoundGrammar> = bound
        .iter()
        .filter(|grammar| grammar.grammar_type() == grammar_type)
        .collect();
    matching.sort_by_key(|grammar| grammar.binding != Binding::Internal);
    matching.into_iter().map(|grammar| grammar.document.as_ref()).collect()
}

/// `None` (no namespace) first, then every namespace the document names.
fn candidate_namespaces(doc: &Document) -> Vec<Option<String>> {
    let mut namespaces = vec![None];
    let hinted = doc.schema_location_hints().into_iter().map(|hint| hint.namespace);
    for namespace in hinted.chain(doc.root_namespace().map(str::to_string)) {
        let namespace = Some(namespace);
        if !namespaces.contains(&namespace) {
            namespaces.push(namespace);
        }
    }
    namespaces
}
