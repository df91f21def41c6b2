//! Grammar binding, caching and validation for XML documents.
//!
//! # Architecture
//!
//! ```text
//!   Document ──► ContentModelManager ──► ContentModelProvider (DTD, XSD)
//!                    │        │                    │
//!                    │        ▼                    ▼
//!                    │   XmlGrammarPool      EntityManager ──► ResolverExtensionManager
//!                    │                             │              (catalogs, file associations)
//!                    ▼                             ▼
//!               XmlValidator                 ResourceLoader
//! ```
//!
//! The [`ContentModelManager`] binds a parsed [`xmlls_dom::Document`] to the
//! grammars it references and caches the resulting [`CMDocument`]s. The
//! [`XmlValidator`] runs one validation pass over a document: it binds
//! grammars through a tracking pool and a per-pass [`EntityManager`], so an
//! unreachable resource becomes a single diagnostic and an empty stand-in
//! instead of a failed pass.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xmlls_contentmodel::{ContentModelManager, NeverCancel, XmlValidator};
//!
//! let manager = Arc::new(ContentModelManager::default());
//! let validator = XmlValidator::new(manager.clone());
//! let doc = xmlls_dom::parse_with_uri(text, "file:///work/note.xml");
//! let diagnostics = validator.validate(&doc, &manager.settings(), &NeverCancel)?;
//! ```

pub mod content;
pub mod entity_manager;
pub mod error;
pub mod generator;
pub mod grammar;
pub mod idref;
pub mod loader;
pub mod manager;
pub mod model;
pub mod pool;
pub mod provider;
pub mod resolver;
pub mod settings;
pub mod validator;

pub use content::{ContentMatcher, ContentModel, Particle, Term};
pub use entity_manager::{EntityManager, InputSource, LoadedEntity, ResourceFailure};
pub use error::{GrammarError, ResourceError, SettingsError};
pub use generator::{GeneratorOptions, generate_xml};
pub use grammar::{Grammar, GrammarDescription, GrammarType};
pub use idref::{find_idref_declaration, search_id_attributes};
pub use loader::{FileSystemLoader, MemoryResourceLoader, ResourceLoader};
pub use manager::{Binding, BoundGrammar, CMElementRef, CacheKey, ContentModelManager};
pub use model::{
    AttributeType, CMAttributeDeclaration, CMDocument, CMElementDeclaration, CMType,
    ElementDeclId, TypeId, dtd_attributes, find_attribute_in,
};
pub use pool::{GrammarPool, GrammarPoolWrapper, XmlGrammarPool};
pub use provider::{
    ContentModelProvider, DtdContentModelProvider, LoadContext, XsdContentModelProvider,
};
pub use resolver::{
    CatalogResolver, FileAssociationResolver, ResolverExtensionManager, ResourceIdentifier,
    ResourceKind, UriResolverExtension, XmlCatalog, expand_system_id,
};
pub use settings::{
    ContentModelSettings, FileAssociation, SchemaEnabled, SchemaSettings, SeverityLevel,
    ValidationSettings,
};
pub use validator::{
    CancelChecker, Cancellation, Cancelled, NeverCancel, ValidationPlan, XmlValidator,
};
