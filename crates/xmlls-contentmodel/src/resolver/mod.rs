//! Resolution of external identifiers to absolute URIs.
//!
//! A [`ResolverExtensionManager`] asks its extensions in a fixed order:
//! XML catalogs first, then file associations, and finally plain
//! resolution of the literal system id against the referencing document.

mod catalog;
mod file_association;

pub use catalog::{CatalogResolver, XmlCatalog};
pub use file_association::FileAssociationResolver;

use std::sync::Arc;

use parking_lot::RwLock;
use url::Url;
use xmlls_source_map::Span;

use crate::error::ResourceError;

/// What an identifier points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// External DTD subset.
    Dtd,
    /// External parsed entity.
    ExternalEntity,
    Schema,
}

/// An external reference as it appears in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentifier {
    pub kind: ResourceKind,
    pub public_id: Option<String>,
    pub literal_system_id: Option<String>,
    /// URI of the referencing document.
    pub base_system_id: Option<String>,
    pub namespace: Option<String>,
    /// Where the reference is written in the referencing document.
    pub origin: Option<Span>,
}

impl ResourceIdentifier {
    pub fn new(kind: ResourceKind, literal_system_id: Option<String>) -> Self {
        Self {
            kind,
            public_id: None,
            literal_system_id,
            base_system_id: None,
            namespace: None,
            origin: None,
        }
    }

    pub fn with_public_id(mut self, public_id: Option<String>) -> Self {
        self.public_id = public_id;
        self
    }

    pub fn with_base(mut self, base_system_id: Option<String>) -> Self {
        self.base_system_id = base_system_id;
        self
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_origin(mut self, origin: Option<Span>) -> Self {
        self.origin = origin;
        self
    }
}

/// One resolution strategy. Returning `None` passes the identifier on to
/// the next extension.
pub trait UriResolverExtension: Send + Sync {
    fn resolve(&self, identifier: &ResourceIdentifier) -> Option<String>;
}

/// The chain of resolver extensions.
#[derive(Default)]
pub struct ResolverExtensionManager {
    catalogs: RwLock<Option<Arc<CatalogResolver>>>,
    file_associations: RwLock<Option<Arc<FileAssociationResolver>>>,
    extensions: RwLock<Vec<Arc<dyn UriResolverExtension>>>,
}

impl ResolverExtensionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_catalogs(&self, catalogs: Option<CatalogResolver>) {
        *self.catalogs.write() = catalogs.map(Arc::new);
    }

    pub fn set_file_associations(&self, associations: Option<FileAssociationResolver>) {
        *self.file_associations.write() = associations.map(Arc::new);
    }

    /// Add a resolver that runs after catalogs and file associations.
    pub fn register(&self, extension: Arc<dyn UriResolverExtension>) {
        self.extensions.write().push(extension);
    }

    /// Whether a file association binds the document at `uri`.
    pub fn has_file_association(&self, uri: &str) -> bool {
        self.file_associations
            .read()
            .as_ref()
            .is_some_and(|associations| associations.matching(uri).is_some())
    }

    /// The grammar a file association binds `uri` to.
    pub fn file_association_for(&self, uri: &str) -> Option<String> {
        self.file_associations.read().as_ref()?.matching(uri)
    }

    /// Resolve `identifier` to an absolute URI.
    pub fn resolve(&self, identifier: &ResourceIdentifier) -> Result<String, ResourceError> {
        let chain: Vec<Arc<dyn UriResolverExtension>> = {
            let mut chain: Vec<Arc<dyn UriResolverExtension>> = Vec::new();
            if let Some(catalogs) = self.catalogs.read().clone() {
                chain.push(catalogs);
            }
            if let Some(associations) = self.file_associations.read().clone() {
                chain.push(associations);
            }
            chain.extend(self.extensions.read().iter().cloned());
            chain
        };
        for extension in chain {
            if let Some(uri) = extension.resolve(identifier) {
                tracing::trace!(%uri, "resolved by extension");
                return Ok(uri);
            }
        }
        let literal = identifier
            .literal_system_id
            .as_deref()
            .ok_or(ResourceError::MissingSystemId)?;
        expand_system_id(literal, identifier.base_system_id.as_deref())
    }
}

/// Resolve a system id against a base URI.
///
/// Absolute URIs are returned as they are. Relative references are joined
/// to `base`; without a base they are taken relative to the current
/// directory. Absolute file system paths become `file:` URIs.
pub fn expand_system_id(system_id: &str, base: Option<&str>) -> Result<String, ResourceError> {
    let invalid = |reason: String| ResourceError::InvalidUri {
        uri: system_id.to_string(),
        reason,
    };
    let system_id = system_id.trim();
    if system_id.is_empty() {
        return Err(ResourceError::MissingSystemId);
    }
    if is_absolute_path(system_id) {
        return Url::from_file_path(system_id)
            .map(String::from)
            .map_err(|()| invalid("not a valid path".to_string()));
    }
    if let Ok(url) = Url::parse(system_id) {
        // A one-letter scheme is a Windows drive, handled above.
        if url.scheme().len() > 1 {
            return Ok(url.into());
        }
    }
    let base = match base {
        Some(base) => Url::parse(base).map_err(|err| invalid(err.to_string()))?,
        None => {
            let cwd = std::env::current_dir().map_err(|err| invalid(err.to_string()))?;
            Url::from_directory_path(cwd).map_err(|()| invalid("no base directory".to_string()))?
        }
    };
    base.join(system_id)
        .map(String::from)
        .map_err(|err| invalid(err.to_string()))
}

fn is_absolute_path(text: &str) -> bool {
    let bytes = text.as_bytes();
    text.starts_with('/')
        || (bytes.len() > 2
            && bytes[0].is_ascii_alphabetic()
            && bytes[1] == b':'
            && (bytes[2] == b'\\' || bytes[2] == b'/'))
}
