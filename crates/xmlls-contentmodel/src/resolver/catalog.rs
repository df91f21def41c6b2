//! OASIS XML catalogs.
//!
//! Supported entries: `public`, `system`, `uri`, `rewriteSystem`,
//! `rewriteURI`, `systemSuffix`, `uriSuffix`, `group` and `nextCatalog`,
//! with `xml:base` honored on the catalog, on groups and on entries.

use std::collections::HashSet;

use xmlls_dom::Node;

use super::{ResourceIdentifier, ResourceKind, UriResolverExtension, expand_system_id};
use crate::loader::ResourceLoader;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CatalogEntry {
    Public { public_id: String, uri: String },
    System { system_id: String, uri: String },
    Uri { name: String, uri: String },
    RewriteSystem { prefix: String, rewrite: String },
    RewriteUri { prefix: String, rewrite: String },
    SystemSuffix { suffix: String, uri: String },
    UriSuffix { suffix: String, uri: String },
}

/// One parsed catalog file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlCatalog {
    uri: String,
    entries: Vec<CatalogEntry>,
    next_catalogs: Vec<String>,
}

impl XmlCatalog {
    pub fn parse(uri: impl Into<String>, text: &str) -> Self {
        let uri = uri.into();
        let doc = xmlls_dom::parse_with_uri(text, uri.clone());
        let mut catalog = Self {
            uri: uri.clone(),
            entries: Vec::new(),
            next_catalogs: Vec::new(),
        };
        if let Some(root) = doc.root_element() {
            let base = with_base(root, &uri);
            catalog.read_entries(root, &base);
        }
        catalog
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn read_entries(&mut self, parent: Node<'_>, base: &str) {
        for child in parent.child_elements() {
            let base = with_base(child, base);
            let attr = |name: &str| child.attribute_value(name).map(str::trim);
            let target = |name: &str| {
                attr(name).and_then(|value| expand_system_id(value, Some(&base)).ok())
            };
            let entry = match child.local_name() {
                Some("group") => {
                    self.read_entries(child, &base);
                    None
                }
                Some("nextCatalog") => {
                    if let Some(next) = target("catalog") {
                        self.next_catalogs.push(next);
                    }
                    None
                }
                Some("public") => attr("publicId").zip(target("uri")).map(|(id, uri)| {
                    CatalogEntry::Public {
                        public_id: normalize_public_id(id),
                        uri,
                    }
                }),
                Some("system") => attr("systemId").zip(target("uri")).map(|(id, uri)| {
                    CatalogEntry::System {
                        system_id: id.to_string(),
                        uri,
                    }
                }),
                Some("uri") => attr("name")
                    .zip(target("uri"))
                    .map(|(name, uri)| CatalogEntry::Uri {
                        name: name.to_string(),
                        uri,
                    }),
                Some("rewriteSystem") => attr("systemIdStartString")
                    .zip(target("rewritePrefix"))
                    .map(|(prefix, rewrite)| CatalogEntry::RewriteSystem {
                        prefix: prefix.to_string(),
                        rewrite,
                    }),
                Some("rewriteURI") => attr("uriStartString")
                    .zip(target("rewritePrefix"))
                    .map(|(prefix, rewrite)| CatalogEntry::RewriteUri {
                        prefix: prefix.to_string(),
                        rewrite,
                    }),
                Some("systemSuffix") => attr("systemIdSuffix")
                    .zip(target("uri"))
                    .map(|(suffix, uri)| CatalogEntry::SystemSuffix {
                        suffix: suffix.to_string(),
                        uri,
                    }),
                Some("uriSuffix") => attr("uriSuffix")
                    .zip(target("uri"))
                    .map(|(suffix, uri)| CatalogEntry::UriSuffix {
                        suffix: suffix.to_string(),
                        uri,
                    }),
                other => {
                    tracing::trace!(entry = ?other, catalog = %self.uri, "ignoring catalog entry");
                    None
                }
            };
            if let Some(entry) = entry {
                self.entries.push(entry);
            }
        }
    }

    fn resolve_system(&self, system_id: &str) -> Option<String> {
        self.entries
            .iter()
            .find_map(|entry| match entry {
                CatalogEntry::System { system_id: id, uri } if id == system_id => Some(uri.clone()),
                _ => None,
            })
            .or_else(|| {
                self.rewrite(system_id, |entry| match entry {
                    CatalogEntry::RewriteSystem { prefix, rewrite } => Some((prefix, rewrite)),
                    _ => None,
                })
            })
            .or_else(|| {
                self.suffix(system_id, |entry| match entry {
                    CatalogEntry::SystemSuffix { suffix, uri } => Some((suffix, uri)),
                    _ => None,
                })
            })
    }

    fn resolve_public(&self, public_id: &str) -> Option<String> {
        let public_id = normalize_public_id(public_id);
        self.entries.iter().find_map(|entry| match entry {
            CatalogEntry::Public { public_id: id, uri } if *id == public_id => Some(uri.clone()),
            _ => None,
        })
    }

    fn resolve_uri(&self, name: &str) -> Option<String> {
        self.entries
            .iter()
            .find_map(|entry| match entry {
                CatalogEntry::Uri { name: n, uri } if n == name => Some(uri.clone()),
                _ => None,
            })
            .or_else(|| {
                self.rewrite(name, |entry| match entry {
                    CatalogEntry::RewriteUri { prefix, rewrite } => Some((prefix, rewrite)),
                    _ => None,
                })
            })
            .or_else(|| {
                self.suffix(name, |entry| match entry {
                    CatalogEntry::UriSuffix { suffix, uri } => Some((suffix, uri)),
                    _ => None,
                })
            })
    }

    /// Apply the rewrite entry with the longest matching prefix.
    fn rewrite<'e>(
        &'e self,
        id: &str,
        select: impl Fn(&'e CatalogEntry) -> Option<(&'e String, &'e String)>,
    ) -> Option<String> {
        let (prefix, rewrite) = self
            .entries
            .iter()
            .filter_map(select)
            .filter(|(prefix, _)| id.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())?;
        let rest = &id[prefix.len()..];
        if rewrite.ends_with('/') {
            Some(format!("{rewrite}{}", rest.trim_start_matches('/')))
        } else {
            Some(format!("{rewrite}{rest}"))
        }
    }

    /// The suffix entry with the longest matching suffix.
    fn suffix<'e>(
        &'e self,
        id: &str,
        select: impl Fn(&'e CatalogEntry) -> Option<(&'e String, &'e String)>,
    ) -> Option<String> {
        self.entries
            .iter()
            .filter_map(select)
            .filter(|(suffix, _)| id.ends_with(suffix.as_str()))
            .max_by_key(|(suffix, _)| suffix.len())
            .map(|(_, uri)| uri.clone())
    }

    fn resolve(&self, identifier: &ResourceIdentifier) -> Option<String> {
        let system_id = identifier.literal_system_id.as_deref();
        let by_system = system_id.and_then(|id| self.resolve_system(id));
        let by_public = || {
            identifier
                .public_id
                .as_deref()
                .and_then(|id| self.resolve_public(id))
        };
        let by_uri = || {
            if identifier.kind != ResourceKind::Schema {
                return None;
            }
            system_id
                .and_then(|id| self.resolve_uri(id))
                .or_else(|| identifier.namespace.as_deref().and_then(|ns| self.resolve_uri(ns)))
        };
        by_system.or_else(by_public).or_else(by_uri)
    }
}

/// Public ids compare with whitespace collapsed.
fn normalize_public_id(id: &str) -> String {
    id.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn with_base(node: Node<'_>, base: &str) -> String {
    match node.attribute_value("xml:base") {
        Some(value) => expand_system_id(value, Some(base)).unwrap_or_else(|_| base.to_string()),
        None => base.to_string(),
    }
}

/// Resolves through a list of catalogs, each followed by the catalogs its
/// `nextCatalog` entries name.
#[derive(Debug, Default)]
pub struct CatalogResolver {
    catalogs: Vec<XmlCatalog>,
}

impl CatalogResolver {
    pub fn new(catalogs: Vec<XmlCatalog>) -> Self {
        Self { catalogs }
    }

    /// Load catalogs from paths or URIs. Catalogs that cannot be read are
    /// skipped with a warning.
    pub fn load(locations: &[String], loader: &dyn ResourceLoader) -> Self {
        let mut visited = HashSet::new();
        let mut catalogs = Vec::new();
        for location in locations {
            match expand_system_id(location, None) {
                Ok(uri) => load_into(&uri, loader, &mut visited, &mut catalogs),
                Err(err) => tracing::warn!(%location, error = %err, "invalid catalog location"),
            }
        }
        Self { catalogs }
    }

    pub fn catalogs(&self) -> &[XmlCatalog] {
        &self.catalogs
    }
}

fn load_into(
    uri: &str,
    loader: &dyn ResourceLoader,
    visited: &mut HashSet<String>,
    catalogs: &mut Vec<XmlCatalog>,
) {
    if !visited.insert(uri.to_string()) {
        return;
    }
    let bytes = match loader.load(uri) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(catalog = %uri, error = %err, "cannot load XML catalog");
            return;
        }
    };
    let catalog = XmlCatalog::parse(uri, &String::from_utf8_lossy(&bytes));
    tracing::debug!(catalog = %uri, entries = catalog.len(), "loaded XML catalog");
    let next = catalog.next_catalogs.clone();
    catalogs.push(catalog);
    for next in next {
        load_into(&next, loader, visited, catalogs);
    }
}

impl UriResolverExtension for CatalogResolver {
    fn resolve(&self, identifier: &ResourceIdentifier) -> Option<String> {
        self.catalogs
            .iter()
            .find_map(|catalog| catalog.resolve(identifier))
    }
}
