//! Per-pass access to external resources.
//!
//! Every failure to reach a resource is recovered on the spot: the failure
//! is recorded, one diagnostic is emitted for the location, and an empty
//! source takes the resource's place so the rest of the pass can go on.

use std::collections::HashSet;

use xmlls_error_reporting::{DiagnosticKind, DiagnosticMessage, DiagnosticMessageBuilder};

use crate::error::{GrammarError, ResourceError};
use crate::loader::ResourceLoader;
use crate::pool::GrammarPool;
use crate::resolver::{ResolverExtensionManager, ResourceIdentifier, ResourceKind};

/// Raw resource content, possibly a stand-in for one that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSource {
    /// Expanded URI, when resolution got that far.
    pub uri: Option<String>,
    pub bytes: Vec<u8>,
    pub substituted: bool,
}

impl InputSource {
    fn empty(uri: Option<String>) -> Self {
        Self {
            uri,
            bytes: Vec::new(),
            substituted: true,
        }
    }
}

/// Decoded resource text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedEntity {
    pub uri: Option<String>,
    pub text: String,
    pub encoding: String,
    pub substituted: bool,
}

#[derive(Debug)]
pub struct ResourceFailure {
    pub identifier: ResourceIdentifier,
    pub error: ResourceError,
}

pub struct EntityManager<'m> {
    resolver: &'m ResolverExtensionManager,
    loader: &'m dyn ResourceLoader,
    failures: Vec<ResourceFailure>,
    diagnostics: Vec<DiagnosticMessage>,
    reported: HashSet<String>,
}

impl<'m> EntityManager<'m> {
    pub fn new(resolver: &'m ResolverExtensionManager, loader: &'m dyn ResourceLoader) -> Self {
        Self {
            resolver,
            loader,
            failures: Vec::new(),
            diagnostics: Vec::new(),
            reported: HashSet::new(),
        }
    }

    pub fn resolver(&self) -> &'m ResolverExtensionManager {
        self.resolver
    }

    /// Resolve `identifier` and read its bytes.
    pub fn resolve_entity(&mut self, identifier: &ResourceIdentifier) -> InputSource {
        let uri = match self.resolver.resolve(identifier) {
            Ok(uri) => uri,
            Err(error) => {
                self.report(identifier, None, error);
                return InputSource::empty(None);
            }
        };
        match self.loader.load(&uri) {
            Ok(bytes) => InputSource {
                uri: Some(uri),
                bytes,
                substituted: false,
            },
            Err(error) => {
                self.report(identifier, Some(&uri), error);
                InputSource::empty(Some(uri))
            }
        }
    }

    /// Decode `source`, honoring a byte order mark or the encoding named by
    /// the XML or text declaration.
    pub fn setup_entity(
        &mut self,
        source: InputSource,
        identifier: &ResourceIdentifier,
    ) -> LoadedEntity {
        match decode(&source.bytes) {
            Ok((text, encoding)) => LoadedEntity {
                uri: source.uri,
                text,
                encoding: encoding.to_string(),
                substituted: source.substituted,
            },
            Err(encoding) => {
                let uri = source.uri.clone().unwrap_or_default();
                let error = ResourceError::Decode {
                    uri: uri.clone(),
                    encoding,
                };
                self.report(identifier, source.uri.as_deref(), error);
                LoadedEntity {
                    uri: source.uri,
                    text: String::new(),
                    encoding: "UTF-8".to_string(),
                    substituted: true,
                }
            }
        }
    }

    /// Resolve, read and decode in one step.
    pub fn load_entity(&mut self, identifier: &ResourceIdentifier) -> LoadedEntity {
        let source = self.resolve_entity(identifier);
        self.setup_entity(source, identifier)
    }

    /// Record a resource that was read but could not be turned into a
    /// grammar.
    pub fn report_unusable(
        &mut self,
        identifier: &ResourceIdentifier,
        uri: &str,
        error: &GrammarError,
    ) {
        let error = ResourceError::Unusable {
            uri: uri.to_string(),
            reason: error.to_string(),
        };
        self.report(identifier, Some(uri), error);
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures(&self) -> &[ResourceFailure] {
        &self.failures
    }

    pub fn take_diagnostics(&mut self) -> Vec<DiagnosticMessage> {
        std::mem::take(&mut self.diagnostics)
    }

    /// End of pass: when a resource failed, nothing this pass cached may
    /// survive it.
    pub fn dispose(self, pool: &dyn GrammarPool) {
        if self.has_failures() {
            tracing::debug!(
                failures = self.failures.len(),
                "clearing grammar pool after unreachable resources"
            );
            pool.clear();
        }
    }

    fn report(&mut self, identifier: &ResourceIdentifier, uri: Option<&str>, error: ResourceError) {
        let location = uri
            .map(str::to_string)
            .or_else(|| identifier.literal_system_id.clone())
            .unwrap_or_default();
        tracing::debug!(%location, error = %error, "external resource unavailable");
        if self.reported.insert(location.clone()) {
            let code = match identifier.kind {
                ResourceKind::Dtd | ResourceKind::ExternalEntity => "dtd_not_found",
                ResourceKind::Schema => "schema_reference.4",
            };
            let mut builder =
                DiagnosticMessageBuilder::from_code(DiagnosticKind::Error, code, &[&location])
                    .add_detail(error.to_string());
            if let Some(origin) = identifier.origin {
                builder = builder.with_location(origin);
            }
            self.diagnostics.push(builder.build());
        }
        self.failures.push(ResourceFailure {
            identifier: identifier.clone(),
            error,
        });
    }
}

/// Decode resource bytes. On failure returns the name of the encoding that
/// could not be applied.
fn decode(bytes: &[u8]) -> Result<(String, &'static str), String> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return utf8(rest).map(|text| (text, "UTF-8"));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return utf16(rest, u16::from_be_bytes).map(|text| (text, "UTF-16BE"));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return utf16(rest, u16::from_le_bytes).map(|text| (text, "UTF-16LE"));
    }
    match declared_encoding(bytes).as_deref() {
        Some("iso-8859-1" | "latin1" | "latin-1" | "iso_8859-1") => {
            Ok((bytes.iter().map(|&b| char::from(b)).collect(), "ISO-8859-1"))
        }
        Some("us-ascii" | "ascii") if bytes.is_ascii() => {
            Ok((utf8(bytes)?, "US-ASCII"))
        }
        Some("us-ascii" | "ascii") => Err("US-ASCII".to_string()),
        _ => utf8(bytes).map(|text| (text, "UTF-8")),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| "UTF-8".to_string())
}

fn utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err("UTF-16".to_string());
    }
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|_| "UTF-16".to_string())
}

/// The `encoding` pseudo-attribute of a leading `<?xml ...?>`, lowercased.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = bytes.strip_prefix(b"<?xml")?;
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&head[..end]).ok()?;
    let after = &decl[decl.find("encoding")? + "encoding".len()..];
    let after = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &after[1..];
    let close = value.find(quote)?;
    Some(value[..close].trim().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryResourceLoader;
    use xmlls_source_map::Span;

    fn dtd(system_id: &str) -> ResourceIdentifier {
        ResourceIdentifier::new(ResourceKind::Dtd, Some(system_id.to_string()))
            .with_base(Some("file:///w/doc.xml".into()))
            .with_origin(Some(Span::new(20, 30)))
    }

    #[test]
    fn test_loads_existing_resource() {
        let resolver = ResolverExtensionManager::new();
        let loader = MemoryResourceLoader::new();
        loader.insert("file:///w/a.dtd", "<!ELEMENT a EMPTY>");
        let mut entities = EntityManager::new(&resolver, &loader);
        let entity = entities.load_entity(&dtd("a.dtd"));
        assert_eq!(entity.text, "<!ELEMENT a EMPTY>");
        assert_eq!(entity.encoding, "UTF-8");
        assert!(!entity.substituted);
        assert!(!entities.has_failures());
        assert!(entities.take_diagnostics().is_empty());
    }

    #[test]
    fn test_missing_resource_is_substituted_and_reported_once() {
        let resolver = ResolverExtensionManager::new();
        let loader = MemoryResourceLoader::new();
        let mut entities = EntityManager::new(&resolver, &loader);
        let first = entities.load_entity(&dtd("missing.dtd"));
        let second = entities.load_entity(&dtd("missing.dtd"));
        assert!(first.substituted && second.substituted);
        assert_eq!(first.text, "");
        assert_eq!(entities.failures().len(), 2);

        let diagnostics = entities.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code.as_deref(), Some("dtd_not_found"));
        assert_eq!(diagnostics[0].title, "Cannot find DTD 'file:///w/missing.dtd'.");
        assert_eq!(diagnostics[0].location, Some(Span::new(20, 30)));
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Error);
    }

    #[test]
    fn test_undecodable_resource_is_substituted() {
        let resolver = ResolverExtensionManager::new();
        let loader = MemoryResourceLoader::new();
        loader.insert("file:///w/bad.dtd", vec![0x3C, 0xFF, 0xFE, 0xFD]);
        let mut entities = EntityManager::new(&resolver, &loader);
        let entity = entities.load_entity(&dtd("bad.dtd"));
        assert!(entity.substituted);
        assert_eq!(entity.text, "");
        assert!(matches!(
            entities.failures()[0].error,
            ResourceError::Decode { .. }
        ));
        assert_eq!(entities.take_diagnostics().len(), 1);
    }

    #[test]
    fn test_setup_reports_declared_encoding() {
        let resolver = ResolverExtensionManager::new();
        let loader = MemoryResourceLoader::new();
        loader.insert(
            "file:///w/latin.ent",
            b"<?xml encoding='ISO-8859-1'?>caf\xE9".to_vec(),
        );
        let mut entities = EntityManager::new(&resolver, &loader);
        let id = ResourceIdentifier::new(ResourceKind::ExternalEntity, Some("latin.ent".into()))
            .with_base(Some("file:///w/doc.xml".into()));
        let source = entities.resolve_entity(&id);
        assert_eq!(source.uri.as_deref(), Some("file:///w/latin.ent"));
        assert!(!source.substituted);

        let entity = entities.setup_entity(source, &id);
        assert_eq!(entity.encoding, "ISO-8859-1");
        assert!(entity.text.ends_with("caf\u{e9}"));
        assert!(!entities.has_failures());
    }

    #[test]
    fn test_schema_failures_use_schema_code() {
        let resolver = ResolverExtensionManager::new();
        let loader = MemoryResourceLoader::new();
        let mut entities = EntityManager::new(&resolver, &loader);
        let id = ResourceIdentifier::new(ResourceKind::Schema, Some("s.xsd".into()))
            .with_base(Some("file:///w/doc.xml".into()));
        entities.load_entity(&id);
        let diagnostics = entities.take_diagnostics();
        assert_eq!(diagnostics[0].code.as_deref(), Some("schema_reference.4"));
        assert_eq!(diagnostics[0].location, None);
    }

    #[test]
    fn test_decode_variants() {
        assert_eq!(decode(b"\xEF\xBB\xBFabc").unwrap(), ("abc".to_string(), "UTF-8"));
        assert_eq!(
            decode(&[0xFF, 0xFE, b'a', 0, b'b', 0]).unwrap(),
            ("ab".to_string(), "UTF-16LE")
        );
        assert_eq!(
            decode(&[0xFE, 0xFF, 0, b'a']).unwrap(),
            ("a".to_string(), "UTF-16BE")
        );
        let latin = b"<?xml version='1.0' encoding='ISO-8859-1'?><a>\xE9</a>";
        let (text, encoding) = decode(latin).unwrap();
        assert_eq!(encoding, "ISO-8859-1");
        assert!(text.ends_with("<a>\u{e9}</a>"));
        assert!(decode(&[0xFF, 0xFE, b'a']).is_err());
    }

    #[test]
    fn test_declared_encoding() {
        assert_eq!(
            declared_encoding(b"<?xml encoding = \"UTF-8\" ?>").as_deref(),
            Some("utf-8")
        );
        assert_eq!(declared_encoding(b"<?xml version='1.0'?>"), None);
        assert_eq!(declared_encoding(b"<a/>"), None);
    }

    #[test]
    fn test_dispose_clears_pool_only_after_failures() {
        use crate::grammar::{Grammar, GrammarDescription, GrammarType};
        use crate::model::CMDocument;
        use crate::pool::XmlGrammarPool;
        use std::sync::Arc;

        let pool = XmlGrammarPool::new();
        let grammar = Arc::new(Grammar::new(
            GrammarDescription::new(GrammarType::Dtd, "file:///w/a.dtd"),
            Arc::new(CMDocument::new("file:///w/a.dtd", GrammarType::Dtd)),
        ));
        pool.cache_grammars(GrammarType::Dtd, &[grammar]);

        let resolver = ResolverExtensionManager::new();
        let loader = MemoryResourceLoader::new();
        EntityManager::new(&resolver, &loader).dispose(&pool);
        assert_eq!(pool.len(), 1);

        let mut failing = EntityManager::new(&resolver, &loader);
        failing.load_entity(&dtd("missing.dtd"));
        failing.dispose(&pool);
        assert!(pool.is_empty());
    }
}
