//! DTD content models, from the DOCTYPE internal subset or from external
//! `.dtd` files.

use std::collections::HashMap;

use indexmap::IndexMap;
use xmlls_dom::{Document, Node, NodeKind};
use xmlls_source_map::Span;

use super::{ContentModelProvider, LoadContext};
use crate::content::{ContentModel, Particle, Term};
use crate::error::GrammarError;
use crate::grammar::GrammarType;
use crate::model::{AttributeType, CMAttributeDeclaration, CMDocument, CMType, ElementDeclData};
use crate::resolver::{ResourceIdentifier, ResourceKind};

#[derive(Debug, Default, Clone, Copy)]
pub struct DtdContentModelProvider;

impl ContentModelProvider for DtdContentModelProvider {
    fn grammar_type(&self) -> GrammarType {
        GrammarType::Dtd
    }

    fn adapt_for_document(&self, doc: &Document, internal: bool) -> bool {
        let Some(doctype) = doc.doctype() else {
            return false;
        };
        if internal {
            doctype.children().any(|child| child.is_dtd_decl())
        } else {
            doctype.doctype_data().is_some_and(|data| data.system_id.is_some())
        }
    }

    fn adapt_for_uri(&self, uri: &str) -> bool {
        GrammarType::from_uri(uri) == Some(GrammarType::Dtd)
    }

    fn identifiers(&self, doc: &Document, _namespace: Option<&str>) -> Vec<ResourceIdentifier> {
        let Some(doctype) = doc.doctype() else {
            return Vec::new();
        };
        let Some(data) = doctype.doctype_data() else {
            return Vec::new();
        };
        let Some(system_id) = data.system_id else {
            return Vec::new();
        };
        let public_id = data.public_id.map(|span| literal(doctype, span).to_string());
        vec![
            ResourceIdentifier::new(
                ResourceKind::Dtd,
                Some(literal(doctype, system_id).to_string()),
            )
            .with_public_id(public_id)
            .with_base(doc.uri().map(str::to_string))
            .with_origin(Some(system_id)),
        ]
    }

    fn create_cm_document(
        &self,
        uri: &str,
        content: &str,
        context: &mut LoadContext<'_, '_>,
    ) -> Result<CMDocument, GrammarError> {
        let dtd = xmlls_dom::parse_dtd(content, Some(uri.to_string()));
        let mut builder = DtdBuilder::new(CMDocument::new(uri, GrammarType::Dtd));
        builder.read(dtd.document_node(), Some(context));
        let cm = builder.finish();
        tracing::debug!(%uri, elements = cm.elements().count(), "built DTD content model");
        Ok(cm)
    }

    fn create_internal_cm_document(&self, doc: &Document) -> Option<CMDocument> {
        let doctype = doc.doctype()?;
        let uri = doc.uri().unwrap_or_default();
        let mut builder = DtdBuilder::new(CMDocument::new(uri, GrammarType::Dtd));
        builder.read(doctype, None);
        Some(builder.finish())
    }
}

/// Text of a quoted literal without its quotes.
fn literal<'a>(node: Node<'a>, span: Span) -> &'a str {
    let raw = node.slice(span);
    let inner = raw.get(1..).unwrap_or_default();
    match raw.chars().next() {
        Some(quote @ ('"' | '\'')) => inner.strip_suffix(quote).unwrap_or(inner),
        _ => raw,
    }
}

struct DtdBuilder {
    cm: CMDocument,
    parameter_entities: HashMap<String, String>,
    attlists: IndexMap<String, Vec<CMAttributeDeclaration>>,
}

impl DtdBuilder {
    fn new(cm: CMDocument) -> Self {
        Self {
            cm,
            parameter_entities: HashMap::new(),
            attlists: IndexMap::new(),
        }
    }

    /// Read the declarations under `container`: the document node of a DTD
    /// file or a DOCTYPE node.
    fn read(&mut self, container: Node<'_>, mut context: Option<&mut LoadContext<'_, '_>>) {
        let mut previous: Option<Node<'_>> = None;
        for decl in container.children() {
            match decl.kind() {
                NodeKind::EntityDecl(data) => {
                    let Some(name) = data.name.map(|span| decl.slice(span)) else {
                        continue;
                    };
                    let value = data.value.map(|span| literal(decl, span).to_string());
                    if !data.parameter {
                        self.cm.add_entity(name, value);
                    } else if let Some(value) = value {
                        self.parameter_entities
                            .entry(name.to_string())
                            .or_insert(value);
                    } else if let (Some(system_id), Some(context)) =
                        (data.system_id, context.as_deref_mut())
                    {
                        let identifier = ResourceIdentifier::new(
                            ResourceKind::ExternalEntity,
                            Some(literal(decl, system_id).to_string()),
                        )
                        .with_public_id(data.public_id.map(|span| literal(decl, span).to_string()))
                        .with_base(decl.document().uri().map(str::to_string));
                        if let Some(entity) = context.load(identifier) {
                            let module = xmlls_dom::parse_dtd(entity.text, entity.uri.clone());
                            if let Some(uri) = entity.uri {
                                self.cm.add_source(uri);
                            }
                            self.read(module.document_node(), Some(context));
                        }
                    }
                }
                NodeKind::ElementDecl(data) => {
                    let (Some(name), Some(content)) = (data.name, data.content) else {
                        continue;
                    };
                    let name = decl.slice(name).to_string();
                    if self.cm.find_global(&name).is_some() {
                        continue;
                    }
                    let model = self.expand(decl.slice(content));
                    let mut cm_type = CMType::new(parse_content_model(&model));
                    cm_type.model_text = Some(model.split_whitespace().collect());
                    let type_id = self.cm.add_type(cm_type);
                    let documentation = previous
                        .filter(|node| node.is_comment())
                        .map(|comment| comment.text_content().trim().to_string())
                        .filter(|text| !text.is_empty());
                    self.cm.add_global(ElementDeclData {
                        name,
                        namespace: None,
                        type_id,
                        documentation,
                        origin: data.name,
                    });
                }
                NodeKind::AttlistDecl(data) => {
                    let Some(element) = data.element_name.map(|span| decl.slice(span)) else {
                        continue;
                    };
                    let mut attributes = Vec::new();
                    for def in &data.definitions {
                        let att_type = def
                            .att_type
                            .map(|span| AttributeType::from_dtd(&self.expand(decl.slice(span))))
                            .unwrap_or(AttributeType::Cdata);
                        let mut attribute = CMAttributeDeclaration::new(decl.slice(def.name), att_type);
                        let default_kind = def.default_kind.map(|span| decl.slice(span));
                        attribute.required = default_kind == Some("#REQUIRED");
                        attribute.fixed = default_kind == Some("#FIXED");
                        attribute.default_value =
                            def.default_value.map(|span| literal(decl, span).to_string());
                        attributes.push(attribute);
                    }
                    let declared = self.attlists.entry(element.to_string()).or_default();
                    for attribute in attributes {
                        if !declared.iter().any(|known| known.name == attribute.name) {
                            declared.push(attribute);
                        }
                    }
                }
                _ => {}
            }
            if !decl.is_whitespace_text() {
                previous = Some(decl);
            }
        }
    }

    /// Replace parameter entity references with their values.
    fn expand(&self, text: &str) -> String {
        let mut text = text.to_string();
        // Bounded so a self-referencing entity cannot loop.
        for _ in 0..8 {
            if !text.contains('%') {
                break;
            }
            let mut out = String::with_capacity(text.len());
            let mut rest = text.as_str();
            let mut changed = false;
            while let Some(start) = rest.find('%') {
                out.push_str(&rest[..start]);
                let after = &rest[start + 1..];
                let replacement = after.find(';').and_then(|semi| {
                    self.parameter_entities
                        .get(&after[..semi])
                        .map(|value| (value, semi))
                });
                match replacement {
                    Some((value, semi)) => {
                        out.push_str(value);
                        rest = &after[semi + 1..];
                        changed = true;
                    }
                    None => {
                        out.push('%');
                        rest = after;
                    }
                }
            }
            out.push_str(rest);
            text = out;
            if !changed {
                break;
            }
        }
        text
    }

    fn finish(mut self) -> CMDocument {
        for (element, attributes) in std::mem::take(&mut self.attlists) {
            match self.cm.find_global(&element).map(|decl| decl.type_id()) {
                Some(type_id) => self.cm.type_mut(type_id).attributes.extend(attributes),
                None => {
                    tracing::trace!(%element, "attribute list for element declared elsewhere");
                    self.cm.add_detached_attributes(element, attributes);
                }
            }
        }
        self.cm
    }
}

/// Parse a DTD content specification: `EMPTY`, `ANY`, mixed content or an
/// element content group. Unparseable models are treated as `ANY`.
pub(crate) fn parse_content_model(text: &str) -> ContentModel {
    let text = text.trim();
    match text {
        "EMPTY" => return ContentModel::Empty,
        "ANY" => return ContentModel::Any,
        _ => {}
    }
    let body = text.trim_start_matches('(').trim_start();
    if body.starts_with("#PCDATA") {
        let names: Vec<String> = text
            .trim_end_matches(['*', ' '])
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split('|')
            .skip(1)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        return if names.is_empty() {
            ContentModel::Text
        } else {
            ContentModel::Mixed(names)
        };
    }
    let mut parser = ModelParser { text, pos: 0 };
    match parser.particle() {
        Some(particle) if parser.at_end() => ContentModel::Elements {
            particle,
            mixed: false,
        },
        _ => {
            tracing::debug!(model = %text, "unparseable content model");
            ContentModel::Any
        }
    }
}

struct ModelParser<'t> {
    text: &'t str,
    pos: usize,
}

impl ModelParser<'_> {
    fn peek(&mut self) -> Option<char> {
        let skipped = self.text[self.pos..]
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(self.text.len() - self.pos);
        self.pos += skipped;
        self.text[self.pos..].chars().next()
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn particle(&mut self) -> Option<Particle> {
        let particle = if self.peek()? == '(' {
            self.bump();
            self.group()?
        } else {
            let rest = &self.text[self.pos..];
            let len = rest
                .find(|c: char| c.is_whitespace() || "(),|?*+".contains(c))
                .unwrap_or(rest.len());
            if len == 0 {
                return None;
            }
            self.pos += len;
            Particle::element(&rest[..len])
        };
        let indicator = self.text[self.pos..]
            .chars()
            .next()
            .filter(|c| matches!(c, '?' | '*' | '+'));
        if indicator.is_some() {
            self.bump();
        }
        Some(particle.with_indicator(indicator))
    }

    fn group(&mut self) -> Option<Particle> {
        let mut items = vec![self.particle()?];
        let mut separator = None;
        loop {
            match self.peek()? {
                ')' => {
                    self.bump();
                    break;
                }
                c @ (',' | '|') => {
                    if separator.is_some_and(|sep| sep != c) {
                        return None;
                    }
                    separator = Some(c);
                    self.bump();
                    items.push(self.particle()?);
                }
                _ => return None,
            }
        }
        let term = match separator {
            Some('|') => Term::Choice(items),
            _ => Term::Sequence(items),
        };
        Some(Particle::new(term, 1, Some(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_manager::EntityManager;
    use crate::loader::MemoryResourceLoader;
    use crate::resolver::ResolverExtensionManager;

    #[test]
    fn test_parse_content_models() {
        assert_eq!(parse_content_model("EMPTY"), ContentModel::Empty);
        assert_eq!(parse_content_model("ANY"), ContentModel::Any);
        assert_eq!(parse_content_model("(#PCDATA)"), ContentModel::Text);
        assert_eq!(
            parse_content_model("(#PCDATA | b | i)*"),
            ContentModel::Mixed(vec!["b".into(), "i".into()])
        );
        let ContentModel::Elements { particle, .. } = parse_content_model("(a, (b | c)*, d?)+")
        else {
            panic!("expected element content");
        };
        assert_eq!((particle.min, particle.max), (1, None));
        assert_eq!(particle.element_names(), vec!["a", "b", "c", "d"]);
        assert_eq!(parse_content_model("(a, b | c)"), ContentModel::Any);
    }

    #[test]
    fn test_internal_subset() {
        let doc = xmlls_dom::parse_with_uri(
            r#"<!DOCTYPE note [
  <!ENTITY % body "to, body">
  <!-- A short message -->
  <!ELEMENT note (%body;)>
  <!ELEMENT to (#PCDATA)>
  <!ATTLIST note id ID #REQUIRED kind (memo|letter) "memo">
  <!ATTLIST note id CDATA #IMPLIED>
  <!ENTITY sig "Regards">
]>
<note/>"#,
            "file:///w/note.xml",
        );
        let provider = DtdContentModelProvider;
        assert!(provider.adapt_for_document(&doc, true));
        assert!(!provider.adapt_for_document(&doc, false));
        let cm = provider.create_internal_cm_document(&doc).unwrap();

        let note = cm.find_global("note").unwrap();
        assert_eq!(note.documentation(), Some("A short message"));
        assert_eq!(note.model_text(), Some("(to,body)"));
        assert_eq!(note.possible_children(), vec!["to", "body"]);
        assert!(note.find_attribute("id").unwrap().is_id());
        assert!(note.find_attribute("id").unwrap().required);
        assert_eq!(
            note.find_attribute("kind").unwrap().enumeration_values(),
            &["memo".to_string(), "letter".to_string()]
        );
        assert_eq!(note.attributes().len(), 2);
        assert!(cm.has_entity("sig"));
        assert_eq!(
            note.origin().map(|span| span.slice(doc.text())),
            Some("note")
        );
    }

    #[test]
    fn test_attribute_list_without_element_is_kept() {
        let doc = xmlls_dom::parse_with_uri(
            r#"<!DOCTYPE note SYSTEM "note.dtd" [<!ATTLIST note extra CDATA #REQUIRED>]><note/>"#,
            "file:///w/note.xml",
        );
        let cm = DtdContentModelProvider.create_internal_cm_document(&doc).unwrap();
        assert!(cm.find_global("note").is_none());
        let detached = cm.detached_attributes("note");
        assert_eq!(detached.len(), 1);
        assert_eq!(detached[0].name, "extra");
        assert!(detached[0].required);
    }

    #[test]
    fn test_identifiers_point_at_system_literal() {
        let text = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0//EN" "xhtml.dtd"><html/>"#;
        let doc = xmlls_dom::parse_with_uri(text, "file:///w/a.xml");
        let ids = DtdContentModelProvider.identifiers(&doc, None);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].literal_system_id.as_deref(), Some("xhtml.dtd"));
        assert_eq!(ids[0].public_id.as_deref(), Some("-//W3C//DTD XHTML 1.0//EN"));
        assert_eq!(ids[0].origin.map(|s| s.slice(text)), Some("\"xhtml.dtd\""));
        assert!(DtdContentModelProvider.adapt_for_document(&doc, false));
        assert!(DtdContentModelProvider.adapt_for_uri("file:///x/mod.ent"));
    }

    #[test]
    fn test_external_parameter_entity_module() {
        let resolver = ResolverExtensionManager::new();
        let loader = MemoryResourceLoader::new();
        loader.insert(
            "file:///d/inline.mod",
            "<!ELEMENT b (#PCDATA)><!ATTLIST b class CDATA #FIXED 'x'>",
        );
        let mut entities = EntityManager::new(&resolver, &loader);
        let mut context = LoadContext::new(&mut entities, "file:///d/main.dtd", None);
        let cm = DtdContentModelProvider
            .create_cm_document(
                "file:///d/main.dtd",
                "<!ENTITY % inline SYSTEM 'inline.mod'> %inline; <!ELEMENT p (b)*>",
                &mut context,
            )
            .unwrap();
        assert_eq!(context.sources().len(), 1);
        let b = cm.find_global("b").unwrap();
        let class = b.find_attribute("class").unwrap();
        assert!(class.fixed);
        assert_eq!(class.default_value.as_deref(), Some("x"));
        assert_eq!(cm.sources(), &["file:///d/main.dtd", "file:///d/inline.mod"]);
        assert!(cm.find_global("p").is_some());
    }
}
