//! Generating an instance skeleton from a content model.

use std::fmt::Write;

use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use xmlls_dom::XSI_NS;

use crate::content::{ContentModel, Particle, Term};
use crate::grammar::GrammarType;
use crate::model::{CMDocument, CMElementDeclaration};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorOptions {
    pub indent: String,
    /// Where the generated document should point at its grammar: a DOCTYPE
    /// system id for DTDs, a schema location for XML Schema.
    pub grammar_uri: Option<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            grammar_uri: None,
        }
    }
}

/// An XML document whose root is `root` with its required attributes and
/// required children filled in. `None` when `root` is not a global element
/// of `cm_document`.
pub fn generate_xml(cm_document: &CMDocument, root: &str, options: &GeneratorOptions) -> Option<String> {
    let decl = cm_document.find_global(root)?;
    let mut generator = Generator {
        options,
        out: String::new(),
        open: Vec::new(),
    };
    let mut root_attributes = Vec::new();
    match (cm_document.grammar_type(), options.grammar_uri.as_deref()) {
        (GrammarType::Dtd, Some(uri)) => {
            let _ = writeln!(generator.out, "<!DOCTYPE {root} SYSTEM \"{}\">", escape(uri));
        }
        (GrammarType::Xsd, uri) => {
            if let Some(namespace) = cm_document.target_namespace() {
                root_attributes.push(("xmlns".to_string(), namespace.to_string()));
            }
            if let Some(uri) = uri {
                root_attributes.push(("xmlns:xsi".to_string(), XSI_NS.to_string()));
                root_attributes.push(match cm_document.target_namespace() {
                    Some(namespace) => ("xsi:schemaLocation".to_string(), format!("{namespace} {uri}")),
                    None => ("xsi:noNamespaceSchemaLocation".to_string(), uri.to_string()),
                });
            }
        }
        _ => {}
    }
    generator.element(decl, 0, &root_attributes);
    Some(generator.out)
}

struct Generator<'o> {
    options: &'o GeneratorOptions,
    out: String,
    /// Elements being expanded, to stop at recursive content.
    open: Vec<String>,
}

impl Generator<'_> {
    fn element(&mut self, decl: CMElementDeclaration<'_>, depth: usize, extra: &[(String, String)]) {
        let name = decl.name();
        let indent = self.options.indent.repeat(depth);
        let _ = write!(self.out, "{indent}<{name}");
        for (attribute, value) in extra {
            let _ = write!(self.out, " {attribute}=\"{}\"", escape(value.as_str()));
        }
        for attribute in decl.attributes().iter().filter(|attribute| attribute.required) {
            let value = attribute
                .default_value
                .as_deref()
                .or_else(|| attribute.enumeration_values().first().map(String::as_str))
                .unwrap_or_default();
            let _ = write!(self.out, " {}=\"{}\"", attribute.name, escape(value));
        }

        let recursive = self.open.iter().any(|open| open == name);
        let children = match decl.content() {
            ContentModel::Elements { particle, .. } if !recursive => required_children(particle),
            _ => Vec::new(),
        };
        if decl.is_empty() || recursive {
            self.out.push_str("/>\n");
            return;
        }
        if children.is_empty() {
            let _ = writeln!(self.out, "></{name}>");
            return;
        }

        self.out.push_str(">\n");
        self.open.push(name.to_string());
        for child in children {
            match decl.find_child(child) {
                Some(child_decl) => self.element(child_decl, depth + 1, &[]),
                None => {
                    let child_indent = self.options.indent.repeat(depth + 1);
                    let _ = writeln!(self.out, "{child_indent}<{child}/>");
                }
            }
        }
        self.open.pop();
        let _ = writeln!(self.out, "{indent}</{name}>");
    }
}

/// The element names a particle needs at minimum, in order. A choice
/// contributes its first alternative.
fn required_children(particle: &Particle) -> Vec<&str> {
    if particle.min == 0 {
        return Vec::new();
    }
    required_terms(&particle.term, particle.min)
}

fn required_terms(term: &Term, copies: u32) -> Vec<&str> {
    match term {
        Term::Element(name) => vec![name.as_str(); copies as usize],
        Term::Sequence(items) => items.iter().flat_map(required_children).collect(),
        Term::Choice(items) => items
            .first()
            .map(|first| required_terms(&first.term, first.min.max(1)))
            .unwrap_or_default(),
        Term::Any => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryResourceLoader;
    use crate::manager::ContentModelManager;
    use std::sync::Arc;
    use xmlls_dom::parse_with_uri;

    fn internal_model(subset: &str) -> Arc<CMDocument> {
        let manager = ContentModelManager::new(Arc::new(MemoryResourceLoader::new()));
        let doc = parse_with_uri(format!("<!DOCTYPE x [{subset}]><x/>"), "file:///gen.xml");
        let root = doc.root_element().unwrap();
        manager.find_cm_document(root).remove(0)
    }

    #[test]
    fn test_required_content() {
        let cm = internal_model(
            r#"<!ELEMENT note (to+, from?, (body|summary), list*)>
<!ATTLIST note id ID #REQUIRED kind (memo|letter) #REQUIRED lang CDATA "en">
<!ELEMENT to (#PCDATA)>
<!ELEMENT from (#PCDATA)>
<!ELEMENT body (#PCDATA)>
<!ELEMENT summary (#PCDATA)>
<!ELEMENT list (note)*>
<!ELEMENT x EMPTY>"#,
        );
        let options = GeneratorOptions {
            grammar_uri: Some("note.dtd".to_string()),
            ..Default::default()
        };
        let xml = generate_xml(&cm, "note", &options).unwrap();
        insta::assert_snapshot!(xml.trim_end(), @r#"
        <!DOCTYPE note SYSTEM "note.dtd">
        <note id="" kind="memo">
          <to></to>
          <body></body>
        </note>
        "#);
        assert!(generate_xml(&cm, "missing", &options).is_none());
    }

    #[test]
    fn test_recursive_content_stops() {
        let cm = internal_model("<!ELEMENT tree (tree)><!ELEMENT x EMPTY>");
        let xml = generate_xml(&cm, "tree", &GeneratorOptions::default()).unwrap();
        assert_eq!(xml, "<tree>\n  <tree/>\n</tree>\n");
    }
}
