//! Grammar-neutral content model: what elements and attributes a grammar
//! declares, independent of whether it came from a DTD or an XML Schema.

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use xmlls_dom::{Attr, Node, Parented};
use xmlls_source_map::Span;

use crate::content::{Automaton, ContentMatcher, ContentModel};
use crate::grammar::GrammarType;

/// Index of an element declaration inside its [`CMDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementDeclId(pub(crate) usize);

/// Index of a content type inside its [`CMDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    Cdata,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Notation(Vec<String>),
    Enumeration(Vec<String>),
}

impl AttributeType {
    /// Parse the type column of a DTD attribute definition.
    pub fn from_dtd(text: &str) -> Self {
        match text.trim() {
            "ID" => AttributeType::Id,
            "IDREF" => AttributeType::IdRef,
            "IDREFS" => AttributeType::IdRefs,
            "ENTITY" => AttributeType::Entity,
            "ENTITIES" => AttributeType::Entities,
            "NMTOKEN" => AttributeType::NmToken,
            "NMTOKENS" => AttributeType::NmTokens,
            other => {
                if let Some(rest) = other.strip_prefix("NOTATION") {
                    AttributeType::Notation(enumeration_values(rest))
                } else if other.starts_with('(') {
                    AttributeType::Enumeration(enumeration_values(other))
                } else {
                    AttributeType::Cdata
                }
            }
        }
    }

    /// The allowed values of an enumerated or notation type.
    pub fn values(&self) -> &[String] {
        match self {
            AttributeType::Notation(values) | AttributeType::Enumeration(values) => values,
            _ => &[],
        }
    }
}

fn enumeration_values(group: &str) -> Vec<String> {
    group
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split('|')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CMAttributeDeclaration {
    pub name: String,
    pub att_type: AttributeType,
    pub required: bool,
    pub default_value: Option<String>,
    /// `#FIXED` (DTD) or `fixed` (XSD): `default_value` is the only legal value.
    pub fixed: bool,
    pub documentation: Option<String>,
}

impl CMAttributeDeclaration {
    pub fn new(name: impl Into<String>, att_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            att_type,
            required: false,
            default_value: None,
            fixed: false,
            documentation: None,
        }
    }

    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    pub fn is_id(&self) -> bool {
        self.att_type == AttributeType::Id
    }

    pub fn is_idref(&self) -> bool {
        matches!(self.att_type, AttributeType::IdRef | AttributeType::IdRefs)
    }

    pub fn enumeration_values(&self) -> &[String] {
        self.att_type.values()
    }
}

/// A content type: content model plus attributes, shared by every element
/// declared with it.
#[derive(Debug)]
pub struct CMType {
    pub name: Option<String>,
    pub content: ContentModel,
    /// The model as written in the grammar, for messages (`(a|b)*`).
    pub model_text: Option<String>,
    pub attributes: Vec<CMAttributeDeclaration>,
    /// Any attribute is allowed (`xs:anyAttribute`).
    pub any_attribute: bool,
    /// Enumeration facet on the text content of a simple type.
    pub text_enumeration: Vec<String>,
    /// Element declarations local to this type, by name.
    pub local_elements: IndexMap<String, ElementDeclId>,
    automaton: OnceCell<Automaton>,
}

impl CMType {
    pub fn new(content: ContentModel) -> Self {
        Self {
            name: None,
            content,
            model_text: None,
            attributes: Vec::new(),
            any_attribute: false,
            text_enumeration: Vec::new(),
            local_elements: IndexMap::new(),
            automaton: OnceCell::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElementDeclData {
    pub name: String,
    pub namespace: Option<String>,
    pub type_id: TypeId,
    pub documentation: Option<String>,
    /// Name span inside the grammar file.
    pub origin: Option<Span>,
}

/// The content model of one grammar resource.
///
/// XSD includes and imports are folded into the same document. For DTDs the
/// internal subset and the external subset each get their own, and
/// [`dtd_attributes`] joins their attribute lists.
#[derive(Debug)]
pub struct CMDocument {
    uri: String,
    grammar_type: GrammarType,
    target_namespace: Option<String>,
    globals: IndexMap<String, ElementDeclId>,
    elements: Vec<ElementDeclData>,
    types: Vec<CMType>,
    entities: IndexMap<String, Option<String>>,
    /// `ATTLIST`s for elements this DTD does not declare itself; the other
    /// subset of the same document may.
    detached_attributes: IndexMap<String, Vec<CMAttributeDeclaration>>,
    /// Every resource this model was read from, starting with `uri`.
    sources: Vec<String>,
}

impl CMDocument {
    pub fn new(uri: impl Into<String>, grammar_type: GrammarType) -> Self {
        let uri = uri.into();
        Self {
            sources: vec![uri.clone()],
            uri,
            grammar_type,
            target_namespace: None,
            globals: IndexMap::new(),
            elements: Vec::new(),
            types: Vec::new(),
            entities: IndexMap::new(),
            detached_attributes: IndexMap::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn grammar_type(&self) -> GrammarType {
        self.grammar_type
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    pub fn set_target_namespace(&mut self, namespace: Option<String>) {
        self.target_namespace = namespace.filter(|ns| !ns.is_empty());
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn add_source(&mut self, uri: impl Into<String>) {
        let uri = uri.into();
        if !self.sources.contains(&uri) {
            self.sources.push(uri);
        }
    }

    // ====== Building ======

    pub fn add_type(&mut self, cm_type: CMType) -> TypeId {
        self.types.push(cm_type);
        TypeId(self.types.len() - 1)
    }

    pub fn type_mut(&mut self, id: TypeId) -> &mut CMType {
        &mut self.types[id.0]
    }

    pub fn content_type(&self, id: TypeId) -> &CMType {
        &self.types[id.0]
    }

    /// Point an existing declaration at another type, once a type that
    /// refers back to the declaration has been built.
    pub fn set_element_type(&mut self, id: ElementDeclId, type_id: TypeId) {
        self.elements[id.0].type_id = type_id;
    }

    pub fn add_element(&mut self, data: ElementDeclData) -> ElementDeclId {
        self.elements.push(data);
        ElementDeclId(self.elements.len() - 1)
    }

    /// Register a top-level declaration. The first declaration of a name
    /// wins.
    pub fn add_global(&mut self, data: ElementDeclData) -> ElementDeclId {
        if let Some(existing) = self.globals.get(&data.name) {
            return *existing;
        }
        let name = data.name.clone();
        let id = self.add_element(data);
        self.globals.insert(name, id);
        id
    }

    pub fn add_entity(&mut self, name: impl Into<String>, value: Option<String>) {
        self.entities.entry(name.into()).or_insert(value);
    }

    pub fn add_detached_attributes(
        &mut self,
        element: impl Into<String>,
        attributes: Vec<CMAttributeDeclaration>,
    ) {
        let declared = self.detached_attributes.entry(element.into()).or_default();
        for attribute in attributes {
            if !declared.iter().any(|known| known.name == attribute.name) {
                declared.push(attribute);
            }
        }
    }

    // ====== Queries ======

    pub fn element(&self, id: ElementDeclId) -> CMElementDeclaration<'_> {
        CMElementDeclaration { doc: self, id }
    }

    /// Top-level element declarations, in declaration order.
    pub fn elements(&self) -> impl Iterator<Item = CMElementDeclaration<'_>> + '_ {
        self.globals.values().map(|id| self.element(*id))
    }

    pub fn find_global(&self, name: &str) -> Option<CMElementDeclaration<'_>> {
        self.globals.get(name).map(|id| self.element(*id))
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Attributes declared for `element` although this DTD does not
    /// declare the element.
    pub fn detached_attributes(&self, element: &str) -> &[CMAttributeDeclaration] {
        self.detached_attributes
            .get(element)
            .map_or(&[], Vec::as_slice)
    }

    /// Whether this model can declare elements of `namespace`.
    pub fn covers_namespace(&self, namespace: Option<&str>) -> bool {
        match self.grammar_type {
            GrammarType::Dtd => true,
            _ => self.target_namespace() == namespace,
        }
    }

    /// The declaration governing `element` in the tree.
    ///
    /// DTD declarations are global, so the lookup is by qualified name. For
    /// schemas the declaration of a nested element depends on its parent's
    /// type, so the lookup walks down from the root.
    pub fn find_cm_element(&self, element: Node<'_>) -> Option<CMElementDeclaration<'_>> {
        let name = element.name()?;
        if self.grammar_type == GrammarType::Dtd {
            return self.find_global(name);
        }
        let mut path: Vec<Node<'_>> = std::iter::once(element)
            .chain(element.ancestors())
            .filter(|node| node.is_element())
            .collect();
        path.reverse();
        let mut nodes = path.into_iter();
        let root = nodes.next()?;
        let mut decl = self.find_global(root.local_name()?)?;
        for node in nodes {
            decl = decl.find_child(node.local_name()?)?;
        }
        Some(decl)
    }

    pub fn find_cm_attribute(&self, attr: Attr<'_>) -> Option<&CMAttributeDeclaration> {
        let owner = attr.parent()?;
        let decl = self.find_cm_element(owner)?;
        decl.find_attribute(attr.name())
    }
}

/// The attribute declarations of the DTD element `element` across the
/// subsets of one document, given internal subset first. The first
/// declaration of an attribute is binding.
pub fn dtd_attributes<'a>(subsets: &[&'a CMDocument], element: &str) -> Vec<&'a CMAttributeDeclaration> {
    let mut merged: Vec<&'a CMAttributeDeclaration> = Vec::new();
    for &subset in subsets {
        let declared = subset
            .find_global(element)
            .map_or(&[][..], |decl| decl.attributes());
        for attribute in declared.iter().chain(subset.detached_attributes(element)) {
            if !merged.iter().any(|known| known.name == attribute.name) {
                merged.push(attribute);
            }
        }
    }
    merged
}

/// Find `name` among `attributes`, by qualified name first and then by
/// local name.
pub fn find_attribute_in<'a>(
    attributes: impl Iterator<Item = &'a CMAttributeDeclaration> + Clone,
    name: &str,
) -> Option<&'a CMAttributeDeclaration> {
    let local = name.split_once(':').map_or(name, |(_, local)| local);
    attributes
        .clone()
        .find(|attr| attr.name == name)
        .or_else(|| attributes.into_iter().find(|attr| attr.local_name() == local))
}

/// A borrowed handle to an element declaration.
#[derive(Debug, Clone, Copy)]
pub struct CMElementDeclaration<'a> {
    doc: &'a CMDocument,
    id: ElementDeclId,
}

impl PartialEq for CMElementDeclaration<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl<'a> CMElementDeclaration<'a> {
    fn data(&self) -> &'a ElementDeclData {
        &self.doc.elements[self.id.0]
    }

    pub fn id(&self) -> ElementDeclId {
        self.id
    }

    pub fn document(&self) -> &'a CMDocument {
        self.doc
    }

    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    pub fn namespace(&self) -> Option<&'a str> {
        self.data().namespace.as_deref()
    }

    pub fn documentation(&self) -> Option<&'a str> {
        self.data().documentation.as_deref()
    }

    pub fn origin(&self) -> Option<Span> {
        self.data().origin
    }

    pub fn type_id(&self) -> TypeId {
        self.data().type_id
    }

    pub fn cm_type(&self) -> &'a CMType {
        &self.doc.types[self.data().type_id.0]
    }

    pub fn content(&self) -> &'a ContentModel {
        &self.cm_type().content
    }

    pub fn is_empty(&self) -> bool {
        self.content() == &ContentModel::Empty
    }

    pub fn attributes(&self) -> &'a [CMAttributeDeclaration] {
        &self.cm_type().attributes
    }

    /// Attribute declaration by qualified or local name.
    pub fn find_attribute(&self, name: &str) -> Option<&'a CMAttributeDeclaration> {
        find_attribute_in(self.attributes().iter(), name)
    }

    /// The declaration of a child element named `name`.
    pub fn find_child(&self, name: &str) -> Option<CMElementDeclaration<'a>> {
        if let Some(id) = self.cm_type().local_elements.get(name) {
            return Some(self.doc.element(*id));
        }
        if self.doc.grammar_type == GrammarType::Dtd || self.possible_children().contains(&name) {
            return self.doc.find_global(name);
        }
        None
    }

    /// Names of the elements the content model allows as children.
    pub fn possible_children(&self) -> Vec<&'a str> {
        match self.content() {
            ContentModel::Elements { particle, .. } => particle.element_names(),
            ContentModel::Mixed(names) => names.iter().map(String::as_str).collect(),
            ContentModel::Any => self.doc.globals.keys().map(String::as_str).collect(),
            ContentModel::Empty | ContentModel::Text => Vec::new(),
        }
    }

    /// A fresh matcher for this element's children.
    pub fn matcher(&self) -> ContentMatcher<'a> {
        let cm_type = self.cm_type();
        cm_type
            .automaton
            .get_or_init(|| cm_type.content.compile())
            .matcher()
    }

    /// The content model as written, or a rendering of the expected names.
    pub fn model_text(&self) -> Option<&'a str> {
        self.cm_type().model_text.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Particle;

    fn sample() -> CMDocument {
        let mut doc = CMDocument::new("file:///note.xsd", GrammarType::Xsd);
        let text = doc.add_type(CMType::new(ContentModel::Text));
        let mut note_type = CMType::new(ContentModel::Elements {
            particle: Particle::element("to"),
            mixed: false,
        });
        let mut id = CMAttributeDeclaration::new("id", AttributeType::Id);
        id.required = true;
        note_type.attributes.push(id);
        let note_type = doc.add_type(note_type);
        let to = doc.add_element(ElementDeclData {
            name: "to".into(),
            namespace: None,
            type_id: text,
            documentation: None,
            origin: None,
        });
        doc.type_mut(note_type).local_elements.insert("to".into(), to);
        doc.add_global(ElementDeclData {
            name: "note".into(),
            namespace: None,
            type_id: note_type,
            documentation: Some("A note".into()),
            origin: None,
        });
        doc
    }

    #[test]
    fn test_attribute_type_from_dtd() {
        assert_eq!(AttributeType::from_dtd("ID"), AttributeType::Id);
        assert_eq!(AttributeType::from_dtd("CDATA"), AttributeType::Cdata);
        assert_eq!(
            AttributeType::from_dtd("( yes | no )"),
            AttributeType::Enumeration(vec!["yes".into(), "no".into()])
        );
        assert_eq!(
            AttributeType::from_dtd("NOTATION (gif|png)").values(),
            &["gif".to_string(), "png".to_string()]
        );
    }

    #[test]
    fn test_find_cm_element_walks_local_declarations() {
        let cm = sample();
        let xml = xmlls_dom::parse("<note id=\"n\"><to/></note>");
        let to = xml.root_element().unwrap().first_child().unwrap();
        let decl = cm.find_cm_element(to).unwrap();
        assert_eq!(decl.name(), "to");
        assert_eq!(decl.content(), &ContentModel::Text);

        let attr = xml.root_element().unwrap().attribute("id").unwrap();
        assert!(cm.find_cm_attribute(attr).unwrap().is_id());
    }

    #[test]
    fn test_global_lookup_and_documentation() {
        let cm = sample();
        let note = cm.find_global("note").unwrap();
        assert_eq!(note.documentation(), Some("A note"));
        assert_eq!(note.possible_children(), vec!["to"]);
        assert!(cm.find_global("to").is_none());
        assert!(note.find_child("from").is_none());
    }

    #[test]
    fn test_first_global_wins() {
        let mut cm = sample();
        let text = cm.add_type(CMType::new(ContentModel::Empty));
        let id = cm.add_global(ElementDeclData {
            name: "note".into(),
            namespace: None,
            type_id: text,
            documentation: None,
            origin: None,
        });
        assert_eq!(cm.find_global("note").unwrap().id(), id);
        assert_eq!(cm.elements().count(), 1);
        assert!(!cm.find_global("note").unwrap().is_empty());
    }

    #[test]
    fn test_matcher_is_shared_per_type() {
        let cm = sample();
        let note = cm.find_global("note").unwrap();
        let mut matcher = note.matcher();
        assert!(matcher.accept("to"));
        assert!(matcher.is_complete());
    }
}
