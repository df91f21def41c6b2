//! XML Schema content models.
//!
//! The schema and everything it includes or imports are parsed with the
//! tolerant DOM and folded into one [`CMDocument`]. Only the structural
//! part of XSD is modelled: element declarations, content particles,
//! attributes and enumerations. Facets other than `enumeration` are
//! ignored.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use xmlls_dom::{Document, Node, NodeId, XSD_NS};
use xmlls_source_map::Span;

use super::{ContentModelProvider, LoadContext};
use crate::content::{ContentModel, Particle, Term};
use crate::error::GrammarError;
use crate::grammar::GrammarType;
use crate::model::{
    AttributeType, CMAttributeDeclaration, CMDocument, CMType, ElementDeclData, ElementDeclId,
    TypeId,
};
use crate::resolver::{ResourceIdentifier, ResourceKind};

/// Occurrence bounds above this are treated as unbounded.
const MAX_OCCURS_LIMIT: u32 = 64;

#[derive(Debug, Default, Clone, Copy)]
pub struct XsdContentModelProvider;

impl ContentModelProvider for XsdContentModelProvider {
    fn grammar_type(&self) -> GrammarType {
        GrammarType::Xsd
    }

    fn adapt_for_document(&self, doc: &Document, internal: bool) -> bool {
        !internal && doc.has_schema_location()
    }

    fn adapt_for_uri(&self, uri: &str) -> bool {
        GrammarType::from_uri(uri) == Some(GrammarType::Xsd)
    }

    fn identifiers(&self, doc: &Document, namespace: Option<&str>) -> Vec<ResourceIdentifier> {
        let base = doc.uri().map(str::to_string);
        match namespace {
            None => doc
                .no_namespace_schema_location()
                .map(|hint| {
                    ResourceIdentifier::new(ResourceKind::Schema, Some(hint.location))
                        .with_base(base.clone())
                        .with_origin(Some(hint.location_span))
                })
                .into_iter()
                .collect(),
            Some(namespace) => doc
                .schema_location_hints()
                .into_iter()
                .filter(|hint| hint.namespace == namespace)
                .map(|hint| {
                    ResourceIdentifier::new(ResourceKind::Schema, Some(hint.location))
                        .with_namespace(Some(hint.namespace))
                        .with_base(base.clone())
                        .with_origin(Some(hint.location_span))
                })
                .collect(),
        }
    }

    fn create_cm_document(
        &self,
        uri: &str,
        content: &str,
        context: &mut LoadContext<'_, '_>,
    ) -> Result<CMDocument, GrammarError> {
        let main = xmlls_dom::parse_with_uri(content, uri);
        let root = main.root_element().ok_or_else(|| GrammarError::Empty {
            uri: uri.to_string(),
        })?;
        if !is_xsd(root, "schema") {
            return Err(GrammarError::NotASchema {
                uri: uri.to_string(),
                root: root.name().unwrap_or_default().to_string(),
            });
        }
        let main = SchemaDoc::new(main, None, false);
        let mut cm = CMDocument::new(uri, GrammarType::Xsd);
        cm.set_target_namespace(main.target_namespace.clone());

        let schemas = load_referenced(main, context, &mut cm);
        let mut builder = SchemaBuilder::new(&schemas, cm);
        builder.declare_globals();
        let cm = builder.cm;
        tracing::debug!(
            %uri,
            schemas = schemas.len(),
            elements = cm.elements().count(),
            "built XML Schema content model"
        );
        Ok(cm)
    }

    fn create_internal_cm_document(&self, _doc: &Document) -> Option<CMDocument> {
        None
    }
}

fn is_xsd(node: Node<'_>, local: &str) -> bool {
    node.local_name() == Some(local) && node.namespace_uri() == Some(XSD_NS)
}

/// Child elements in the XSD namespace, annotations excluded.
fn xsd_children<'a>(node: Node<'a>) -> impl Iterator<Item = Node<'a>> + 'a {
    node.child_elements().filter(|child| {
        child.namespace_uri() == Some(XSD_NS) && child.local_name() != Some("annotation")
    })
}

fn local_part(qname: &str) -> &str {
    qname.split_once(':').map_or(qname, |(_, local)| local)
}

fn documentation(node: Node<'_>) -> Option<String> {
    let text = node
        .child_elements()
        .filter(|child| is_xsd(*child, "annotation"))
        .flat_map(|annotation| annotation.child_elements())
        .filter(|child| is_xsd(*child, "documentation"))
        .map(|doc| doc.text_content().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}

fn occurrence(node: Node<'_>) -> (u32, Option<u32>) {
    let min = node
        .attribute_value("minOccurs")
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(1u32);
    let max = match node.attribute_value("maxOccurs").map(str::trim) {
        Some("unbounded") => None,
        Some(value) => Some(value.parse().unwrap_or(1u32)),
        None => Some(1),
    };
    match max {
        Some(max) if max > MAX_OCCURS_LIMIT => (min.min(MAX_OCCURS_LIMIT), None),
        max => (min.min(MAX_OCCURS_LIMIT), max),
    }
}

struct SchemaDoc {
    document: Document,
    target_namespace: Option<String>,
    elements_qualified: bool,
    /// Components of an imported schema live in another namespace: they are
    /// reachable by reference but are not globals of this model.
    imported: bool,
}

impl SchemaDoc {
    /// `inherited` is the includer's namespace, adopted by a schema that
    /// declares none.
    fn new(document: Document, inherited: Option<String>, imported: bool) -> Self {
        let root = document.root_element();
        let target_namespace = root
            .and_then(|root| root.attribute_value("targetNamespace"))
            .map(str::to_string)
            .or(inherited);
        let elements_qualified =
            root.and_then(|root| root.attribute_value("elementFormDefault")) == Some("qualified");
        Self {
            document,
            target_namespace,
            elements_qualified,
            imported,
        }
    }

    fn root(&self) -> Option<Node<'_>> {
        self.document.root_element()
    }
}

/// Follow `include`, `redefine` and `import` transitively, breadth first.
fn load_referenced(
    main: SchemaDoc,
    context: &mut LoadContext<'_, '_>,
    cm: &mut CMDocument,
) -> Vec<SchemaDoc> {
    let mut schemas = vec![main];
    let mut next = 0;
    while next < schemas.len() {
        let schema = &schemas[next];
        let base = schema.document.uri().map(str::to_string);
        let mut references = Vec::new();
        for child in schema.root().into_iter().flat_map(xsd_children) {
            let import = match child.local_name() {
                Some("include" | "redefine") => false,
                Some("import") => true,
                _ => continue,
            };
            let Some(location) = child.attribute_value("schemaLocation") else {
                continue;
            };
            let namespace = if import {
                child.attribute_value("namespace").map(str::to_string)
            } else {
                schema.target_namespace.clone()
            };
            let identifier =
                ResourceIdentifier::new(ResourceKind::Schema, Some(location.trim().to_string()))
                    .with_namespace(namespace.clone())
                    .with_base(base.clone());
            references.push((identifier, namespace, import || schema.imported));
        }
        for (identifier, namespace, imported) in references {
            let Some(entity) = context.load(identifier) else {
                continue;
            };
            let uri = entity.uri.unwrap_or_default();
            let document = xmlls_dom::parse_with_uri(entity.text, uri.clone());
            if !document.root_element().is_some_and(|root| is_xsd(root, "schema")) {
                tracing::debug!(%uri, "referenced resource is not a schema");
                continue;
            }
            cm.add_source(uri);
            schemas.push(SchemaDoc::new(document, namespace, imported));
        }
        next += 1;
    }
    schemas
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Component {
    Element,
    ComplexType,
    SimpleType,
    Group,
    AttributeGroup,
    Attribute,
}

impl Component {
    fn of(node: Node<'_>) -> Option<Self> {
        Some(match node.local_name()? {
            "element" => Component::Element,
            "complexType" => Component::ComplexType,
            "simpleType" => Component::SimpleType,
            "group" => Component::Group,
            "attributeGroup" => Component::AttributeGroup,
            "attribute" => Component::Attribute,
            _ => return None,
        })
    }
}

/// Where a node lives: index of its schema and its id there.
type Located = (usize, NodeId);

struct SchemaBuilder<'d> {
    schemas: &'d [SchemaDoc],
    components: HashMap<(Component, String), Located>,
    cm: CMDocument,
    named_types: HashMap<String, TypeId>,
    builtin_types: HashMap<String, TypeId>,
    referenced_elements: HashMap<String, ElementDeclId>,
    expanding: HashSet<(Component, String)>,
}

impl<'d> SchemaBuilder<'d> {
    fn new(schemas: &'d [SchemaDoc], cm: CMDocument) -> Self {
        let mut components = HashMap::new();
        for (index, schema) in schemas.iter().enumerate() {
            let Some(root) = schema.root() else {
                continue;
            };
            for child in xsd_children(root) {
                let (Some(kind), Some(name)) = (Component::of(child), child.attribute_value("name"))
                else {
                    continue;
                };
                components
                    .entry((kind, name.to_string()))
                    .or_insert((index, child.id()));
            }
        }
        Self {
            schemas,
            components,
            cm,
            named_types: HashMap::new(),
            builtin_types: HashMap::new(),
            referenced_elements: HashMap::new(),
            expanding: HashSet::new(),
        }
    }

    fn node(&self, (index, id): Located) -> Node<'d> {
        self.schemas[index].document.node(id)
    }

    fn lookup(&self, kind: Component, qname: &str) -> Option<Located> {
        self.components
            .get(&(kind, local_part(qname).to_string()))
            .copied()
    }

    fn declare_globals(&mut self) {
        let schemas = self.schemas;
        for (index, schema) in schemas.iter().enumerate() {
            if schema.imported {
                continue;
            }
            for child in schema.root().into_iter().flat_map(xsd_children) {
                if child.local_name() == Some("element") {
                    if let Some(name) = child.attribute_value("name") {
                        self.global_element(name, Some((index, child.id())));
                    }
                }
            }
        }
    }

    /// The declaration of a top-level element, built on first use.
    fn global_element(&mut self, name: &str, located: Option<Located>) -> Option<ElementDeclId> {
        if let Some(id) = self.referenced_elements.get(name) {
            return Some(*id);
        }
        let located = located.or_else(|| self.lookup(Component::Element, name))?;
        let schemas = self.schemas;
        let schema = &schemas[located.0];
        let node = self.node(located);
        let placeholder = self.any_type();
        let data = ElementDeclData {
            name: name.to_string(),
            namespace: schema.target_namespace.clone(),
            type_id: placeholder,
            documentation: documentation(node),
            origin: self.origin(located.0, node),
        };
        let id = if schema.imported {
            self.cm.add_element(data)
        } else {
            self.cm.add_global(data)
        };
        self.referenced_elements.insert(name.to_string(), id);
        let type_id = self.element_type(node, located.0);
        self.cm.set_element_type(id, type_id);
        Some(id)
    }

    /// Spans are only meaningful inside the main schema file.
    fn origin(&self, index: usize, node: Node<'_>) -> Option<Span> {
        if index != 0 {
            return None;
        }
        node.attribute("name").and_then(|attr| attr.value_content_span())
    }

    fn local_element(&mut self, node: Node<'d>, index: usize) -> Option<ElementDeclId> {
        if let Some(reference) = node.attribute_value("ref") {
            return self.global_element(local_part(reference), None).or_else(|| {
                tracing::debug!(%reference, "unresolved element reference");
                let any = self.any_type();
                Some(self.cm.add_element(ElementDeclData {
                    name: local_part(reference).to_string(),
                    namespace: None,
                    type_id: any,
                    documentation: None,
                    origin: None,
                }))
            });
        }
        let name = node.attribute_value("name")?;
        let schemas = self.schemas;
        let schema = &schemas[index];
        let qualified = match node.attribute_value("form") {
            Some(form) => form == "qualified",
            None => schema.elements_qualified,
        };
        let type_id = self.element_type(node, index);
        Some(self.cm.add_element(ElementDeclData {
            name: name.to_string(),
            namespace: if qualified {
                schema.target_namespace.clone()
            } else {
                None
            },
            type_id,
            documentation: documentation(node),
            origin: self.origin(index, node),
        }))
    }

    fn element_type(&mut self, node: Node<'d>, index: usize) -> TypeId {
        if let Some(type_name) = node.attribute_value("type") {
            return self.resolve_type(node, type_name);
        }
        for child in xsd_children(node) {
            match child.local_name() {
                Some("complexType") => {
                    let cm_type = self.complex_type(child, index);
                    return self.cm.add_type(cm_type);
                }
                Some("simpleType") => {
                    let cm_type = self.simple_content_type(child);
                    return self.cm.add_type(cm_type);
                }
                _ => {}
            }
        }
        self.any_type()
    }

    // ====== Types ======

    fn any_type(&mut self) -> TypeId {
        self.builtin("anyType")
    }

    fn builtin(&mut self, local: &str) -> TypeId {
        if let Some(id) = self.builtin_types.get(local) {
            return *id;
        }
        let cm_type = if local == "anyType" {
            let mut any = CMType::new(ContentModel::Any);
            any.any_attribute = true;
            any
        } else {
            CMType::new(ContentModel::Text)
        };
        let id = self.cm.add_type(cm_type);
        self.builtin_types.insert(local.to_string(), id);
        id
    }

    /// The type named by `qname`, resolved in the scope of `context`.
    fn resolve_type(&mut self, context: Node<'d>, qname: &str) -> TypeId {
        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, qname),
        };
        if context.lookup_namespace_uri(prefix) == Some(XSD_NS) {
            return self.builtin(local);
        }
        if let Some(id) = self.named_types.get(local) {
            return *id;
        }
        if let Some(located) = self.lookup(Component::ComplexType, local) {
            // Registered before building so recursive references terminate.
            let id = self.cm.add_type(CMType::new(ContentModel::Any));
            self.named_types.insert(local.to_string(), id);
            let mut cm_type = self.complex_type(self.node(located), located.0);
            cm_type.name = Some(local.to_string());
            *self.cm.type_mut(id) = cm_type;
            return id;
        }
        if let Some(located) = self.lookup(Component::SimpleType, local) {
            let mut cm_type = self.simple_content_type(self.node(located));
            cm_type.name = Some(local.to_string());
            let id = self.cm.add_type(cm_type);
            self.named_types.insert(local.to_string(), id);
            return id;
        }
        tracing::debug!(%qname, "unresolved type reference");
        self.any_type()
    }

    fn simple_content_type(&mut self, node: Node<'d>) -> CMType {
        let mut cm_type = CMType::new(ContentModel::Text);
        cm_type.text_enumeration = self.simple_type(node).values().to_vec();
        cm_type
    }

    fn complex_type(&mut self, node: Node<'d>, index: usize) -> CMType {
        let mut mixed = node.attribute_value("mixed") == Some("true");
        let mut particle = None;
        let mut attributes = Vec::new();
        let mut any_attribute = false;
        let mut locals = IndexMap::new();
        let mut text = false;
        let mut text_enumeration = Vec::new();

        for child in xsd_children(node) {
            match child.local_name() {
                Some("sequence" | "choice" | "all" | "group") => {
                    particle = self.particle(child, index, &mut locals);
                }
                Some("attribute" | "attributeGroup" | "anyAttribute") => {
                    self.attribute_use(child, &mut attributes, &mut any_attribute);
                }
                Some(kind @ ("simpleContent" | "complexContent")) => {
                    let simple = kind == "simpleContent";
                    if child.attribute_value("mixed") == Some("true") {
                        mixed = true;
                    }
                    let Some(derivation) = xsd_children(child).next() else {
                        continue;
                    };
                    let extension = derivation.local_name() == Some("extension");
                    let base = derivation
                        .attribute_value("base")
                        .map(|base| self.resolve_type(derivation, base));
                    let (base_particle, base_text) = match base {
                        Some(base) => {
                            let base_type = self.cm.content_type(base);
                            attributes.extend(base_type.attributes.iter().cloned());
                            any_attribute |= base_type.any_attribute;
                            locals.extend(
                                base_type
                                    .local_elements
                                    .iter()
                                    .map(|(name, id)| (name.clone(), *id)),
                            );
                            text_enumeration = base_type.text_enumeration.clone();
                            let base_particle = match &base_type.content {
                                ContentModel::Elements { particle, .. } => Some(particle.clone()),
                                ContentModel::Any => Some(Particle::new(Term::Any, 0, None)),
                                _ => None,
                            };
                            (base_particle, base_type.content.allows_text())
                        }
                        None => (None, simple),
                    };
                    let mut own = None;
                    for part in xsd_children(derivation) {
                        match part.local_name() {
                            Some("sequence" | "choice" | "all" | "group") => {
                                own = self.particle(part, index, &mut locals);
                            }
                            Some("attribute" | "attributeGroup" | "anyAttribute") => {
                                self.attribute_use(part, &mut attributes, &mut any_attribute);
                            }
                            Some("enumeration") => {
                                if let Some(value) = part.attribute_value("value") {
                                    text_enumeration.push(value.to_string());
                                }
                            }
                            _ => {}
                        }
                    }
                    if simple {
                        text = true;
                        continue;
                    }
                    particle = match (extension, base_particle, own) {
                        (true, Some(base), Some(own)) => Some(Particle::new(
                            Term::Sequence(vec![base, own]),
                            1,
                            Some(1),
                        )),
                        (true, base, own) => own.or(base),
                        (false, _, own) => own,
                    };
                    if particle.is_none() && base_text && extension {
                        text = true;
                    }
                }
                _ => {}
            }
        }

        let content = match particle {
            Some(particle) => ContentModel::Elements { particle, mixed },
            None if text || mixed => ContentModel::Text,
            None => ContentModel::Empty,
        };
        let mut cm_type = CMType::new(content);
        cm_type.model_text = model_text(&cm_type.content);
        cm_type.attributes = attributes;
        cm_type.any_attribute = any_attribute;
        cm_type.local_elements = locals;
        cm_type.text_enumeration = text_enumeration;
        cm_type
    }

    fn particle(
        &mut self,
        node: Node<'d>,
        index: usize,
        locals: &mut IndexMap<String, ElementDeclId>,
    ) -> Option<Particle> {
        let (min, max) = occurrence(node);
        if max == Some(0) {
            return None;
        }
        let particle = match node.local_name()? {
            "element" => {
                let id = self.local_element(node, index)?;
                let name = self.cm.element(id).name().to_string();
                locals.entry(name.clone()).or_insert(id);
                Particle::element(name)
            }
            "sequence" | "choice" => {
                let items = xsd_children(node)
                    .filter_map(|child| self.particle(child, index, locals))
                    .collect();
                if node.local_name() == Some("choice") {
                    Particle::new(Term::Choice(items), 1, Some(1))
                } else {
                    Particle::new(Term::Sequence(items), 1, Some(1))
                }
            }
            "all" => {
                let items: Vec<Particle> = xsd_children(node)
                    .filter_map(|child| self.particle(child, index, locals))
                    .collect();
                let required = items.iter().any(|item| item.min > 0);
                let loop_min = if required && min > 0 { 1 } else { 0 };
                return Some(Particle::new(Term::Choice(items), loop_min, None));
            }
            "group" => {
                let reference = node.attribute_value("ref")?;
                let key = (Component::Group, local_part(reference).to_string());
                let located = self.lookup(Component::Group, reference)?;
                if !self.expanding.insert(key.clone()) {
                    return None;
                }
                let group = self.node(located);
                let model = xsd_children(group)
                    .find(|child| matches!(child.local_name(), Some("sequence" | "choice" | "all")));
                let particle = model.and_then(|model| self.particle(model, located.0, locals));
                self.expanding.remove(&key);
                particle?
            }
            "any" => Particle::new(Term::Any, 1, Some(1)),
            _ => return None,
        };
        Some(particle.with_occurrence(min, max))
    }

    // ====== Attributes ======

    /// Add the attributes declared by an `attribute`, `attributeGroup` or
    /// `anyAttribute` node. Later declarations override earlier ones of the
    /// same name.
    fn attribute_use(
        &mut self,
        node: Node<'d>,
        attributes: &mut Vec<CMAttributeDeclaration>,
        any_attribute: &mut bool,
    ) {
        match node.local_name() {
            Some("anyAttribute") => *any_attribute = true,
            Some("attributeGroup") => {
                let Some(reference) = node.attribute_value("ref") else {
                    return;
                };
                let key = (Component::AttributeGroup, local_part(reference).to_string());
                let Some(located) = self.lookup(Component::AttributeGroup, reference) else {
                    tracing::debug!(%reference, "unresolved attribute group");
                    return;
                };
                if !self.expanding.insert(key.clone()) {
                    return;
                }
                for child in xsd_children(self.node(located)) {
                    self.attribute_use(child, attributes, any_attribute);
                }
                self.expanding.remove(&key);
            }
            Some("attribute") => {
                let name = node
                    .attribute_value("name")
                    .or_else(|| node.attribute_value("ref"));
                if node.attribute_value("use") == Some("prohibited") {
                    if let Some(name) = name {
                        attributes.retain(|attr| attr.name != name);
                    }
                    return;
                }
                if let Some(attribute) = self.attribute(node) {
                    match attributes.iter_mut().find(|attr| attr.name == attribute.name) {
                        Some(existing) => *existing = attribute,
                        None => attributes.push(attribute),
                    }
                }
            }
            _ => {}
        }
    }

    fn attribute(&mut self, node: Node<'d>) -> Option<CMAttributeDeclaration> {
        let (name, declaration) = match node.attribute_value("ref") {
            Some(reference) => {
                let declaration = self
                    .lookup(Component::Attribute, reference)
                    .map(|located| self.node(located))
                    .unwrap_or(node);
                (reference.to_string(), declaration)
            }
            None => (node.attribute_value("name")?.to_string(), node),
        };
        let att_type = match declaration.attribute_value("type") {
            Some(type_name) => self.attribute_type(declaration, type_name),
            None => xsd_children(declaration)
                .find(|child| child.local_name() == Some("simpleType"))
                .map(|simple| self.simple_type(simple))
                .unwrap_or(AttributeType::Cdata),
        };
        let mut attribute = CMAttributeDeclaration::new(name, att_type);
        attribute.required = node.attribute_value("use") == Some("required");
        let fixed = node
            .attribute_value("fixed")
            .or_else(|| declaration.attribute_value("fixed"));
        attribute.fixed = fixed.is_some();
        attribute.default_value = fixed
            .or_else(|| node.attribute_value("default"))
            .or_else(|| declaration.attribute_value("default"))
            .map(str::to_string);
        attribute.documentation = documentation(node).or_else(|| documentation(declaration));
        Some(attribute)
    }

    fn attribute_type(&mut self, context: Node<'d>, qname: &str) -> AttributeType {
        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, qname),
        };
        if context.lookup_namespace_uri(prefix) == Some(XSD_NS) {
            return builtin_attribute_type(local);
        }
        let key = (Component::SimpleType, local.to_string());
        let Some(located) = self.lookup(Component::SimpleType, local) else {
            return AttributeType::Cdata;
        };
        if !self.expanding.insert(key.clone()) {
            return AttributeType::Cdata;
        }
        let att_type = self.simple_type(self.node(located));
        self.expanding.remove(&key);
        att_type
    }

    /// Map a `simpleType` to the attribute type it behaves as.
    fn simple_type(&mut self, node: Node<'d>) -> AttributeType {
        let Some(restriction) = xsd_children(node).find(|child| child.local_name() == Some("restriction"))
        else {
            return AttributeType::Cdata;
        };
        let values: Vec<String> = xsd_children(restriction)
            .filter(|facet| facet.local_name() == Some("enumeration"))
            .filter_map(|facet| facet.attribute_value("value"))
            .map(str::to_string)
            .collect();
        if !values.is_empty() {
            return AttributeType::Enumeration(values);
        }
        match restriction.attribute_value("base") {
            Some(base) => self.attribute_type(restriction, base),
            None => AttributeType::Cdata,
        }
    }
}

/// Expected children as listed in messages: `{a, b}`.
fn model_text(content: &ContentModel) -> Option<String> {
    let ContentModel::Elements { particle, .. } = content else {
        return None;
    };
    Some(format!("{{{}}}", particle.element_names().join(", ")))
}

fn builtin_attribute_type(local: &str) -> AttributeType {
    match local {
        "ID" => AttributeType::Id,
        "IDREF" => AttributeType::IdRef,
        "IDREFS" => AttributeType::IdRefs,
        "ENTITY" => AttributeType::Entity,
        "ENTITIES" => AttributeType::Entities,
        "NMTOKEN" => AttributeType::NmToken,
        "NMTOKENS" => AttributeType::NmTokens,
        _ => AttributeType::Cdata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_manager::EntityManager;
    use crate::loader::MemoryResourceLoader;
    use crate::resolver::ResolverExtensionManager;

    const NOTE_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:note" elementFormDefault="qualified">
  <xs:include schemaLocation="types.xsd"/>
  <xs:element name="note">
    <xs:annotation><xs:documentation>A short message</xs:documentation></xs:annotation>
    <xs:complexType>
      <xs:sequence>
        <xs:element name="to" type="xs:string" maxOccurs="unbounded"/>
        <xs:element name="priority" type="Priority" minOccurs="0"/>
        <xs:element ref="body"/>
      </xs:sequence>
      <xs:attribute name="id" type="xs:ID" use="required"/>
      <xs:attributeGroup ref="common"/>
    </xs:complexType>
  </xs:element>
  <xs:element name="body" type="xs:string"/>
</xs:schema>"#;

    const TYPES_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Priority">
    <xs:restriction base="xs:string">
      <xs:enumeration value="low"/>
      <xs:enumeration value="high"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:attributeGroup name="common">
    <xs:attribute name="version" type="xs:string" fixed="1.0"/>
    <xs:attribute name="kind">
      <xs:simpleType>
        <xs:restriction base="xs:token">
          <xs:enumeration value="memo"/>
          <xs:enumeration value="letter"/>
        </xs:restriction>
      </xs:simpleType>
    </xs:attribute>
  </xs:attributeGroup>
</xs:schema>"#;

    fn build(uri: &str, text: &str, loader: &MemoryResourceLoader) -> Result<CMDocument, GrammarError> {
        let resolver = ResolverExtensionManager::new();
        let mut entities = EntityManager::new(&resolver, loader);
        let mut context = LoadContext::new(&mut entities, uri, None);
        XsdContentModelProvider.create_cm_document(uri, text, &mut context)
    }

    #[test]
    fn test_schema_with_include() {
        let loader = MemoryResourceLoader::new();
        loader.insert("file:///s/types.xsd", TYPES_XSD);
        let cm = build("file:///s/note.xsd", NOTE_XSD, &loader).unwrap();

        assert_eq!(cm.target_namespace(), Some("urn:note"));
        assert_eq!(cm.sources(), &["file:///s/note.xsd", "file:///s/types.xsd"]);
        let note = cm.find_global("note").unwrap();
        assert_eq!(note.documentation(), Some("A short message"));
        assert_eq!(note.namespace(), Some("urn:note"));
        assert_eq!(note.possible_children(), vec!["to", "priority", "body"]);
        assert_eq!(note.model_text(), Some("{to, priority, body}"));
        assert!(note.find_attribute("id").unwrap().required);
        let version = note.find_attribute("version").unwrap();
        assert!(version.fixed);
        assert_eq!(version.default_value.as_deref(), Some("1.0"));
        assert_eq!(
            note.find_attribute("kind").unwrap().enumeration_values(),
            &["memo".to_string(), "letter".to_string()]
        );
        let priority = note.find_child("priority").unwrap();
        assert_eq!(
            priority.cm_type().text_enumeration,
            vec!["low".to_string(), "high".to_string()]
        );
        assert_eq!(note.find_child("body"), cm.find_global("body"));

        let mut matcher = note.matcher();
        assert!(matcher.accept("to"));
        assert!(matcher.accept("to"));
        assert!(!matcher.is_complete());
        assert!(matcher.accept("body"));
        assert!(matcher.is_complete());
    }

    #[test]
    fn test_missing_include_is_reported_not_fatal() {
        let resolver = ResolverExtensionManager::new();
        let loader = MemoryResourceLoader::new();
        let mut entities = EntityManager::new(&resolver, &loader);
        let mut context = LoadContext::new(&mut entities, "file:///s/note.xsd", None);
        let cm = XsdContentModelProvider
            .create_cm_document("file:///s/note.xsd", NOTE_XSD, &mut context)
            .unwrap();
        assert!(cm.find_global("note").is_some());
        assert!(entities.has_failures());
    }

    #[test]
    fn test_not_a_schema() {
        let loader = MemoryResourceLoader::new();
        let err = build("file:///s/a.xsd", "<html/>", &loader).unwrap_err();
        assert!(matches!(err, GrammarError::NotASchema { ref root, .. } if root == "html"));
        let err = build("file:///s/b.xsd", "", &loader).unwrap_err();
        assert!(matches!(err, GrammarError::Empty { .. }));
    }

    #[test]
    fn test_extension_and_recursion() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="Base">
    <xs:sequence><xs:element name="a" type="xs:string"/></xs:sequence>
    <xs:attribute name="lang" type="xs:language"/>
  </xs:complexType>
  <xs:complexType name="Item">
    <xs:complexContent>
      <xs:extension base="Base">
        <xs:sequence>
          <xs:element name="item" type="Item" minOccurs="0" maxOccurs="100"/>
          <xs:any processContents="lax" minOccurs="0"/>
        </xs:sequence>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:element name="root" type="Item"/>
</xs:schema>"#;
        let loader = MemoryResourceLoader::new();
        let cm = build("file:///s/item.xsd", xsd, &loader).unwrap();
        let root = cm.find_global("root").unwrap();
        assert_eq!(root.possible_children(), vec!["a", "item"]);
        assert!(root.find_attribute("lang").is_some());
        let item = root.find_child("item").unwrap();
        assert_eq!(item.type_id(), root.type_id());
        let mut matcher = root.matcher();
        assert!(matcher.accept("a"));
        assert!(matcher.accept("item"));
        assert!(matcher.accept("item"));
        assert!(matcher.expects_any());
    }

    #[test]
    fn test_identifiers_by_namespace() {
        let text = r#"<n:note xmlns:n="urn:note"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xsi:schemaLocation="urn:note note.xsd urn:other other.xsd"/>"#;
        let doc = xmlls_dom::parse_with_uri(text, "file:///w/a.xml");
        let provider = XsdContentModelProvider;
        assert!(provider.adapt_for_document(&doc, false));
        assert!(!provider.adapt_for_document(&doc, true));
        let ids = provider.identifiers(&doc, Some("urn:note"));
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].literal_system_id.as_deref(), Some("note.xsd"));
        assert_eq!(ids[0].namespace.as_deref(), Some("urn:note"));
        assert_eq!(ids[0].origin.map(|span| span.slice(text)), Some("note.xsd"));
        assert!(provider.identifiers(&doc, None).is_empty());
    }
}
