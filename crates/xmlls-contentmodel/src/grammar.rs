//! Grammar identity and the cached grammar value.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::CMDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrammarType {
    Dtd,
    Xsd,
    /// RelaxNG has a provider slot but no engine.
    RelaxNg,
}

impl GrammarType {
    pub const ALL: [GrammarType; 3] = [GrammarType::Dtd, GrammarType::Xsd, GrammarType::RelaxNg];

    /// Guess the grammar language from a resource URI.
    pub fn from_uri(uri: &str) -> Option<GrammarType> {
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
        match extension.as_str() {
            "dtd" | "ent" | "mod" => Some(GrammarType::Dtd),
            "xsd" => Some(GrammarType::Xsd),
            "rng" | "rnc" => Some(GrammarType::RelaxNg),
            _ => None,
        }
    }
}

impl fmt::Display for GrammarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GrammarType::Dtd => "DTD",
            GrammarType::Xsd => "XML Schema",
            GrammarType::RelaxNg => "RelaxNG",
        })
    }
}

/// Identity of a grammar resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrammarDescription {
    pub grammar_type: GrammarType,
    pub namespace: Option<String>,
    pub public_id: Option<String>,
    pub expanded_system_id: Option<String>,
}

impl GrammarDescription {
    pub fn new(grammar_type: GrammarType, expanded_system_id: impl Into<String>) -> Self {
        Self {
            grammar_type,
            namespace: None,
            public_id: None,
            expanded_system_id: Some(expanded_system_id.into()),
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_public_id(mut self, public_id: Option<String>) -> Self {
        self.public_id = public_id;
        self
    }
}

/// A parsed grammar: its content model plus the descriptions of every
/// resource it was built from (the main one first).
#[derive(Debug)]
pub struct Grammar {
    description: GrammarDescription,
    derived_from: Vec<GrammarDescription>,
    cm_document: Arc<CMDocument>,
}

impl Grammar {
    pub fn new(description: GrammarDescription, cm_document: Arc<CMDocument>) -> Self {
        Self {
            derived_from: Vec::new(),
            description,
            cm_document,
        }
    }

    /// Record a resource (include, import, external subset) this grammar
    /// was read from.
    pub fn with_source(mut self, source: GrammarDescription) -> Self {
        if source != self.description && !self.derived_from.contains(&source) {
            self.derived_from.push(source);
        }
        self
    }

    pub fn description(&self) -> &GrammarDescription {
        &self.description
    }

    pub fn grammar_type(&self) -> GrammarType {
        self.description.grammar_type
    }

    pub fn derived_from(&self) -> &[GrammarDescription] {
        &self.derived_from
    }

    pub fn cm_document(&self) -> &Arc<CMDocument> {
        &self.cm_document
    }
}
