//! Content model settings, in the JSON shape editors send them.
//!
//! ```json
//! {
//!   "validation": {
//!     "enabled": true,
//!     "schema": { "enabled": "always" },
//!     "noGrammar": "hint"
//!   },
//!   "catalogs": ["catalog.xml"],
//!   "fileAssociations": [{ "pattern": "**/*.pom", "systemId": "maven.xsd" }]
//! }
//! ```

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use xmlls_error_reporting::DiagnosticKind;

use crate::error::SettingsError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentModelSettings {
    pub validation: ValidationSettings,
    /// Paths or URIs of OASIS XML catalogs, in lookup order.
    pub catalogs: Vec<String>,
    pub file_associations: Vec<FileAssociation>,
}

impl ContentModelSettings {
    /// Parse settings JSON and check that every file association pattern
    /// compiles.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        for association in &settings.file_associations {
            association.matcher()?;
        }
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationSettings {
    pub enabled: bool,
    pub schema: SchemaSettings,
    /// Severity of the advisory for documents bound to no grammar.
    pub no_grammar: SeverityLevel,
    /// Severity of violations reported against a grammar.
    pub grammar_error_severity: SeverityLevel,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            schema: SchemaSettings::default(),
            no_grammar: SeverityLevel::Hint,
            grammar_error_severity: SeverityLevel::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaSettings {
    pub enabled: SchemaEnabled,
}

/// When schema (and, with it, grammar) validation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SchemaEnabled {
    #[default]
    Always,
    Never,
    /// Validate only when the bound schema itself could be loaded.
    OnValidSchema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Ignore,
    Hint,
    Info,
    Warning,
    Error,
}

impl SeverityLevel {
    /// The diagnostic kind to report with, or `None` when ignored.
    pub fn to_kind(self) -> Option<DiagnosticKind> {
        match self {
            SeverityLevel::Ignore => None,
            SeverityLevel::Hint => Some(DiagnosticKind::Hint),
            SeverityLevel::Info => Some(DiagnosticKind::Info),
            SeverityLevel::Warning => Some(DiagnosticKind::Warning),
            SeverityLevel::Error => Some(DiagnosticKind::Error),
        }
    }
}

/// Binds every document whose URI matches `pattern` to the grammar at
/// `system_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAssociation {
    pub pattern: String,
    pub system_id: String,
}

impl FileAssociation {
    pub fn new(pattern: impl Into<String>, system_id: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            system_id: system_id.into(),
        }
    }

    pub fn matcher(&self) -> Result<GlobMatcher, SettingsError> {
        Glob::new(&self.pattern)
            .map(|glob| glob.compile_matcher())
            .map_err(|source| SettingsError::InvalidPattern {
                pattern: self.pattern.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ContentModelSettings::default();
        assert!(settings.validation.enabled);
        assert_eq!(settings.validation.schema.enabled, SchemaEnabled::Always);
        assert_eq!(settings.validation.no_grammar, SeverityLevel::Hint);
        assert_eq!(settings.validation.grammar_error_severity, SeverityLevel::Error);
    }

    #[test]
    fn test_from_editor_json() {
        let json = r#"{
            "validation": { "schema": { "enabled": "never" }, "noGrammar": "ignore" },
            "catalogs": ["/etc/xml/catalog.xml"],
            "fileAssociations": [{ "pattern": "**/*.pom", "systemId": "maven.xsd" }]
        }"#;
        let settings = ContentModelSettings::from_json(json).unwrap();
        assert!(settings.validation.enabled);
        assert_eq!(settings.validation.schema.enabled, SchemaEnabled::Never);
        assert_eq!(settings.validation.no_grammar.to_kind(), None);
        assert_eq!(settings.catalogs, vec!["/etc/xml/catalog.xml"]);
        assert_eq!(settings.file_associations[0].system_id, "maven.xsd");
    }

    #[test]
    fn test_on_valid_schema_spelling() {
        let settings =
            ContentModelSettings::from_json(r#"{"validation":{"schema":{"enabled":"onValidSchema"}}}"#)
                .unwrap();
        assert_eq!(settings.validation.schema.enabled, SchemaEnabled::OnValidSchema);
    }

    #[test]
    fn test_invalid_pattern() {
        let json = r#"{"fileAssociations": [{ "pattern": "a[", "systemId": "x.xsd" }]}"#;
        let err = ContentModelSettings::from_json(json).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidPattern { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let err = ContentModelSettings::from_json("{").unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }
}
