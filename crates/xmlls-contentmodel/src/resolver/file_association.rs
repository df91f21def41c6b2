use std::path::PathBuf;

use globset::GlobMatcher;
use url::Url;

use super::{ResourceIdentifier, UriResolverExtension, expand_system_id};
use crate::error::SettingsError;
use crate::settings::FileAssociation;

/// Binds documents to grammars by file name pattern.
pub struct FileAssociationResolver {
    associations: Vec<(GlobMatcher, String)>,
}

impl FileAssociationResolver {
    pub fn new(associations: &[FileAssociation]) -> Result<Self, SettingsError> {
        let associations = associations
            .iter()
            .map(|association| Ok((association.matcher()?, association.system_id.clone())))
            .collect::<Result<Vec<_>, SettingsError>>()?;
        Ok(Self { associations })
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    /// The expanded system id of the first association matching the
    /// document at `uri`.
    pub fn matching(&self, uri: &str) -> Option<String> {
        let path = document_path(uri);
        let (_, system_id) = self
            .associations
            .iter()
            .find(|(matcher, _)| matcher.is_match(&path))?;
        expand_system_id(system_id, Some(uri)).ok()
    }
}

/// Match file URIs by their path, anything else by the raw URI.
fn document_path(uri: &str) -> PathBuf {
    Url::parse(uri)
        .ok()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(uri))
}

impl UriResolverExtension for FileAssociationResolver {
    /// Only references without a system id of their own are bound.
    fn resolve(&self, identifier: &ResourceIdentifier) -> Option<String> {
        if identifier.literal_system_id.is_some() {
            return None;
        }
        self.matching(identifier.base_system_id.as_deref()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResourceKind;

    fn resolver() -> FileAssociationResolver {
        FileAssociationResolver::new(&[
            FileAssociation::new("**/*.pom", "maven.xsd"),
            FileAssociation::new("**/web.xml", "/schemas/web.xsd"),
        ])
        .unwrap()
    }

    #[test]
    fn test_relative_system_id_resolves_against_document() {
        assert_eq!(
            resolver().matching("file:///work/app/project.pom").as_deref(),
            Some("file:///work/app/maven.xsd")
        );
        assert_eq!(
            resolver().matching("file:///work/WEB-INF/web.xml").as_deref(),
            Some("file:///schemas/web.xsd")
        );
        assert_eq!(resolver().matching("file:///work/other.xml"), None);
    }

    #[test]
    fn test_explicit_system_id_is_not_overridden() {
        let resolver = resolver();
        let explicit = ResourceIdentifier::new(ResourceKind::Schema, Some("own.xsd".into()))
            .with_base(Some("file:///w/a.pom".into()));
        assert_eq!(resolver.resolve(&explicit), None);

        let implicit = ResourceIdentifier::new(ResourceKind::Schema, None)
            .with_base(Some("file:///w/a.pom".into()));
        assert_eq!(
            resolver.resolve(&implicit).as_deref(),
            Some("file:///w/maven.xsd")
        );
    }
}
