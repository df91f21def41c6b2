//! Error types for grammar resolution and loading.

use thiserror::Error;

/// Failure to locate or read an external resource (DTD, entity, schema,
/// catalog).
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("no system identifier to resolve")]
    MissingSystemId,

    #[error("invalid URI `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("resource `{uri}` not found")]
    NotFound { uri: String },

    #[error("cannot read `{uri}`")]
    Io {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote resources are never downloaded.
    #[error("loading `{uri}` is not supported")]
    Unsupported { uri: String },

    #[error("cannot decode `{uri}` as {encoding}")]
    Decode { uri: String, encoding: String },

    /// The resource was read but is not a grammar the provider understands.
    #[error("`{uri}` is not a usable grammar: {reason}")]
    Unusable { uri: String, reason: String },
}

impl ResourceError {
    pub fn uri(&self) -> Option<&str> {
        match self {
            ResourceError::MissingSystemId => None,
            ResourceError::InvalidUri { uri, .. }
            | ResourceError::NotFound { uri }
            | ResourceError::Io { uri, .. }
            | ResourceError::Unsupported { uri }
            | ResourceError::Decode { uri, .. }
            | ResourceError::Unusable { uri, .. } => Some(uri),
        }
    }
}

/// Failure to build a content model from grammar text.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("`{uri}` is not an XML Schema (root element is `{root}`)")]
    NotASchema { uri: String, root: String },

    #[error("`{uri}` has no root element")]
    Empty { uri: String },

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Invalid content model settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings JSON")]
    Json(#[from] serde_json::Error),

    #[error("invalid file association pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
