//! Revalidation commands.
//!
//! Both commands evict cached grammars before scheduling the passes that
//! read them, so a changed grammar on disk is picked up. Their results reach
//! the client only through the diagnostics sink.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::service::ValidationService;

/// Evict the grammars of one document, then revalidate it.
pub const VALIDATION_CURRENT_FILE: &str = "xml.validation.current.file";

/// Evict every cached grammar, then revalidate all documents.
pub const VALIDATION_ALL_FILES: &str = "xml.validation.all.files";

pub const COMMANDS: &[&str] = &[VALIDATION_CURRENT_FILE, VALIDATION_ALL_FILES];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("command `{0}` expects a document URI argument")]
    MissingArgument(&'static str),

    #[error("document `{0}` is not open")]
    DocumentNotFound(String),
}

/// Run `command` with its JSON arguments.
///
/// `xml.validation.current.file` takes the document URI either as a string
/// or as an object with a `uri` field.
pub async fn execute_command(
    service: &Arc<ValidationService>,
    command: &str,
    arguments: &[Value],
) -> Result<(), CommandError> {
    tracing::info!(command, "executing command");
    match command {
        VALIDATION_CURRENT_FILE => {
            let uri = document_uri(arguments).ok_or(CommandError::MissingArgument(VALIDATION_CURRENT_FILE))?;
            let document = service
                .documents()
                .get_document(uri)
                .ok_or_else(|| CommandError::DocumentNotFound(uri.to_string()))?;
            service.manager().evict_cache_for(document.dom());
            if let Err(error) = service.validate(document).await {
                tracing::error!(uri, %error, "revalidation failed");
            }
            Ok(())
        }
        VALIDATION_ALL_FILES => {
            service.manager().evict_cache();
            service.validate_all().await;
            Ok(())
        }
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

fn document_uri(arguments: &[Value]) -> Option<&str> {
    match arguments.first()? {
        Value::String(uri) => Some(uri),
        Value::Object(object) => object.get("uri")?.as_str(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_uri_argument_shapes() {
        assert_eq!(document_uri(&[json!("file:///a.xml")]), Some("file:///a.xml"));
        assert_eq!(document_uri(&[json!({"uri": "file:///b.xml"})]), Some("file:///b.xml"));
        assert_eq!(document_uri(&[json!(3)]), None);
        assert_eq!(document_uri(&[]), None);
    }
}
