//! `xmlls validate`

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use xmlls_contentmodel::{ContentModelManager, ContentModelSettings};
use xmlls_core::{
    CollectingSink, DiagnosticSeverity, DocumentStore, Published, ValidationService,
};

use super::file_uri;
use crate::Format;

pub fn execute(
    files: &[PathBuf],
    settings: Option<&Path>,
    catalogs: &[PathBuf],
    format: Format,
) -> Result<ExitCode> {
    let mut settings = match settings {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read settings {}", path.display()))?;
            ContentModelSettings::from_json(&json)
                .with_context(|| format!("invalid settings in {}", path.display()))?
        }
        None => ContentModelSettings::default(),
    };
    for catalog in catalogs {
        settings.catalogs.push(file_uri(catalog)?);
    }

    let manager = Arc::new(ContentModelManager::default());
    manager.set_settings(settings)?;

    let store = Arc::new(DocumentStore::new());
    for file in files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("cannot read {}", file.display()))?;
        store.open(file_uri(file)?, text, 1);
    }

    let sink = Arc::new(CollectingSink::new());
    let service = Arc::new(ValidationService::new(manager, store, sink.clone()));
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(service.validate_all());

    let mut published = sink.take();
    published.sort_by(|a, b| a.uri.cmp(&b.uri));
    let failed = published.iter().any(|result| {
        result
            .diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == DiagnosticSeverity::Error)
    });

    match format {
        Format::Text => print!("{}", render_text(&published)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&published)?),
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// One `uri:line:column: severity: message [code]` line per diagnostic,
/// with 1-based lines and columns.
fn render_text(published: &[Published]) -> String {
    let mut out = String::new();
    for result in published {
        for diagnostic in &result.diagnostics {
            let severity = match diagnostic.severity {
                DiagnosticSeverity::Error => "error",
                DiagnosticSeverity::Warning => "warning",
                DiagnosticSeverity::Information => "info",
                DiagnosticSeverity::Hint => "hint",
            };
            out.push_str(&format!(
                "{}:{}:{}: {severity}: {}",
                result.uri,
                diagnostic.range.start.line + 1,
                diagnostic.range.start.character + 1,
                diagnostic.message
            ));
            if let Some(code) = &diagnostic.code {
                out.push_str(&format!(" [{code}]"));
            }
            out.push('\n');
        }
    }
    out
}
