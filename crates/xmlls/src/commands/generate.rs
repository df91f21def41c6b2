//! `xmlls generate`

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use xmlls_contentmodel::{ContentModelManager, GeneratorOptions, generate_xml};
use xmlls_core::XmlDocument;
use xmlls_dom::XSI_NS;

use super::file_uri;

pub fn execute(grammar: &Path, root: &str, namespace: Option<&str>) -> Result<ExitCode> {
    let grammar_uri = file_uri(grammar)?;
    let manager = ContentModelManager::default();
    let xml = generate(&manager, &grammar_uri, root, namespace)?;
    print!("{xml}");
    Ok(ExitCode::SUCCESS)
}

/// Bind a throwaway document that references `grammar_uri` and generate
/// the skeleton of `root` from the model it binds to.
fn generate(
    manager: &ContentModelManager,
    grammar_uri: &str,
    root: &str,
    namespace: Option<&str>,
) -> Result<String> {
    let stub = if grammar_uri.ends_with(".dtd") {
        format!("<!DOCTYPE {root} SYSTEM \"{grammar_uri}\"><{root}/>")
    } else {
        let location = match namespace {
            Some(namespace) => {
                format!("xmlns=\"{namespace}\" xsi:schemaLocation=\"{namespace} {grammar_uri}\"")
            }
            None => format!("xsi:noNamespaceSchemaLocation=\"{grammar_uri}\""),
        };
        format!("<{root} xmlns:xsi=\"{XSI_NS}\" {location}/>")
    };
    let document = XmlDocument::new(format!("{grammar_uri}.stub.xml"), 0, stub);
    let element = document
        .dom()
        .root_element()
        .context("generated stub has no root element")?;

    let options = GeneratorOptions {
        grammar_uri: Some(grammar_uri.to_string()),
        ..Default::default()
    };
    for cm_document in manager.find_cm_document(element) {
        if let Some(xml) = generate_xml(&cm_document, root, &options) {
            return Ok(xml);
        }
    }
    bail!("{grammar_uri} does not declare a global element `{root}`")
}
