//! End-to-end validation passes against grammars on disk.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;
use xmlls_contentmodel::{
    Cancellation, Cancelled, ContentModelManager, ContentModelSettings, NeverCancel, SeverityLevel,
    XmlValidator,
};
use xmlls_dom::{Document, parse_with_uri};
use xmlls_error_reporting::{DiagnosticKind, DiagnosticMessage};

const NOTE_DTD: &str = r#"<!ELEMENT note (to, body)>
<!ATTLIST note id ID #REQUIRED kind (memo|letter) "memo">
<!ELEMENT to (#PCDATA)>
<!ATTLIST to ref IDREF #IMPLIED>
<!ELEMENT body (#PCDATA)>
"#;

const NOTE_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="note">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="to" type="xs:string"/>
        <xs:element name="body" type="xs:string" minOccurs="0"/>
      </xs:sequence>
      <xs:attribute name="id" type="xs:ID" use="required"/>
    </xs:complexType>
  </xs:element>
</xs:schema>
"#;

struct Workspace {
    dir: TempDir,
    validator: XmlValidator,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            validator: XmlValidator::new(Arc::new(ContentModelManager::default())),
        }
    }

    fn write(&self, name: &str, content: &str) {
        std::fs::write(self.dir.path().join(name), content).unwrap();
    }

    fn document(&self, name: &str, text: &str) -> Document {
        parse_with_uri(text.to_string(), file_uri(&self.dir.path().join(name)))
    }

    fn validate(&self, doc: &Document) -> Vec<DiagnosticMessage> {
        self.validate_with(doc, &ContentModelSettings::default())
    }

    fn validate_with(&self, doc: &Document, settings: &ContentModelSettings) -> Vec<DiagnosticMessage> {
        self.validator.validate(doc, settings, &NeverCancel).unwrap()
    }
}

fn file_uri(path: &Path) -> String {
    url::Url::from_file_path(path).unwrap().to_string()
}

fn codes(diagnostics: &[DiagnosticMessage]) -> Vec<&str> {
    diagnostics
        .iter()
        .filter_map(|diagnostic| diagnostic.code.as_deref())
        .collect()
}

fn located<'t>(text: &'t str, diagnostic: &DiagnosticMessage) -> &'t str {
    let location = diagnostic.location.unwrap();
    &text[location.start..location.end]
}

#[test]
fn test_external_dtd_violations() {
    let workspace = Workspace::new();
    workspace.write("note.dtd", NOTE_DTD);
    let text = r#"<!DOCTYPE note SYSTEM "note.dtd">
<note kind="fax"><to ref="nowhere">A</to><body/><extra/></note>"#;
    let doc = workspace.document("note.xml", text);
    let diagnostics = workspace.validate(&doc);
    let found = codes(&diagnostics);
    for expected in [
        "MSG_REQUIRED_ATTRIBUTE_NOT_SPECIFIED",
        "MSG_ATTRIBUTE_VALUE_NOT_IN_LIST",
        "MSG_ELEMENT_NOT_DECLARED",
        "MSG_CONTENT_INVALID",
        "MSG_ELEMENT_WITH_ID_REQUIRED",
    ] {
        assert!(found.contains(&expected), "missing {expected} in {found:?}");
    }
    assert!(!found.contains(&"NoGrammarConstraints"));
    assert!(diagnostics.iter().all(|d| d.kind == DiagnosticKind::Error));

    let not_in_list = diagnostics
        .iter()
        .find(|d| d.has_code("MSG_ATTRIBUTE_VALUE_NOT_IN_LIST"))
        .unwrap();
    assert_eq!(located(text, not_in_list), "\"fax\"");
}

#[test]
fn test_valid_document_has_no_diagnostics() {
    let workspace = Workspace::new();
    workspace.write("note.dtd", NOTE_DTD);
    let doc = workspace.document(
        "note.xml",
        r#"<!DOCTYPE note SYSTEM "note.dtd">
<note id="n1"><to ref="n1">A</to><body>B</body></note>"#,
    );
    assert_eq!(workspace.validate(&doc), Vec::new());
}

#[test]
fn test_internal_subset_adds_attributes_to_external_element() {
    let workspace = Workspace::new();
    workspace.write("note.dtd", "<!ELEMENT note (#PCDATA)>\n");
    let doctype = r#"<!DOCTYPE note SYSTEM "note.dtd" [<!ATTLIST note extra CDATA #REQUIRED>]>"#;

    let valid = workspace.document("valid.xml", &format!(r#"{doctype}<note extra="x">hi</note>"#));
    assert_eq!(workspace.validate(&valid), Vec::new());

    let missing = workspace.document("missing.xml", &format!("{doctype}<note>hi</note>"));
    assert_eq!(
        codes(&workspace.validate(&missing)),
        vec!["MSG_REQUIRED_ATTRIBUTE_NOT_SPECIFIED"]
    );
}

#[test]
fn test_internal_attribute_declaration_takes_precedence() {
    let workspace = Workspace::new();
    workspace.write(
        "note.dtd",
        "<!ELEMENT note (#PCDATA)>\n<!ATTLIST note kind (memo|letter) #REQUIRED>\n",
    );
    let doc = workspace.document(
        "note.xml",
        r#"<!DOCTYPE note SYSTEM "note.dtd" [<!ATTLIST note kind CDATA #IMPLIED>]><note kind="fax">hi</note>"#,
    );
    assert_eq!(workspace.validate(&doc), Vec::new());
}

#[test]
fn test_missing_dtd_is_reported_once() {
    let workspace = Workspace::new();
    let text = r#"<!DOCTYPE note SYSTEM "missing.dtd">
<note a="1" a="2"><to>x</to></note>"#;
    let doc = workspace.document("note.xml", text);
    for _ in 0..2 {
        let diagnostics = workspace.validate(&doc);
        let not_found: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.has_code("dtd_not_found"))
            .collect();
        assert_eq!(not_found.len(), 1, "{diagnostics:?}");
        assert_eq!(located(text, not_found[0]), "\"missing.dtd\"");
        assert!(not_found[0].title.contains("missing.dtd"));
        assert!(codes(&diagnostics).contains(&"AttributeNotUnique"));
        assert!(!codes(&diagnostics).contains(&"MSG_ELEMENT_NOT_DECLARED"));
    }
    assert!(workspace.validator.manager().pool().is_empty());
}

#[test]
fn test_doctype_without_declarations_is_not_validated() {
    let workspace = Workspace::new();
    let bare = workspace.document("bare.xml", "<!DOCTYPE note><note><anything/></note>");
    assert_eq!(workspace.validate(&bare), Vec::new());

    let declared = workspace.document(
        "declared.xml",
        "<!DOCTYPE note [<!ELEMENT note EMPTY>]><note><anything/></note>",
    );
    let found = workspace.validate(&declared);
    let found = codes(&found);
    assert!(found.contains(&"MSG_CONTENT_INVALID"), "{found:?}");
    assert!(found.contains(&"MSG_ELEMENT_NOT_DECLARED"), "{found:?}");
}

#[test]
fn test_evicted_schema_is_reloaded() {
    let workspace = Workspace::new();
    workspace.write("note.xsd", NOTE_XSD);
    let text = r#"<note xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
      xsi:noNamespaceSchemaLocation="note.xsd" id="n1"><to>a</to></note>"#;
    let doc = workspace.document("note.xml", text);
    assert_eq!(workspace.validate(&doc), Vec::new());

    workspace.write("note.xsd", &NOTE_XSD.replace("name=\"to\"", "name=\"from\""));
    assert_eq!(workspace.validate(&doc), Vec::new(), "cached schema still applies");

    workspace.validator.manager().evict_cache_for(&doc);
    let diagnostics = workspace.validate(&doc);
    assert_eq!(codes(&diagnostics), vec!["cvc-complex-type.2.4.a"]);
    assert_eq!(located(text, &diagnostics[0]), "to");
    assert!(diagnostics[0].title.contains("{from}"));
}

#[test]
fn test_unreadable_schema() {
    let workspace = Workspace::new();
    workspace.write("broken.xsd", "<notaschema/>");
    let text = r#"<note xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
      xsi:noNamespaceSchemaLocation="broken.xsd"/>"#;
    let doc = workspace.document("note.xml", text);
    let diagnostics = workspace.validate(&doc);
    let found = codes(&diagnostics);
    assert_eq!(
        found.iter().filter(|code| **code == "schema_reference.4").count(),
        1,
        "{found:?}"
    );
    assert!(found.contains(&"cvc-elt.1.a"));

    let mut settings = ContentModelSettings::default();
    settings.validation.schema.enabled = xmlls_contentmodel::SchemaEnabled::OnValidSchema;
    let found = workspace.validate_with(&doc, &settings);
    assert_eq!(codes(&found), vec!["schema_reference.4"]);
}

#[test]
fn test_no_grammar_advisory() {
    let workspace = Workspace::new();
    let text = "<?xml version=\"1.0\"?>\n<note><to/></note>";
    let doc = workspace.document("plain.xml", text);
    let diagnostics = workspace.validate(&doc);
    assert_eq!(codes(&diagnostics), vec!["NoGrammarConstraints"]);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Hint);
    assert_eq!(located(text, &diagnostics[0]), "note");
    assert_eq!(diagnostics[0].title, "No grammar constraints (DTD or XML Schema).");

    let mut settings = ContentModelSettings::default();
    settings.validation.no_grammar = SeverityLevel::Ignore;
    assert_eq!(workspace.validate_with(&doc, &settings), Vec::new());

    settings.validation.enabled = false;
    let broken = workspace.document("broken.xml", "<note a=\"1\" a=\"2\"/>");
    assert_eq!(workspace.validate_with(&broken, &settings), Vec::new());
}

#[test]
fn test_cancelled_pass_reports_nothing() {
    let workspace = Workspace::new();
    workspace.write("note.dtd", NOTE_DTD);
    let doc = workspace.document(
        "note.xml",
        r#"<!DOCTYPE note SYSTEM "note.dtd"><note kind="fax"><extra/></note>"#,
    );
    let settings = ContentModelSettings::default();

    let cancellation = Cancellation::new();
    cancellation.cancel();
    assert_eq!(
        workspace.validator.validate(&doc, &settings, &cancellation),
        Err(Cancelled)
    );

    // Cancel in the middle of the event stream.
    let polls = AtomicUsize::new(0);
    let midway = || polls.fetch_add(1, Ordering::SeqCst) >= 4;
    assert_eq!(workspace.validator.validate(&doc, &settings, &midway), Err(Cancelled));

    assert!(!workspace.validate(&doc).is_empty());
}
