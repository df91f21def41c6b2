//! Revalidation commands against grammars that change on disk.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use xmlls_contentmodel::ContentModelManager;
use xmlls_core::{
    CollectingSink, CommandError, DocumentStore, PassOutcome, VALIDATION_ALL_FILES,
    VALIDATION_CURRENT_FILE, ValidationService, execute_command,
};

const NOTE_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="note">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="to" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>
"#;

const NOTE_XML: &str = r#"<note xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
      xsi:noNamespaceSchemaLocation="note.xsd"><to>a</to></note>"#;

struct Fixture {
    dir: TempDir,
    store: Arc<DocumentStore>,
    sink: Arc<CollectingSink>,
    service: Arc<ValidationService>,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(DocumentStore::new());
        let sink = Arc::new(CollectingSink::new());
        let service = Arc::new(ValidationService::new(
            Arc::new(ContentModelManager::default()),
            store.clone(),
            sink.clone(),
        ));
        Self {
            dir: TempDir::new().unwrap(),
            store,
            sink,
            service,
        }
    }

    fn write(&self, name: &str, content: &str) {
        std::fs::write(self.dir.path().join(name), content).unwrap();
    }

    fn uri(&self, name: &str) -> String {
        file_uri(&self.dir.path().join(name))
    }

    fn last_codes(&self) -> Vec<Vec<String>> {
        self.sink
            .take()
            .into_iter()
            .map(|published| {
                published
                    .diagnostics
                    .into_iter()
                    .filter_map(|diagnostic| diagnostic.code)
                    .collect()
            })
            .collect()
    }
}

fn file_uri(path: &Path) -> String {
    url::Url::from_file_path(path).unwrap().to_string()
}

#[tokio::test]
async fn test_current_file_reloads_changed_schema() {
    let fixture = Fixture::new();
    fixture.write("note.xsd", NOTE_XSD);
    let uri = fixture.uri("note.xml");
    let doc = fixture.store.open(uri.clone(), NOTE_XML, 1);

    assert_eq!(
        fixture.service.validate(doc.clone()).await.unwrap(),
        PassOutcome::Published(Vec::new())
    );

    fixture.write("note.xsd", &NOTE_XSD.replace("name=\"to\"", "name=\"from\""));
    fixture.service.validate(doc).await.unwrap();
    assert_eq!(fixture.last_codes(), vec![Vec::<String>::new(), Vec::new()]);

    execute_command(&fixture.service, VALIDATION_CURRENT_FILE, &[json!(uri)])
        .await
        .unwrap();
    assert_eq!(fixture.last_codes(), vec![vec!["cvc-complex-type.2.4.a".to_string()]]);
}

#[tokio::test]
async fn test_all_files_revalidates_every_document() {
    let fixture = Fixture::new();
    fixture.write("note.xsd", NOTE_XSD);
    fixture.store.open(fixture.uri("a.xml"), NOTE_XML, 1);
    fixture
        .store
        .open(fixture.uri("b.xml"), NOTE_XML.replace("<to>a</to>", "<to>b</to>"), 1);
    fixture.service.validate_all().await;
    fixture.sink.take();

    fixture.write("note.xsd", &NOTE_XSD.replace("name=\"to\"", "name=\"from\""));
    execute_command(&fixture.service, VALIDATION_ALL_FILES, &[])
        .await
        .unwrap();
    let published = fixture.last_codes();
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|codes| codes == &["cvc-complex-type.2.4.a"]));
}

#[tokio::test]
async fn test_command_errors() {
    let fixture = Fixture::new();
    assert_eq!(
        execute_command(&fixture.service, "xml.unknown", &[]).await,
        Err(CommandError::UnknownCommand("xml.unknown".to_string()))
    );
    assert_eq!(
        execute_command(&fixture.service, VALIDATION_CURRENT_FILE, &[]).await,
        Err(CommandError::MissingArgument(VALIDATION_CURRENT_FILE))
    );
    assert_eq!(
        execute_command(&fixture.service, VALIDATION_CURRENT_FILE, &[json!("file:///nope.xml")]).await,
        Err(CommandError::DocumentNotFound("file:///nope.xml".to_string()))
    );
    assert!(fixture.sink.take().is_empty());
}
