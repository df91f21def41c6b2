//! Versioned validation scheduling.
//!
//! Each URI carries a generation counter. Starting a pass bumps the
//! generation and cancels the pass it supersedes; a finished pass publishes
//! only while its generation is still the current one. Diagnostics from a
//! stale pass therefore never overwrite those of a newer pass.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use xmlls_contentmodel::{Cancellation, Cancelled, ContentModelManager, XmlValidator};

use crate::diagnostics::to_diagnostics;
use crate::document::{DocumentProvider, XmlDocument};
use crate::types::Diagnostic;

/// Where finished passes deliver their diagnostics.
#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    async fn publish(&self, uri: &str, version: i32, diagnostics: Vec<Diagnostic>);
}

/// A sink that keeps everything it is given, in publication order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    published: Mutex<Vec<Published>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Published {
    pub uri: String,
    pub version: i32,
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Published> {
        std::mem::take(&mut *self.published.lock())
    }
}

#[async_trait]
impl DiagnosticsSink for CollectingSink {
    async fn publish(&self, uri: &str, version: i32, diagnostics: Vec<Diagnostic>) {
        self.published.lock().push(Published {
            uri: uri.to_string(),
            version,
            diagnostics,
        });
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Published(Vec<Diagnostic>),
    /// Cancelled, or superseded by a newer pass before it could publish.
    Discarded,
}

struct Pass {
    generation: u64,
    cancellation: Cancellation,
}

pub struct ValidationService {
    manager: Arc<ContentModelManager>,
    documents: Arc<dyn DocumentProvider>,
    sink: Arc<dyn DiagnosticsSink>,
    passes: Mutex<HashMap<String, Pass>>,
    generation: Mutex<u64>,
    /// Generation last published per URI; held across `publish`.
    published: tokio::sync::Mutex<HashMap<String, u64>>,
}

impl ValidationService {
    pub fn new(
        manager: Arc<ContentModelManager>,
        documents: Arc<dyn DocumentProvider>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            manager,
            documents,
            sink,
            passes: Mutex::new(HashMap::new()),
            generation: Mutex::new(0),
            published: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn manager(&self) -> &Arc<ContentModelManager> {
        &self.manager
    }

    pub fn documents(&self) -> &Arc<dyn DocumentProvider> {
        &self.documents
    }

    /// Validate one document snapshot and publish the result unless a newer
    /// pass for the same URI started meanwhile.
    pub async fn validate(&self, document: Arc<XmlDocument>) -> Result<PassOutcome, ServiceError> {
        let uri = document.uri().to_string();
        let (generation, cancellation) = self.begin(&uri);

        let manager = Arc::clone(&self.manager);
        let snapshot = Arc::clone(&document);
        let checker = cancellation.clone();
        let result = tokio::task::spawn_blocking(move || {
            let settings = manager.settings();
            XmlValidator::new(manager).validate(snapshot.dom(), &settings, &checker)
        })
        .await?;

        let messages = match result {
            Ok(messages) => messages,
            Err(Cancelled) => {
                tracing::debug!(%uri, generation, "validation pass cancelled");
                self.finish(&uri, generation);
                return Ok(PassOutcome::Discarded);
            }
        };
        if !self.finish(&uri, generation) {
            tracing::debug!(%uri, generation, "dropping diagnostics of a superseded pass");
            return Ok(PassOutcome::Discarded);
        }

        let diagnostics = to_diagnostics(&document, &messages);
        let mut published = self.published.lock().await;
        if published.get(&uri).is_some_and(|last| *last > generation) {
            tracing::debug!(%uri, generation, "a newer pass already published");
            return Ok(PassOutcome::Discarded);
        }
        tracing::debug!(%uri, version = document.version(), count = diagnostics.len(), "publishing diagnostics");
        self.sink
            .publish(&uri, document.version(), diagnostics.clone())
            .await;
        published.insert(uri, generation);
        Ok(PassOutcome::Published(diagnostics))
    }

    /// Validate every document the provider knows about, concurrently. A
    /// failed task is logged and does not stop the others.
    pub async fn validate_all(self: &Arc<Self>) -> Vec<(String, PassOutcome)> {
        let mut tasks = JoinSet::new();
        for document in self.documents.all_documents() {
            let service = Arc::clone(self);
            tasks.spawn(async move {
                let uri = document.uri().to_string();
                (uri, service.validate(document).await)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((uri, Ok(outcome))) => outcomes.push((uri, outcome)),
                Ok((uri, Err(error))) => tracing::error!(%uri, %error, "validation failed"),
                Err(error) => tracing::error!(%error, "validation task panicked"),
            }
        }
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        outcomes
    }

    /// Cancel the running pass for `uri`, if any, e.g. when the document
    /// is closed.
    pub fn cancel(&self, uri: &str) {
        if let Some(pass) = self.passes.lock().remove(uri) {
            pass.cancellation.cancel();
        }
    }

    /// Whether a pass for `uri` is still running.
    pub fn is_pending(&self, uri: &str) -> bool {
        self.passes.lock().contains_key(uri)
    }

    fn begin(&self, uri: &str) -> (u64, Cancellation) {
        let generation = {
            let mut counter = self.generation.lock();
            *counter += 1;
            *counter
        };
        let cancellation = Cancellation::new();
        let previous = self.passes.lock().insert(
            uri.to_string(),
            Pass {
                generation,
                cancellation: cancellation.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::trace!(uri, superseded = previous.generation, generation, "superseding pass");
            previous.cancellation.cancel();
        }
        (generation, cancellation)
    }

    /// Retire `generation`. Returns whether it was still current.
    fn finish(&self, uri: &str, generation: u64) -> bool {
        let mut passes = self.passes.lock();
        match passes.get(uri) {
            Some(pass) if pass.generation == generation => {
                passes.remove(uri);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentStore;

    fn service() -> (Arc<ValidationService>, Arc<DocumentStore>, Arc<CollectingSink>) {
        let store = Arc::new(DocumentStore::new());
        let sink = Arc::new(CollectingSink::new());
        let service = Arc::new(ValidationService::new(
            Arc::new(ContentModelManager::default()),
            store.clone(),
            sink.clone(),
        ));
        (service, store, sink)
    }

    #[tokio::test]
    async fn test_publishes_current_pass() {
        let (service, store, sink) = service();
        let doc = store.open("file:///a.xml", "<a b=\"1\" b=\"2\"/>", 4);
        let outcome = service.validate(doc).await.unwrap();
        let PassOutcome::Published(diagnostics) = outcome else {
            panic!("expected diagnostics");
        };
        assert!(diagnostics.iter().any(|d| d.code.as_deref() == Some("AttributeNotUnique")));

        let published = sink.take();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].version, 4);
        assert!(!service.is_pending("file:///a.xml"));
    }

    #[tokio::test]
    async fn test_superseded_generation_is_not_current() {
        let (service, _, _) = service();
        let (first, first_cancel) = service.begin("file:///a.xml");
        let (second, _) = service.begin("file:///a.xml");
        assert!(first_cancel.token().is_cancelled());
        assert!(!service.finish("file:///a.xml", first));
        assert!(service.finish("file:///a.xml", second));
    }

    #[tokio::test]
    async fn test_validate_all_covers_every_document() {
        let (service, store, sink) = service();
        store.open("file:///b.xml", "<b/>", 1);
        store.open("file:///a.xml", "<a/>", 1);
        let outcomes = service.validate_all().await;
        let uris: Vec<_> = outcomes.iter().map(|(uri, _)| uri.as_str()).collect();
        assert_eq!(uris, vec!["file:///a.xml", "file:///b.xml"]);
        assert_eq!(sink.take().len(), 2);
    }
}
