//! Validation of one document snapshot.
//!
//! A pass runs in this order:
//!
//! 1. decide what to validate against ([`ValidationPlan`]);
//! 2. bind the document through the [`ContentModelManager`], with a
//!    tracking pool and a fresh entity manager;
//! 3. walk the document once, feeding the well-formedness checks and one
//!    structure validator per bound grammar language;
//! 4. collect resource diagnostics and dispose of the entity manager.
//!
//! A pass that is cancelled returns [`Cancelled`] and no diagnostics.

mod report;
mod structure;
mod wellformed;

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use xmlls_dom::{Document, Rangeable, XmlEvent};
use xmlls_error_reporting::{DiagnosticKind, DiagnosticMessage, DiagnosticMessageBuilder};
use xmlls_source_map::Span;

use crate::entity_manager::EntityManager;
use crate::grammar::GrammarType;
use crate::manager::{ContentModelManager, documents_of};
use crate::pool::{GrammarPool, GrammarPoolWrapper};
use crate::resolver::{ResolverExtensionManager, ResourceKind};
use crate::settings::{ContentModelSettings, SchemaEnabled};

use structure::StructureValidator;
use wellformed::WellFormedness;

/// Polled between steps of a pass.
pub trait CancelChecker: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl<F> CancelChecker for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// A checker that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelChecker for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A checker backed by a [`CancellationToken`], so async callers can cancel
/// a pass running on a blocking thread.
#[derive(Debug, Clone)]
pub struct Cancellation {
    token: CancellationToken,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl CancelChecker for Cancellation {
    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("validation cancelled")]
pub struct Cancelled;

/// What a pass validates against, decided before any grammar is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPlan {
    /// A DOCTYPE names the root but declares nothing: there is nothing to
    /// validate the structure against.
    pub suppress_dtd: bool,
    pub has_grammar: bool,
    /// XML Schema validation is on.
    pub schema: bool,
    pub validation: bool,
    /// Severity of the "no grammar" advisory, when one is due.
    pub no_grammar: Option<DiagnosticKind>,
}

impl ValidationPlan {
    pub fn compute(
        doc: &Document,
        settings: &ContentModelSettings,
        resolver: &ResolverExtensionManager,
    ) -> Self {
        let doctype = doc.doctype();
        let suppress_dtd = doctype.is_some_and(|doctype| {
            let external = doctype
                .doctype_data()
                .is_some_and(|data| data.kind.is_some());
            !external && !doctype.children().any(|child| child.is_dtd_decl())
        });
        let mut has_grammar = doctype.is_some()
            || doc.has_schema_location()
            || doc.uri().is_some_and(|uri| resolver.has_file_association(uri));

        let schema = settings.validation.schema.enabled != SchemaEnabled::Never;
        let mut no_grammar = None;
        if schema {
            if !has_grammar {
                no_grammar = settings.validation.no_grammar.to_kind();
            }
        } else {
            has_grammar = false;
        }
        Self {
            suppress_dtd,
            has_grammar,
            schema: schema && has_grammar,
            validation: has_grammar,
            no_grammar,
        }
    }
}

/// Runs validation passes against the models of a shared
/// [`ContentModelManager`].
#[derive(Clone)]
pub struct XmlValidator {
    manager: Arc<ContentModelManager>,
}

impl XmlValidator {
    pub fn new(manager: Arc<ContentModelManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ContentModelManager> {
        &self.manager
    }

    /// Validate `doc`, returning diagnostics ordered by location.
    pub fn validate(
        &self,
        doc: &Document,
        settings: &ContentModelSettings,
        cancel: &dyn CancelChecker,
    ) -> Result<Vec<DiagnosticMessage>, Cancelled> {
        if !settings.validation.enabled {
            tracing::trace!(uri = doc.uri().unwrap_or_default(), "validation disabled");
            return Ok(Vec::new());
        }
        let plan = ValidationPlan::compute(doc, settings, self.manager.resolver());
        tracing::debug!(
            uri = doc.uri().unwrap_or_default(),
            ?plan,
            "validating document"
        );

        let pool = GrammarPoolWrapper::new(self.manager.pool().clone());
        let mut entities = EntityManager::new(self.manager.resolver(), self.manager.loader().as_ref());
        let outcome = self.run(doc, settings, &plan, &mut entities, &pool, cancel);
        let resources = entities.take_diagnostics();
        entities.dispose(&pool);

        let mut diagnostics = resources;
        diagnostics.extend(outcome?);
        diagnostics.sort_by_key(|diagnostic| diagnostic.location.map_or(0, |location| location.start));
        Ok(diagnostics)
    }

    fn run(
        &self,
        doc: &Document,
        settings: &ContentModelSettings,
        plan: &ValidationPlan,
        entities: &mut EntityManager<'_>,
        pool: &dyn GrammarPool,
        cancel: &dyn CancelChecker,
    ) -> Result<Vec<DiagnosticMessage>, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let mut types = Vec::new();
        if doc.doctype().is_some() {
            types.push(GrammarType::Dtd);
        }
        if plan.schema {
            types.push(GrammarType::Xsd);
        }
        let bound = self.manager.bind_document(doc, entities, pool, &types);
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let dtds = documents_of(&bound, GrammarType::Dtd);
        let schemas = documents_of(&bound, GrammarType::Xsd);
        let failed = |kind: ResourceKind| {
            entities
                .failures()
                .iter()
                .any(|failure| failure.identifier.kind == kind)
        };
        let known_entities = (!failed(ResourceKind::Dtd)).then(|| {
            dtds.iter()
                .flat_map(|document| document.entity_names())
                .map(str::to_string)
                .collect::<HashSet<_>>()
        });
        let schema_usable =
            settings.validation.schema.enabled != SchemaEnabled::OnValidSchema || !failed(ResourceKind::Schema);

        let mut validators = Vec::new();
        if let Some(kind) = settings.validation.grammar_error_severity.to_kind() {
            // An unreadable external subset would make every element undeclared.
            if plan.validation && !plan.suppress_dtd && !dtds.is_empty() && !failed(ResourceKind::Dtd) {
                let doctype_name = doc
                    .doctype()
                    .and_then(|doctype| doctype.name())
                    .map(str::to_string);
                validators.push(StructureValidator::new(GrammarType::Dtd, dtds, kind, doctype_name));
            }
            if plan.schema && schema_usable && !schemas.is_empty() {
                validators.push(StructureValidator::new(GrammarType::Xsd, schemas, kind, None));
            }
        }

        let mut wellformed = WellFormedness::new(known_entities);
        for event in doc.events() {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            match event {
                XmlEvent::StartElement(node) => {
                    wellformed.start_element(node);
                    validators.iter_mut().for_each(|v| v.start_element(node));
                }
                XmlEvent::EndElement(_) => validators.iter_mut().for_each(|v| v.end_element()),
                XmlEvent::Text(node) => {
                    wellformed.text(node);
                    validators.iter_mut().for_each(|v| v.text(node));
                }
                XmlEvent::CData(node) => validators.iter_mut().for_each(|v| v.text(node)),
                _ => {}
            }
        }

        let mut diagnostics: Vec<DiagnosticMessage> =
            doc.syntax_errors().iter().map(|error| error.to_diagnostic()).collect();
        diagnostics.extend(wellformed.finish());
        for validator in validators {
            diagnostics.extend(validator.finish());
        }
        if let Some(kind) = plan.no_grammar {
            let location = doc
                .root_element()
                .and_then(|root| root.name_span().or_else(|| Some(root.span())))
                .unwrap_or_else(|| Span::new(0, 0));
            diagnostics.push(
                DiagnosticMessageBuilder::from_code(kind, "NoGrammarConstraints", &[])
                    .with_location(location)
                    .build(),
            );
        }
        Ok(diagnostics)
    }
}
