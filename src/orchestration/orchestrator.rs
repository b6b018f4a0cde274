use crate::db::{
    QuoteDraft, QuoteId, QuoteMeta, QuoteRecord, QuoteStore, QuoteSummary, RevisionId,
    RevisionSummary, StoreError, DRAFT_STATUS,
};
use crate::domain::{digest_json, QuoteError, QuoteInputs, QuoteResult};
use crate::engine::{compute_quote, validate_inputs, ValidationIssue, ValidationReport};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result of computing inputs without storing them.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub inputs: QuoteInputs,
    pub computed: QuoteResult,
    pub warnings: Vec<ValidationIssue>,
}

/// A stored quote, optionally as of one of its revisions.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteView {
    pub id: QuoteId,
    pub inputs: Value,
    pub computed: Option<Value>,
    pub compute_error: Option<String>,
    pub meta: QuoteMeta,
    /// Set when the view shows a revision snapshot instead of the live quote.
    pub revision: Option<RevisionSummary>,
    pub inputs_digest: String,
    pub result_digest: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<QuoteRecord> for QuoteView {
    fn from(record: QuoteRecord) -> Self {
        Self {
            id: record.id,
            inputs: record.inputs,
            computed: record.computed,
            compute_error: record.compute_error,
            meta: record.meta,
            revision: None,
            inputs_digest: record.inputs_digest,
            result_digest: record.result_digest,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RevisionCreated {
    pub id: RevisionId,
    pub name: String,
    pub revisions: Vec<RevisionSummary>,
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The request body cannot be read as quote inputs.
    #[error(transparent)]
    Quote(#[from] QuoteError),
    /// Stored inputs exist but cannot be computed.
    #[error("Quote cannot be computed: {0}")]
    Uncomputable(QuoteError),
    #[error("Revision {revision_id} of quote {quote_id} not found")]
    RevisionNotFound {
        quote_id: QuoteId,
        revision_id: RevisionId,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Strip an optional `{"inputs": …}` envelope; anything but an object becomes `{}`.
pub fn normalize_inputs(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("inputs") {
            Some(inner @ Value::Object(_)) => inner,
            Some(_) => Value::Object(Default::default()),
            None => Value::Object(map),
        },
        _ => Value::Object(Default::default()),
    }
}

fn computed_value(result: &QuoteResult) -> Result<(Value, String), OrchestrationError> {
    Ok((serde_json::to_value(result)?, digest_json(result)?))
}

/// Quote workflows on top of the engine and a [`QuoteStore`].
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn QuoteStore>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn QuoteStore>) -> Self {
        Self { store }
    }

    /// Compute without saving.
    ///
    /// # Errors
    /// [`QuoteError::Malformed`] for an unreadable body and
    /// [`QuoteError::InvalidInput`] when the engine refuses the inputs.
    pub fn preview(&self, body: Value) -> Result<Preview, OrchestrationError> {
        let inputs = QuoteInputs::from_value(body)?;
        let report = validate_inputs(&inputs);
        let computed = compute_quote(&inputs)?;
        Ok(Preview {
            inputs,
            computed,
            warnings: report.warnings().cloned().collect(),
        })
    }

    pub fn validate(&self, body: Value) -> Result<ValidationReport, OrchestrationError> {
        let inputs = QuoteInputs::from_value(body)?;
        Ok(validate_inputs(&inputs))
    }

    /// Build what gets saved for `inputs`.
    ///
    /// Never fails because the inputs are incomplete: the compute error is
    /// kept next to the inputs instead, so drafts can always be saved.
    pub fn evaluate(&self, inputs: Value) -> Result<QuoteDraft, OrchestrationError> {
        let outcome = QuoteInputs::from_value(inputs.clone())
            .and_then(|parsed| compute_quote(&parsed));

        let (computed, result_digest, compute_error) = match outcome {
            Ok(result) => {
                let (value, digest) = computed_value(&result)?;
                (Some(value), Some(digest), None)
            }
            Err(err) => {
                tracing::debug!(error = %err, "saving quote without a result");
                (None, None, Some(err.to_string()))
            }
        };

        Ok(QuoteDraft {
            meta: QuoteMeta::from_inputs(&inputs),
            inputs_digest: digest_json(&inputs)?,
            inputs,
            computed,
            compute_error,
            result_digest,
        })
    }

    pub async fn create(&self, body: Value) -> Result<QuoteView, OrchestrationError> {
        let draft = self.evaluate(normalize_inputs(body))?;
        let record = self.store.insert_quote(&draft).await?;
        tracing::info!(quote_id = record.id, computed = record.computed.is_some(), "quote created");
        Ok(record.into())
    }

    pub async fn update(&self, id: QuoteId, body: Value) -> Result<QuoteView, OrchestrationError> {
        let draft = self.evaluate(normalize_inputs(body))?;
        let record = self.store.update_quote(id, &draft).await?;
        tracing::info!(quote_id = id, computed = record.computed.is_some(), "quote updated");
        Ok(record.into())
    }

    pub async fn list(&self) -> Result<Vec<QuoteSummary>, OrchestrationError> {
        Ok(self.store.list_quotes().await?)
    }

    /// Load a quote, or one of its revision snapshots.
    pub async fn get(
        &self,
        id: QuoteId,
        revision_id: Option<RevisionId>,
    ) -> Result<QuoteView, OrchestrationError> {
        let record = self.load(id).await?;
        let Some(revision_id) = revision_id else {
            return Ok(record.into());
        };

        let revision = self
            .store
            .get_revision(id, revision_id)
            .await?
            .ok_or(OrchestrationError::RevisionNotFound {
                quote_id: id,
                revision_id,
            })?;

        let mut view = QuoteView::from(record);
        view.inputs = revision.inputs;
        view.computed = revision.computed;
        view.compute_error = None;
        view.inputs_digest = revision.inputs_digest;
        view.result_digest = None;
        view.revision = Some(RevisionSummary {
            id: revision.id,
            name: revision.name,
            created_at: revision.created_at,
        });
        Ok(view)
    }

    /// Recompute from the stored inputs.
    ///
    /// # Errors
    /// Unlike saving, fails with [`OrchestrationError::Uncomputable`] when the
    /// stored inputs cannot be computed; the stored result is left untouched.
    pub async fn recalculate(&self, id: QuoteId) -> Result<QuoteView, OrchestrationError> {
        let record = self.load(id).await?;

        let result = QuoteInputs::from_value(record.inputs.clone())
            .and_then(|inputs| compute_quote(&inputs))
            .map_err(OrchestrationError::Uncomputable)?;
        let (computed, digest) = computed_value(&result)?;

        let updated = self.store.set_computed(id, &computed, &digest).await?;
        tracing::info!(quote_id = id, result_digest = %digest, "quote recalculated");
        Ok(updated.into())
    }

    /// Copy a quote as a new, unlinked draft.
    pub async fn duplicate(&self, id: QuoteId) -> Result<QuoteView, OrchestrationError> {
        let source = self.load(id).await?;

        let mut inputs = source.inputs;
        if let Value::Object(map) = &mut inputs {
            map.remove("deal_id");
        }

        let meta = QuoteMeta {
            deal_id: None,
            ref_code: Some(format!(
                "{}-COPY",
                source.meta.ref_code.as_deref().unwrap_or("REF")
            )),
            status: DRAFT_STATUS.to_string(),
            ..source.meta
        };

        let draft = QuoteDraft {
            meta,
            inputs_digest: digest_json(&inputs)?,
            inputs,
            computed: source.computed,
            compute_error: source.compute_error,
            result_digest: source.result_digest,
        };
        let record = self.store.insert_quote(&draft).await?;
        tracing::info!(source_id = id, quote_id = record.id, "quote duplicated");
        Ok(record.into())
    }

    pub async fn create_revision(
        &self,
        id: QuoteId,
        name: Option<&str>,
    ) -> Result<RevisionCreated, OrchestrationError> {
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("Rev {}", chrono::Utc::now().timestamp_millis()),
        };

        let revision = self.store.insert_revision(id, &name).await?;
        let revisions = self.store.list_revisions(id).await?;
        Ok(RevisionCreated {
            id: revision.id,
            name: revision.name,
            revisions,
        })
    }

    pub async fn list_revisions(
        &self,
        id: QuoteId,
    ) -> Result<Vec<RevisionSummary>, OrchestrationError> {
        Ok(self.store.list_revisions(id).await?)
    }

    async fn load(&self, id: QuoteId) -> Result<QuoteRecord, OrchestrationError> {
        self.store
            .get_quote(id)
            .await?
            .ok_or(OrchestrationError::Store(StoreError::QuoteNotFound(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use serde_json::json;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(Arc::new(InMemoryStore::new()))
    }

    fn body(door: i64) -> Value {
        json!({
            "ref_code": "COT-10",
            "deal_id": 3,
            "items": [{"qty": 1, "door_value_usd": door}],
            "freight_international_total_usd": 100,
            "insurance_sale_total_usd": 20,
            "rent_rate": 0.3,
            "additional_mode": "PRORATED_ACROSS_ITEMS",
            "insurance_profit_mode": "CORRECTED",
        })
    }

    #[test]
    fn test_normalize_inputs() {
        assert_eq!(normalize_inputs(json!({"inputs": {"a": 1}})), json!({"a": 1}));
        assert_eq!(normalize_inputs(json!({"a": 1})), json!({"a": 1}));
        assert_eq!(normalize_inputs(json!(null)), json!({}));
    }

    #[test]
    fn test_preview_computes_without_storing() {
        let preview = orchestrator().preview(body(1000)).unwrap();
        assert_eq!(preview.computed.oferta.totals.total_sales_usd.to_string(), "1420");
        assert!(preview.warnings.is_empty());

        let err = orchestrator().preview(body(0)).unwrap_err();
        assert!(matches!(err, OrchestrationError::Quote(QuoteError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_draft_saves_with_compute_error() {
        let orch = orchestrator();
        let saved = orch.create(body(0)).await.unwrap();
        assert!(saved.computed.is_none());
        assert!(saved
            .compute_error
            .as_deref()
            .unwrap()
            .contains("total_door_usd"));

        let err = orch.recalculate(saved.id).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Uncomputable(_)));

        let fixed = orch.update(saved.id, body(1000)).await.unwrap();
        assert!(fixed.computed.is_some());
        assert!(fixed.compute_error.is_none());
        assert!(fixed.result_digest.is_some());
    }

    #[tokio::test]
    async fn test_recalculate_is_deterministic() {
        let orch = orchestrator();
        let saved = orch.create(json!({"inputs": body(1000)})).await.unwrap();
        let again = orch.recalculate(saved.id).await.unwrap();
        assert_eq!(again.computed, saved.computed);
        assert_eq!(again.result_digest, saved.result_digest);
    }

    #[tokio::test]
    async fn test_duplicate_is_unlinked_draft() {
        let orch = orchestrator();
        let mut source_body = body(1000);
        source_body["status"] = json!("sent");
        let source = orch.create(source_body).await.unwrap();
        assert_eq!(source.meta.deal_id, Some(3));

        let copy = orch.duplicate(source.id).await.unwrap();
        assert_ne!(copy.id, source.id);
        assert_eq!(copy.meta.deal_id, None);
        assert_eq!(copy.meta.ref_code.as_deref(), Some("COT-10-COPY"));
        assert_eq!(copy.meta.status, "draft");
        assert!(copy.inputs.get("deal_id").is_none());
        assert_eq!(copy.computed, source.computed);
        assert_ne!(copy.inputs_digest, source.inputs_digest);
    }

    #[tokio::test]
    async fn test_revisions_snapshot_and_view() {
        let orch = orchestrator();
        let saved = orch.create(body(1000)).await.unwrap();

        let created = orch.create_revision(saved.id, Some("  ")).await.unwrap();
        assert!(created.name.starts_with("Rev "));
        assert_eq!(created.revisions.len(), 1);

        orch.update(saved.id, body(2000)).await.unwrap();

        let live = orch.get(saved.id, None).await.unwrap();
        let snapshot = orch.get(saved.id, Some(created.id)).await.unwrap();
        assert_ne!(live.inputs, snapshot.inputs);
        assert_eq!(snapshot.inputs, saved.inputs);
        assert_eq!(snapshot.revision.unwrap().id, created.id);

        let err = orch.get(saved.id, Some(created.id + 10)).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::RevisionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_quote() {
        let err = orchestrator().duplicate(77).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestrationError::Store(StoreError::QuoteNotFound(77))
        ));
    }
}
