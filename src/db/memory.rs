//! In-memory quote store for tests and database-less runs.

use super::{
    total_sales_of, QuoteDraft, QuoteId, QuoteRecord, QuoteStore, QuoteSummary, RevisionId,
    RevisionRecord, RevisionSummary, StoreError,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    quotes: Vec<QuoteRecord>,
    revisions: Vec<RevisionRecord>,
    next_quote_id: QuoteId,
    next_revision_id: RevisionId,
}

impl State {
    fn quote_mut(&mut self, id: QuoteId) -> Result<&mut QuoteRecord, StoreError> {
        self.quotes
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(StoreError::QuoteNotFound(id))
    }

    fn check_deal(&self, draft: &QuoteDraft, except: Option<QuoteId>) -> Result<(), StoreError> {
        let Some(deal) = draft.meta.deal_id else {
            return Ok(());
        };
        let taken = self
            .quotes
            .iter()
            .any(|q| q.meta.deal_id == Some(deal) && Some(q.id) != except);
        if taken {
            return Err(StoreError::DealTaken(deal));
        }
        Ok(())
    }
}

/// Quote store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteStore for InMemoryStore {
    async fn insert_quote(&self, draft: &QuoteDraft) -> Result<QuoteRecord, StoreError> {
        let mut state = self.state.write().await;
        state.check_deal(draft, None)?;

        state.next_quote_id += 1;
        let now = Utc::now();
        let record = QuoteRecord {
            id: state.next_quote_id,
            meta: draft.meta.clone(),
            inputs: draft.inputs.clone(),
            computed: draft.computed.clone(),
            compute_error: draft.compute_error.clone(),
            inputs_digest: draft.inputs_digest.clone(),
            result_digest: draft.result_digest.clone(),
            created_at: now,
            updated_at: now,
        };
        state.quotes.push(record.clone());
        Ok(record)
    }

    async fn update_quote(
        &self,
        id: QuoteId,
        draft: &QuoteDraft,
    ) -> Result<QuoteRecord, StoreError> {
        let mut state = self.state.write().await;
        state.quote_mut(id)?;
        state.check_deal(draft, Some(id))?;

        let record = state.quote_mut(id)?;
        record.meta = draft.meta.clone();
        record.inputs = draft.inputs.clone();
        record.computed = draft.computed.clone();
        record.compute_error = draft.compute_error.clone();
        record.inputs_digest = draft.inputs_digest.clone();
        record.result_digest = draft.result_digest.clone();
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn get_quote(&self, id: QuoteId) -> Result<Option<QuoteRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.quotes.iter().find(|q| q.id == id).cloned())
    }

    async fn list_quotes(&self) -> Result<Vec<QuoteSummary>, StoreError> {
        let state = self.state.read().await;
        let mut summaries: Vec<QuoteSummary> =
            state.quotes.iter().map(QuoteSummary::from_record).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(summaries)
    }

    async fn set_computed(
        &self,
        id: QuoteId,
        computed: &Value,
        result_digest: &str,
    ) -> Result<QuoteRecord, StoreError> {
        let mut state = self.state.write().await;
        let record = state.quote_mut(id)?;
        record.computed = Some(computed.clone());
        record.compute_error = None;
        record.result_digest = Some(result_digest.to_string());
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn insert_revision(
        &self,
        quote_id: QuoteId,
        name: &str,
    ) -> Result<RevisionRecord, StoreError> {
        let mut state = self.state.write().await;
        let source = state.quote_mut(quote_id)?.clone();

        state.next_revision_id += 1;
        let revision = RevisionRecord {
            id: state.next_revision_id,
            quote_id,
            name: name.to_string(),
            inputs: source.inputs,
            computed: source.computed,
            inputs_digest: source.inputs_digest,
            created_at: Utc::now(),
        };
        state.revisions.push(revision.clone());
        Ok(revision)
    }

    async fn list_revisions(&self, quote_id: QuoteId) -> Result<Vec<RevisionSummary>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .revisions
            .iter()
            .rev()
            .filter(|r| r.quote_id == quote_id)
            .map(|r| RevisionSummary {
                id: r.id,
                name: r.name.clone(),
                created_at: r.created_at,
            })
            .collect())
    }

    async fn get_revision(
        &self,
        quote_id: QuoteId,
        revision_id: RevisionId,
    ) -> Result<Option<RevisionRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .revisions
            .iter()
            .find(|r| r.id == revision_id && r.quote_id == quote_id)
            .cloned())
    }
}
