//! Quote persistence.
//!
//! This module provides:
//! - The `QuoteStore` abstraction over stored quotes and their revisions
//! - Database initialization, migrations and SQLite pragma configuration
//! - A SQLite `Repository` and an in-memory store for tests and previews
//!
//! Inputs and results are stored as opaque JSON documents. The store never
//! interprets them beyond the metadata columns extracted at save time.

pub mod memory;
pub mod migrations;
pub mod repo;

pub use memory::InMemoryStore;
pub use migrations::init_db;
pub use repo::Repository;

use crate::domain::lenient;
use crate::domain::Decimal;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub type QuoteId = i64;
pub type RevisionId = i64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Corrupt stored document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Quote {0} not found")]
    QuoteNotFound(QuoteId),
    #[error("Deal {0} already has a quote")]
    DealTaken(i64),
}

/// Status of a quote that has just been created or duplicated.
pub const DRAFT_STATUS: &str = "draft";

/// Descriptive columns lifted out of the inputs document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteMeta {
    pub deal_id: Option<i64>,
    pub ref_code: Option<String>,
    pub revision: Option<String>,
    pub client_name: Option<String>,
    pub status: String,
    pub created_by: Option<String>,
}

impl Default for QuoteMeta {
    fn default() -> Self {
        Self {
            deal_id: None,
            ref_code: None,
            revision: None,
            client_name: None,
            status: DRAFT_STATUS.to_string(),
            created_by: None,
        }
    }
}

fn non_empty_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl QuoteMeta {
    /// Read metadata fields from an inputs document (or its `inputs` envelope).
    pub fn from_inputs(inputs: &Value) -> Self {
        let body = inputs.get("inputs").unwrap_or(inputs);
        let deal_id = body
            .get("deal_id")
            .map(lenient::value_to_decimal)
            .filter(|d| d.is_positive())
            .and_then(|d| d.inner().trunc().to_i64());

        Self {
            deal_id,
            ref_code: non_empty_text(body.get("ref_code")),
            revision: non_empty_text(body.get("revision")),
            client_name: non_empty_text(body.get("client_name")),
            status: non_empty_text(body.get("status")).unwrap_or_else(|| DRAFT_STATUS.to_string()),
            created_by: non_empty_text(body.get("created_by")),
        }
    }
}

/// Everything written when a quote is saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteDraft {
    pub meta: QuoteMeta,
    pub inputs: Value,
    pub computed: Option<Value>,
    pub compute_error: Option<String>,
    pub inputs_digest: String,
    pub result_digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteRecord {
    pub id: QuoteId,
    pub meta: QuoteMeta,
    pub inputs: Value,
    pub computed: Option<Value>,
    pub compute_error: Option<String>,
    pub inputs_digest: String,
    pub result_digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the quote listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteSummary {
    pub id: QuoteId,
    pub deal_id: Option<i64>,
    pub ref_code: Option<String>,
    pub client_name: Option<String>,
    pub status: String,
    /// Bottom-line sale total of the last successful computation.
    pub total_sales_usd: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteSummary {
    pub fn from_record(record: &QuoteRecord) -> Self {
        Self {
            id: record.id,
            deal_id: record.meta.deal_id,
            ref_code: record.meta.ref_code.clone(),
            client_name: record.meta.client_name.clone(),
            status: record.meta.status.clone(),
            total_sales_usd: record.computed.as_ref().and_then(total_sales_of),
            updated_at: record.updated_at,
        }
    }
}

pub(crate) fn total_sales_of(computed: &Value) -> Option<Decimal> {
    computed
        .pointer("/oferta/totals/total_sales_usd")
        .map(lenient::value_to_decimal)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionRecord {
    pub id: RevisionId,
    pub quote_id: QuoteId,
    pub name: String,
    pub inputs: Value,
    pub computed: Option<Value>,
    pub inputs_digest: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionSummary {
    pub id: RevisionId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn timestamp(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Storage for quotes and their revision snapshots.
///
/// Implementations must be safe to share across request handlers.
#[async_trait]
pub trait QuoteStore: Send + Sync + fmt::Debug {
    /// Insert a new quote.
    ///
    /// # Errors
    /// Returns [`StoreError::DealTaken`] when another quote is already linked
    /// to the same deal.
    async fn insert_quote(&self, draft: &QuoteDraft) -> Result<QuoteRecord, StoreError>;

    /// Replace a quote's inputs, metadata and result.
    ///
    /// # Errors
    /// Returns [`StoreError::QuoteNotFound`] when the quote does not exist.
    async fn update_quote(&self, id: QuoteId, draft: &QuoteDraft)
        -> Result<QuoteRecord, StoreError>;

    async fn get_quote(&self, id: QuoteId) -> Result<Option<QuoteRecord>, StoreError>;

    /// All quotes, most recently updated first.
    async fn list_quotes(&self) -> Result<Vec<QuoteSummary>, StoreError>;

    /// Store a freshly computed result, clearing any previous compute error.
    ///
    /// # Errors
    /// Returns [`StoreError::QuoteNotFound`] when the quote does not exist.
    async fn set_computed(
        &self,
        id: QuoteId,
        computed: &Value,
        result_digest: &str,
    ) -> Result<QuoteRecord, StoreError>;

    /// Snapshot the quote's current inputs and result under `name`.
    ///
    /// # Errors
    /// Returns [`StoreError::QuoteNotFound`] when the quote does not exist.
    async fn insert_revision(
        &self,
        quote_id: QuoteId,
        name: &str,
    ) -> Result<RevisionRecord, StoreError>;

    /// Revisions of a quote, newest first.
    async fn list_revisions(&self, quote_id: QuoteId)
        -> Result<Vec<RevisionSummary>, StoreError>;

    async fn get_revision(
        &self,
        quote_id: QuoteId,
        revision_id: RevisionId,
    ) -> Result<Option<RevisionRecord>, StoreError>;
}
