//! SQLite repository for stored quotes.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `mod.rs` - Quote operations
//! - `revisions.rs` - Revision snapshot operations

mod revisions;

use super::{
    timestamp, total_sales_of, QuoteDraft, QuoteId, QuoteMeta, QuoteRecord, QuoteStore,
    QuoteSummary, RevisionId, RevisionRecord, RevisionSummary, StoreError,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

const QUOTE_COLUMNS: &str = r#"
    id, deal_id, ref_code, revision, client_name, status, created_by,
    inputs_json, computed_json, compute_error, inputs_digest, result_digest,
    created_at, updated_at
"#;

fn parse_json(raw: &str) -> Result<Value, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

fn parse_optional_json(raw: Option<String>) -> Result<Option<Value>, StoreError> {
    raw.as_deref().map(parse_json).transpose()
}

fn quote_from_row(row: &SqliteRow) -> Result<QuoteRecord, StoreError> {
    Ok(QuoteRecord {
        id: row.get("id"),
        meta: QuoteMeta {
            deal_id: row.get("deal_id"),
            ref_code: row.get("ref_code"),
            revision: row.get("revision"),
            client_name: row.get("client_name"),
            status: row.get("status"),
            created_by: row.get("created_by"),
        },
        inputs: parse_json(row.get::<&str, _>("inputs_json"))?,
        computed: parse_optional_json(row.get("computed_json"))?,
        compute_error: row.get("compute_error"),
        inputs_digest: row.get("inputs_digest"),
        result_digest: row.get("result_digest"),
        created_at: timestamp(row.get("created_at")),
        updated_at: timestamp(row.get("updated_at")),
    })
}

/// A unique-index violation on `deal_id` means the deal already has a quote.
fn deal_conflict(err: sqlx::Error, deal_id: Option<i64>) -> StoreError {
    match (&err, deal_id) {
        (sqlx::Error::Database(db_err), Some(deal)) if db_err.is_unique_violation() => {
            StoreError::DealTaken(deal)
        }
        _ => StoreError::Db(err),
    }
}

fn optional_json_text(value: Option<&Value>) -> Result<Option<String>, StoreError> {
    value.map(serde_json::to_string).transpose().map_err(StoreError::from)
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Insert a new quote.
    ///
    /// # Errors
    /// Returns [`StoreError::DealTaken`] if the deal already has a quote.
    pub async fn insert_quote_row(&self, draft: &QuoteDraft) -> Result<QuoteRecord, StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let meta = &draft.meta;

        let result = sqlx::query(
            r#"
            INSERT INTO quotes (
                deal_id, ref_code, revision, client_name, status, created_by,
                inputs_json, computed_json, compute_error, inputs_digest, result_digest,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(meta.deal_id)
        .bind(meta.ref_code.as_deref())
        .bind(meta.revision.as_deref())
        .bind(meta.client_name.as_deref())
        .bind(meta.status.as_str())
        .bind(meta.created_by.as_deref())
        .bind(serde_json::to_string(&draft.inputs)?)
        .bind(optional_json_text(draft.computed.as_ref())?)
        .bind(draft.compute_error.as_deref())
        .bind(draft.inputs_digest.as_str())
        .bind(draft.result_digest.as_deref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| deal_conflict(e, meta.deal_id))?;

        let id = result.last_insert_rowid();
        self.fetch_quote(id)
            .await?
            .ok_or(StoreError::QuoteNotFound(id))
    }

    /// Replace inputs, metadata and result of an existing quote.
    ///
    /// # Errors
    /// Returns [`StoreError::QuoteNotFound`] if no quote has this id.
    pub async fn update_quote_row(
        &self,
        id: QuoteId,
        draft: &QuoteDraft,
    ) -> Result<QuoteRecord, StoreError> {
        let meta = &draft.meta;

        let result = sqlx::query(
            r#"
            UPDATE quotes
            SET deal_id = ?, ref_code = ?, revision = ?, client_name = ?, status = ?,
                created_by = ?, inputs_json = ?, computed_json = ?, compute_error = ?,
                inputs_digest = ?, result_digest = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(meta.deal_id)
        .bind(meta.ref_code.as_deref())
        .bind(meta.revision.as_deref())
        .bind(meta.client_name.as_deref())
        .bind(meta.status.as_str())
        .bind(meta.created_by.as_deref())
        .bind(serde_json::to_string(&draft.inputs)?)
        .bind(optional_json_text(draft.computed.as_ref())?)
        .bind(draft.compute_error.as_deref())
        .bind(draft.inputs_digest.as_str())
        .bind(draft.result_digest.as_deref())
        .bind(chrono::Utc::now().timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| deal_conflict(e, meta.deal_id))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::QuoteNotFound(id));
        }
        self.fetch_quote(id)
            .await?
            .ok_or(StoreError::QuoteNotFound(id))
    }

    /// Fetch a single quote by id.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored document is not valid JSON.
    pub async fn fetch_quote(&self, id: QuoteId) -> Result<Option<QuoteRecord>, StoreError> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(quote_from_row).transpose()
    }

    /// List quotes, most recently updated first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_quote_summaries(&self) -> Result<Vec<QuoteSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, deal_id, ref_code, client_name, status, computed_json, updated_at
            FROM quotes
            ORDER BY updated_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let computed = parse_optional_json(row.get("computed_json"))?;
                Ok(QuoteSummary {
                    id: row.get("id"),
                    deal_id: row.get("deal_id"),
                    ref_code: row.get("ref_code"),
                    client_name: row.get("client_name"),
                    status: row.get("status"),
                    total_sales_usd: computed.as_ref().and_then(total_sales_of),
                    updated_at: timestamp(row.get("updated_at")),
                })
            })
            .collect()
    }

    /// Store a recomputed result and clear the compute error.
    ///
    /// # Errors
    /// Returns [`StoreError::QuoteNotFound`] if no quote has this id.
    pub async fn update_computed(
        &self,
        id: QuoteId,
        computed: &Value,
        result_digest: &str,
    ) -> Result<QuoteRecord, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE quotes
            SET computed_json = ?, compute_error = NULL, result_digest = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(serde_json::to_string(computed)?)
        .bind(result_digest)
        .bind(chrono::Utc::now().timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::QuoteNotFound(id));
        }
        self.fetch_quote(id)
            .await?
            .ok_or(StoreError::QuoteNotFound(id))
    }
}

#[async_trait]
impl QuoteStore for Repository {
    async fn insert_quote(&self, draft: &QuoteDraft) -> Result<QuoteRecord, StoreError> {
        self.insert_quote_row(draft).await
    }

    async fn update_quote(
        &self,
        id: QuoteId,
        draft: &QuoteDraft,
    ) -> Result<QuoteRecord, StoreError> {
        self.update_quote_row(id, draft).await
    }

    async fn get_quote(&self, id: QuoteId) -> Result<Option<QuoteRecord>, StoreError> {
        self.fetch_quote(id).await
    }

    async fn list_quotes(&self) -> Result<Vec<QuoteSummary>, StoreError> {
        self.query_quote_summaries().await
    }

    async fn set_computed(
        &self,
        id: QuoteId,
        computed: &Value,
        result_digest: &str,
    ) -> Result<QuoteRecord, StoreError> {
        self.update_computed(id, computed, result_digest).await
    }

    async fn insert_revision(
        &self,
        quote_id: QuoteId,
        name: &str,
    ) -> Result<RevisionRecord, StoreError> {
        self.snapshot_revision(quote_id, name).await
    }

    async fn list_revisions(&self, quote_id: QuoteId) -> Result<Vec<RevisionSummary>, StoreError> {
        self.query_revision_summaries(quote_id).await
    }

    async fn get_revision(
        &self,
        quote_id: QuoteId,
        revision_id: RevisionId,
    ) -> Result<Option<RevisionRecord>, StoreError> {
        self.fetch_revision(quote_id, revision_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn draft(inputs: Value) -> QuoteDraft {
        QuoteDraft {
            meta: QuoteMeta::from_inputs(&inputs),
            inputs,
            computed: None,
            compute_error: Some("Invalid input: total_door_usd must be > 0".to_string()),
            inputs_digest: "abc".to_string(),
            result_digest: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_quote() {
        let (repo, _temp) = setup_test_db().await;
        let inputs = json!({"ref_code": "COT-7", "client_name": "Acme", "items": []});

        let saved = repo.insert_quote_row(&draft(inputs.clone())).await.unwrap();
        assert!(saved.id > 0);
        assert_eq!(saved.meta.ref_code.as_deref(), Some("COT-7"));
        assert_eq!(saved.meta.status, "draft");
        assert!(saved.computed.is_none());
        assert!(saved.compute_error.is_some());

        let fetched = repo.fetch_quote(saved.id).await.unwrap().unwrap();
        assert_eq!(fetched.inputs, inputs);
        assert_eq!(fetched, saved);
    }

    #[tokio::test]
    async fn test_fetch_missing_quote() {
        let (repo, _temp) = setup_test_db().await;
        assert!(repo.fetch_quote(999).await.unwrap().is_none());
        let err = repo
            .update_quote_row(999, &draft(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::QuoteNotFound(999)));
    }

    #[tokio::test]
    async fn test_update_computed_clears_error() {
        let (repo, _temp) = setup_test_db().await;
        let saved = repo.insert_quote_row(&draft(json!({}))).await.unwrap();

        let computed = json!({"oferta": {"totals": {"total_sales_usd": 1420}}});
        let updated = repo
            .update_computed(saved.id, &computed, "digest")
            .await
            .unwrap();
        assert_eq!(updated.computed, Some(computed));
        assert!(updated.compute_error.is_none());
        assert_eq!(updated.result_digest.as_deref(), Some("digest"));

        let summaries = repo.query_quote_summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_sales_usd.unwrap().to_string(), "1420");
    }

    #[tokio::test]
    async fn test_deal_can_only_have_one_quote() {
        let (repo, _temp) = setup_test_db().await;
        repo.insert_quote_row(&draft(json!({"deal_id": 5})))
            .await
            .unwrap();
        let err = repo
            .insert_quote_row(&draft(json!({"deal_id": 5})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DealTaken(5)));

        // Quotes without a deal never conflict.
        repo.insert_quote_row(&draft(json!({}))).await.unwrap();
        repo.insert_quote_row(&draft(json!({}))).await.unwrap();
    }
}
