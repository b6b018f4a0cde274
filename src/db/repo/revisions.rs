//! Revision snapshot operations for the repository.

use sqlx::Row;

use super::{parse_json, parse_optional_json, Repository};
use crate::db::{timestamp, QuoteId, RevisionId, RevisionRecord, RevisionSummary, StoreError};

impl Repository {
    /// Copy the quote's current inputs and result into a named revision.
    ///
    /// # Errors
    /// Returns [`StoreError::QuoteNotFound`] if no quote has this id.
    pub async fn snapshot_revision(
        &self,
        quote_id: QuoteId,
        name: &str,
    ) -> Result<RevisionRecord, StoreError> {
        let created_at = chrono::Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        let source = sqlx::query(
            "SELECT inputs_json, computed_json, inputs_digest FROM quotes WHERE id = ?",
        )
        .bind(quote_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::QuoteNotFound(quote_id))?;

        let inputs_json: String = source.get("inputs_json");
        let computed_json: Option<String> = source.get("computed_json");
        let inputs_digest: String = source.get("inputs_digest");

        let result = sqlx::query(
            r#"
            INSERT INTO quote_revisions (quote_id, name, inputs_json, computed_json, inputs_digest, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(quote_id)
        .bind(name)
        .bind(inputs_json.as_str())
        .bind(computed_json.as_deref())
        .bind(inputs_digest.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RevisionRecord {
            id: result.last_insert_rowid(),
            quote_id,
            name: name.to_string(),
            inputs: parse_json(&inputs_json)?,
            computed: parse_optional_json(computed_json)?,
            inputs_digest,
            created_at: timestamp(created_at),
        })
    }

    /// List revisions of a quote, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_revision_summaries(
        &self,
        quote_id: QuoteId,
    ) -> Result<Vec<RevisionSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, created_at
            FROM quote_revisions
            WHERE quote_id = ?
            ORDER BY id DESC
            "#,
        )
        .bind(quote_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| RevisionSummary {
                id: row.get("id"),
                name: row.get("name"),
                created_at: timestamp(row.get("created_at")),
            })
            .collect())
    }

    /// Fetch one revision; `None` if it does not exist or belongs to another quote.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored document is not valid JSON.
    pub async fn fetch_revision(
        &self,
        quote_id: QuoteId,
        revision_id: RevisionId,
    ) -> Result<Option<RevisionRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, quote_id, name, inputs_json, computed_json, inputs_digest, created_at
            FROM quote_revisions
            WHERE id = ? AND quote_id = ?
            "#,
        )
        .bind(revision_id)
        .bind(quote_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(RevisionRecord {
            id: row.get("id"),
            quote_id: row.get("quote_id"),
            name: row.get("name"),
            inputs: parse_json(row.get::<&str, _>("inputs_json"))?,
            computed: parse_optional_json(row.get("computed_json"))?,
            inputs_digest: row.get("inputs_digest"),
            created_at: timestamp(row.get("created_at")),
        }))
    }
}
