//! Append-only storage for feature requests.
//!
//! There is no update or delete path. Hash lookups return the earliest row
//! with that hash; listings are newest first.

use sqlx::SqlitePool;

use crate::config::DatabaseConfig;
use crate::db;
use crate::error::EpicforgeError;
use crate::models::{FeatureRequest, FeatureRequestSummary, NewFeatureRequest};

#[derive(Debug, Clone)]
pub struct FeatureStore {
    pool: SqlitePool,
}

impl FeatureStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the table exists.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, EpicforgeError> {
        let pool = db::create_pool(config).await?;
        db::create_schema(&pool).await?;
        tracing::info!(url = %config.url, "Feature request store ready");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a record and return it with its assigned id.
    pub async fn insert(&self, record: NewFeatureRequest) -> Result<FeatureRequest, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO feature_requests
                (feature_text, submission_time, ip, json_response, response_md5, epic_title)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.feature_text)
        .bind(record.submission_time)
        .bind(&record.client_ip)
        .bind(&record.json_response)
        .bind(&record.response_hash)
        .bind(&record.epic_title)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::info!(id, hash = %record.response_hash, "Stored feature request");

        Ok(FeatureRequest {
            id,
            feature_text: record.feature_text,
            submission_time: record.submission_time,
            client_ip: record.client_ip,
            json_response: record.json_response,
            response_hash: record.response_hash,
            epic_title: record.epic_title,
        })
    }

    pub async fn find_by_hash(&self, hash: &str) -> Result<Option<FeatureRequest>, sqlx::Error> {
        sqlx::query_as::<_, FeatureRequest>(
            r#"
            SELECT id,
                   COALESCE(feature_text, '') AS feature_text,
                   submission_time,
                   COALESCE(ip, '') AS ip,
                   COALESCE(json_response, '') AS json_response,
                   response_md5,
                   COALESCE(epic_title, '') AS epic_title
            FROM feature_requests
            WHERE response_md5 = ?
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_summaries(&self) -> Result<Vec<FeatureRequestSummary>, sqlx::Error> {
        sqlx::query_as::<_, FeatureRequestSummary>(
            r#"
            SELECT submission_time,
                   COALESCE(epic_title, '') AS epic_title,
                   COALESCE(response_md5, '') AS response_md5
            FROM feature_requests
            ORDER BY submission_time DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feature_requests")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
