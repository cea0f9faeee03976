use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::hash::content_hash;
use crate::payload::Payload;

/// One stored generation call. Rows are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeatureRequest {
    pub id: i64,
    pub feature_text: String,
    pub submission_time: NaiveDateTime,
    #[sqlx(rename = "ip")]
    pub client_ip: String,
    pub json_response: String,
    #[sqlx(rename = "response_md5")]
    #[serde(rename = "response_md5")]
    pub response_hash: String,
    pub epic_title: String,
}

/// A record about to be inserted; the id is assigned by the database.
#[derive(Debug, Clone)]
pub struct NewFeatureRequest {
    pub feature_text: String,
    pub submission_time: NaiveDateTime,
    pub client_ip: String,
    pub json_response: String,
    pub response_hash: String,
    pub epic_title: String,
}

impl NewFeatureRequest {
    /// Derive the hash and best-effort title from the generated text and
    /// stamp the current local time.
    pub fn from_generation(
        feature_text: impl Into<String>,
        client_ip: impl Into<String>,
        json_response: impl Into<String>,
    ) -> Self {
        let json_response = json_response.into();
        let epic_title = Payload::parse(&json_response).epic_title().to_string();

        Self {
            feature_text: feature_text.into(),
            submission_time: Local::now().naive_local(),
            client_ip: client_ip.into(),
            response_hash: content_hash(&json_response),
            json_response,
            epic_title,
        }
    }
}

/// Row shape returned by the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct FeatureRequestSummary {
    pub submission_time: NaiveDateTime,
    pub epic_title: String,
    pub response_md5: String,
}
