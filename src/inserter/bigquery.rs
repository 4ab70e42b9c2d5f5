//! Production bulk upload backend.
//!
//! Implements [`Uploader`] over the warehouse's streaming-insert REST API.
//! Each `put` issues one `insertAll` request; the response's per-index error
//! list is translated into the generic partial-failure taxonomy at this
//! boundary, so the inserter core never sees backend-specific error shapes.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{
    InserterParams, ACCESS_TOKEN_ENV, DEFAULT_WAREHOUSE_ENDPOINT, ENDPOINT_ENV, PROJECT_ENV,
};
use crate::error_handling::{
    categorize_reqwest_error, categorize_status, classify_insert_reason, FatalError, FatalKind,
    InitializationError, PartialInsertError, RowFailure, UploadError,
};

use super::row::EncodedRow;
use super::uploader::Uploader;

/// Streaming-insert client for one destination table.
pub struct StreamingUploader {
    client: reqwest::Client,
    endpoint: String,
    project: String,
    dataset: String,
    table: String,
    token: String,
}

impl StreamingUploader {
    /// Wires a production uploader from the environment.
    ///
    /// Reads the project id from `ETL_PROJECT`, the bearer token from
    /// `ETL_ACCESS_TOKEN`, and an optional endpoint override from
    /// `ETL_WAREHOUSE_ENDPOINT`. This is the sole place the core touches the
    /// production backend; tests substitute an uploader at construction
    /// instead.
    pub fn from_env(params: &InserterParams) -> Result<Self, InitializationError> {
        let project = env::var(PROJECT_ENV).map_err(|_| {
            InitializationError::MissingConfiguration(format!("{} is not set", PROJECT_ENV))
        })?;
        let token = env::var(ACCESS_TOKEN_ENV).map_err(|_| {
            InitializationError::MissingConfiguration(format!("{} is not set", ACCESS_TOKEN_ENV))
        })?;
        let endpoint =
            env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_WAREHOUSE_ENDPOINT.to_string());
        let client = reqwest::Client::builder().build()?;
        Ok(Self::new(client, endpoint, project, token, params))
    }

    /// Builds an uploader against an explicit endpoint and credentials.
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        project: impl Into<String>,
        token: impl Into<String>,
        params: &InserterParams,
    ) -> Self {
        StreamingUploader {
            client,
            endpoint: endpoint.into(),
            project: project.into(),
            dataset: params.dataset.clone(),
            table: params.table_with_suffix(),
            token: token.into(),
        }
    }

    fn insert_all_url(&self) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.endpoint, self.project, self.dataset, self.table
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRequest {
    kind: &'static str,
    skip_invalid_rows: bool,
    rows: Vec<RowEnvelope>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RowEnvelope {
    insert_id: String,
    json: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertErrorEntry>,
}

#[derive(Deserialize)]
struct InsertErrorEntry {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl Uploader for StreamingUploader {
    async fn put(&self, rows: Vec<EncodedRow>, timeout: Duration) -> Result<usize, UploadError> {
        let total = rows.len();
        let body = InsertAllRequest {
            kind: "bigquery#tableDataInsertAllRequest",
            skip_invalid_rows: true,
            rows: rows
                .into_iter()
                .map(|r| RowEnvelope {
                    insert_id: r.insert_id,
                    json: r.fields,
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.insert_all_url())
            .bearer_auth(&self.token)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| FatalError::new(categorize_reqwest_error(&e), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|e| e.to_string());
            return Err(FatalError::new(
                categorize_status(status.as_u16()),
                format!("HTTP {}: {}", status.as_u16(), message),
            )
            .into());
        }

        let parsed: InsertAllResponse = response.json().await.map_err(|e| {
            FatalError::new(FatalKind::Other, format!("unreadable insert response: {}", e))
        })?;

        if parsed.insert_errors.is_empty() {
            return Ok(total);
        }

        let failures = parsed
            .insert_errors
            .into_iter()
            .map(|entry| {
                let (reason, message) = entry
                    .errors
                    .into_iter()
                    .next()
                    .map(|e| (e.reason, e.message))
                    .unwrap_or_else(|| ("unknown".to_string(), String::new()));
                RowFailure {
                    row_index: entry.index,
                    kind: classify_insert_reason(&reason),
                    reason,
                    message,
                }
            })
            .collect();
        Err(PartialInsertError { failures }.into())
    }
}
