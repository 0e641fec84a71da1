use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::document::Document;
use crate::store::{Result, StoreError};

/// Minimal Firestore REST v1 client
pub struct FirestoreClient {
    client: Client,
    /// `{api_base}/projects/{project}/databases/(default)/documents`
    documents_url: String,
    bearer_token: Option<String>,
}

/// One element of a `runQuery` response stream
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryResponse {
    document: Option<Document>,
    #[allow(dead_code)]
    read_time: Option<String>,
}

impl FirestoreClient {
    /// Create a new Firestore client
    pub fn new(
        api_base: &str,
        project_id: &str,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        // Normalize URL - ensure no trailing slash
        let api_base = api_base.trim_end_matches('/');

        if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
            return Err(StoreError::InvalidUrl(
                "URL must start with http:// or https://".to_string(),
            ));
        }
        if project_id.is_empty() {
            return Err(StoreError::InvalidUrl("project id must not be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                api_base, project_id
            ),
            bearer_token,
        })
    }

    /// Build full URL for a document path
    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.documents_url.clone()
        } else {
            format!("{}/{}", self.documents_url, path)
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map error statuses to store errors
    async fn check(response: Response, path: &str) -> Result<Response> {
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::AuthFailed),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(path.to_string())),
            status if !status.is_success() => Err(StoreError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
            _ => Ok(response),
        }
    }

    /// runQuery - documents of `collection_id` under `parent` with
    /// `min_level <= level <= max_level`
    pub async fn run_level_query(
        &self,
        parent: &str,
        collection_id: &str,
        min_level: i32,
        max_level: i32,
    ) -> Result<Vec<Document>> {
        let url = format!("{}:runQuery", self.url(parent));
        let body = level_query(collection_id, min_level, max_level);

        let response = self
            .authorized(self.client.post(&url).json(&body))
            .send()
            .await?;
        let response = Self::check(response, parent).await?;

        let results: Vec<RunQueryResponse> = response.json().await?;
        Ok(results.into_iter().filter_map(|r| r.document).collect())
    }

    /// PATCH - create or replace a document
    pub async fn patch_document(&self, path: &str, document: &Document) -> Result<()> {
        let url = self.url(path);

        let response = self
            .authorized(self.client.patch(&url).json(document))
            .send()
            .await?;
        Self::check(response, path).await?;
        Ok(())
    }

    /// DELETE - remove a document; deleting a missing document succeeds
    pub async fn delete_document(&self, path: &str) -> Result<()> {
        let url = self.url(path);

        let response = self.authorized(self.client.delete(&url)).send().await?;
        match Self::check(response, path).await {
            Ok(_) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Structured query selecting a level range from one collection
fn level_query(collection_id: &str, min_level: i32, max_level: i32) -> serde_json::Value {
    let level_filter = |op: &str, level: i32| {
        json!({
            "fieldFilter": {
                "field": { "fieldPath": "level" },
                "op": op,
                "value": { "integerValue": level.to_string() }
            }
        })
    };

    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection_id }],
            "where": {
                "compositeFilter": {
                    "op": "AND",
                    "filters": [
                        level_filter("GREATER_THAN_OR_EQUAL", min_level),
                        level_filter("LESS_THAN_OR_EQUAL", max_level),
                    ]
                }
            }
        }
    })
}
