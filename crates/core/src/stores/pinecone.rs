use crate::error::IndexError;
use crate::models::{IndexStats, NamespaceStats, QueryMatch, VectorRecord};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// Pinecone does not return a structured code for oversized upserts; its message
/// names the 2MB request limit, so that literal is the classification signal.
pub const PAYLOAD_TOO_LARGE_MARKER: &str = "2MB";

const API_VERSION: &str = "2024-07";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PineconeSettings {
    pub api_key: String,
    /// Data-plane host of the index, e.g. `index-abc123.svc.us-east-1.pinecone.io`.
    pub host: String,
}

pub struct PineconeStore {
    client: Client,
    base: Url,
    api_key: String,
}

impl PineconeStore {
    pub fn new(settings: &PineconeSettings) -> Result<Self, IndexError> {
        Ok(Self {
            client: Client::new(),
            base: normalize_host(&settings.host)?,
            api_key: settings.api_key.clone(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, IndexError> {
        let response = self
            .client
            .post(self.base.join(path)?)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        Ok(response.json().await?)
    }
}

fn normalize_host(host: &str) -> Result<Url, IndexError> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(IndexError::Request("index host is empty".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Maps a failed response to [`IndexError`], recognising oversized payloads.
pub fn classify_failure(status: StatusCode, body: &str) -> IndexError {
    if status == StatusCode::PAYLOAD_TOO_LARGE || body.contains(PAYLOAD_TOO_LARGE_MARKER) {
        return IndexError::PayloadTooLarge(format!("{status}: {body}"));
    }

    IndexError::Service {
        status: status.as_u16(),
        details: body.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RawMatch>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    id: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    namespaces: BTreeMap<String, RawNamespaceStats>,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNamespaceStats {
    #[serde(default)]
    vector_count: u64,
}

#[async_trait]
impl VectorIndex for PineconeStore {
    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> Result<usize, IndexError> {
        if records.is_empty() {
            return Ok(0);
        }

        let body = json!({ "vectors": records, "namespace": namespace });
        let response = self.post("vectors/upsert", &body).await?;
        let parsed: UpsertResponse = serde_json::from_value(response)?;

        debug!(
            namespace,
            sent = records.len(),
            upserted = parsed.upserted_count,
            "pinecone upsert"
        );
        Ok(parsed.upserted_count)
    }

    async fn query(
        &self,
        probe: &[f32],
        top_k: usize,
        namespace: &str,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let body = json!({
            "vector": probe,
            "topK": top_k,
            "namespace": namespace,
            "includeMetadata": include_metadata,
            "includeValues": false,
        });
        let response = self.post("query", &body).await?;
        let parsed: QueryResponse = serde_json::from_value(response)?;

        Ok(parsed
            .matches
            .into_iter()
            .map(|hit| QueryMatch {
                id: hit.id,
                score: hit.score,
                metadata: hit.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn describe_stats(&self) -> Result<IndexStats, IndexError> {
        let response = self.post("describe_index_stats", &json!({})).await?;
        let parsed: StatsResponse = serde_json::from_value(response)?;

        Ok(IndexStats {
            dimension: parsed.dimension,
            total_vector_count: parsed.total_vector_count,
            namespaces: parsed
                .namespaces
                .into_iter()
                .map(|(name, stats)| {
                    (
                        name,
                        NamespaceStats {
                            vector_count: stats.vector_count,
                        },
                    )
                })
                .collect(),
        })
    }
}
