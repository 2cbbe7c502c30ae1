use super::{Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};
use tracing::debug;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-large";

/// Longest input, in tokens, the embedding models accept in one piece.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 8191;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub max_retries: usize,
    /// Texts longer than this are embedded window by window and averaged.
    pub max_input_tokens: usize,
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            max_retries: 2,
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
        }
    }
}

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
///
/// A text that fits the model's context is sent as a string. A longer one is
/// tokenized with the model's BPE, sent as consecutive token windows in one
/// request, and the window vectors are averaged (weighted by window length)
/// and L2-normalized into a single embedding.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    settings: OpenAiSettings,
    tokenizer: Arc<CoreBPE>,
}

impl OpenAiEmbedder {
    pub fn new(settings: OpenAiSettings) -> Result<Self, EmbeddingError> {
        let endpoint = format!("{}/embeddings", settings.base_url.trim_end_matches('/'));
        let tokenizer = tokenizer_for(&settings.model)?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            settings,
            tokenizer: Arc::new(tokenizer),
        })
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.tokenizer
            .encode_ordinary(text)
            .into_iter()
            .map(|token| token as u32)
            .collect()
    }

    fn request<'a>(&'a self, input: EmbeddingInput<'a>) -> EmbeddingRequest<'a> {
        // only the text-embedding-3 family accepts a dimensions override
        let dimensions = self
            .settings
            .model
            .starts_with("text-embedding-3")
            .then_some(self.settings.dimensions);

        EmbeddingRequest {
            model: &self.settings.model,
            input,
            dimensions,
        }
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }

    fn retry_backoff(attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(250 * (1 << capped))
    }

    /// Posts one request and returns its vectors in input order.
    async fn post_embeddings(
        &self,
        input: EmbeddingInput<'_>,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = self.request(input);
        let mut attempt = 0usize;

        loop {
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.settings.api_key)
                .json(&request)
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(error) if Self::is_retryable_error(&error) && attempt < self.settings.max_retries => {
                    attempt += 1;
                    debug!(attempt, error = %error, "retrying embedding request");
                    tokio::time::sleep(Self::retry_backoff(attempt)).await;
                    continue;
                }
                Err(error) => return Err(error.into()),
            };

            let status = response.status();
            if !status.is_success() {
                if Self::should_retry(status) && attempt < self.settings.max_retries {
                    attempt += 1;
                    debug!(attempt, status = %status, "retrying embedding request");
                    tokio::time::sleep(Self::retry_backoff(attempt)).await;
                    continue;
                }

                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<body unavailable>".to_string());
                return Err(EmbeddingError::Service {
                    status: status.as_u16(),
                    body,
                });
            }

            let mut parsed: EmbeddingResponse = response.json().await?;
            if parsed.data.is_empty() {
                return Err(EmbeddingError::EmptyResponse);
            }
            if parsed.data.len() != expected {
                return Err(EmbeddingError::ResponseCount {
                    expected,
                    actual: parsed.data.len(),
                });
            }
            parsed.data.sort_by_key(|entry| entry.index);

            let mut vectors = Vec::with_capacity(expected);
            for entry in parsed.data {
                if entry.embedding.len() != self.settings.dimensions {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.settings.dimensions,
                        actual: entry.embedding.len(),
                    });
                }
                vectors.push(entry.embedding);
            }

            return Ok(vectors);
        }
    }
}

fn tokenizer_for(model: &str) -> Result<CoreBPE, EmbeddingError> {
    match get_bpe_from_model(model) {
        Ok(bpe) => Ok(bpe),
        Err(error) => {
            debug!(model, error = %error, "no tokenizer registered for model; using cl100k_base");
            cl100k_base().map_err(|error| EmbeddingError::Tokenizer {
                model: model.to_string(),
                details: error.to_string(),
            })
        }
    }
}

/// Averages window vectors weighted by token count, then scales to unit length.
fn combine_windows(vectors: &[Vec<f32>], weights: &[usize], dimensions: usize) -> Vec<f32> {
    let total = weights.iter().sum::<usize>().max(1) as f32;
    let mut combined = vec![0f32; dimensions];

    for (vector, weight) in vectors.iter().zip(weights) {
        let share = *weight as f32 / total;
        for (slot, value) in combined.iter_mut().zip(vector) {
            *slot += value * share;
        }
    }

    let norm = combined.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut combined {
            *value /= norm;
        }
    }
    combined
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.settings.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let tokens = self.encode(text);
        let window = self.settings.max_input_tokens.max(1);

        if tokens.len() <= window {
            let mut vectors = self.post_embeddings(EmbeddingInput::Text(text), 1).await?;
            return vectors.pop().ok_or(EmbeddingError::EmptyResponse);
        }

        let windows: Vec<&[u32]> = tokens.chunks(window).collect();
        let weights: Vec<usize> = windows.iter().map(|piece| piece.len()).collect();
        debug!(
            tokens = tokens.len(),
            windows = windows.len(),
            "embedding long text in token windows"
        );

        let expected = windows.len();
        let vectors = self
            .post_embeddings(EmbeddingInput::Tokens(windows), expected)
            .await?;
        Ok(combine_windows(&vectors, &weights, self.settings.dimensions))
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    Text(&'a str),
    Tokens(Vec<&'a [u32]>),
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
