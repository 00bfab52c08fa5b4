//! Embedding provider for OpenAI-compatible `/v1/embeddings` endpoints.
//!
//! Works against the OpenAI API as well as self-hosted servers that speak
//! the same protocol (text-embeddings-inference, vLLM, Ollama, LocalAI).
//!
//! This module is only available when the `openai` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{DEFAULT_MAX_INPUT_CHARS, EmbeddingProvider, prepare_input};
use crate::error::{RagError, Result};

/// The default OpenAI embeddings API endpoint.
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// The default model, a 384-dimensional sentence-transformers model.
const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Request timeout used until [`OpenAIEmbeddingProvider::with_timeout`] overrides it.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// # Configuration
///
/// - `url` – full embeddings endpoint; defaults to the OpenAI API.
/// - `model` – defaults to `sentence-transformers/all-MiniLM-L6-v2`.
/// - `dimensions` – the vector length the model produces; every response is
///   checked against it.
/// - `api_key` – optional, sent as a bearer token when set.
///
/// # Example
///
/// ```rust,ignore
/// use endee_rag::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("http://localhost:8081/v1/embeddings", 384)?
///     .with_model("BAAI/bge-small-en-v1.5");
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    max_input_chars: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for the endpoint at `url` producing `dimensions`-long vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `url` is empty or `dimensions == 0`.
    pub fn new(url: impl Into<String>, dimensions: usize) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(RagError::Configuration("embedding url must not be empty".into()));
        }
        if dimensions == 0 {
            return Err(RagError::Configuration("dimensions must be greater than zero".into()));
        }

        Ok(Self {
            client: http_client(DEFAULT_TIMEOUT)?,
            url,
            api_key: None,
            model: DEFAULT_MODEL.into(),
            dimensions,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        })
    }

    /// Create a provider for the hosted OpenAI API using `OPENAI_API_KEY`.
    pub fn from_env(dimensions: usize) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| RagError::Embedding {
            provider: "OpenAI".into(),
            message: "OPENAI_API_KEY environment variable not set".into(),
        })?;
        Ok(Self::new(OPENAI_EMBEDDINGS_URL, dimensions)?.with_api_key(api_key))
    }

    /// Set the bearer token sent with each request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the character limit applied to each input before sending.
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Set the request timeout (30 seconds by default). A request that runs
    /// past it fails with [`RagError::Embedding`].
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = http_client(timeout)?;
        Ok(self)
    }

    fn embedding_error(message: impl Into<String>) -> RagError {
        RagError::Embedding { provider: "OpenAI".into(), message: message.into() }
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
        RagError::Configuration(format!("failed to build embedding http client: {e}"))
    })
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "OpenAI", text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Self::embedding_error("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let input = texts
            .iter()
            .map(|text| prepare_input(text, self.max_input_chars))
            .collect::<Result<Vec<_>>>()?;

        debug!(provider = "OpenAI", batch_size = texts.len(), model = %self.model, "embedding batch");

        let mut request = self
            .client
            .post(&self.url)
            .json(&EmbeddingRequest { model: &self.model, input });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "request failed");
            Self::embedding_error(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = "OpenAI", %status, "API error");
            return Err(Self::embedding_error(format!("API returned {status}: {detail}")));
        }

        let mut embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "failed to parse response");
            Self::embedding_error(format!("failed to parse response: {e}"))
        })?;

        if embedding_response.data.len() != texts.len() {
            return Err(Self::embedding_error(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embedding_response.data.len()
            )));
        }

        // Servers may answer out of order; `index` ties each vector to its input.
        embedding_response.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));

        let embeddings: Vec<Vec<f32>> =
            embedding_response.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(Self::embedding_error(format!(
                "model returned {} dimensions, expected {}",
                bad.len(),
                self.dimensions
            )));
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
