//! HTTP client for the Endee vector index service.
//!
//! Provides [`EndeeClient`] which implements [`VectorIndex`] over the
//! service's JSON API:
//!
//! | Operation | Request |
//! |---|---|
//! | create | `POST /api/v1/index/create` `{index_name, dim, space_type}` |
//! | describe | `GET /api/v1/index/{name}/info` |
//! | insert | `POST /api/v1/index/{name}/vector/insert` `{id, embedding, meta}` |
//! | search | `POST /api/v1/index/{name}/search` `{vector, k}` |
//! | health | `GET /health` |
//!
//! Network errors, timeouts, `429` and `5xx` responses are retried under the
//! configured [`RetryPolicy`]; other `4xx` responses fail immediately as
//! [`RagError::Index`] with the service's message attached.
//!
//! # Example
//!
//! ```rust,ignore
//! use endee_rag::{EndeeClient, RagConfig, SpaceType, VectorIndex};
//!
//! let client = EndeeClient::from_config(&RagConfig::default())?;
//! client.create_index("kb", 384, SpaceType::Cosine).await?;
//! client.insert("kb", &record).await?;
//! let result = client.search("kb", &query_embedding, 3).await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{RagConfig, RetryPolicy, SpaceType};
use crate::document::{IndexedRecord, RecordMeta, SearchHit, SearchResult};
use crate::error::{RagError, Result};
use crate::index::{IndexSpec, VectorIndex, ensure_positive_k};
use crate::retry::{Failure, with_retry};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`VectorIndex`] backed by a remote Endee service.
///
/// The client remembers the [`IndexSpec`] of every index it has created or
/// described, so dimension checks on insert and search happen locally
/// without a round-trip.
pub struct EndeeClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    specs: RwLock<HashMap<String, IndexSpec>>,
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    index_name: &'a str,
    dim: usize,
    space_type: SpaceType,
}

#[derive(Serialize)]
struct InsertRequest<'a> {
    id: &'a str,
    embedding: &'a [f32],
    meta: &'a RecordMeta,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    k: usize,
}

#[derive(Deserialize)]
struct IndexInfo {
    #[serde(alias = "dimension")]
    dim: usize,
    space_type: SpaceType,
}

#[derive(Deserialize)]
struct WireHit {
    #[serde(alias = "metadata")]
    meta: RecordMeta,
    score: f32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Hits(Vec<WireHit>),
    Wrapped { results: Vec<WireHit> },
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

/// A completed HTTP exchange the caller still has to interpret.
struct Reply {
    status: StatusCode,
    body: String,
}

impl EndeeClient {
    /// Create a client for the service at `base_url` with default timeout and retry policy.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::build(base_url.into(), DEFAULT_TIMEOUT, RetryPolicy::default())
    }

    /// Create a client using the endpoint, timeout and retry policy from `config`.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::build(config.endpoint.clone(), config.request_timeout, config.retry)
    }

    fn build(base_url: String, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RagError::Configuration("index service url must not be empty".into()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            RagError::Configuration(format!("failed to build index http client: {e}"))
        })?;
        info!(endpoint = %base_url, "initialized index client");
        Ok(Self { http, base_url, retry, specs: RwLock::new(HashMap::new()) })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the service answers `GET /health` with `200 OK`.
    ///
    /// Never retried and never fails: unreachable services report `false`.
    pub async fn health(&self) -> bool {
        match self.http.get(format!("{}/health", self.base_url)).send().await {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                warn!(status = %response.status(), "index service health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "index service unreachable");
                false
            }
        }
    }

    /// Fetch the dimension and space type of an existing index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Index`] if the service does not know the index and
    /// [`RagError::ServiceUnavailable`] if it cannot be reached.
    pub async fn describe_index(&self, name: &str) -> Result<IndexSpec> {
        validate_name(name)?;
        let url = format!("{}/api/v1/index/{name}/info", self.base_url);
        let reply =
            with_retry(&self.retry, "describe_index", || self.execute(self.http.get(&url), name, None))
                .await?;

        let info: IndexInfo = serde_json::from_str(&reply.body).map_err(|e| RagError::Index {
            index: name.to_string(),
            status: reply.status.as_u16(),
            message: format!("malformed index info: {e}"),
        })?;
        let spec = IndexSpec { dimensions: info.dim, space_type: info.space_type };
        self.remember(name, spec).await;
        Ok(spec)
    }

    async fn cached_spec(&self, name: &str) -> Option<IndexSpec> {
        self.specs.read().await.get(name).copied()
    }

    async fn remember(&self, name: &str, spec: IndexSpec) {
        self.specs.write().await.insert(name.to_string(), spec);
    }

    /// The parameters of `name`, from cache or from the service.
    async fn spec_for(&self, name: &str) -> Result<IndexSpec> {
        match self.cached_spec(name).await {
            Some(spec) => Ok(spec),
            None => self.describe_index(name).await,
        }
    }

    /// Send one request and classify the outcome.
    ///
    /// `tolerated` is a non-2xx status the caller wants to interpret itself.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        index: &str,
        tolerated: Option<StatusCode>,
    ) -> std::result::Result<Reply, Failure> {
        let response = request.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                "timed out"
            } else if e.is_connect() {
                "connection failed"
            } else {
                "request failed"
            };
            Failure::Transient(format!("{kind}: {e}"))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Failure::Transient(format!("failed to read response body: {e}")))?;

        if status.is_success() || Some(status) == tolerated {
            return Ok(Reply { status, body });
        }

        let message = serde_json::from_str::<ErrorBody>(&body).map(|b| b.error).unwrap_or(body);
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Failure::Transient(format!("HTTP {status}: {message}")));
        }
        Err(Failure::Permanent(RagError::Index {
            index: index.to_string(),
            status: status.as_u16(),
            message,
        }))
    }
}

/// Index names are interpolated into request paths, so only `[A-Za-z0-9_.-]`
/// is accepted and the dot-segments `.`/`..` are refused.
fn validate_name(name: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
    if name.is_empty() || name == "." || name == ".." || !name.chars().all(allowed) {
        return Err(RagError::Validation(format!(
            "invalid index name '{name}': use letters, digits, '_', '-' or '.'"
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for EndeeClient {
    async fn create_index(
        &self,
        name: &str,
        dimensions: usize,
        space_type: SpaceType,
    ) -> Result<()> {
        validate_name(name)?;
        if dimensions == 0 {
            return Err(RagError::Configuration("dimensions must be greater than zero".into()));
        }
        let requested = IndexSpec { dimensions, space_type };
        if let Some(known) = self.cached_spec(name).await {
            debug!(index = name, "index already known, skipping creation");
            return known.ensure_matches(name, &requested);
        }

        let url = format!("{}/api/v1/index/create", self.base_url);
        let body = CreateIndexRequest { index_name: name, dim: dimensions, space_type };
        let reply = with_retry(&self.retry, "create_index", || {
            self.execute(self.http.post(&url).json(&body), name, Some(StatusCode::CONFLICT))
        })
        .await?;

        if reply.status == StatusCode::CONFLICT {
            let existing = self.describe_index(name).await.map_err(|e| match e {
                RagError::Index { message, .. } => RagError::Configuration(format!(
                    "index '{name}' already exists and its parameters could not be verified: {message}"
                )),
                other => other,
            })?;
            existing.ensure_matches(name, &requested)?;
            info!(index = name, dimensions, %space_type, "index already exists");
            return Ok(());
        }

        self.remember(name, requested).await;
        info!(index = name, dimensions, %space_type, "created index");
        Ok(())
    }

    async fn insert(&self, index: &str, record: &IndexedRecord) -> Result<()> {
        validate_name(index)?;
        let spec = self.spec_for(index).await?;
        spec.ensure_dimensions(index, &record.vector)?;

        let url = format!("{}/api/v1/index/{index}/vector/insert", self.base_url);
        let body = InsertRequest { id: &record.id, embedding: &record.vector, meta: &record.meta };
        with_retry(&self.retry, "insert", || {
            self.execute(self.http.post(&url).json(&body), index, None)
        })
        .await?;

        debug!(index, record.id = %record.id, "inserted record");
        Ok(())
    }

    async fn search(&self, index: &str, vector: &[f32], k: usize) -> Result<SearchResult> {
        validate_name(index)?;
        ensure_positive_k(k)?;
        let spec = self.spec_for(index).await?;
        spec.ensure_dimensions(index, vector)?;

        let url = format!("{}/api/v1/index/{index}/search", self.base_url);
        let body = SearchRequest { vector, k };
        let reply = with_retry(&self.retry, "search", || {
            self.execute(self.http.post(&url).json(&body), index, None)
        })
        .await?;

        if reply.body.trim().is_empty() {
            info!(index, result_count = 0, "search completed");
            return Ok(SearchResult::default());
        }

        let parsed: SearchResponse = serde_json::from_str(&reply.body).map_err(|e| RagError::Index {
            index: index.to_string(),
            status: reply.status.as_u16(),
            message: format!("malformed search response: {e}"),
        })?;
        let wire_hits = match parsed {
            SearchResponse::Hits(hits) | SearchResponse::Wrapped { results: hits } => hits,
        };

        let hits: Vec<SearchHit> = wire_hits
            .into_iter()
            .take(k)
            .map(|hit| SearchHit { meta: hit.meta, score: hit.score })
            .collect();

        info!(index, result_count = hits.len(), "search completed");
        Ok(SearchResult::new(hits))
    }
}
