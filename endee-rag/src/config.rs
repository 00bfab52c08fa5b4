//! Configuration for the retrieval pipeline and index client.
//!
//! A [`RagConfig`] is a plain value threaded explicitly into
//! [`RagPipeline`](crate::RagPipeline) and [`EndeeClient`](crate::EndeeClient);
//! nothing in this crate reads process-wide state on its own.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Distance metric an index is created with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpaceType {
    /// Cosine similarity; 1.0 for identical directions.
    #[default]
    Cosine,
    /// Euclidean (L2) distance, reported as a similarity by the service.
    #[serde(alias = "l2")]
    Euclidean,
    /// Raw inner product.
    #[serde(alias = "ip")]
    Dot,
}

impl SpaceType {
    /// The wire name of this space type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Dot => "dot",
        }
    }
}

impl fmt::Display for SpaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpaceType {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "dot" | "ip" => Ok(Self::Dot),
            other => Err(RagError::Configuration(format!("unknown space type '{other}'"))),
        }
    }
}

/// The unit `chunk_size` and `chunk_overlap` are measured in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    /// Unicode scalar values.
    Characters,
    /// Whitespace-separated tokens.
    #[default]
    Words,
}

impl FromStr for ChunkUnit {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "characters" | "chars" => Ok(Self::Characters),
            "words" | "tokens" => Ok(Self::Words),
            other => Err(RagError::Configuration(format!("unknown chunk unit '{other}'"))),
        }
    }
}

/// What happens when a document that is already indexed is ingested again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReingestPolicy {
    /// Records are keyed `{document_id}#{chunk_index}`, so a re-ingest
    /// overwrites the previous record for every chunk position it produces.
    #[default]
    Upsert,
    /// Every insert gets a fresh id; re-ingesting duplicates the document.
    Append,
}

impl FromStr for ReingestPolicy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upsert" => Ok(Self::Upsert),
            "append" => Ok(Self::Append),
            other => Err(RagError::Configuration(format!("unknown reingest policy '{other}'"))),
        }
    }
}

/// Bounded exponential backoff for transient index-service failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Factor the delay grows by after each failed attempt.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// The delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Base URL of the index service.
    pub endpoint: String,
    /// Name of the index documents are stored in.
    pub index_name: String,
    /// Embedding dimension the index is created with.
    pub dimensions: usize,
    /// Distance metric the index is created with.
    pub space_type: SpaceType,
    /// Unit for `chunk_size` and `chunk_overlap`.
    pub chunk_unit: ChunkUnit,
    /// Maximum chunk length in `chunk_unit`s.
    pub chunk_size: usize,
    /// Units shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of results a query returns.
    pub top_k: usize,
    /// Hits scoring below this are dropped. `None` disables filtering.
    pub similarity_threshold: Option<f32>,
    /// Timeout applied to every request to the index service.
    pub request_timeout: Duration,
    /// Retry policy for transient index-service failures.
    pub retry: RetryPolicy,
    /// Maximum number of documents ingested concurrently.
    pub max_concurrency: usize,
    /// Behaviour when a document is ingested more than once.
    pub reingest_policy: ReingestPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            index_name: "knowledge_base".to_string(),
            dimensions: 384,
            space_type: SpaceType::Cosine,
            chunk_unit: ChunkUnit::Words,
            chunk_size: 512,
            chunk_overlap: 50,
            top_k: 3,
            similarity_threshold: None,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            max_concurrency: 4,
            reingest_policy: ReingestPolicy::Upsert,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load configuration from process environment variables.
    ///
    /// Unset variables keep their defaults. See [`RagConfig::from_lookup`]
    /// for the variable names.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Recognised keys: `ENDEE_URL`, `COLLECTION_NAME`, `EMBEDDING_DIMENSION`,
    /// `SPACE_TYPE`, `CHUNK_UNIT`, `CHUNK_SIZE`, `CHUNK_OVERLAP`, `TOP_K`,
    /// `SIMILARITY_THRESHOLD`, `REQUEST_TIMEOUT_SECS`, `MAX_ATTEMPTS`,
    /// `INGEST_CONCURRENCY`, `REINGEST_POLICY`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a value fails to parse or the
    /// resulting configuration is inconsistent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(url) = lookup("ENDEE_URL") {
            builder = builder.endpoint(url);
        }
        if let Some(name) = lookup("COLLECTION_NAME") {
            builder = builder.index_name(name);
        }
        if let Some(dim) = parse_var(&lookup, "EMBEDDING_DIMENSION")? {
            builder = builder.dimensions(dim);
        }
        if let Some(space) = parse_var(&lookup, "SPACE_TYPE")? {
            builder = builder.space_type(space);
        }
        if let Some(unit) = parse_var(&lookup, "CHUNK_UNIT")? {
            builder = builder.chunk_unit(unit);
        }
        if let Some(size) = parse_var(&lookup, "CHUNK_SIZE")? {
            builder = builder.chunk_size(size);
        }
        if let Some(overlap) = parse_var(&lookup, "CHUNK_OVERLAP")? {
            builder = builder.chunk_overlap(overlap);
        }
        if let Some(k) = parse_var(&lookup, "TOP_K")? {
            builder = builder.top_k(k);
        }
        if let Some(threshold) = parse_var(&lookup, "SIMILARITY_THRESHOLD")? {
            builder = builder.similarity_threshold(threshold);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "REQUEST_TIMEOUT_SECS")? {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = parse_var(&lookup, "MAX_ATTEMPTS")? {
            builder = builder.max_attempts(attempts);
        }
        if let Some(concurrency) = parse_var(&lookup, "INGEST_CONCURRENCY")? {
            builder = builder.max_concurrency(concurrency);
        }
        if let Some(policy) = parse_var(&lookup, "REINGEST_POLICY")? {
            builder = builder.reingest_policy(policy);
        }

        builder.build()
    }

    /// Check that the parameters are consistent.
    ///
    /// Fields are public, so anything assembled by hand should pass through
    /// here before use; [`RagPipeline`](crate::RagPipeline) does so on build.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`, `dimensions == 0` or `max_concurrency == 0`
    /// - `retry.max_attempts == 0` or `request_timeout` is zero
    /// - `index_name` or `endpoint` is empty
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Configuration("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Configuration("top_k must be greater than zero".into()));
        }
        if self.dimensions == 0 {
            return Err(RagError::Configuration("dimensions must be greater than zero".into()));
        }
        if self.max_concurrency == 0 {
            return Err(RagError::Configuration(
                "max_concurrency must be greater than zero".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(RagError::Configuration("max_attempts must be greater than zero".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(RagError::Configuration("request_timeout must be greater than zero".into()));
        }
        if self.index_name.trim().is_empty() {
            return Err(RagError::Configuration("index_name must not be empty".into()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(RagError::Configuration("endpoint must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| RagError::Configuration(format!("invalid {key} '{raw}': {e}"))),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the base URL of the index service.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the index name.
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    /// Set the embedding dimension.
    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.config.dimensions = dimensions;
        self
    }

    /// Set the index distance metric.
    pub fn space_type(mut self, space_type: SpaceType) -> Self {
        self.config.space_type = space_type;
        self
    }

    /// Set the unit chunk sizes are measured in.
    pub fn chunk_unit(mut self, unit: ChunkUnit) -> Self {
        self.config.chunk_unit = unit;
        self
    }

    /// Set the maximum chunk size.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of results a query returns.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Drop hits scoring below `threshold`.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Replace the whole retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the total number of attempts for transient failures.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    /// Set the document-level ingestion concurrency cap.
    pub fn max_concurrency(mut self, concurrency: usize) -> Self {
        self.config.max_concurrency = concurrency;
        self
    }

    /// Set the re-ingestion policy.
    pub fn reingest_policy(mut self, policy: ReingestPolicy) -> Self {
        self.config.reingest_policy = policy;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.index_name, "knowledge_base");
        assert_eq!(config.dimensions, 384);
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn overlap_not_below_chunk_size_is_rejected() {
        let err = RagConfig::builder().chunk_size(10).chunk_overlap(10).build().unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let err = RagConfig::from_lookup(lookup_from(&[("REQUEST_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
        assert!(err.to_string().contains("request_timeout"));
    }

    #[test]
    fn hand_assembled_config_is_checked_by_validate() {
        let mut config = RagConfig::default();
        assert!(config.validate().is_ok());
        config.max_concurrency = 0;
        assert!(matches!(config.validate(), Err(RagError::Configuration(_))));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let err = RagConfig::builder().top_k(0).build().unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = RagConfig::from_lookup(lookup_from(&[
            ("ENDEE_URL", "http://endee:9000"),
            ("COLLECTION_NAME", "kb"),
            ("EMBEDDING_DIMENSION", "256"),
            ("SPACE_TYPE", "dot"),
            ("CHUNK_UNIT", "chars"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "10"),
            ("TOP_K", "7"),
            ("SIMILARITY_THRESHOLD", "0.25"),
            ("REINGEST_POLICY", "append"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "http://endee:9000");
        assert_eq!(config.index_name, "kb");
        assert_eq!(config.dimensions, 256);
        assert_eq!(config.space_type, SpaceType::Dot);
        assert_eq!(config.chunk_unit, ChunkUnit::Characters);
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.chunk_overlap, 10);
        assert_eq!(config.top_k, 7);
        assert_eq!(config.similarity_threshold, Some(0.25));
        assert_eq!(config.reingest_policy, ReingestPolicy::Append);
    }

    #[test]
    fn unparseable_lookup_value_is_configuration_error() {
        let err = RagConfig::from_lookup(lookup_from(&[("CHUNK_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("CHUNK_SIZE"));
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            multiplier: 2,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
    }
}
