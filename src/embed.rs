//! Embedding gateways for query vectorization.
//!
//! Two providers sit behind one trait: a local fastembed model (feature
//! `local-embed`) and an HTTP endpoint speaking the OpenAI embeddings
//! shape. The search path treats an absent gateway as a configuration
//! error only when a request actually needs semantic retrieval.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[cfg(feature = "local-embed")]
use fastembed::{InitOptions, TextEmbedding};
#[cfg(feature = "local-embed")]
use std::path::PathBuf;
#[cfg(feature = "local-embed")]
use std::sync::Mutex;

/// Default timeout for embedding HTTP requests.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("no embedding provider configured; set embedding.provider in the config")]
    NotConfigured,

    #[error("model initialization failed: {0}")]
    InitFailed(String),

    #[error("embedding request failed: {0}")]
    RequestFailed(String),

    #[error("provider returned an empty embedding vector")]
    EmptyVector,

    #[error("unknown embedding model: {0}")]
    InvalidModel(String),
}

/// Turns text into a dense vector. Implementations must be cheap to
/// share across request handlers.
pub trait EmbeddingGateway: Send + Sync {
    fn generate(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Cosine similarity in [-1, 1]. Zero-norm or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// OpenAI-style `POST /embeddings` client.
pub struct HttpGateway {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HttpGateway {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, EmbeddingError> {
        let timeout = timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        Ok(HttpGateway {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key,
        })
    }
}

impl EmbeddingGateway for HttpGateway {
    fn generate(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "model": self.model,
            "input": text,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::RequestFailed(format!(
                "{} returned {status}",
                self.endpoint
            )));
        }

        let body: EmbeddingsResponse = response
            .json()
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default();
        if embedding.is_empty() {
            return Err(EmbeddingError::EmptyVector);
        }
        Ok(embedding)
    }
}

/// Local fastembed model. Mutex because fastembed's embed() takes
/// &mut self.
#[cfg(feature = "local-embed")]
pub struct LocalGateway {
    model: Mutex<TextEmbedding>,
}

#[cfg(feature = "local-embed")]
impl LocalGateway {
    /// Load (downloading on first use) the named model, caching files
    /// under `cache_dir/models`.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let model_enum = parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("failed to create models directory: {e}"))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        Ok(LocalGateway {
            model: Mutex::new(model),
        })
    }
}

#[cfg(feature = "local-embed")]
impl EmbeddingGateway for LocalGateway {
    fn generate(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::RequestFailed(format!("failed to acquire model lock: {e}"))
        })?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(EmbeddingError::EmptyVector)
    }
}

#[cfg(feature = "local-embed")]
fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l6-v2-q" | "allminiml6v2q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
        "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-small-en-v1.5-q" | "bgesmallenv15q" => Ok(fastembed::EmbeddingModel::BGESmallENV15Q),
        "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-base-en-v1.5-q" | "bgebaseenv15q" => Ok(fastembed::EmbeddingModel::BGEBaseENV15Q),
        _ => Err(EmbeddingError::InvalidModel(format!(
            "{name}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5 (-q for quantized)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![0.5, 0.5, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let a = vec![1.0, 2.0];
        let b = vec![-1.0, -2.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[cfg(feature = "local-embed")]
    #[test]
    fn test_parse_model_name_rejects_unknown() {
        assert!(parse_model_name("all-MiniLM-L6-v2").is_ok());
        assert!(matches!(
            parse_model_name("not-a-model"),
            Err(EmbeddingError::InvalidModel(_))
        ));
    }
}
