//! Embedding provider trait for converting text into vectors

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaEmbedder`: local Ollama server (nomic-embed-text)
/// - `OpenAiEmbedder`: any OpenAI-compatible `/v1/embeddings` endpoint
/// - `HashEmbedder`: deterministic offline feature hashing
///
/// `embed` is one-to-one and order-preserving. Backend failures surface as
/// [`Error::EmbeddingBackendUnavailable`]; partial results are never returned.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a sequence of texts
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::embedding(self.name(), "backend returned no vector"))
    }

    /// Output dimensionality
    fn dimensions(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Identifies the vector space; persisted indexes built under another
    /// fingerprint must be rebuilt.
    fn fingerprint(&self) -> String {
        format!("{}:{}", self.name(), self.dimensions())
    }

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Drive a per-request embedding call over `texts` in batches of
/// `batch_size`, time-boxing every request and checking the output count.
pub(crate) async fn embed_in_batches<F, Fut>(
    backend: &str,
    texts: &[String],
    batch_size: usize,
    timeout: Duration,
    call: F,
) -> Result<Vec<Vec<f32>>>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<Vec<f32>>>>,
{
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        let result = tokio::time::timeout(timeout, call(batch.to_vec()))
            .await
            .map_err(|_| {
                Error::embedding(backend, format!("timed out after {}s", timeout.as_secs()))
            })?;

        let embedded = result.map_err(|e| match e {
            Error::EmbeddingBackendUnavailable { .. } => e,
            other => Error::embedding(backend, other.to_string()),
        })?;

        if embedded.len() != batch.len() {
            return Err(Error::embedding(
                backend,
                format!("expected {} vectors, got {}", batch.len(), embedded.len()),
            ));
        }
        if embedded.iter().any(|v| v.is_empty()) {
            return Err(Error::embedding(backend, "backend returned an empty vector"));
        }
        vectors.extend(embedded);
    }

    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_batches_preserve_order() {
        let calls = AtomicUsize::new(0);
        let texts: Vec<String> = (0..5).map(|i| i.to_string()).collect();

        let vectors = embed_in_batches("test", &texts, 2, Duration::from_secs(5), |batch| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(batch
                    .iter()
                    .map(|t| vec![t.parse::<f32>().unwrap_or(0.0)])
                    .collect())
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let flat: Vec<f32> = vectors.into_iter().flatten().collect();
        assert_eq!(flat, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_wrong_count_is_backend_error() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = embed_in_batches("test", &texts, 8, Duration::from_secs(5), |_| async {
            Ok(vec![vec![1.0]])
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::EmbeddingBackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_backend_error() {
        let texts = vec!["a".to_string()];
        let err = embed_in_batches("slow", &texts, 8, Duration::from_millis(10), |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![vec![1.0]])
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::EmbeddingBackendUnavailable { ref backend, .. } if backend == "slow"));
    }

    #[tokio::test]
    async fn test_other_errors_are_wrapped() {
        let texts = vec!["a".to_string()];
        let err = embed_in_batches("wrapped", &texts, 8, Duration::from_secs(5), |_| async {
            Err(Error::internal("boom"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::EmbeddingBackendUnavailable { ref message, .. } if message.contains("boom")));
    }
}
