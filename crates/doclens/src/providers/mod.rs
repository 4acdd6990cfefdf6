//! Pluggable embedding and generation backends
//!
//! The backend set is fixed and chosen from configuration at startup:
//!
//! | provider | embeddings          | generation                  |
//! |----------|---------------------|-----------------------------|
//! | ollama   | `/api/embed`        | `/api/generate`             |
//! | openai   | `/v1/embeddings`    | `/v1/chat/completions`      |
//! | hash     | offline hashing     | n/a                         |

pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod ollama;
pub mod openai;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendProvider, EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

pub use embedding::Embedder;
pub use hashing::HashEmbedder;
pub use llm::Generator;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaGenerator};
pub use openai::{OpenAiEmbedder, OpenAiGenerator};

/// Build the configured embedder
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        BackendProvider::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        BackendProvider::OpenAi => Arc::new(OpenAiEmbedder::new(config)?),
        BackendProvider::Hash => Arc::new(HashEmbedder::new(config.dimensions)),
    };
    tracing::info!(
        "Embedder: {} ({} dims, fingerprint {})",
        embedder.name(),
        embedder.dimensions(),
        embedder.fingerprint()
    );
    Ok(embedder)
}

/// Build the configured generator
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match config.provider {
        BackendProvider::Ollama => Arc::new(OllamaGenerator::new(config)?),
        BackendProvider::OpenAi => Arc::new(OpenAiGenerator::new(config)?),
        BackendProvider::Hash => {
            return Err(Error::invalid_config(
                "the hash provider cannot generate text",
            ))
        }
    };
    tracing::info!("Generator: {} (model {})", generator.name(), generator.model());
    Ok(generator)
}

/// Exponential backoff schedule for retried backend calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Run `operation`, retrying while `retryable` accepts the error
    pub async fn run<F, Fut, T>(
        &self,
        mut operation: F,
        retryable: impl Fn(&Error) -> bool,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.max_retries && retryable(&e) => {
                    let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_build_hash_embedder() {
        let config = EmbeddingConfig {
            provider: BackendProvider::Hash,
            dimensions: 128,
            ..Default::default()
        };
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.name(), "hash");
        assert_eq!(embedder.dimensions(), 128);
    }

    #[test]
    fn test_hash_generator_rejected() {
        let config = LlmConfig {
            provider: BackendProvider::Hash,
            ..Default::default()
        };
        assert!(matches!(
            build_generator(&config),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result = policy
            .run(
                || {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(Error::generation("fake", "down"))
                        } else {
                            Ok(n)
                        }
                    }
                },
                |e| matches!(e, Error::GenerationBackendUnavailable { .. }),
            )
            .await
            .unwrap();

        assert_eq!(result, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let err = policy
            .run(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(Error::internal("bad prompt")) }
                },
                |e| matches!(e, Error::GenerationBackendUnavailable { .. }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let err = policy
            .run(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(Error::generation("fake", "down")) }
                },
                |_| true,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::GenerationBackendUnavailable { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
