//! Retrieval-augmented answering: embed, retrieve, compose, generate

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::{Embedder, Generator, RetryPolicy};
use crate::retrieval::{ScoredChunk, VectorIndex};
use crate::types::Language;

use super::messages;
use super::prompt::PromptBuilder;

/// Progress of a single answer request. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStage {
    Idle,
    Embedding,
    Retrieving,
    Composing,
    Generating,
    Done,
    Failed,
}

/// Everything produced while answering one question
#[derive(Debug)]
pub struct AnswerOutcome {
    /// Terminal stage reached
    pub stage: AnswerStage,
    /// Stage that was running when the request failed
    pub failed_at: Option<AnswerStage>,
    /// Generated answer (set when `stage == Done`)
    pub answer: Option<String>,
    /// Retrieved chunks, after similarity filtering
    pub hits: Vec<ScoredChunk>,
    /// Prompt handed to the generator
    pub prompt: Option<String>,
    /// Cause of failure
    pub error: Option<Error>,
}

impl AnswerOutcome {
    fn new() -> Self {
        Self {
            stage: AnswerStage::Idle,
            failed_at: None,
            answer: None,
            hits: Vec::new(),
            prompt: None,
            error: None,
        }
    }

    fn fail(mut self, error: Error) -> Self {
        self.failed_at = Some(self.stage);
        self.stage = AnswerStage::Failed;
        self.error = Some(error);
        self
    }

    pub fn is_done(&self) -> bool {
        self.stage == AnswerStage::Done
    }
}

/// Tunables for the answerer
#[derive(Debug, Clone)]
pub struct AnswererOptions {
    /// Hits scoring below this are dropped before composing
    pub min_similarity: Option<f32>,
    /// Time box for one generation attempt
    pub generation_timeout: Duration,
    /// Retry schedule for an unavailable generator
    pub retry: RetryPolicy,
}

impl AnswererOptions {
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            min_similarity: config.retrieval.min_similarity,
            generation_timeout: Duration::from_secs(config.llm.timeout_secs),
            retry: RetryPolicy::new(
                config.llm.max_retries,
                Duration::from_millis(config.llm.retry_backoff_ms),
            ),
        }
    }
}

impl Default for AnswererOptions {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

/// Answers questions against a shared vector index
pub struct Answerer {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: Arc<VectorIndex>,
    options: AnswererOptions,
}

impl Answerer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        index: Arc<VectorIndex>,
        options: AnswererOptions,
    ) -> Self {
        Self {
            embedder,
            generator,
            index,
            options,
        }
    }

    /// Answer a question and report every intermediate artefact
    pub async fn answer(&self, question: &str, lang: Language, k: usize) -> AnswerOutcome {
        let mut outcome = AnswerOutcome::new();
        let question = question.trim();

        if question.is_empty() {
            outcome.stage = AnswerStage::Done;
            outcome.answer = Some(messages::empty_question(lang).to_string());
            return outcome;
        }
        let k = k.max(1);

        outcome.stage = AnswerStage::Embedding;
        let query_vector = match self.embedder.embed_one(question).await {
            Ok(v) => v,
            Err(e) => return outcome.fail(e),
        };

        outcome.stage = AnswerStage::Retrieving;
        let mut hits = match self.index.search(&query_vector, k) {
            Ok(hits) => hits,
            Err(e) => return outcome.fail(e),
        };
        if let Some(threshold) = self.options.min_similarity {
            hits.retain(|h| h.score >= threshold);
        }
        tracing::debug!("Retrieved {} chunks for question", hits.len());

        outcome.stage = AnswerStage::Composing;
        let prompt = PromptBuilder::build(question, lang, &hits);
        outcome.hits = hits;
        outcome.prompt = Some(prompt.clone());

        outcome.stage = AnswerStage::Generating;
        match self.generate(&prompt).await {
            Ok(answer) => {
                outcome.stage = AnswerStage::Done;
                outcome.answer = Some(answer);
                outcome
            }
            Err(e) => outcome.fail(e),
        }
    }

    /// Answer a question, converting any failure into a localized degraded message
    pub async fn answer_question(&self, question: &str, lang: Language, k: usize) -> String {
        let outcome = self.answer(question, lang, k).await;

        match outcome {
            AnswerOutcome {
                answer: Some(answer),
                ..
            } => answer,
            AnswerOutcome {
                failed_at, error, ..
            } => {
                let backend_failure = error.as_ref().is_some_and(Error::is_query_path);
                let cause = error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                if backend_failure {
                    tracing::warn!(
                        question = %question,
                        stage = ?failed_at,
                        embedder = %self.embedder.name(),
                        generator = %self.generator.name(),
                        "Answer degraded: {}",
                        cause
                    );
                } else {
                    tracing::error!(
                        question = %question,
                        stage = ?failed_at,
                        "Answer failed unexpectedly: {}",
                        cause
                    );
                }
                messages::degraded_answer(lang).to_string()
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let backend = self.generator.name().to_string();
        let timeout = self.options.generation_timeout;

        self.options
            .retry
            .run(
                || {
                    let backend = backend.clone();
                    async move {
                        let text = tokio::time::timeout(timeout, self.generator.generate(prompt))
                            .await
                            .map_err(|_| Error::GenerationTimeout {
                                backend: backend.clone(),
                                seconds: timeout.as_secs(),
                            })?
                            .map_err(|e| match e {
                                Error::GenerationBackendUnavailable { .. }
                                | Error::GenerationTimeout { .. } => e,
                                other => Error::generation(backend.clone(), other.to_string()),
                            })?;

                        if text.trim().is_empty() {
                            return Err(Error::generation(backend, "empty response"));
                        }
                        Ok(text.trim().to_string())
                    }
                },
                |e| matches!(e, Error::GenerationBackendUnavailable { .. }),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceMetric;
    use crate::providers::HashEmbedder;
    use crate::types::Chunk;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    /// Echoes the prompt back so tests can inspect it
    struct EchoGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            Ok(format!("ANSWER based on: {}", prompt.len()))
        }
        fn name(&self) -> &str {
            "echo"
        }
        fn model(&self) -> &str {
            "echo"
        }
    }

    /// Fails `failures` times before answering
    struct FlakyGenerator {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Generator for FlakyGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(Error::generation("flaky", "connection refused"))
            } else {
                Ok("recovered".to_string())
            }
        }
        fn name(&self) -> &str {
            "flaky"
        }
        fn model(&self) -> &str {
            "flaky"
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl Generator for SlowGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok("too late".to_string())
        }
        fn name(&self) -> &str {
            "slow"
        }
        fn model(&self) -> &str {
            "slow"
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::embedding("down", "quota exceeded"))
        }
        fn dimensions(&self) -> usize {
            8
        }
        fn name(&self) -> &str {
            "down"
        }
    }

    fn options(max_retries: u32) -> AnswererOptions {
        AnswererOptions {
            min_similarity: None,
            generation_timeout: Duration::from_millis(200),
            retry: RetryPolicy::new(max_retries, Duration::from_millis(1)),
        }
    }

    async fn seeded_index(embedder: &HashEmbedder) -> Arc<VectorIndex> {
        let index = Arc::new(VectorIndex::new(DistanceMetric::Cosine));
        let doc = Uuid::new_v4();
        let texts = ["Page1 content.", "Page2 content."];
        let vectors = embedder
            .embed(&texts.iter().map(|t| t.to_string()).collect::<Vec<_>>())
            .await
            .unwrap();
        let batch = texts
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, v))| {
                (
                    Chunk {
                        id: Uuid::new_v4(),
                        document_id: doc,
                        document_name: "two.txt".into(),
                        text: text.to_string(),
                        position: i as u32,
                        page_number: Some(i as u32 + 1),
                        char_start: 0,
                        char_end: text.len(),
                        token_count: 2,
                    },
                    v,
                )
            })
            .collect();
        index.insert(batch).unwrap();
        index
    }

    #[tokio::test]
    async fn test_answer_retrieves_and_composes() {
        let embedder = HashEmbedder::new(256);
        let index = seeded_index(&embedder).await;
        let generator = Arc::new(EchoGenerator {
            prompts: Mutex::new(Vec::new()),
        });
        let answerer = Answerer::new(Arc::new(embedder), generator.clone(), index, options(0));

        let outcome = answerer.answer("What is in page 2?", Language::En, 1).await;

        assert_eq!(outcome.stage, AnswerStage::Done);
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].chunk.text, "Page2 content.");
        let prompt = outcome.prompt.unwrap();
        assert!(prompt.contains("Page2 content."));
        assert!(prompt.contains("(source: two.txt, page 2)"));
        assert_eq!(generator.prompts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_index_uses_no_context_prompt() {
        let answerer = Answerer::new(
            Arc::new(HashEmbedder::new(32)),
            Arc::new(EchoGenerator {
                prompts: Mutex::new(Vec::new()),
            }),
            Arc::new(VectorIndex::new(DistanceMetric::Cosine)),
            options(0),
        );

        let outcome = answerer.answer("anything", Language::Es, 3).await;
        assert!(outcome.is_done());
        assert!(outcome.hits.is_empty());
        assert!(outcome.prompt.unwrap().contains("No relevant context was found"));
    }

    #[tokio::test]
    async fn test_min_similarity_filters_hits() {
        let embedder = HashEmbedder::new(256);
        let index = seeded_index(&embedder).await;
        let mut opts = options(0);
        opts.min_similarity = Some(0.99);
        let answerer = Answerer::new(
            Arc::new(embedder),
            Arc::new(EchoGenerator {
                prompts: Mutex::new(Vec::new()),
            }),
            index,
            opts,
        );

        let outcome = answerer.answer("unrelated words entirely", Language::En, 2).await;
        assert!(outcome.hits.is_empty());
        assert!(outcome.prompt.unwrap().contains("No relevant context was found"));
    }

    #[tokio::test]
    async fn test_generation_unavailable_degrades() {
        let embedder = HashEmbedder::new(64);
        let index = seeded_index(&embedder).await;
        let generator = Arc::new(FlakyGenerator {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let answerer = Answerer::new(Arc::new(embedder), generator.clone(), index, options(2));

        let outcome = answerer.answer("What is in page 2?", Language::En, 1).await;
        assert_eq!(outcome.stage, AnswerStage::Failed);
        assert_eq!(outcome.failed_at, Some(AnswerStage::Generating));
        assert!(matches!(
            outcome.error,
            Some(Error::GenerationBackendUnavailable { .. })
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);

        let text = answerer.answer_question("What is in page 2?", Language::Fr, 1).await;
        assert!(!text.is_empty());
        assert_eq!(text, messages::degraded_answer(Language::Fr));
    }

    #[tokio::test]
    async fn test_generation_retry_recovers() {
        let embedder = HashEmbedder::new(64);
        let index = seeded_index(&embedder).await;
        let answerer = Answerer::new(
            Arc::new(embedder),
            Arc::new(FlakyGenerator {
                failures: 1,
                calls: AtomicU32::new(0),
            }),
            index,
            options(1),
        );
        assert_eq!(answerer.answer_question("page 2", Language::En, 1).await, "recovered");
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let answerer = Answerer::new(
            Arc::new(HashEmbedder::new(16)),
            Arc::new(SlowGenerator),
            Arc::new(VectorIndex::new(DistanceMetric::Cosine)),
            options(3),
        );
        let outcome = answerer.answer("hello?", Language::En, 1).await;
        assert!(matches!(outcome.error, Some(Error::GenerationTimeout { .. })));
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades() {
        let answerer = Answerer::new(
            Arc::new(DownEmbedder),
            Arc::new(SlowGenerator),
            Arc::new(VectorIndex::new(DistanceMetric::Cosine)),
            options(0),
        );
        let outcome = answerer.answer("hello?", Language::En, 1).await;
        assert_eq!(outcome.failed_at, Some(AnswerStage::Embedding));

        let text = answerer.answer_question("hello?", Language::Ar, 1).await;
        assert_eq!(text, messages::degraded_answer(Language::Ar));
    }

    #[tokio::test]
    async fn test_empty_question_skips_backends() {
        let answerer = Answerer::new(
            Arc::new(DownEmbedder),
            Arc::new(SlowGenerator),
            Arc::new(VectorIndex::new(DistanceMetric::Cosine)),
            options(0),
        );
        let text = answerer.answer_question("   ", Language::Es, 3).await;
        assert_eq!(text, messages::empty_question(Language::Es));
    }

    #[tokio::test]
    async fn test_k_zero_is_clamped() {
        let embedder = HashEmbedder::new(256);
        let index = seeded_index(&embedder).await;
        let answerer = Answerer::new(
            Arc::new(embedder),
            Arc::new(EchoGenerator {
                prompts: Mutex::new(Vec::new()),
            }),
            index,
            options(0),
        );
        let outcome = answerer.answer("page 2", Language::En, 0).await;
        assert_eq!(outcome.hits.len(), 1);
    }
}
