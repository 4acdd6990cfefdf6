//! A document Q&A session: one index, one set of backends, one document set

use serde::Serialize;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::{AnswerOutcome, Answerer, AnswererOptions};
use crate::ingestion::IngestPipeline;
use crate::lifecycle::{DocumentUpload, IndexLifecycle, ReconcileReport, StoreOutcome};
use crate::providers::{build_embedder, build_generator, Embedder, Generator};
use crate::retrieval::VectorIndex;
use crate::storage::{FeedbackStore, SqliteFeedbackStore};
use crate::types::{AnswerRecord, Language, SourceDocument};

/// Backend and index status
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub embedder: String,
    pub embedder_ok: bool,
    pub generator: String,
    pub generator_ok: bool,
    pub documents: usize,
    pub indexed_chunks: usize,
}

/// Entry point tying ingestion, retrieval, answering and feedback together
pub struct Session {
    config: RagConfig,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: Arc<VectorIndex>,
    lifecycle: IndexLifecycle,
    answerer: Answerer,
    feedback: Option<Arc<dyn FeedbackStore>>,
}

impl Session {
    /// Build a session with the backends named in the configuration
    pub fn new(config: RagConfig) -> Result<Self> {
        config.validate()?;

        let embedder = build_embedder(&config.embeddings)?;
        let generator = build_generator(&config.llm)?;
        let feedback: Option<Arc<dyn FeedbackStore>> = if config.feedback.enabled {
            Some(Arc::new(SqliteFeedbackStore::open(&config.feedback.db_path)?))
        } else {
            None
        };

        Self::with_backends(config, embedder, generator, feedback)
    }

    /// Build a session around explicit backends
    pub fn with_backends(
        config: RagConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        feedback: Option<Arc<dyn FeedbackStore>>,
    ) -> Result<Self> {
        config.validate()?;
        let pipeline = Arc::new(IngestPipeline::from_config(&config)?);

        let (index, restored) = if config.vector_db.persist {
            VectorIndex::load(
                &config.vector_db.snapshot_path,
                &embedder.fingerprint(),
                embedder.dimensions(),
                config.retrieval.metric,
            )?
        } else {
            (
                VectorIndex::with_dimensions(config.retrieval.metric, embedder.dimensions()),
                Vec::new(),
            )
        };
        let index = Arc::new(index);

        let lifecycle = IndexLifecycle::new(pipeline, embedder.clone(), index.clone(), &config);
        lifecycle.restore(restored);

        let answerer = Answerer::new(
            embedder.clone(),
            generator.clone(),
            index.clone(),
            AnswererOptions::from_config(&config),
        );

        tracing::info!(
            "Session ready: embedder {}, generator {} ({}), {} documents restored",
            embedder.name(),
            generator.name(),
            generator.model(),
            lifecycle.documents().len()
        );

        Ok(Self {
            config,
            embedder,
            generator,
            index,
            lifecycle,
            answerer,
            feedback,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Answer a question; never fails, degrading to a localized message instead
    pub async fn answer_question(&self, question: &str, lang: Language, k: usize) -> String {
        self.answerer.answer_question(question, lang, k).await
    }

    /// Answer a question and return every intermediate artefact
    pub async fn answer(&self, question: &str, lang: Language, k: usize) -> AnswerOutcome {
        self.answerer.answer(question, lang, k).await
    }

    /// Ingest a document; storing an already tracked name is a no-op
    pub async fn store_document(&self, data: Vec<u8>, name: &str) -> Result<()> {
        self.ingest(name, data).await.map(|_| ())
    }

    /// Like [`store_document`](Self::store_document), reporting what happened
    pub async fn ingest(&self, name: &str, data: Vec<u8>) -> Result<StoreOutcome> {
        let outcome = self.lifecycle.store_document(name, Arc::new(data)).await?;
        if matches!(outcome, StoreOutcome::Indexed { .. }) {
            self.persist();
        }
        Ok(outcome)
    }

    /// Remove a document; deleting an unknown name succeeds
    pub fn delete_document(&self, name: &str) -> Result<()> {
        if self.lifecycle.delete_document(name) {
            self.persist();
        }
        Ok(())
    }

    /// Reconcile the index against the full desired document set
    pub async fn sync_documents(&self, uploads: Vec<DocumentUpload>) -> ReconcileReport {
        let report = self.lifecycle.reconcile(uploads).await;
        if !report.added.is_empty() || !report.removed.is_empty() {
            self.persist();
        }
        report
    }

    /// Documents currently indexed
    pub fn list_documents(&self) -> Vec<SourceDocument> {
        self.lifecycle.documents()
    }

    /// Append a question/answer record to the feedback store
    pub async fn record_feedback(&self, record: AnswerRecord) -> Result<i64> {
        let store = self
            .feedback
            .clone()
            .ok_or_else(|| Error::Feedback("feedback recording is disabled".to_string()))?;

        tokio::task::spawn_blocking(move || store.save(&record))
            .await
            .map_err(|e| Error::internal(format!("feedback task failed: {}", e)))?
    }

    /// Probe both backends and summarise the index
    pub async fn health(&self) -> HealthReport {
        let embedder_ok = self.embedder.health_check().await.unwrap_or(false);
        let generator_ok = self.generator.health_check().await.unwrap_or(false);

        HealthReport {
            embedder: self.embedder.name().to_string(),
            embedder_ok,
            generator: self.generator.name().to_string(),
            generator_ok,
            documents: self.lifecycle.documents().len(),
            indexed_chunks: self.index.len(),
        }
    }

    fn persist(&self) {
        if !self.config.vector_db.persist {
            return;
        }
        let documents = self.lifecycle.documents();
        if let Err(e) = self.index.save(
            &self.config.vector_db.snapshot_path,
            &self.embedder.fingerprint(),
            &documents,
        ) {
            tracing::warn!("Failed to persist index snapshot: {}", e);
        }
    }
}
