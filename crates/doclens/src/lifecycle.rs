//! Keeps the vector index in step with the set of uploaded documents

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::{parser::hash_bytes, IngestPipeline};
use crate::providers::Embedder;
use crate::retrieval::VectorIndex;
use crate::types::SourceDocument;

/// A raw upload: declared name plus file bytes
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub name: String,
    pub data: Arc<Vec<u8>>,
}

impl DocumentUpload {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(data.into()),
        }
    }
}

/// A document currently represented in the index
#[derive(Debug, Clone)]
pub struct TrackedDocument {
    pub document: SourceDocument,
    /// SHA-256 of the bytes the document was ingested from
    pub fingerprint: String,
}

/// Difference between the tracked set and a desired set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Per-document ingestion failure
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub name: String,
    pub error: String,
}

/// Result of one reconciliation round
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
    pub failed: Vec<IngestFailure>,
}

/// What `store_document` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreOutcome {
    Indexed { chunks: usize },
    AlreadyIndexed,
}

/// Tracks which documents are indexed and drives ingestion and deletion
pub struct IndexLifecycle {
    pipeline: Arc<IngestPipeline>,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    tracked: DashMap<String, TrackedDocument>,
    parallel_documents: usize,
    reindex_on_content_change: bool,
}

impl IndexLifecycle {
    pub fn new(
        pipeline: Arc<IngestPipeline>,
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        config: &RagConfig,
    ) -> Self {
        Self {
            pipeline,
            embedder,
            index,
            tracked: DashMap::new(),
            parallel_documents: config.processing.parallel_documents.max(1),
            reindex_on_content_change: config.lifecycle.reindex_on_content_change,
        }
    }

    /// Re-track documents restored from a snapshot
    pub fn restore(&self, documents: Vec<SourceDocument>) {
        let known: HashSet<_> = self.index.document_ids().into_iter().collect();
        for document in documents {
            if document.total_chunks > 0 && !known.contains(&document.id) {
                tracing::warn!(
                    "Snapshot lists '{}' but holds none of its chunks; it will be re-ingested",
                    document.name
                );
                continue;
            }
            self.tracked.insert(
                document.name.clone(),
                TrackedDocument {
                    fingerprint: document.content_hash.clone(),
                    document,
                },
            );
        }
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.tracked.contains_key(name)
    }

    /// Tracked documents, sorted by name
    pub fn documents(&self) -> Vec<SourceDocument> {
        let mut docs: Vec<_> = self
            .tracked
            .iter()
            .map(|entry| entry.value().document.clone())
            .collect();
        docs.sort_by(|a, b| a.name.cmp(&b.name));
        docs
    }

    /// Compare the tracked set against the desired uploads
    pub fn plan(&self, desired: &[DocumentUpload]) -> ReconcilePlan {
        let desired_by_name: BTreeMap<&str, &DocumentUpload> =
            desired.iter().map(|u| (u.name.as_str(), u)).collect();
        let mut plan = ReconcilePlan::default();

        for (name, upload) in &desired_by_name {
            match self.tracked.get(*name) {
                None => plan.to_add.push(name.to_string()),
                Some(tracked)
                    if self.reindex_on_content_change
                        && tracked.fingerprint != hash_bytes(&upload.data) =>
                {
                    plan.to_remove.push(name.to_string());
                    plan.to_add.push(name.to_string());
                }
                Some(_) => plan.unchanged.push(name.to_string()),
            }
        }

        let mut stale: Vec<String> = self
            .tracked
            .iter()
            .filter(|entry| !desired_by_name.contains_key(entry.key().as_str()))
            .map(|entry| entry.key().clone())
            .collect();
        stale.sort();
        plan.to_remove.extend(stale);

        plan
    }

    /// Run one reconciliation round: remove what disappeared, ingest what is new
    pub async fn reconcile(&self, desired: Vec<DocumentUpload>) -> ReconcileReport {
        let plan = self.plan(&desired);
        let mut report = ReconcileReport {
            unchanged: plan.unchanged.clone(),
            ..Default::default()
        };

        for name in &plan.to_remove {
            if self.delete_document(name) {
                report.removed.push(name.clone());
            }
        }

        let to_add: HashSet<&str> = plan.to_add.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let uploads: Vec<DocumentUpload> = desired
            .into_iter()
            .filter(|u| to_add.contains(u.name.as_str()) && seen.insert(u.name.clone()))
            .collect();

        let results: Vec<(String, Result<StoreOutcome>)> = stream::iter(uploads)
            .map(|upload| async move {
                let outcome = self.store_document(&upload.name, upload.data.clone()).await;
                (upload.name, outcome)
            })
            .buffer_unordered(self.parallel_documents)
            .collect()
            .await;

        for (name, outcome) in results {
            match outcome {
                Ok(_) => report.added.push(name),
                Err(e) => report.failed.push(IngestFailure {
                    name,
                    error: e.to_string(),
                }),
            }
        }
        report.added.sort();
        report.failed.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!(
            "Reconciled documents: {} added, {} removed, {} unchanged, {} failed",
            report.added.len(),
            report.removed.len(),
            report.unchanged.len(),
            report.failed.len()
        );
        report
    }

    /// Ingest one document unless a document with this name is already indexed
    pub async fn store_document(&self, name: &str, data: Arc<Vec<u8>>) -> Result<StoreOutcome> {
        let fingerprint = hash_bytes(&data);

        let existing = self.tracked.get(name).map(|t| t.fingerprint.clone());
        if let Some(existing) = existing {
            if !self.reindex_on_content_change || existing == fingerprint {
                tracing::debug!("'{}' is already indexed", name);
                return Ok(StoreOutcome::AlreadyIndexed);
            }
            tracing::info!("Content of '{}' changed, re-indexing", name);
            self.delete_document(name);
        }

        match self.ingest(name, data, fingerprint).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_ingestion() => {
                tracing::warn!(
                    document = %name,
                    embedder = %self.embedder.name(),
                    "Failed to ingest document: {}",
                    e
                );
                Err(e)
            }
            Err(e) => {
                tracing::error!(document = %name, "Unexpected ingestion failure: {}", e);
                Err(e)
            }
        }
    }

    async fn ingest(&self, name: &str, data: Arc<Vec<u8>>, fingerprint: String) -> Result<StoreOutcome> {
        let (mut document, chunks) = self.pipeline.ingest_blocking(name, data).await?;

        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            self.embedder.embed(&texts).await?
        };
        if vectors.len() != chunks.len() {
            return Err(Error::embedding(
                self.embedder.name(),
                format!("expected {} vectors, got {}", chunks.len(), vectors.len()),
            ));
        }
        document.total_chunks = chunks.len() as u32;
        let count = chunks.len();

        // Commit under the tracked-set entry so two uploads of one name cannot both land
        match self.tracked.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                tracing::debug!("'{}' was indexed concurrently, discarding duplicate", name);
                Ok(StoreOutcome::AlreadyIndexed)
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                if count > 0 {
                    self.index.insert(chunks.into_iter().zip(vectors).collect())?;
                }
                tracing::info!(
                    "Indexed '{}': {} pages, {} chunks",
                    name,
                    document.total_pages,
                    count
                );
                slot.insert(TrackedDocument {
                    document,
                    fingerprint,
                });
                Ok(StoreOutcome::Indexed { chunks: count })
            }
        }
    }

    /// Remove a document's entries and stop tracking it. Returns whether it was tracked.
    pub fn delete_document(&self, name: &str) -> bool {
        match self.tracked.remove(name) {
            Some((_, tracked)) => {
                let removed = self.index.delete_by_document(tracked.document.id);
                tracing::info!("Deleted '{}' ({} chunks)", name, removed);
                true
            }
            None => {
                tracing::debug!("Delete of untracked '{}' ignored", name);
                false
            }
        }
    }
}
