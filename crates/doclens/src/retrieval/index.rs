//! In-memory exact nearest-neighbour index over chunk embeddings

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::config::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::{Chunk, DocumentId, SourceDocument};

const SNAPSHOT_VERSION: u32 = 1;

/// A stored (vector, chunk) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Insertion sequence, used to break score ties
    pub seq: u64,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

/// Search hit with similarity score (higher is better)
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: Vec<IndexEntry>,
    dimensions: Option<usize>,
    next_seq: u64,
}

/// Brute-force vector index guarded by a readers-writer lock.
///
/// Every mutation takes the write lock exactly once, so searches never
/// observe a partially applied batch.
#[derive(Debug)]
pub struct VectorIndex {
    state: RwLock<IndexState>,
    metric: DistanceMetric,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    fingerprint: String,
    metric: DistanceMetric,
    dimensions: Option<usize>,
    next_seq: u64,
    documents: Vec<SourceDocument>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index whose dimensionality is set by the first insert
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            metric,
        }
    }

    /// Create an empty index with a fixed dimensionality
    pub fn with_dimensions(metric: DistanceMetric, dimensions: usize) -> Self {
        let index = Self::new(metric);
        index.state.write().dimensions = Some(dimensions);
        index
    }

    /// Insert a batch atomically. Returns the number of entries written.
    ///
    /// All vectors are checked against the established dimensionality (or the
    /// batch's first vector on an unconfigured index) before anything is
    /// written; one mismatch rejects the whole batch.
    pub fn insert(&self, batch: Vec<(Chunk, Vec<f32>)>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.write();
        let expected = state
            .dimensions
            .or_else(|| batch.iter().map(|(_, v)| v.len()).find(|len| *len > 0))
            .unwrap_or(0);

        if let Some((_, bad)) = batch
            .iter()
            .find(|(_, v)| v.is_empty() || v.len() != expected)
        {
            return Err(Error::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let count = batch.len();
        state.dimensions = Some(expected);
        for (chunk, vector) in batch {
            let seq = state.next_seq;
            state.next_seq += 1;
            state.entries.push(IndexEntry { seq, vector, chunk });
        }

        tracing::debug!("Inserted {} entries ({} total)", count, state.entries.len());
        Ok(count)
    }

    /// Remove every entry of a document; absent ids remove nothing
    pub fn delete_by_document(&self, document_id: DocumentId) -> usize {
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|e| e.chunk.document_id != document_id);
        let removed = before - state.entries.len();
        if removed > 0 {
            tracing::debug!("Deleted {} entries for document {}", removed, document_id);
        }
        removed
    }

    /// Top-`k` entries by decreasing similarity, ties in insertion order
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let state = self.state.read();
        if state.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = state.dimensions {
            if query.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<(f32, u64, &IndexEntry)> = state
            .entries
            .iter()
            .map(|e| (self.score(query, &e.vector), e.seq, e))
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, _, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::Euclidean => -euclidean_distance(a, b),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Established dimensionality, if any
    pub fn dimensions(&self) -> Option<usize> {
        self.state.read().dimensions
    }

    /// Distinct document ids in first-insertion order
    pub fn document_ids(&self) -> Vec<DocumentId> {
        let state = self.state.read();
        let mut seen = HashSet::new();
        state
            .entries
            .iter()
            .map(|e| e.chunk.document_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Chunks of one document in position order
    pub fn chunks_for(&self, document_id: DocumentId) -> Vec<Chunk> {
        let state = self.state.read();
        let mut chunks: Vec<Chunk> = state
            .entries
            .iter()
            .filter(|e| e.chunk.document_id == document_id)
            .map(|e| e.chunk.clone())
            .collect();
        chunks.sort_by_key(|c| c.position);
        chunks
    }

    /// Persist entries and document records as a JSON snapshot
    pub fn save(
        &self,
        path: impl AsRef<Path>,
        fingerprint: &str,
        documents: &[SourceDocument],
    ) -> Result<()> {
        let path = path.as_ref();
        let snapshot = {
            let state = self.state.read();
            Snapshot {
                version: SNAPSHOT_VERSION,
                fingerprint: fingerprint.to_string(),
                metric: self.metric,
                dimensions: state.dimensions,
                next_seq: state.next_seq,
                documents: documents.to_vec(),
                entries: state.entries.clone(),
            }
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        // Write-then-rename so a crash never leaves a truncated snapshot
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, &snapshot)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::info!(
            "Saved index snapshot: {} entries, {} documents -> {}",
            snapshot.entries.len(),
            snapshot.documents.len(),
            path.display()
        );
        Ok(())
    }

    /// Load a snapshot written by [`save`](Self::save).
    ///
    /// The returned index is fixed at `dimensions`. A missing, unreadable or
    /// incompatible snapshot (different embedder fingerprint, dimensionality
    /// or metric) yields an empty index, meaning every document must be
    /// re-ingested.
    pub fn load(
        path: impl AsRef<Path>,
        fingerprint: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<(Self, Vec<SourceDocument>)> {
        let path = path.as_ref();
        let empty = || (Self::with_dimensions(metric, dimensions), Vec::new());

        if !path.exists() {
            return Ok(empty());
        }

        let raw = std::fs::read(path)?;
        let snapshot: Snapshot = match serde_json::from_slice(&raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Ignoring unreadable index snapshot {}: {}", path.display(), e);
                return Ok(empty());
            }
        };

        let compatible = snapshot.version == SNAPSHOT_VERSION
            && snapshot.fingerprint == fingerprint
            && snapshot.metric == metric
            && snapshot.dimensions.map_or(true, |d| d == dimensions)
            && snapshot.entries.iter().all(|e| e.vector.len() == dimensions);

        if !compatible {
            tracing::warn!(
                "Index snapshot built with '{}' ({:?} dims) does not match '{}' ({} dims); rebuild required",
                snapshot.fingerprint,
                snapshot.dimensions,
                fingerprint,
                dimensions
            );
            return Ok(empty());
        }

        tracing::info!(
            "Loaded index snapshot: {} entries, {} documents",
            snapshot.entries.len(),
            snapshot.documents.len()
        );

        let index = Self {
            state: RwLock::new(IndexState {
                entries: snapshot.entries,
                dimensions: Some(dimensions),
                next_seq: snapshot.next_seq,
            }),
            metric,
        };
        Ok((index, snapshot.documents))
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileType;
    use uuid::Uuid;

    fn chunk(doc: DocumentId, position: u32, text: &str) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            document_id: doc,
            document_name: format!("{}.txt", doc),
            text: text.to_string(),
            position,
            page_number: None,
            char_start: 0,
            char_end: text.len(),
            token_count: 1,
        }
    }

    #[test]
    fn test_empty_index_search() {
        let index = VectorIndex::new(DistanceMetric::Cosine);
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), None);
    }

    #[test]
    fn test_search_orders_and_clamps() {
        let index = VectorIndex::new(DistanceMetric::Cosine);
        let doc = Uuid::new_v4();
        index
            .insert(vec![
                (chunk(doc, 0, "far"), vec![0.0, 1.0]),
                (chunk(doc, 1, "near"), vec![1.0, 0.1]),
                (chunk(doc, 2, "exact"), vec![1.0, 0.0]),
            ])
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 3);
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "near", "far"]);
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let index = VectorIndex::new(DistanceMetric::Cosine);
        let doc = Uuid::new_v4();
        index
            .insert(vec![
                (chunk(doc, 0, "first"), vec![1.0, 0.0]),
                (chunk(doc, 1, "second"), vec![2.0, 0.0]),
            ])
            .unwrap();
        index
            .insert(vec![(chunk(doc, 2, "third"), vec![3.0, 0.0])])
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_mismatched_batch_rejected_wholesale() {
        let index = VectorIndex::new(DistanceMetric::Cosine);
        let doc = Uuid::new_v4();
        let err = index
            .insert(vec![
                (chunk(doc, 0, "a"), vec![1.0, 0.0, 0.0]),
                (chunk(doc, 1, "b"), vec![1.0, 0.0]),
                (chunk(doc, 2, "c"), vec![0.0, 0.0, 1.0]),
            ])
            .unwrap_err();

        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
        assert_eq!(index.len(), 0);
        assert_eq!(index.dimensions(), None);
    }

    #[test]
    fn test_established_dimensions_enforced() {
        let index = VectorIndex::with_dimensions(DistanceMetric::Cosine, 2);
        let doc = Uuid::new_v4();
        assert!(matches!(
            index.insert(vec![(chunk(doc, 0, "a"), vec![1.0, 0.0, 0.0])]),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            index.insert(vec![(chunk(doc, 0, "a"), vec![])]),
            Err(Error::DimensionMismatch { expected: 2, actual: 0 })
        ));
        index.insert(vec![(chunk(doc, 0, "a"), vec![1.0, 0.0])]).unwrap();
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_delete_by_document_is_idempotent() {
        let index = VectorIndex::new(DistanceMetric::Cosine);
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        index
            .insert(vec![
                (chunk(keep, 0, "k"), vec![1.0, 0.0]),
                (chunk(drop, 0, "d0"), vec![0.0, 1.0]),
                (chunk(drop, 1, "d1"), vec![0.5, 0.5]),
            ])
            .unwrap();

        assert_eq!(index.delete_by_document(drop), 2);
        assert_eq!(index.delete_by_document(drop), 0);
        assert_eq!(index.delete_by_document(Uuid::new_v4()), 0);
        assert_eq!(index.document_ids(), vec![keep]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_euclidean_metric() {
        let index = VectorIndex::new(DistanceMetric::Euclidean);
        let doc = Uuid::new_v4();
        index
            .insert(vec![
                (chunk(doc, 0, "long"), vec![10.0, 0.0]),
                (chunk(doc, 1, "short"), vec![1.0, 0.0]),
            ])
            .unwrap();

        // Same direction, so only Euclidean distance separates them
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].chunk.text, "short");
        assert_eq!(hits[0].score, 0.0);
        assert!(hits[1].score < 0.0);
    }

    #[test]
    fn test_nan_scores_sort_without_panicking() {
        let index = VectorIndex::new(DistanceMetric::Euclidean);
        let doc = Uuid::new_v4();
        index
            .insert(vec![
                (chunk(doc, 0, "inf"), vec![f32::INFINITY, 0.0]),
                (chunk(doc, 1, "near"), vec![1.0, 0.0]),
                (chunk(doc, 2, "nan"), vec![f32::NAN, 0.0]),
                (chunk(doc, 3, "far"), vec![5.0, 0.0]),
            ])
            .unwrap();

        let hits = index.search(&[f32::INFINITY, 0.0], 4).unwrap();
        assert_eq!(hits.len(), 4);

        let hits = index.search(&[1.0, 0.0], 4).unwrap();
        assert_eq!(hits.len(), 4);
        let finite: Vec<&str> = hits
            .iter()
            .filter(|h| h.score.is_finite())
            .map(|h| h.chunk.text.as_str())
            .collect();
        assert_eq!(finite, vec!["near", "far"]);
    }

    #[test]
    fn test_snapshot_roundtrip_and_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.json");

        let index = VectorIndex::new(DistanceMetric::Cosine);
        let doc = SourceDocument::new("a.txt".into(), FileType::Txt, "ab".into(), 2);
        index
            .insert(vec![
                (chunk(doc.id, 0, "zero"), vec![1.0, 0.0]),
                (chunk(doc.id, 1, "one"), vec![0.0, 1.0]),
            ])
            .unwrap();
        index.save(&path, "hash:v1:2", &[doc.clone()]).unwrap();

        let (loaded, docs) =
            VectorIndex::load(&path, "hash:v1:2", 2, DistanceMetric::Cosine).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, doc.id);
        assert_eq!(loaded.chunks_for(doc.id)[1].text, "one");

        // New inserts continue the sequence
        loaded
            .insert(vec![(chunk(doc.id, 2, "two"), vec![1.0, 0.0])])
            .unwrap();
        let hits = loaded.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].chunk.text, "zero");
        assert_eq!(hits[1].chunk.text, "two");

        let (other, docs) =
            VectorIndex::load(&path, "ollama:nomic:2", 2, DistanceMetric::Cosine).unwrap();
        assert!(other.is_empty());
        assert!(docs.is_empty());

        let (wrong_dims, _) =
            VectorIndex::load(&path, "hash:v1:2", 3, DistanceMetric::Cosine).unwrap();
        assert!(wrong_dims.is_empty());
        assert_eq!(wrong_dims.dimensions(), Some(3));

        let (missing, _) = VectorIndex::load(
            dir.path().join("none.json"),
            "hash:v1:2",
            2,
            DistanceMetric::Cosine,
        )
        .unwrap();
        assert!(missing.is_empty());
        assert_eq!(missing.dimensions(), Some(2));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
