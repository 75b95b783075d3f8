//! Persistent brute-force vector index over schema descriptions.
//!
//! Stores embedding vectors alongside their [`DocumentRecord`]s and answers
//! k-nearest-neighbor queries by exact Euclidean distance. Schema catalogs
//! hold tens to low hundreds of descriptions, so a full scan beats the
//! bookkeeping cost of an approximate structure.
//!
//! # Persistence
//!
//! Two artifacts under a configured path prefix:
//! - `<prefix>.vectors` — all vectors concatenated as little-endian f32 bytes
//! - `<prefix>.meta.json` — the record list as a JSON array, same order
//!
//! Both are written to a temp file and renamed, so readers never observe a
//! half-written artifact. On load, a count mismatch between the two files
//! means the pair is inconsistent and the index starts empty.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::embedding::{blob_to_vecs, vecs_to_blob, EmbeddingProvider};
use crate::error::PipelineError;
use crate::models::{DocMeta, DocumentRecord, IndexStats, SearchHit};

struct IndexState {
    vectors: Vec<Vec<f32>>,
    records: Vec<DocumentRecord>,
    /// SHA-256 of each indexed text, for duplicate suppression.
    seen: HashSet<[u8; 32]>,
}

impl IndexState {
    fn empty() -> Self {
        Self {
            vectors: Vec::new(),
            records: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

/// In-memory vector store with optional on-disk persistence.
pub struct VectorIndex {
    dims: usize,
    path_prefix: Option<PathBuf>,
    provider: Arc<dyn EmbeddingProvider>,
    state: RwLock<IndexState>,
}

fn text_digest(text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

fn vectors_path(prefix: &Path) -> PathBuf {
    let mut p = prefix.as_os_str().to_owned();
    p.push(".vectors");
    PathBuf::from(p)
}

fn meta_path(prefix: &Path) -> PathBuf {
    let mut p = prefix.as_os_str().to_owned();
    p.push(".meta.json");
    PathBuf::from(p)
}

impl VectorIndex {
    /// Create an index that lives only in memory.
    pub fn in_memory(dims: usize, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            dims,
            path_prefix: None,
            provider,
            state: RwLock::new(IndexState::empty()),
        }
    }

    /// Open a persistent index, loading existing artifacts if present.
    ///
    /// A missing artifact pair means a fresh index. A corrupt or
    /// inconsistent pair is reported on stderr and the index starts empty
    /// rather than serving partial data.
    pub fn open(
        dims: usize,
        path_prefix: &Path,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let index = Self {
            dims,
            path_prefix: Some(path_prefix.to_path_buf()),
            provider,
            state: RwLock::new(IndexState::empty()),
        };

        match index.load_from_disk(path_prefix) {
            Ok(Some(loaded)) => {
                let mut state = index
                    .state
                    .write()
                    .map_err(|_| anyhow::anyhow!("index lock poisoned"))?;
                *state = loaded;
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!(
                    "Warning: failed to load index from {}: {}. Starting empty.",
                    path_prefix.display(),
                    e
                );
            }
        }

        Ok(index)
    }

    fn load_from_disk(&self, prefix: &Path) -> Result<Option<IndexState>> {
        let vec_path = vectors_path(prefix);
        let rec_path = meta_path(prefix);

        if !vec_path.exists() && !rec_path.exists() {
            return Ok(None);
        }
        if !vec_path.exists() || !rec_path.exists() {
            bail!(
                "index artifact pair incomplete: {} and {} must both exist",
                vec_path.display(),
                rec_path.display()
            );
        }

        let blob = std::fs::read(&vec_path)
            .with_context(|| format!("Failed to read {}", vec_path.display()))?;
        let vectors = blob_to_vecs(&blob, self.dims)?;

        let meta_text = std::fs::read_to_string(&rec_path)
            .with_context(|| format!("Failed to read {}", rec_path.display()))?;
        let records: Vec<DocumentRecord> =
            serde_json::from_str(&meta_text).with_context(|| "Failed to parse index metadata")?;

        if vectors.len() != records.len() {
            bail!(
                "index artifacts inconsistent: {} vectors but {} records",
                vectors.len(),
                records.len()
            );
        }

        let seen = records.iter().map(|r| text_digest(&r.text)).collect();

        Ok(Some(IndexState {
            vectors,
            records,
            seen,
        }))
    }

    fn save_locked(&self, state: &IndexState) -> Result<()> {
        let Some(prefix) = &self.path_prefix else {
            return Ok(());
        };

        if let Some(parent) = prefix.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let vec_path = vectors_path(prefix);
        let rec_path = meta_path(prefix);

        let blob = vecs_to_blob(&state.vectors);
        let vec_tmp = vec_path.with_extension("vectors.tmp");
        std::fs::write(&vec_tmp, &blob)
            .with_context(|| format!("Failed to write {}", vec_tmp.display()))?;
        std::fs::rename(&vec_tmp, &vec_path)?;

        let meta_json = serde_json::to_string(&state.records)?;
        let rec_tmp = rec_path.with_extension("json.tmp");
        std::fs::write(&rec_tmp, meta_json)
            .with_context(|| format!("Failed to write {}", rec_tmp.display()))?;
        std::fs::rename(&rec_tmp, &rec_path)?;

        Ok(())
    }

    /// Add a batch of documents, skipping texts already indexed.
    ///
    /// Returns the number of documents actually added. The batch is
    /// atomic: an embedding failure or a wrong-sized vector leaves the
    /// index untouched.
    pub async fn add_documents(
        &self,
        texts: Vec<String>,
        metas: Vec<DocMeta>,
    ) -> Result<usize, PipelineError> {
        if texts.len() != metas.len() {
            return Err(PipelineError::ProviderUnavailable(format!(
                "document batch mismatch: {} texts but {} metadata entries",
                texts.len(),
                metas.len()
            )));
        }

        // Filter duplicates before paying for embeddings. Duplicates within
        // the batch itself keep the first occurrence.
        let (fresh_texts, fresh_metas) = {
            let state = self
                .state
                .read()
                .map_err(|_| PipelineError::ProviderUnavailable("index lock poisoned".into()))?;
            let mut batch_seen: HashSet<[u8; 32]> = HashSet::new();
            let mut fresh_texts = Vec::new();
            let mut fresh_metas = Vec::new();
            for (text, meta) in texts.into_iter().zip(metas) {
                let digest = text_digest(&text);
                if state.seen.contains(&digest) || !batch_seen.insert(digest) {
                    continue;
                }
                fresh_texts.push(text);
                fresh_metas.push(meta);
            }
            (fresh_texts, fresh_metas)
        };

        if fresh_texts.is_empty() {
            return Ok(0);
        }

        let embeddings = self
            .provider
            .embed_batch(&fresh_texts)
            .await
            .map_err(|e| PipelineError::ProviderUnavailable(e.to_string()))?;

        if embeddings.len() != fresh_texts.len() {
            return Err(PipelineError::ProviderUnavailable(format!(
                "provider returned {} vectors for {} texts",
                embeddings.len(),
                fresh_texts.len()
            )));
        }

        // Validate every vector before mutating anything.
        for vec in &embeddings {
            if vec.len() != self.dims {
                return Err(PipelineError::DimensionMismatch {
                    expected: self.dims,
                    actual: vec.len(),
                });
            }
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| PipelineError::ProviderUnavailable("index lock poisoned".into()))?;

        // The read-lock filter above ran before the embedding call, so a
        // concurrent add may have stored some of these texts since.
        // Recheck under the write lock; `insert` returning false means
        // another writer got there first.
        let mut added = 0;
        for ((text, meta), vec) in fresh_texts.into_iter().zip(fresh_metas).zip(embeddings) {
            if !state.seen.insert(text_digest(&text)) {
                continue;
            }
            state.vectors.push(vec);
            state.records.push(DocumentRecord { text, meta });
            added += 1;
        }

        if let Err(e) = self.save_locked(&state) {
            eprintln!("Warning: failed to persist index: {}", e);
        }

        Ok(added)
    }

    /// Find the `k` nearest documents to the question.
    ///
    /// Results are ordered by ascending Euclidean distance; ties keep
    /// insertion order. An embedding failure degrades to an empty result
    /// set rather than failing the caller.
    pub async fn search(&self, question: &str, k: usize) -> Vec<SearchHit> {
        if k == 0 {
            return Vec::new();
        }

        let query = match self.provider.embed(question).await {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Warning: query embedding failed: {}", e);
                return Vec::new();
            }
        };

        if query.len() != self.dims {
            eprintln!(
                "Warning: query embedding has {} dims, index expects {}",
                query.len(),
                self.dims
            );
            return Vec::new();
        }

        let state = match self.state.read() {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };

        let mut hits: Vec<SearchHit> = state
            .vectors
            .iter()
            .zip(&state.records)
            .map(|(vec, record)| SearchHit {
                record: record.clone(),
                distance: euclidean_distance(&query, vec),
            })
            .collect();

        // Stable sort keeps insertion order among equal distances.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k.min(state.records.len()));
        hits
    }

    /// O(1) summary of index contents.
    pub fn stats(&self) -> IndexStats {
        let (total, meta) = match self.state.read() {
            Ok(s) => (s.vectors.len(), s.records.len()),
            Err(_) => (0, 0),
        };
        IndexStats {
            total_documents: total,
            dimensions: self.dims,
            metadata_count: meta,
        }
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
