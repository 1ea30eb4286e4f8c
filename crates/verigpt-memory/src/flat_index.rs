use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::vector_store::{IndexedChunk, ScoredChunk, VectorIndex, VectorIndexError};

pub const FORMAT_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";
pub const CHUNKS_FILE: &str = "chunks.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunks: usize,
    /// blake3 of the chunks file, hex encoded.
    pub checksum: String,
    /// Unix seconds.
    pub created_at: u64,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    chunk: IndexedChunk,
    vector: Vec<f32>,
}

struct Entry {
    chunk: IndexedChunk,
    vector: Vec<f32>,
    norm: f32,
}

/// Exhaustive cosine-similarity index. Vectors live in memory; `save`/`load`
/// persist them as a manifest plus a JSON chunk file.
pub struct FlatIndex {
    embedding_model: String,
    dimensions: usize,
    entries: Vec<Entry>,
}

impl std::fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatIndex")
            .field("embedding_model", &self.embedding_model)
            .field("dimensions", &self.dimensions)
            .field("len", &self.entries.len())
            .finish()
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

impl FlatIndex {
    /// # Errors
    ///
    /// Returns [`VectorIndexError::InvalidInput`] when `items` is empty, a
    /// vector is empty or non-finite, or dimensions disagree.
    pub fn build(
        embedding_model: impl Into<String>,
        items: Vec<(IndexedChunk, Vec<f32>)>,
    ) -> Result<Self, VectorIndexError> {
        let dimensions = match items.first() {
            Some((_, v)) if !v.is_empty() => v.len(),
            Some(_) => {
                return Err(VectorIndexError::InvalidInput(
                    "embedding vectors must not be empty".into(),
                ));
            }
            None => {
                return Err(VectorIndexError::InvalidInput(
                    "index must contain at least one chunk".into(),
                ));
            }
        };

        let mut entries = Vec::with_capacity(items.len());
        for (i, (chunk, vector)) in items.into_iter().enumerate() {
            if vector.len() != dimensions {
                return Err(VectorIndexError::InvalidInput(format!(
                    "vector {i} has {} dimensions, expected {dimensions}",
                    vector.len()
                )));
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(VectorIndexError::InvalidInput(format!(
                    "vector {i} contains non-finite values"
                )));
            }
            entries.push(Entry {
                norm: norm(&vector),
                chunk,
                vector,
            });
        }

        Ok(Self {
            embedding_model: embedding_model.into(),
            dimensions,
            entries,
        })
    }

    /// Whether `dir` holds a saved index.
    #[must_use]
    pub fn exists(dir: &Path) -> bool {
        dir.join(MANIFEST_FILE).is_file() && dir.join(CHUNKS_FILE).is_file()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &IndexedChunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Write the index into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or serialization failure.
    pub fn save(&self, dir: &Path) -> Result<IndexManifest, VectorIndexError> {
        std::fs::create_dir_all(dir)?;

        let stored: Vec<StoredEntry> = self
            .entries
            .iter()
            .map(|e| StoredEntry {
                chunk: e.chunk.clone(),
                vector: e.vector.clone(),
            })
            .collect();
        let bytes = serde_json::to_vec(&stored)?;

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            embedding_model: self.embedding_model.clone(),
            dimensions: self.dimensions,
            chunks: self.entries.len(),
            checksum: blake3::hash(&bytes).to_hex().to_string(),
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
        };

        std::fs::write(dir.join(CHUNKS_FILE), &bytes)?;
        std::fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&manifest)?,
        )?;
        Ok(manifest)
    }

    /// Read a saved index, verifying format version and checksum.
    ///
    /// # Errors
    ///
    /// Returns [`VectorIndexError::NotFound`] if `dir` holds no index, and
    /// [`VectorIndexError::Corrupt`] or [`VectorIndexError::UnsupportedVersion`]
    /// if the stored data cannot be trusted.
    pub fn load(dir: &Path) -> Result<Self, VectorIndexError> {
        if !Self::exists(dir) {
            return Err(VectorIndexError::NotFound(dir.to_path_buf()));
        }

        let manifest: IndexManifest =
            serde_json::from_slice(&std::fs::read(dir.join(MANIFEST_FILE))?)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(VectorIndexError::UnsupportedVersion(manifest.format_version));
        }

        let bytes = std::fs::read(dir.join(CHUNKS_FILE))?;
        let checksum = blake3::hash(&bytes).to_hex().to_string();
        if checksum != manifest.checksum {
            return Err(VectorIndexError::Corrupt(format!(
                "checksum mismatch: manifest {}, data {checksum}",
                manifest.checksum
            )));
        }

        let stored: Vec<StoredEntry> = serde_json::from_slice(&bytes)?;
        if stored.len() != manifest.chunks {
            return Err(VectorIndexError::Corrupt(format!(
                "manifest lists {} chunks, data has {}",
                manifest.chunks,
                stored.len()
            )));
        }

        let index = Self::build(
            manifest.embedding_model,
            stored.into_iter().map(|s| (s.chunk, s.vector)).collect(),
        )
        .map_err(|e| VectorIndexError::Corrupt(e.to_string()))?;

        if index.dimensions != manifest.dimensions {
            return Err(VectorIndexError::Corrupt(format!(
                "manifest dimensions {}, data dimensions {}",
                manifest.dimensions, index.dimensions
            )));
        }
        Ok(index)
    }
}

impl VectorIndex for FlatIndex {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorIndexError> {
        if query.len() != self.dimensions {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let denom = query_norm * e.norm;
                let score = if denom == 0.0 {
                    0.0
                } else {
                    dot(query, &e.vector) / denom
                };
                (i, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ChunkMetadata, DocumentMetadata};

    fn chunk(path: &str, content: &str) -> IndexedChunk {
        IndexedChunk {
            content: content.to_owned(),
            metadata: ChunkMetadata {
                document: DocumentMetadata {
                    path: path.to_owned(),
                    extension: "sv".to_owned(),
                    size: content.len() as u64,
                },
                chunk_index: 0,
                total_chunks: 1,
                start_byte: 0,
                end_byte: content.len(),
                line_start: 1,
                line_end: 1,
            },
        }
    }

    fn sample() -> FlatIndex {
        FlatIndex::build(
            "test-embed",
            vec![
                (chunk("a.sv", "alpha"), vec![1.0, 0.0, 0.0]),
                (chunk("b.sv", "beta"), vec![0.0, 1.0, 0.0]),
                (chunk("c.sv", "gamma"), vec![0.7, 0.7, 0.0]),
                (chunk("d.sv", "delta"), vec![0.0, 0.0, 1.0]),
                (chunk("e.sv", "epsilon"), vec![-1.0, 0.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn search_orders_by_similarity() {
        let index = sample();
        let results = index.search(&[1.0, 0.1, 0.0], 3).unwrap();
        let paths: Vec<_> = results
            .iter()
            .map(|r| r.chunk.metadata.document.path.as_str())
            .collect();
        assert_eq!(paths, ["a.sv", "c.sv", "b.sv"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn search_returns_at_most_len() {
        let index = sample();
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 10).unwrap().len(), 5);
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 3).unwrap().len(), 3);
        assert!(index.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = FlatIndex::build(
            "m",
            vec![
                (chunk("first.sv", "x"), vec![1.0, 0.0]),
                (chunk("second.sv", "y"), vec![2.0, 0.0]),
                (chunk("third.sv", "z"), vec![0.5, 0.0]),
            ],
        )
        .unwrap();
        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let paths: Vec<_> = results
            .iter()
            .map(|r| r.chunk.metadata.document.path.as_str())
            .collect();
        assert_eq!(paths, ["first.sv", "second.sv", "third.sv"]);
    }

    #[test]
    fn zero_query_scores_zero() {
        let index = sample();
        let results = index.search(&[0.0, 0.0, 0.0], 2).unwrap();
        assert!(results.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let err = sample().search(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            VectorIndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn build_rejects_bad_input() {
        assert!(matches!(
            FlatIndex::build("m", vec![]),
            Err(VectorIndexError::InvalidInput(_))
        ));
        assert!(matches!(
            FlatIndex::build(
                "m",
                vec![
                    (chunk("a.sv", "a"), vec![1.0, 0.0]),
                    (chunk("b.sv", "b"), vec![1.0]),
                ]
            ),
            Err(VectorIndexError::InvalidInput(_))
        ));
        assert!(matches!(
            FlatIndex::build("m", vec![(chunk("a.sv", "a"), vec![f32::NAN])]),
            Err(VectorIndexError::InvalidInput(_))
        ));
    }

    #[test]
    fn save_and_load_preserve_results() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample();
        let manifest = index.save(dir.path()).unwrap();
        assert_eq!(manifest.chunks, 5);
        assert_eq!(manifest.dimensions, 3);
        assert_eq!(manifest.embedding_model, "test-embed");
        assert!(FlatIndex::exists(dir.path()));

        let loaded = FlatIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded.embedding_model(), "test-embed");

        let query = [0.3, 0.9, 0.1];
        assert_eq!(
            index.search(&query, 5).unwrap(),
            loaded.search(&query, 5).unwrap()
        );
    }

    #[test]
    fn load_missing_dir_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlatIndex::load(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, VectorIndexError::NotFound(_)));
    }

    #[test]
    fn load_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        sample().save(dir.path()).unwrap();

        let path = dir.path().join(CHUNKS_FILE);
        let data = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, data.replace("alpha", "omega")).unwrap();

        let err = FlatIndex::load(dir.path()).unwrap_err();
        assert!(matches!(err, VectorIndexError::Corrupt(_)));
    }

    #[test]
    fn load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = sample().save(dir.path()).unwrap();
        manifest.format_version = 99;
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();

        let err = FlatIndex::load(dir.path()).unwrap_err();
        assert!(matches!(err, VectorIndexError::UnsupportedVersion(99)));
    }
}
