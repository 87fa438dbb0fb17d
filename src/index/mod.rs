//! In-memory similarity index over embedded chunks.
//!
//! A [`VectorIndex`] is built once from chunks and their vectors and never mutated afterwards.
//! The live index is published through an [`IndexHandle`], which swaps whole indexes.

mod handle;

pub use handle::IndexHandle;

use crate::processing::chunking::Chunk;
use thiserror::Error;

/// Errors raised while building or querying an index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Chunks and vectors were not paired one to one.
    #[error("expected {chunks} vectors, got {vectors}")]
    LengthMismatch {
        /// Number of chunks supplied.
        chunks: usize,
        /// Number of vectors supplied.
        vectors: usize,
    },
    /// A vector had a different dimension from the rest.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the first vector in the index.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Index would contain nothing.
    #[error("cannot build an index without chunks")]
    Empty,
}

/// Chunk paired with its embedding.
#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: Chunk,
    vector: Vec<f32>,
    norm: f32,
}

/// Chunk returned by a search, with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// Immutable brute-force cosine index.
#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
    dimension: usize,
}

impl VectorIndex {
    /// Pair `chunks` with `vectors` and build the index.
    ///
    /// Fails without producing anything if the inputs are empty, differ in length, or carry
    /// vectors of different dimensions.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        let dimension = match vectors.first() {
            Some(first) if !first.is_empty() => first.len(),
            Some(_) => {
                return Err(IndexError::DimensionMismatch {
                    expected: 1,
                    actual: 0,
                });
            }
            None => return Err(IndexError::Empty),
        };

        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            let norm = l2_norm(&vector);
            entries.push(IndexedChunk {
                chunk,
                vector,
                norm,
            });
        }

        Ok(Self { entries, dimension })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks. Always false for a built index.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension shared by every vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Return up to `k` chunks ordered by descending cosine similarity.
    ///
    /// Equal scores keep document order. A score that is not a number (for example from
    /// infinite vector components) ranks below every real score.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let query_norm = l2_norm(query);

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .entries
            .iter()
            .map(|entry| (cosine(query, query_norm, entry), entry))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|value| value * value).sum::<f32>().sqrt()
}

fn cosine(query: &[f32], query_norm: f32, entry: &IndexedChunk) -> f32 {
    if query_norm == 0.0 || entry.norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = query
        .iter()
        .zip(&entry.vector)
        .map(|(left, right)| left * right)
        .sum();
    let score = dot / (query_norm * entry.norm);
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

#[cfg(test)]
pub(crate) fn test_chunk(ordinal: usize, text: &str) -> Chunk {
    Chunk {
        text: text.to_string(),
        page: 1,
        ordinal,
        start: 0,
        overlap: 0,
    }
}
