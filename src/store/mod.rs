
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunker::{Chunk, ChunkMetadata};
use crate::{BookragError, Result};

const VECTOR_FILE: &str = "vectors.bin";
const CHUNK_FILE: &str = "chunks.json";
const VECTOR_MAGIC: [u8; 4] = *b"BRVX";
const VECTOR_FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

/// Candidates scoring below this similarity are dropped from search results.
pub const SIMILARITY_FLOOR: f32 = 0.3;

/// A chunk as stored in the index, paired by position with its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub similarity_score: f32,
}

/// Exact-match metadata filter applied to search candidates. Unset fields
/// match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub module_name: Option<String>,
    pub chapter_id: Option<String>,
    pub chapter_number: Option<u32>,
}

impl SearchFilter {
    pub fn module(name: impl Into<String>) -> Self {
        Self {
            module_name: Some(name.into()),
            ..Self::default()
        }
    }

    fn matches(&self, metadata: &ChunkMetadata) -> bool {
        if let Some(module) = &self.module_name {
            if metadata.module_name != *module {
                return false;
            }
        }
        if let Some(chapter) = &self.chapter_id {
            if metadata.chapter_id != *chapter {
                return false;
            }
        }
        if let Some(number) = self.chapter_number {
            if metadata.chapter_number != number {
                return false;
            }
        }
        true
    }
}

/// Flat vector index with exact linear-scan search.
///
/// Vectors live in one contiguous buffer, chunk records in a parallel list;
/// the i-th record describes the i-th vector. The corpus is small (tens to
/// low hundreds of chunks), so an O(n) scan beats the recall error and
/// complexity of an approximate structure at this scale. Both on-disk
/// artifacts are rewritten after every mutation; a single writer per index
/// directory is assumed.
#[derive(Debug)]
pub struct VectorStore {
    dir: PathBuf,
    dimension: usize,
    vectors: Vec<f32>,
    records: Vec<StoredChunk>,
}

impl VectorStore {
    /// Open the index at `dir`, loading persisted state when present.
    ///
    /// Fails with `CorruptIndex` when the two artifacts are unpaired or
    /// disagree on count, and with `DimensionMismatch` when the stored
    /// dimension differs from `dimension`.
    pub fn open(dir: impl Into<PathBuf>, dimension: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let vector_path = dir.join(VECTOR_FILE);
        let chunk_path = dir.join(CHUNK_FILE);

        if !vector_path.exists() && !chunk_path.exists() {
            debug!(
                "Creating empty vector index at {} (dimension {})",
                dir.display(),
                dimension
            );
            return Ok(Self {
                dir,
                dimension,
                vectors: Vec::new(),
                records: Vec::new(),
            });
        }

        if vector_path.exists() != chunk_path.exists() {
            return Err(BookragError::CorruptIndex(format!(
                "index artifacts are unpaired in {}: both {VECTOR_FILE} and {CHUNK_FILE} are required",
                dir.display()
            )));
        }

        let (stored_dimension, vectors) = read_vector_file(&vector_path)?;
        if stored_dimension != dimension {
            return Err(BookragError::DimensionMismatch {
                expected: dimension,
                actual: stored_dimension,
            });
        }

        let data = fs::read_to_string(&chunk_path).map_err(|e| {
            BookragError::CorruptIndex(format!("failed to read {}: {e}", chunk_path.display()))
        })?;
        let records: Vec<StoredChunk> = serde_json::from_str(&data).map_err(|e| {
            BookragError::CorruptIndex(format!("failed to parse {}: {e}", chunk_path.display()))
        })?;

        let vector_count = vectors.len() / dimension;
        if vector_count != records.len() {
            return Err(BookragError::CorruptIndex(format!(
                "{vector_count} vectors but {} chunk records in {}",
                records.len(),
                dir.display()
            )));
        }

        info!("Loaded vector index with {} chunks", records.len());
        Ok(Self {
            dir,
            dimension,
            vectors,
            records,
        })
    }

    /// Append chunk/vector pairs and persist.
    ///
    /// Fails with `DimensionMismatch` before any mutation when the counts
    /// disagree or a vector has the wrong length.
    pub fn add(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(BookragError::DimensionMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            });
        }
        for vector in embeddings {
            if vector.len() != self.dimension {
                return Err(BookragError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        for (chunk, vector) in chunks.iter().zip(embeddings) {
            self.vectors.extend_from_slice(vector);
            self.records.push(StoredChunk {
                id: chunk.id.clone(),
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
            });
        }

        self.save()?;
        info!(
            "Added {} chunks to vector index ({} total)",
            chunks.len(),
            self.records.len()
        );
        Ok(())
    }

    /// Exact similarity search over all stored vectors.
    ///
    /// Scans with squared Euclidean distance, keeps `2 * top_k` candidates
    /// (capped at the index size) to survive post-filtering, converts
    /// distance to `1 / (1 + distance)`, applies the optional metadata
    /// filter and the similarity floor, and returns at most `top_k` hits in
    /// descending similarity. An empty index yields an empty list.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>> {
        if self.records.is_empty() {
            debug!("Search on empty index");
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(BookragError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = (0..self.records.len())
            .map(|i| (i, squared_distance(query, self.vector(i))))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate((top_k * 2).min(self.records.len()));

        let mut hits = Vec::new();
        for (idx, distance) in scored {
            let record = &self.records[idx];

            if let Some(filter) = filter {
                if !filter.matches(&record.metadata) {
                    continue;
                }
            }

            let similarity = 1.0 / (1.0 + distance);
            if similarity < SIMILARITY_FLOOR {
                continue;
            }

            hits.push(SearchHit {
                chunk_id: record.id.clone(),
                content: record.content.clone(),
                metadata: record.metadata.clone(),
                similarity_score: similarity,
            });

            if hits.len() >= top_k {
                break;
            }
        }

        debug!("Search returned {} of {top_k} requested hits", hits.len());
        Ok(hits)
    }

    /// Look up a stored chunk by its identifier.
    pub fn get(&self, chunk_id: &str) -> Option<&StoredChunk> {
        self.records.iter().find(|r| r.id == chunk_id)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Clear all vectors and records, persisting the empty state.
    pub fn reset(&mut self) -> Result<()> {
        self.vectors.clear();
        self.records.clear();
        self.save()?;
        info!("Vector index reset");
        Ok(())
    }

    fn vector(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dimension..(i + 1) * self.dimension]
    }

    fn save(&self) -> Result<()> {
        write_vector_file(&self.dir.join(VECTOR_FILE), self.dimension, &self.vectors)?;

        let json = serde_json::to_string(&self.records).map_err(anyhow::Error::new)?;
        fs::write(self.dir.join(CHUNK_FILE), json)?;

        debug!("Vector index saved to {}", self.dir.display());
        Ok(())
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn write_vector_file(path: &Path, dimension: usize, vectors: &[f32]) -> Result<()> {
    let count = if dimension == 0 {
        0
    } else {
        vectors.len() / dimension
    };

    let mut buf = Vec::with_capacity(HEADER_LEN + vectors.len() * 4);
    buf.extend_from_slice(&VECTOR_MAGIC);
    buf.extend_from_slice(&VECTOR_FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&(dimension as u32).to_le_bytes());
    buf.extend_from_slice(&(count as u32).to_le_bytes());
    buf.extend_from_slice(bytemuck::cast_slice(vectors));

    fs::write(path, buf)?;
    Ok(())
}

fn read_vector_file(path: &Path) -> Result<(usize, Vec<f32>)> {
    let data = fs::read(path).map_err(|e| {
        BookragError::CorruptIndex(format!("failed to read {}: {e}", path.display()))
    })?;

    if data.len() < HEADER_LEN || data[..4] != VECTOR_MAGIC {
        return Err(BookragError::CorruptIndex(format!(
            "{} has an invalid header",
            path.display()
        )));
    }

    let version = read_u32(&data, 4);
    if version != VECTOR_FORMAT_VERSION {
        return Err(BookragError::CorruptIndex(format!(
            "unsupported vector file version {version}"
        )));
    }

    let dimension = read_u32(&data, 8) as usize;
    let count = read_u32(&data, 12) as usize;
    let payload = &data[HEADER_LEN..];

    if payload.len() != count * dimension * 4 {
        return Err(BookragError::CorruptIndex(format!(
            "vector payload is {} bytes, expected {} ({count} vectors of dimension {dimension})",
            payload.len(),
            count * dimension * 4
        )));
    }

    // pod_collect_to_vec copies, which sidesteps alignment requirements on
    // the raw file bytes.
    let vectors: Vec<f32> = bytemuck::pod_collect_to_vec(payload);
    Ok((dimension, vectors))
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[at..at + 4]);
    u32::from_le_bytes(bytes)
}
