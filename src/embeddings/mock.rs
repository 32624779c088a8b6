use std::hash::{DefaultHasher, Hash, Hasher};

use anyhow::Result;

use crate::BookragError;

use super::{EmbeddingProvider, EmbeddingTask};

/// Deterministic embedding provider for tests.
///
/// Produces hash-seeded unit vectors without network access. Failures can be
/// injected per-text (`fail_marker`) or for all batch calls (`fail_batches`)
/// to exercise the degraded paths.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimension: usize,
    /// Texts containing this marker fail to embed.
    pub fail_marker: Option<String>,
    /// When set, every batch call fails, forcing per-item fallback.
    pub fail_batches: bool,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_marker: None,
            fail_batches: false,
        }
    }

    pub fn with_fail_marker(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    pub fn with_failing_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }
}

impl EmbeddingProvider for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>> {
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(BookragError::Embedding(format!(
                    "injected failure for text containing {marker:?}"
                ))
                .into());
            }
        }

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        task.as_str().hash(&mut hasher);
        let bytes = hasher.finish().to_le_bytes();

        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|i| f32::from(bytes[i % 8]) / 255.0)
            .collect();

        let norm_sq: f32 = vector.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut vector {
                *v *= inv;
            }
        }

        Ok(vector)
    }

    fn embed_many(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
        if self.fail_batches {
            return Err(BookragError::Embedding("injected batch failure".to_string()).into());
        }
        texts.iter().map(|t| self.embed(t, task)).collect()
    }
}
