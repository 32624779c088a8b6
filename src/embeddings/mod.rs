
mod http;
mod mock;

pub use http::HttpEmbedder;
pub use mock::MockEmbedder;

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, warn};

/// Role hint for asymmetric embedding backends: the same text embeds
/// differently depending on whether it is being indexed or searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    Document,
    Query,
}

impl EmbeddingTask {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "retrieval_document",
            Self::Query => "retrieval_query",
        }
    }
}

/// Boundary to the external embedding service.
pub trait EmbeddingProvider {
    /// Output vector length.
    fn dimension(&self) -> usize;

    /// Embed a single text. Implementations retry transient failures
    /// internally and surface a terminal error once retries are exhausted.
    fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>>;

    /// Embed a batch of texts with a single service call, preserving input
    /// order.
    fn embed_many(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Pause between batch requests, for service rate limits.
    pub batch_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_delay: Duration::from_secs(1),
        }
    }
}

/// Result of a batch embedding run. `embeddings` always has one entry per
/// input text; texts that could not be embedded carry a zero vector and are
/// counted in `placeholder_count` so operators can spot quality degradation.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub embeddings: Vec<Vec<f32>>,
    pub placeholder_count: usize,
}

/// Embed `texts` in fixed-size batches, strictly sequentially.
///
/// A failed batch call falls back to per-item embedding for that batch; an
/// item that still fails becomes a zero-vector placeholder rather than
/// aborting the run. The output preserves input order and length.
pub fn embed_batch(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    task: EmbeddingTask,
    options: &BatchOptions,
) -> BatchOutcome {
    let batch_size = options.batch_size.max(1);
    let total_batches = texts.len().div_ceil(batch_size);

    let mut embeddings = Vec::with_capacity(texts.len());
    let mut placeholder_count = 0;

    for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
        debug!(
            "Embedding batch {}/{} ({} texts)",
            batch_index + 1,
            total_batches,
            batch.len()
        );

        match provider.embed_many(batch, task) {
            Ok(vectors) if vectors.len() == batch.len() => embeddings.extend(vectors),
            Ok(vectors) => {
                warn!(
                    "Batch returned {} embeddings for {} texts, falling back to per-item",
                    vectors.len(),
                    batch.len()
                );
                embed_items(provider, batch, task, &mut embeddings, &mut placeholder_count);
            }
            Err(e) => {
                warn!("Batch embedding failed, falling back to per-item: {e}");
                embed_items(provider, batch, task, &mut embeddings, &mut placeholder_count);
            }
        }

        if batch_index + 1 < total_batches {
            std::thread::sleep(options.batch_delay);
        }
    }

    if placeholder_count > 0 {
        warn!("{placeholder_count} of {} texts received zero-vector placeholders", texts.len());
    }

    BatchOutcome {
        embeddings,
        placeholder_count,
    }
}

fn embed_items(
    provider: &dyn EmbeddingProvider,
    batch: &[String],
    task: EmbeddingTask,
    embeddings: &mut Vec<Vec<f32>>,
    placeholder_count: &mut usize,
) {
    for text in batch {
        match provider.embed(text, task) {
            Ok(vector) => embeddings.push(vector),
            Err(e) => {
                error!("Embedding failed for text ({} chars): {e}", text.len());
                embeddings.push(vec![0.0; provider.dimension()]);
                *placeholder_count += 1;
            }
        }
    }
}
