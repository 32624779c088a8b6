#[cfg(test)]
mod tests;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::book::BookContext;
use crate::chunker::{TokenCounter, chunk_corpus};
use crate::config::Config;
use crate::embeddings::{
    BatchOptions, EmbeddingProvider, EmbeddingTask, HttpEmbedder, embed_batch,
};
use crate::metadata::{build_summary, build_topic_index, save_metadata};
use crate::store::{SearchFilter, VectorStore};

/// Outcome of a full ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks: usize,
    /// Chunks indexed with a zero-vector placeholder instead of a real
    /// embedding. Non-zero means degraded retrieval quality for those chunks.
    pub placeholder_embeddings: usize,
    pub modules: usize,
    pub chapters: usize,
    pub words: usize,
    pub topics: usize,
}

/// A search result enriched with citation fields for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub content: String,
    /// Corpus-relative source path of the chapter.
    pub source: String,
    pub chapter_title: String,
    pub module: String,
    pub score: f32,
}

/// End-to-end ingestion and retrieval pipeline.
///
/// Owns the embedding provider, the vector index, and the token counter;
/// everything else is stateless functions over them. Strictly sequential:
/// one corpus walk, one batch embedding pass, one index write.
pub struct Pipeline {
    config: Config,
    provider: Box<dyn EmbeddingProvider>,
    store: VectorStore,
    counter: TokenCounter,
}

impl Pipeline {
    /// Build a pipeline backed by the configured HTTP embedding service.
    pub fn new(config: Config) -> Result<Self> {
        let provider = HttpEmbedder::new(&config.embedding)?;
        Self::with_provider(config, Box::new(provider))
    }

    /// Build a pipeline with an explicit provider. Used by tests and any
    /// embedder other than the HTTP default.
    pub fn with_provider(config: Config, provider: Box<dyn EmbeddingProvider>) -> Result<Self> {
        let counter = match &config.embedding.tokenizer_file {
            Some(path) => TokenCounter::from_file(path)
                .with_context(|| format!("Failed to load tokenizer: {}", path.display()))?,
            None => TokenCounter::approximate(),
        };

        let store = VectorStore::open(config.index_dir(), provider.dimension())?;

        Ok(Self {
            config,
            provider,
            store,
            counter,
        })
    }

    /// Ingest the whole corpus: chunk, embed, index, and rebuild the derived
    /// metadata documents. Replaces any previously indexed content.
    pub fn build(&mut self) -> Result<IngestReport> {
        let corpus_root = self.config.corpus_dir();
        info!("Ingesting corpus from {}", corpus_root.display());

        let chunks = chunk_corpus(
            &corpus_root,
            &self.config.modules,
            &self.counter,
            &self.config.chunking,
        )?;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let options = BatchOptions {
            batch_size: self.config.embedding.batch_size as usize,
            batch_delay: Duration::from_millis(self.config.embedding.batch_delay_ms),
        };
        let outcome = embed_batch(self.provider.as_ref(), &texts, EmbeddingTask::Document, &options);

        if self.store.count() > 0 {
            info!("Replacing {} previously indexed chunks", self.store.count());
            self.store.reset()?;
        }
        self.store.add(&chunks, &outcome.embeddings)?;

        let summary = build_summary(&corpus_root, &self.config.modules)?;
        let topics = build_topic_index(&summary);
        save_metadata(&self.config.metadata_dir(), &summary, &topics)?;

        if outcome.placeholder_count > 0 {
            warn!(
                "{} chunks were indexed with placeholder embeddings",
                outcome.placeholder_count
            );
        }

        Ok(IngestReport {
            chunks: chunks.len(),
            placeholder_embeddings: outcome.placeholder_count,
            modules: summary.total_modules,
            chapters: summary.total_chapters,
            words: summary.total_words,
            topics: topics.topics.len(),
        })
    }

    /// Embed the query and search the index, resolving each hit to a
    /// display-ready passage.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<Passage>> {
        let vector = self
            .provider
            .embed(query, EmbeddingTask::Query)
            .context("Failed to embed search query")?;

        let hits = self.store.search(&vector, top_k, filter)?;
        Ok(hits
            .into_iter()
            .map(|hit| Passage {
                content: hit.content,
                source: hit.metadata.file_path,
                chapter_title: hit.metadata.chapter_title,
                module: hit.metadata.module_name,
                score: hit.similarity_score,
            })
            .collect())
    }

    /// Load the navigation context from the metadata built by `build`.
    pub fn book_context(&self) -> Result<BookContext> {
        BookContext::load(&self.config.metadata_dir())
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Drop all indexed vectors and chunks.
    pub fn reset(&mut self) -> Result<()> {
        self.store.reset()?;
        Ok(())
    }
}
