use thiserror::Error;

pub type Result<T> = std::result::Result<T, BookragError>;

#[derive(Error, Debug)]
pub enum BookragError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod book;
pub mod chunker;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod indexer;
pub mod metadata;
pub mod store;
