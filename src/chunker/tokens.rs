use std::path::Path;

use anyhow::{Result, anyhow};
use tokenizers::Tokenizer;
use tracing::{info, warn};

/// Counts tokens for chunk budgeting.
///
/// The primary path runs a real subword tokenizer loaded from a
/// `tokenizer.json` file. When no tokenizer is configured the counter falls
/// back to approximating one token per four characters; the approximation is
/// cheaper but shifts chunk boundaries, so indexes built with different
/// counters should not be mixed.
pub enum TokenCounter {
    Subword(Box<Tokenizer>),
    Approximate,
}

impl TokenCounter {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {e}", path.display()))?;
        info!("Loaded subword tokenizer from {}", path.display());
        Ok(Self::Subword(Box::new(tokenizer)))
    }

    pub fn approximate() -> Self {
        Self::Approximate
    }

    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::Subword(tokenizer) => match tokenizer.encode(text, false) {
                Ok(encoding) => encoding.len(),
                Err(e) => {
                    warn!("Tokenizer failed, approximating token count: {e}");
                    text.len() / 4
                }
            },
            Self::Approximate => text.len() / 4,
        }
    }
}
