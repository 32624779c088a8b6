use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::BookragError;
use crate::config::EmbeddingConfig;

use super::{EmbeddingProvider, EmbeddingTask};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking HTTP client for the embedding service.
///
/// Single and batch requests hit the same service; transient failures (5xx,
/// transport errors) are retried with exponential backoff, 4xx responses are
/// terminal.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    base_url: Url,
    model: String,
    dimension: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: &'a str,
    task_type: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    model: &'a str,
    content: &'a [String],
    task_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .endpoint_url()
            .context("Invalid embedding service endpoint")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            dimension: config.dimension as usize,
            agent,
            retry_attempts: config.retry_attempts,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    fn post_json(&self, path: &str, body: &str) -> Result<String> {
        let url = self
            .base_url
            .join(path)
            .context("Failed to build embedding URL")?;

        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("Embedding request attempt {}/{}", attempt, self.retry_attempts);

            match self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
            {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Embedding service error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                return Err(BookragError::Embedding(format!(
                                    "embedding service rejected request: HTTP {status}"
                                ))
                                .into());
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(BookragError::Embedding(format!(
                            "non-retryable embedding error: {error}"
                        ))
                        .into());
                    }

                    last_error = Some(error);

                    if attempt < self.retry_attempts {
                        let delay =
                            Duration::from_secs(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1));
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!(
            "All {} embedding attempts failed for {}",
            self.retry_attempts, url
        );

        Err(BookragError::Embedding(match last_error {
            Some(e) => format!(
                "embedding request failed after {} attempts: {e}",
                self.retry_attempts
            ),
            None => "embedding request failed".to_string(),
        })
        .into())
    }
}

impl EmbeddingProvider for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>> {
        debug!("Embedding text ({} chars, task {})", text.len(), task.as_str());

        let request = EmbedRequest {
            model: &self.model,
            content: text,
            task_type: task.as_str(),
        };
        let body =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let response_text = self.post_json("/v1/embed", &body)?;
        let response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        if response.embedding.len() != self.dimension {
            return Err(BookragError::DimensionMismatch {
                expected: self.dimension,
                actual: response.embedding.len(),
            }
            .into());
        }

        Ok(response.embedding)
    }

    fn embed_many(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding batch of {} texts (task {})", texts.len(), task.as_str());

        let request = BatchEmbedRequest {
            model: &self.model,
            content: texts,
            task_type: task.as_str(),
        };
        let body = serde_json::to_string(&request)
            .context("Failed to serialize batch embedding request")?;

        let response_text = self.post_json("/v1/embed_batch", &body)?;
        let response: BatchEmbedResponse = serde_json::from_str(&response_text)
            .context("Failed to parse batch embedding response")?;

        if response.embeddings.len() != texts.len() {
            return Err(BookragError::Embedding(format!(
                "batch response has {} embeddings for {} texts",
                response.embeddings.len(),
                texts.len()
            ))
            .into());
        }

        Ok(response.embeddings)
    }
}
