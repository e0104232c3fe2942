use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// Relevance coefficients keyed by comment id, each in [0, 1].
pub type Relevances = HashMap<String, f64>;

/// External service returning relevance coefficients for a batch of
/// comments. One call per prompt; the response must be a structured JSON
/// mapping whose cardinality the caller validates.
#[async_trait]
pub trait RelevanceProvider: Send + Sync {
    async fn score(&self, prompt: &str, max_tokens: u32) -> Result<Relevances>;
    fn name(&self) -> &str;
}
