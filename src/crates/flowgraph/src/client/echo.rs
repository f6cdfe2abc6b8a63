//! Offline completion provider
//!
//! Echoes the rendered prompt back. Useful for dry runs of a workflow and
//! for the CLI when no model backend is wired in.

use crate::error::Result;
use crate::services::{Completion, CompletionProvider, ModelConfig};
use async_trait::async_trait;

/// Completion provider that answers `AI response to: <prompt>`
#[derive(Debug, Clone, Default)]
pub struct EchoCompletion {
    /// Cost charged per 1000 estimated tokens
    pub cost_per_1k_tokens: f64,
}

impl EchoCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cost_per_1k_tokens(mut self, cost: f64) -> Self {
        self.cost_per_1k_tokens = cost;
        self
    }

    /// Rough token estimate: one token per four characters, at least one
    fn estimate_tokens(text: &str) -> u64 {
        let chars = text.chars().count() as u64;
        chars.div_ceil(4).max(1)
    }
}

#[async_trait]
impl CompletionProvider for EchoCompletion {
    async fn complete(&self, prompt: &str, _model: &ModelConfig) -> Result<Completion> {
        let text = format!("AI response to: {}", prompt);
        let tokens_used = Self::estimate_tokens(prompt) + Self::estimate_tokens(&text);
        Ok(Completion {
            cost: tokens_used as f64 / 1000.0 * self.cost_per_1k_tokens,
            tokens_used,
            text,
        })
    }
}
