mod client;
pub mod interpreter;
pub mod prompts;
pub mod retry;

pub use client::ModelClient;
pub use interpreter::{interpret, FilterVerdict, ParseFailure, ResponseSchema, SummaryText};
pub use retry::{parse_retry_hint, retry_delay_from_secs, Attempt, Pacer, RetryPolicy, MAX_RETRY_DELAY};

use async_trait::async_trait;

use crate::error::Result;

/// Sampling settings for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

/// A text-in, text-out model endpoint.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    fn model_version(&self) -> &str;
}
