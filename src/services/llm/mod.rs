//! The `LLMClient` capability (§4.A): generates text from a prompt, honoring
//! per-provider rate limits, retries, and timeouts.

pub mod openai_compatible;
pub mod rate_limiter;
pub mod retry;

pub use openai_compatible::OpenAiCompatibleClient;
pub use rate_limiter::RateLimiter;
pub use retry::{RetryConfig, retry_with_backoff};

use crate::Result;
use async_trait::async_trait;

/// Latency/reasoning-depth hint passed to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingLevel {
    /// Used for chapter-body calls, per spec §4.F.
    Low,
    /// Default level when the caller has no preference.
    Medium,
    /// Extends the effective timeout to at least 1.5x or 300s.
    High,
}

impl Default for ThinkingLevel {
    fn default() -> Self {
        Self::Medium
    }
}

/// An attachment accompanying a prompt (document upload, image, etc.).
#[derive(Debug, Clone)]
pub enum Attachment {
    /// Bytes already resident in memory, with a MIME type.
    Bytes { mime: String, bytes: Vec<u8> },
    /// A remote URI the provider can fetch directly.
    Uri { mime: String, uri: String },
}

/// Options controlling a single [`LlmClient::generate`] call.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Ask the provider to constrain output to valid JSON.
    pub json_mode: bool,
    /// Reasoning-depth hint.
    pub thinking: ThinkingLevel,
    /// Optional attachment to accompany the prompt.
    pub attachment: Option<Attachment>,
}

/// Capability for generating text from a prompt, per spec §4.A.
///
/// Implementations must gate every call through a [`RateLimiter`] keyed by
/// provider, retry transient failures with backoff, and never retry
/// `InvalidAuth`/`InvalidInput`/`QuotaExceeded`-shaped failures.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a full textual response for `prompt`.
    async fn generate(&self, prompt: &str, opts: &GenerateOptions) -> Result<String>;

    /// The provider key this client gates its calls under (for the shared
    /// [`RateLimiter`]).
    fn provider_key(&self) -> &str;
}
