//! Configuration management for the generation orchestrator.
//!
//! Configuration is loaded from an optional TOML file, overridden by
//! `INSIGHT_FORGE_*` environment variables, and falls back to the defaults
//! below. Nothing in this crate reads configuration through a global; every
//! component receives its settings through [`Config`] at construction time.

mod service;
mod test_service;

pub use service::{ConfigService, ProductionConfigService};
pub use test_service::TestConfigService;

use serde::{Deserialize, Serialize};

/// Root configuration object, grouped by the subsystem that owns each section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// LLM provider connection and generation parameters.
    pub llm: LlmConfig,
    /// Generation pipeline behavior (chapter modes, retry policy, limits).
    pub generation: GenerationConfig,
    /// Worker pool and queue sizing.
    pub parallel: ParallelConfig,
    /// Filesystem locations the orchestrator reads and writes.
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            generation: GenerationConfig::default(),
            parallel: ParallelConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// LLM provider configuration (§4.A, §6 config table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// Provider identifier, e.g. `"openai-compatible"`.
    pub provider: String,
    /// Model name passed to the provider.
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions endpoint.
    pub base_url: String,
    /// API key; read from `INSIGHT_FORGE_LLM__API_KEY` in practice.
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Minimum seconds between calls to the same provider (`rate_limit_interval`).
    pub rate_limit_interval_secs: f64,
    /// Maximum retry attempts for a transient LLM failure (`max_retries`).
    pub max_retries: u32,
    /// Base delay for exponential backoff (`retry_backoff_base`), in milliseconds.
    pub retry_backoff_base_ms: u64,
    /// Request timeout for a `thinking=low|medium` call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai-compatible".to_string(),
            model: "gpt-4.1-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            temperature: 0.7,
            rate_limit_interval_secs: 1.0,
            max_retries: 3,
            retry_backoff_base_ms: 1000,
            request_timeout_secs: 120,
        }
    }
}

/// Chapter-generation mode, mirrored from §4.F's two generation strategies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// One LLM call per chapter, staggered by `concurrent_delay`.
    Concurrent,
    /// Chapters generated one at a time, each seeing prior chapters.
    Sequential,
}

/// Generation pipeline configuration (§6 config table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// Chapter stage strategy.
    pub mode: GenerationMode,
    /// Stagger, in seconds, between parallel chapter LLM calls.
    pub concurrent_delay_secs: f64,
    /// Hard cap on chapters in `ultra` mode before `chapter_count_exceeded`.
    pub ultra_chapter_limit: usize,
    /// Maximum accepted size, in bytes, for plain-text/Markdown uploads.
    pub max_text_file_size: u64,
    /// Maximum accepted size, in bytes, for binary (PDF/Office) uploads.
    pub max_binary_file_size: u64,
    /// Whether a workflow pauses at `awaiting_confirmation` after the
    /// outline stage, exposing its pre-analysis profile for an external
    /// `confirm` call (§4.F's optional confirmation variant).
    pub require_confirmation: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: GenerationMode::Concurrent,
            concurrent_delay_secs: 0.5,
            ultra_chapter_limit: 20,
            max_text_file_size: 2 * 1024 * 1024,
            max_binary_file_size: 20 * 1024 * 1024,
            require_confirmation: false,
        }
    }
}

/// Worker pool and queue configuration (§4.I, §6 config table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParallelConfig {
    /// Number of concurrent workflow workers (`N_WORKERS`).
    pub n_workers: usize,
    /// Bounded queue capacity (`QUEUE_MAX`); `submit` fails fast beyond this.
    pub queue_max: usize,
    /// Per-task hard deadline, in seconds (`TASK_TIMEOUT`).
    pub task_timeout_secs: u64,
    /// Bound on the number of log lines retained per task.
    pub log_ring_capacity: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            n_workers: num_cpus::get().clamp(1, 8),
            queue_max: 64,
            task_timeout_secs: 3600,
            log_ring_capacity: 500,
        }
    }
}

/// On-disk layout configuration (§6 filesystem layout).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Directory holding finalized Markdown reports.
    pub documents_dir: String,
    /// Directory holding per-task scratch directories.
    pub tasks_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            documents_dir: "documents".to_string(),
            tasks_dir: "tasks".to_string(),
        }
    }
}
