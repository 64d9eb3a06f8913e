//! Error taxonomy for the generation orchestrator.
//!
//! Every variant maps to one row of the error taxonomy table: whether it is
//! surfaced to the submitting client, whether it is retried internally, and
//! what its `kind()` string is for `TaskState.error`.
use thiserror::Error;

/// All errors the orchestrator's components can produce.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The submitted URL or document could not be understood.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transcript or document extraction produced no usable content.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The bounded submission queue was full at submit time.
    #[error("queue is full")]
    QueueFull,

    /// The orchestrator or an LLM provider is misconfigured.
    #[error("configuration error: {0}")]
    Config(String),

    /// A transient LLM failure (network, timeout); callers may retry.
    #[error("transient LLM failure: {0}")]
    LlmTransient(String),

    /// A fatal LLM failure (auth, quota); never retried.
    #[error("LLM error: {0}")]
    LlmFatal(String),

    /// The outline could not be parsed into a usable plan.
    #[error("outline parse error: {0}")]
    OutlineParse(String),

    /// `mode=ultra` exceeded the chapter-count safety bound after one regeneration.
    #[error("chapter count exceeded the ultra-mode limit")]
    ChapterCountExceeded,

    /// A task exceeded its per-task hard deadline.
    #[error("task {task_id} timed out after {elapsed:?}")]
    Timeout {
        /// The task that timed out.
        task_id: String,
        /// How long the task had run before being torn down.
        elapsed: std::time::Duration,
    },

    /// I/O failure reading or writing orchestrator state.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for everything else.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Specialized `Result` type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

impl OrchestratorError {
    /// Create an [`OrchestratorError::InvalidInput`].
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an [`OrchestratorError::SourceUnavailable`].
    pub fn source_unavailable<S: Into<String>>(message: S) -> Self {
        Self::SourceUnavailable(message.into())
    }

    /// Create an [`OrchestratorError::Config`].
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create an [`OrchestratorError::LlmTransient`].
    pub fn llm_transient<S: Into<String>>(message: S) -> Self {
        Self::LlmTransient(message.into())
    }

    /// Create an [`OrchestratorError::LlmFatal`].
    pub fn llm_fatal<S: Into<String>>(message: S) -> Self {
        Self::LlmFatal(message.into())
    }

    /// Create an [`OrchestratorError::OutlineParse`].
    pub fn outline_parse<S: Into<String>>(message: S) -> Self {
        Self::OutlineParse(message.into())
    }

    /// Create an [`OrchestratorError::Timeout`].
    pub fn timeout(task_id: impl Into<String>, elapsed: std::time::Duration) -> Self {
        Self::Timeout {
            task_id: task_id.into(),
            elapsed,
        }
    }

    /// Map a `config` crate error into [`OrchestratorError::Config`].
    pub fn from_config_crate(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }

    /// The stable taxonomy string from spec §7, used in the surfaced error record.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::QueueFull => "queue_full",
            Self::Config(_) => "config_error",
            Self::LlmTransient(_) => "llm_transient",
            Self::LlmFatal(_) => "analysis_error",
            Self::OutlineParse(_) => "outline_parse_error",
            Self::ChapterCountExceeded => "chapter_count_exceeded",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) | Self::Other(_) => "unknown",
        }
    }

    /// Whether LLMClient/workflow retry loops should attempt this error again.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::LlmTransient(_))
    }

    /// Whether this error is surfaced to the submitting client, per spec §7.
    /// `llm_transient` is retried internally and never reaches the client on
    /// its own — only the `analysis_error` it turns into after retries does.
    pub fn surfaced(&self) -> bool {
        !matches!(self, Self::LlmTransient(_))
    }

    /// Process exit code for the demo CLI's `main`, grouped by taxonomy kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) => 2,
            Self::SourceUnavailable(_) => 3,
            Self::QueueFull => 4,
            Self::Config(_) => 5,
            Self::LlmFatal(_) => 6,
            Self::OutlineParse(_) => 7,
            Self::ChapterCountExceeded => 8,
            Self::Timeout { .. } => 9,
            Self::LlmTransient(_) | Self::Io(_) | Self::Other(_) => 1,
        }
    }

    /// A message plus its suggestions, joined for terminal display.
    pub fn user_friendly_message(&self) -> String {
        let suggestions = self.suggestions();
        if suggestions.is_empty() {
            self.to_string()
        } else {
            format!("{self}\n  - {}", suggestions.join("\n  - "))
        }
    }

    /// Short, human-readable suggestions to accompany a surfaced error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidInput(_) => vec!["Check the submitted URL or file format.".into()],
            Self::SourceUnavailable(_) => {
                vec!["Confirm the source has a readable transcript or text.".into()]
            }
            Self::QueueFull => vec!["Retry after the queue has drained.".into()],
            Self::Config(_) => vec!["Check the orchestrator's LLM provider configuration.".into()],
            Self::LlmFatal(_) => vec!["Check LLM provider credentials and quota.".into()],
            Self::OutlineParse(_) => vec!["The source content may be too short or unclear.".into()],
            Self::ChapterCountExceeded => {
                vec!["Use `deep` mode, or shorten the source content.".into()]
            }
            Self::Timeout { .. } => vec!["Retry; consider a shorter source or `deep` mode.".into()],
            _ => vec!["Please report this issue.".into()],
        }
    }
}
