//! Shared scaffolding for end-to-end tests: a [`wiremock`] stub standing in
//! for an OpenAI-compatible provider, and a [`Config`] wired to point at a
//! scratch directory, mirroring subx-cli's `tests/common` helpers.

use insight_forge::config::Config;
use tempfile::TempDir;
use wiremock::MockServer;

/// A scratch environment for one test: a temp directory for `documents/`
/// and `tasks/`, plus a mock LLM server the test can program with
/// `wiremock::Mock::given(...)`.
pub struct TestEnv {
    pub dir: TempDir,
    pub server: MockServer,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let server = MockServer::start().await;
        Self { dir, server }
    }

    /// A [`Config`] pointed at this environment's scratch directories and
    /// mock server, with retries/rate-limiting dialed down so tests run fast.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.llm.base_url = self.server.uri();
        config.llm.api_key = Some("test-key".to_string());
        config.llm.rate_limit_interval_secs = 0;
        config.llm.max_retries = 2;
        config.llm.retry_backoff_base_ms = 1;
        config.generation.concurrent_delay_secs = 0;
        config.storage.documents_dir = self.dir.path().join("documents").to_string_lossy().to_string();
        config.storage.tasks_dir = self.dir.path().join("tasks").to_string_lossy().to_string();
        config
    }
}

/// Build a minimal OpenAI-chat-completions-shaped JSON body wrapping `content`.
pub fn chat_response(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [
            { "message": { "content": content } }
        ]
    })
}

/// A well-formed outline response with `n` chapters, fenced as JSON.
pub fn outline_response(title_cn: &str, n: usize) -> String {
    let chapters: Vec<_> = (1..=n)
        .map(|i| {
            serde_json::json!({
                "index": i,
                "title": format!("第 {i} 章"),
                "subsections": [],
                "must_include": [],
                "must_exclude": [],
            })
        })
        .collect();
    let body = serde_json::json!({
        "title_cn": title_cn,
        "introduction": "這是一篇引言。",
        "content_type": "technical",
        "chapters": chapters,
    });
    format!("# {title_cn}\n\n```json\n{body}\n```\n")
}
