//! An OpenAI-compatible chat-completions provider, grounded on subx-cli's
//! `services::ai::openai::OpenAIClient`.

use super::{Attachment, GenerateOptions, LlmClient, RateLimiter, RetryConfig, ThinkingLevel, retry_with_backoff};
use crate::Result;
use crate::config::LlmConfig;
use crate::error::OrchestratorError;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Calls a chat-completions endpoint compatible with the OpenAI API shape.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    retry_config: RetryConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl OpenAiCompatibleClient {
    /// Build a client from orchestrator configuration and a shared rate limiter.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::Config`] if `base_url` is not a valid
    /// `http(s)` URL, or if no API key is configured.
    pub fn from_config(config: &LlmConfig, rate_limiter: Arc<RateLimiter>) -> Result<Self> {
        let parsed = url::Url::parse(&config.base_url)
            .map_err(|e| OrchestratorError::config(format!("invalid llm.base_url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(OrchestratorError::config(
                "llm.base_url must be an http(s) URL with a host",
            ));
        }
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| OrchestratorError::config("llm.api_key is required"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OrchestratorError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            retry_config: RetryConfig {
                max_attempts: config.max_retries as usize,
                base_delay: Duration::from_millis(config.retry_backoff_base_ms),
                max_delay: Duration::from_secs(30),
                backoff_multiplier: 2.0,
            },
            rate_limiter,
        })
    }

    async fn chat_completion(&self, prompt: &str, opts: &GenerateOptions) -> Result<String> {
        let mut messages = vec![json!({ "role": "user", "content": self.render_prompt(prompt, opts) })];
        if opts.json_mode {
            messages.insert(
                0,
                json!({ "role": "system", "content": "Respond with a single valid JSON value only." }),
            );
        }
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if opts.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let timeout = self.effective_timeout(opts.thinking);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(Self::classify_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Self::classify_status_error(status, text));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::llm_transient(format!("malformed response body: {e}")))?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| OrchestratorError::llm_fatal("response had no message content"))
    }

    fn render_prompt(&self, prompt: &str, opts: &GenerateOptions) -> String {
        match &opts.attachment {
            None => prompt.to_string(),
            Some(Attachment::Uri { uri, .. }) => format!("{prompt}\n\nAttachment: {uri}"),
            Some(Attachment::Bytes { mime, bytes }) => {
                format!("{prompt}\n\nAttachment ({mime}, {} bytes) omitted from inline text.", bytes.len())
            }
        }
    }

    /// §4.A: extend the effective timeout for `thinking=high` to at least 1.5x
    /// the configured timeout or 300s, whichever is larger.
    fn effective_timeout(&self, thinking: ThinkingLevel) -> Duration {
        let base = self.client.timeout().unwrap_or(Duration::from_secs(120));
        match thinking {
            ThinkingLevel::High => {
                let scaled = Duration::from_secs_f64(base.as_secs_f64() * 1.5);
                scaled.max(Duration::from_secs(300))
            }
            _ => base,
        }
    }

    fn classify_transport_error(err: reqwest::Error) -> OrchestratorError {
        if err.is_timeout() {
            OrchestratorError::llm_transient(format!("request timed out: {err}"))
        } else if err.is_connect() {
            OrchestratorError::llm_transient(format!("connection failed: {err}"))
        } else {
            OrchestratorError::llm_transient(err.to_string())
        }
    }

    fn classify_status_error(status: reqwest::StatusCode, body: String) -> OrchestratorError {
        match status.as_u16() {
            401 | 403 => OrchestratorError::llm_fatal(format!("authentication rejected: {body}")),
            429 => OrchestratorError::llm_fatal(format!("quota exceeded: {body}")),
            500..=599 => OrchestratorError::llm_transient(format!("provider error {status}: {body}")),
            _ => OrchestratorError::llm_fatal(format!("request rejected ({status}): {body}")),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn generate(&self, prompt: &str, opts: &GenerateOptions) -> Result<String> {
        self.rate_limiter.acquire(self.provider_key()).await;
        retry_with_backoff(|| self.chat_completion(prompt, opts), &self.retry_config).await
    }

    fn provider_key(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> LlmConfig {
        LlmConfig {
            provider: "openai-compatible".into(),
            model: "test-model".into(),
            base_url,
            api_key: Some("test-key".into()),
            temperature: 0.5,
            rate_limit_interval_secs: 0.0,
            max_retries: 2,
            retry_backoff_base_ms: 5,
            request_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn generate_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "hello world" } }]
            })))
            .mount(&server)
            .await;

        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(0)));
        let client = OpenAiCompatibleClient::from_config(&test_config(server.uri()), limiter).unwrap();
        let result = client.generate("hi", &GenerateOptions::default()).await.unwrap();
        assert_eq!(result, "hello world");
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .expect(1)
            .mount(&server)
            .await;

        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(0)));
        let client = OpenAiCompatibleClient::from_config(&test_config(server.uri()), limiter).unwrap();
        let result = client.generate("hi", &GenerateOptions::default()).await;
        assert!(matches!(result, Err(OrchestratorError::LlmFatal(_))));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(0)));
        let mut config = test_config("ftp://example.com".into());
        config.base_url = "ftp://example.com".into();
        let result = OpenAiCompatibleClient::from_config(&config, limiter);
        assert!(result.is_err());
    }
}
