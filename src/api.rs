//! LLM API interaction with exponential backoff retry logic.
//!
//! This module provides the interface to an OpenAI-compatible API for the
//! report pipeline. It covers:
//!
//! - [`Complete`]: Core trait defining one completion exchange
//! - [`LlmBackend`]: Two capability-equivalent backends (chat completions and
//!   the older text completions endpoint), probed once at startup
//! - [`RetryCompletion`]: Decorator adding truncation, bounded retry, and
//!   exponential backoff to any [`Complete`] implementation
//!
//! # Retry Strategy
//!
//! Attempts are capped (default 5) with pure exponential backoff and no
//! jitter: the delay after failed attempt `i` (0-based) is
//! `base_delay * 2^i`, and no sleep follows the final failure. Retry
//! exhaustion is converted into an inline error string carrying
//! [`ERROR_MARKER`] rather than an error value, so one dead endpoint still
//! produces a complete report.

use crate::config::ReportConfig;
use crate::utils::{truncate_chars, truncate_for_log};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Marker prefixed to every inline error string embedded in the report.
pub const ERROR_MARKER: &str = "[ERROR]";

/// Fixed system instruction sent with every completion.
const SYSTEM_PROMPT: &str = "간결하고 정확하게 한국어로 답변하세요.";

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Timeout for a single LLM HTTP call. Generous because completions for long
/// documents routinely take tens of seconds.
const LLM_CALL_TIMEOUT: Duration = Duration::from_secs(90);

/// Trait for one LLM completion exchange.
///
/// Implementors take a system instruction and a user message and return the
/// model's textual response. This abstraction is the seam between the retry
/// decorator and the concrete HTTP backends, and is what tests mock.
pub trait Complete {
    /// Send one system + user message pair and return the response text.
    ///
    /// An empty or absent response body yields `Ok("")`; callers substitute
    /// their own placeholder.
    async fn complete(&self, system: &str, user: &str) -> Result<String, Box<dyn Error>>;
}

impl<T: Complete> Complete for &T {
    async fn complete(&self, system: &str, user: &str) -> Result<String, Box<dyn Error>> {
        (**self).complete(system, user).await
    }
}

// ---- Wire types ----

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct TextCompletionRequest<'a> {
    model: &'a str,
    prompt: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct TextCompletionResponse {
    choices: Vec<TextCompletionChoice>,
}

#[derive(Deserialize)]
struct TextCompletionChoice {
    text: Option<String>,
}

// ---- Backends ----

/// Client for the chat completions endpoint (`POST /v1/chat/completions`).
pub struct ModernClient {
    http: reqwest::Client,
    model: String,
    temperature: f32,
}

impl ModernClient {
    /// Construct the client, baking the credential into default headers.
    ///
    /// # Errors
    ///
    /// Fails if the credential is not a valid header value or the HTTP
    /// client cannot be built; [`LlmBackend::select`] treats either as
    /// "modern unavailable" and falls back.
    pub fn new(api_key: &str, model: &str, temperature: f32) -> Result<Self, Box<dyn Error>> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(LLM_CALL_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            model: model.to_string(),
            temperature,
        })
    }
}

impl fmt::Debug for ModernClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModernClient")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Complete for ModernClient {
    #[instrument(level = "debug", skip_all)]
    async fn complete(&self, system: &str, user: &str) -> Result<String, Box<dyn Error>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };
        let response = self
            .http
            .post(format!("{OPENAI_API_BASE}/chat/completions"))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(preview = %truncate_for_log(&content, 200), "Chat completion response");
        Ok(content)
    }
}

/// Client for the older text completions endpoint (`POST /v1/completions`).
///
/// Messages are flattened into a single prompt string, which is how the
/// pre-chat API generation consumed instructions.
pub struct LegacyClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl LegacyClient {
    pub fn new(api_key: &str, model: &str, temperature: f32) -> Result<Self, Box<dyn Error>> {
        let http = reqwest::Client::builder()
            .timeout(LLM_CALL_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
        })
    }
}

impl fmt::Debug for LegacyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyClient")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Complete for LegacyClient {
    #[instrument(level = "debug", skip_all)]
    async fn complete(&self, system: &str, user: &str) -> Result<String, Box<dyn Error>> {
        let request = TextCompletionRequest {
            model: &self.model,
            prompt: format!("{system}\n\n{user}"),
            temperature: self.temperature,
        };
        let response = self
            .http
            .post(format!("{OPENAI_API_BASE}/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<TextCompletionResponse>()
            .await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.text)
            .unwrap_or_default();
        debug!(preview = %truncate_for_log(&content, 200), "Text completion response");
        Ok(content)
    }
}

/// The backend selected at startup.
///
/// Exactly one variant is active for the life of the process: construction
/// of the modern client is probed first, and any failure falls back to the
/// legacy client. The choice is made once and never re-evaluated.
#[derive(Debug)]
pub enum LlmBackend {
    Modern(ModernClient),
    Legacy(LegacyClient),
}

impl LlmBackend {
    /// Probe the modern backend and fall back to the legacy one.
    ///
    /// # Errors
    ///
    /// Only fails if neither client can be constructed, which is a
    /// startup-fatal configuration problem.
    pub fn select(api_key: &str, config: &ReportConfig) -> Result<Self, Box<dyn Error>> {
        match ModernClient::new(api_key, &config.model_modern, config.temperature) {
            Ok(client) => {
                info!(model = %config.model_modern, "Using chat completions backend");
                Ok(Self::Modern(client))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    model = %config.model_legacy,
                    "Chat completions client unavailable; falling back to text completions"
                );
                let client = LegacyClient::new(api_key, &config.model_legacy, config.temperature)?;
                Ok(Self::Legacy(client))
            }
        }
    }
}

impl Complete for LlmBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, Box<dyn Error>> {
        match self {
            Self::Modern(client) => client.complete(system, user).await,
            Self::Legacy(client) => client.complete(system, user).await,
        }
    }
}

// ---- Retry decorator ----

/// Tunables for [`RetryCompletion`], usually taken from [`ReportConfig`].
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum characters of document text sent per call.
    pub max_chars: usize,
    /// Maximum call attempts before giving up.
    pub max_retries: usize,
    /// Delay after the first failed attempt; doubles on each further failure.
    pub base_delay: Duration,
}

impl RetryOptions {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
        }
    }
}

/// Wrapper that adds truncation, bounded retry, and exponential backoff to
/// any [`Complete`] implementation.
///
/// [`RetryCompletion::ask`] never fails: terminal outcomes are inline
/// strings prefixed with [`ERROR_MARKER`], which the report builder embeds
/// verbatim. One call blocks the pipeline until it resolves or exhausts its
/// attempts; that is deliberate, the whole run is sequential.
pub struct RetryCompletion<T> {
    inner: T,
    opts: RetryOptions,
}

impl<T> fmt::Debug for RetryCompletion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryCompletion")
            .field("opts", &self.opts)
            .finish()
    }
}

impl<T: Complete> RetryCompletion<T> {
    pub fn new(inner: T, opts: RetryOptions) -> Self {
        Self { inner, opts }
    }

    /// Ask the backend to respond to `prompt` applied to `text`.
    ///
    /// The document text is truncated to `max_chars` characters before
    /// sending; the fixed system instruction plus `"{prompt}\n\n{text}"`
    /// form the exchange. Failed attempts back off as `base_delay * 2^i`
    /// with no sleep after the final failure.
    ///
    /// # Returns
    ///
    /// - the model's response on success (empty string for an empty
    ///   response),
    /// - `"[ERROR] GPT 호출 실패: …"` when all attempts fail,
    /// - `"[ERROR] GPT 래퍼 오류: …"` for failures outside the retry loop.
    #[instrument(level = "info", skip_all)]
    pub async fn ask(&self, prompt: &str, text: &str) -> String {
        match self.ask_inner(prompt, text).await {
            Ok(response) => response,
            Err(e) => format!("{ERROR_MARKER} GPT 래퍼 오류: {e}"),
        }
    }

    async fn ask_inner(&self, prompt: &str, text: &str) -> Result<String, Box<dyn Error>> {
        if self.opts.max_retries == 0 {
            return Err("재시도 횟수가 0으로 설정되어 호출할 수 없습니다".into());
        }

        let body = truncate_chars(text, self.opts.max_chars);
        let user = format!("{prompt}\n\n{body}");

        for attempt in 0..self.opts.max_retries {
            match self.inner.complete(SYSTEM_PROMPT, &user).await {
                Ok(response) => {
                    debug!(attempt, chars = response.chars().count(), "Completion succeeded");
                    return Ok(response);
                }
                Err(e) => {
                    let is_last = attempt + 1 == self.opts.max_retries;
                    if is_last {
                        error!(
                            attempt,
                            max = self.opts.max_retries,
                            error = %e,
                            "Completion exhausted retries"
                        );
                        return Ok(format!("{ERROR_MARKER} GPT 호출 실패: {e}"));
                    }
                    let delay = self.opts.base_delay.mul_f64(2f64.powi(attempt as i32));
                    warn!(
                        attempt,
                        max = self.opts.max_retries,
                        ?delay,
                        error = %e,
                        "Completion attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }

        Ok(format!("{ERROR_MARKER} GPT 호출 실패: 재시도 초과"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Fails the first `failures` calls, then succeeds with `response`.
    struct FlakyBackend {
        failures: usize,
        response: String,
        calls: Cell<usize>,
    }

    impl FlakyBackend {
        fn new(failures: usize, response: &str) -> Self {
            Self {
                failures,
                response: response.to_string(),
                calls: Cell::new(0),
            }
        }
    }

    impl Complete for FlakyBackend {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, Box<dyn Error>> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            if call < self.failures {
                Err("simulated transient failure".into())
            } else {
                Ok(self.response.clone())
            }
        }
    }

    /// Records every user message it receives and echoes a fixed response.
    struct RecordingBackend {
        seen: RefCell<Vec<String>>,
    }

    impl RecordingBackend {
        fn new() -> Self {
            Self {
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Complete for RecordingBackend {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, Box<dyn Error>> {
            self.seen.borrow_mut().push(user.to_string());
            Ok("ok".to_string())
        }
    }

    fn opts(max_retries: usize) -> RetryOptions {
        RetryOptions {
            max_chars: 6000,
            max_retries,
            base_delay: Duration::from_secs_f64(1.5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_max_retries() {
        let backend = FlakyBackend::new(usize::MAX, "never");
        let retry = RetryCompletion::new(&backend, opts(5));

        let start = tokio::time::Instant::now();
        let result = retry.ask("요약해줘", "본문").await;

        assert!(result.starts_with(ERROR_MARKER));
        assert!(result.contains("GPT 호출 실패"));
        assert_eq!(backend.calls.get(), 5);
        // backoff after attempts 0..=3 only: 1.5 * (1 + 2 + 4 + 8) = 22.5s,
        // no sleep after the final failure
        assert_eq!(start.elapsed(), Duration::from_millis(22_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_k_failures() {
        let backend = FlakyBackend::new(3, "살아났다");
        let retry = RetryCompletion::new(&backend, opts(5));

        let result = retry.ask("요약해줘", "본문").await;

        assert_eq!(result, "살아났다");
        assert_eq!(backend.calls.get(), 4);
    }

    #[tokio::test]
    async fn test_immediate_success_makes_one_call() {
        let backend = FlakyBackend::new(0, "바로 성공");
        let retry = RetryCompletion::new(&backend, opts(5));

        let result = retry.ask("요약해줘", "본문").await;

        assert_eq!(result, "바로 성공");
        assert_eq!(backend.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_passes_through() {
        let backend = FlakyBackend::new(0, "");
        let retry = RetryCompletion::new(&backend, opts(5));

        assert_eq!(retry.ask("요약해줘", "본문").await, "");
    }

    #[tokio::test]
    async fn test_long_text_truncated_to_exactly_max_chars() {
        let backend = RecordingBackend::new();
        let retry = RetryCompletion::new(&backend, opts(5));

        let text = "가".repeat(7000);
        retry.ask("P", &text).await;

        let seen = backend.seen.borrow();
        let body = seen[0].strip_prefix("P\n\n").unwrap();
        assert_eq!(body.chars().count(), 6000);
    }

    #[tokio::test]
    async fn test_short_text_sent_unmodified() {
        let backend = RecordingBackend::new();
        let retry = RetryCompletion::new(&backend, opts(5));

        retry.ask("P", "짧은 본문").await;

        let seen = backend.seen.borrow();
        assert_eq!(seen[0], "P\n\n짧은 본문");
    }

    #[tokio::test]
    async fn test_zero_retries_yields_wrapper_error_marker() {
        let backend = FlakyBackend::new(0, "unreachable");
        let retry = RetryCompletion::new(&backend, opts(0));

        let result = retry.ask("요약해줘", "본문").await;

        assert!(result.starts_with(ERROR_MARKER));
        assert!(result.contains("GPT 래퍼 오류"));
        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn test_chat_response_deserialization() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"안녕"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        assert_eq!(content.as_deref(), Some("안녕"));
    }

    #[test]
    fn test_chat_response_null_content() {
        let json = r#"{"choices":[{"message":{"content":null}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        assert_eq!(content, "");
    }

    #[test]
    fn test_text_completion_response_deserialization() {
        let json = r#"{"choices":[{"text":"legacy answer"}]}"#;
        let parsed: TextCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices.into_iter().next().and_then(|c| c.text).as_deref(),
            Some("legacy answer")
        );
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: "질문\n\n본문",
                },
            ],
            temperature: 0.3,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "질문\n\n본문");
    }

    #[test]
    fn test_backend_selection_prefers_modern() {
        let config = ReportConfig::default();
        let backend = LlmBackend::select("sk-test", &config).unwrap();
        assert!(matches!(backend, LlmBackend::Modern(_)));
    }

    #[test]
    fn test_backend_selection_falls_back_on_bad_credential() {
        // a newline is not a valid header value, so the modern probe fails
        let config = ReportConfig::default();
        let backend = LlmBackend::select("sk-bad\nkey", &config).unwrap();
        assert!(matches!(backend, LlmBackend::Legacy(_)));
    }
}
