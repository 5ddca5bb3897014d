//! Run configuration: URL list, prompts, models, and thresholds.
//!
//! All tunables live in [`ReportConfig`]. The defaults reproduce the weekly
//! report job as shipped (two Naver news sections, Korean prompts); an
//! optional YAML file can override any subset of fields for ad-hoc runs:
//!
//! ```yaml
//! urls:
//!   - https://example.com/blog
//! max_retries: 3
//! output_path: report.md
//! ```
//!
//! The URL list is ordered and iteration order is report order.

use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::time::Duration;
use tracing::info;

/// Configuration for one report run.
///
/// Deserialized from YAML with every field optional; missing fields fall back
/// to [`ReportConfig::default`], which carries the built-in weekly job.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// URLs to analyze, in report order.
    pub urls: Vec<String>,
    /// Prompt for the per-page summary.
    pub summary_prompt: String,
    /// Prompt for the per-page keywords and insights.
    pub insight_prompt: String,
    /// Model used by the modern (chat completions) backend.
    pub model_modern: String,
    /// Model used by the legacy (text completions) backend.
    pub model_legacy: String,
    /// Sampling temperature for both backends.
    pub temperature: f32,
    /// Minimum length (characters) of extracted text; shorter pages are
    /// treated as extraction failures.
    pub min_text_len: usize,
    /// Minimum total size (characters) the HTML extractor must produce
    /// before the per-page minimum is even considered.
    pub min_extracted_hint: usize,
    /// Timeout for each page fetch, in seconds.
    pub fetch_timeout_secs: u64,
    /// Maximum characters of page text sent to the LLM per call.
    pub max_chars: usize,
    /// Maximum LLM call attempts before giving up on a completion.
    pub max_retries: usize,
    /// Base backoff delay in seconds; doubles on each failed attempt.
    pub base_delay_secs: f64,
    /// Pacing delay between URLs, in seconds.
    pub url_delay_secs: u64,
    /// Where the Markdown report is written.
    pub output_path: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            urls: vec![
                "https://news.naver.com/section/105".to_string(),
                "https://news.naver.com/section/104".to_string(),
            ],
            summary_prompt: "다음 글의 핵심 내용을 요약해줘".to_string(),
            insight_prompt: "이 글에서 중요한 키워드 5개와 그 설명을 알려줘".to_string(),
            model_modern: "gpt-4o-mini".to_string(),
            model_legacy: "gpt-4".to_string(),
            temperature: 0.3,
            min_text_len: 500,
            min_extracted_hint: 200,
            fetch_timeout_secs: 10,
            max_chars: 6000,
            max_retries: 5,
            base_delay_secs: 1.5,
            url_delay_secs: 2,
            output_path: "weekly_web_report.md".to_string(),
        }
    }
}

impl ReportConfig {
    /// Page fetch timeout as a [`Duration`].
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Base backoff delay as a [`Duration`].
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay_secs)
    }

    /// Inter-URL pacing delay as a [`Duration`].
    pub fn url_delay(&self) -> Duration {
        Duration::from_secs(self.url_delay_secs)
    }
}

/// Load the run configuration.
///
/// With no path, returns the built-in defaults. With a path, reads the file
/// and deserializes it; unspecified fields keep their default values.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid YAML. Config
/// problems are startup-fatal, so this is the one place deserialization
/// errors propagate.
pub fn load_config(path: Option<&str>) -> Result<ReportConfig, Box<dyn Error>> {
    match path {
        None => Ok(ReportConfig::default()),
        Some(p) => {
            let raw = fs::read_to_string(p)?;
            let config: ReportConfig = serde_yaml::from_str(&raw)?;
            info!(path = %p, urls = config.urls.len(), "Loaded configuration file");
            Ok(config)
        }
    }
}
