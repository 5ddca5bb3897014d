//! Report building: drive the pipeline and render the Markdown document.
//!
//! The builder walks the configured URL list in order. For each URL it
//! extracts the main text and asks the LLM twice (summary, then keywords and
//! insights), recording a [`SectionOutcome`] no matter what happened; every
//! failure mode becomes report text, never an aborted run. A fixed pacing
//! delay follows every URL regardless of outcome.
//!
//! Rendering is a separate, pure step: identical outcomes produce
//! byte-identical Markdown. The document is written once, at the end of the
//! run, overwriting any previous report.

use crate::api::{Complete, RetryCompletion};
use crate::config::ReportConfig;
use crate::extract::extract_main_text;
use crate::models::{Document, SectionOutcome, SectionResult};
use indicatif::ProgressBar;
use std::error::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument};
use url::Url;

/// First line of every report.
pub const REPORT_TITLE: &str = "# 자동 분석 보고서";
/// Notice recorded when a page yields no usable text.
pub const EXTRACTION_FAILED_NOTICE: &str = "본문 추출 실패 또는 너무 짧음";
/// Placeholder substituted for a blank model response.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "(빈 응답)";
const SEPARATOR: &str = "---";

/// Source of extracted documents.
///
/// The production implementation fetches over HTTP; tests substitute fixed
/// documents to keep runs deterministic.
pub trait ExtractSource {
    async fn extract(&self, url: &str) -> Option<Document>;
}

/// [`ExtractSource`] backed by real page fetches.
#[derive(Debug)]
pub struct WebExtractor<'a> {
    pub client: &'a reqwest::Client,
    pub config: &'a ReportConfig,
}

impl ExtractSource for WebExtractor<'_> {
    async fn extract(&self, url: &str) -> Option<Document> {
        extract_main_text(self.client, url, self.config).await
    }
}

/// Process every configured URL, in order, and collect one outcome each.
///
/// Per-URL failures are recorded in the outcome and the loop continues; the
/// returned vector always has one entry per input URL, in input order. The
/// console progress bar advances once per URL, and the configured pacing
/// delay runs after every URL whatever its outcome.
#[instrument(level = "info", skip_all, fields(urls = config.urls.len()))]
pub async fn build_report<E, C>(
    config: &ReportConfig,
    extractor: &E,
    llm: &RetryCompletion<C>,
) -> Vec<SectionOutcome>
where
    E: ExtractSource,
    C: Complete,
{
    let progress = ProgressBar::new(config.urls.len() as u64);
    let mut sections = Vec::with_capacity(config.urls.len());

    for url in &config.urls {
        progress.set_message(url.clone());
        let result = match process_url(config, extractor, llm, url).await {
            Ok(result) => result,
            Err(e) => {
                error!(%url, error = %e, "Unexpected failure while processing URL");
                SectionResult::Error(e.to_string())
            }
        };
        sections.push(SectionOutcome {
            url: url.clone(),
            result,
        });
        progress.inc(1);

        // pacing between LLM bursts, applied even after a failed URL
        sleep(config.url_delay()).await;
    }

    progress.finish_with_message("완료");
    sections
}

/// Process one URL: extract, then summarize and extract keywords.
///
/// Extraction failure is an expected outcome, not an error; the `Err` path
/// only carries failures outside the normal flow (currently an unparseable
/// URL), which the caller records as an inline error line.
///
/// The up-front parse is deliberate: a malformed URL is a configuration
/// mistake, so it is reported as an "에러 발생" line naming the parse error
/// instead of the extraction-failure notice a dead-but-valid URL gets.
async fn process_url<E, C>(
    config: &ReportConfig,
    extractor: &E,
    llm: &RetryCompletion<C>,
    url: &str,
) -> Result<SectionResult, Box<dyn Error>>
where
    E: ExtractSource,
    C: Complete,
{
    Url::parse(url)?;

    let Some(document) = extractor.extract(url).await else {
        return Ok(SectionResult::ExtractionFailed);
    };

    let summary = llm.ask(&config.summary_prompt, &document.text).await;
    let insight = llm.ask(&config.insight_prompt, &document.text).await;

    Ok(SectionResult::Analyzed { summary, insight })
}

/// Render the collected outcomes into the final Markdown document.
///
/// Pure and deterministic: the same `date` and `sections` always produce the
/// same bytes. `date` is the generation date shown under the title; the
/// caller supplies it so rendering stays reproducible.
pub fn render_report(date: &str, sections: &[SectionOutcome]) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(REPORT_TITLE.to_string());
    lines.push(String::new());
    lines.push(format!("생성일: {date}"));
    lines.push(String::new());

    for section in sections {
        lines.push(format!("## URL: {}", section.url));
        lines.push(String::new());
        match &section.result {
            SectionResult::Analyzed { summary, insight } => {
                lines.push("### 요약".to_string());
                lines.push(or_placeholder(summary));
                lines.push(String::new());
                lines.push("### 주요 키워드와 인사이트".to_string());
                lines.push(or_placeholder(insight));
                lines.push(String::new());
            }
            SectionResult::ExtractionFailed => {
                lines.push(EXTRACTION_FAILED_NOTICE.to_string());
            }
            SectionResult::Error(e) => {
                lines.push(format!("에러 발생: {e}"));
            }
        }
        lines.push(SEPARATOR.to_string());
    }

    lines.join("\n")
}

fn or_placeholder(response: &str) -> String {
    if response.is_empty() {
        EMPTY_RESPONSE_PLACEHOLDER.to_string()
    } else {
        response.to_string()
    }
}

/// Write the rendered report, overwriting any existing file.
#[instrument(level = "info", skip(content), fields(path = %path))]
pub async fn write_report(path: &str, content: &str) -> Result<(), Box<dyn Error>> {
    tokio::fs::write(path, content).await?;
    info!(bytes = content.len(), "Wrote report");
    Ok(())
}
