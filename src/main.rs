//! # Weekly Web Report
//!
//! A single-pass batch job that fetches a fixed list of web pages, extracts
//! their main textual content, asks an OpenAI-compatible LLM for a summary
//! and for keywords with insights, and writes everything into one Markdown
//! report.
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=sk-... weekly_web_report
//! ```
//!
//! ## Architecture
//!
//! The pipeline is deliberately sequential:
//! 1. **Extraction**: Download each page and reduce it to clean body text
//! 2. **Completion**: Two LLM calls per page (summary, keywords/insights),
//!    each with bounded retry and exponential backoff
//! 3. **Output**: Render all sections and write `weekly_web_report.md` once
//!
//! Failures never abort the run after startup: fetch, extraction, and LLM
//! failures are all downgraded to notices inside the report. The only fatal
//! error is a missing API credential.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod cli;
mod config;
mod extract;
mod models;
mod report;
mod utils;

use api::{LlmBackend, RetryCompletion, RetryOptions};
use cli::Cli;
use config::load_config;
use report::{WebExtractor, build_report, render_report, write_report};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("weekly_web_report starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.output, "Parsed CLI arguments");

    // --- Config ---
    let mut config = load_config(args.config.as_deref())?;
    if let Some(output) = args.output {
        config.output_path = output;
    }
    info!(
        urls = config.urls.len(),
        output = %config.output_path,
        "Configuration loaded"
    );

    // --- Credential check, before any URL is touched ---
    let api_key = args
        .openai_api_key
        .as_deref()
        .map(str::trim)
        .unwrap_or("");
    if api_key.is_empty() {
        error!("OPENAI_API_KEY is not set");
        return Err("OPENAI_API_KEY 환경변수가 설정되어 있지 않습니다.".into());
    }

    // --- Backend selection, once for the life of the process ---
    let backend = LlmBackend::select(api_key, &config)?;
    let llm = RetryCompletion::new(&backend, RetryOptions::from_config(&config));

    let fetch_client = reqwest::Client::builder()
        .timeout(config.fetch_timeout())
        .build()?;
    let extractor = WebExtractor {
        client: &fetch_client,
        config: &config,
    };

    // --- Run the pipeline ---
    let sections = build_report(&config, &extractor, &llm).await;

    let analyzed = sections
        .iter()
        .filter(|s| matches!(s.result, models::SectionResult::Analyzed { .. }))
        .count();
    info!(
        total = sections.len(),
        analyzed,
        failed = sections.len() - analyzed,
        "Completed URL processing"
    );

    // --- Render and write, once ---
    let date = Local::now().date_naive().to_string();
    let markdown = render_report(&date, &sections);
    write_report(&config.output_path, &markdown).await?;

    let elapsed = start_time.elapsed();
    info!(?elapsed, path = %config.output_path, "Execution complete");
    println!("보고서 생성 완료: {}", config.output_path);

    Ok(())
}
