//! Data models for extracted documents and report sections.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`Document`]: Cleaned main-body text extracted from a fetched page
//! - [`SectionOutcome`]: The per-URL processing result, one per report section
//! - [`SectionResult`]: What happened for a URL (analyzed, extraction failed,
//!   or an unexpected per-URL error)
//!
//! All of these are transient, in-memory values: the pipeline rebuilds them
//! from scratch on every run and nothing is persisted between runs.

/// Cleaned main-body text extracted from a fetched page.
///
/// A `Document` is only ever constructed after extraction succeeded, so its
/// text is free of HTML markup and comments and has already passed the
/// configured minimum-length check.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The extracted, whitespace-trimmed body text.
    pub text: String,
}

impl Document {
    pub fn new(text: String) -> Self {
        Self { text }
    }

    /// Length in characters, matching the threshold semantics used by the
    /// extractor's minimum-length check.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// The processing result for a single URL.
///
/// Every URL in the input list produces exactly one `SectionOutcome`, in list
/// order, and every outcome produces exactly one Markdown section in the
/// final report.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionOutcome {
    /// The URL this section reports on.
    pub url: String,
    /// What happened while processing the URL.
    pub result: SectionResult,
}

/// What happened while processing one URL.
///
/// Failures are values here, not errors: extraction and LLM failures are
/// recorded and rendered into the report rather than aborting the run.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionResult {
    /// Extraction succeeded and both LLM calls completed (each response may
    /// still be an inline error string from the retry wrapper, or empty).
    Analyzed {
        /// Response to the summarization prompt.
        summary: String,
        /// Response to the keywords-and-insights prompt.
        insight: String,
    },
    /// The page could not be fetched, yielded no extractable text, or the
    /// extracted text was shorter than the configured minimum.
    ExtractionFailed,
    /// An unexpected per-URL failure (e.g. an unparseable URL), recorded as
    /// an inline error line.
    Error(String),
}
