//! Page fetching and main-text extraction.
//!
//! Given a URL this module downloads the page and reduces it to readable
//! body text: content elements only (paragraphs, headings, list items), no
//! markup, no comments, no script or style text. Pages that fail to fetch,
//! yield nothing, or yield too little text all degrade to `None`; failures
//! are logged and never propagate out of this layer. There is no retry here,
//! one outbound request per call.

use crate::config::ReportConfig;
use crate::models::Document;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, instrument, warn};

/// Elements whose text is considered page content. Selecting leaf-level
/// blocks rather than containers keeps nested text from being collected
/// twice.
static CONTENT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p, h1, h2, h3, li").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Fetch `url` and return its cleaned main-body text.
///
/// Returns `None` when the fetch fails (network error, non-success status,
/// timeout), when the page yields less text than the extractor's minimum
/// size hint, or when the trimmed result is shorter than the configured
/// per-page minimum. All failure modes are logged and swallowed.
///
/// The fetch timeout comes from the shared `client`, which the caller builds
/// from [`ReportConfig::fetch_timeout`].
#[instrument(level = "info", skip(client, config), fields(%url))]
pub async fn extract_main_text(
    client: &reqwest::Client,
    url: &str,
    config: &ReportConfig,
) -> Option<Document> {
    let html = match fetch_page(client, url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(%url, error = %e, "Fetch failed");
            return None;
        }
    };

    let text = match extract_text_from_html(&html, config.min_extracted_hint) {
        Some(text) => text,
        None => {
            warn!(%url, bytes = html.len(), "Extraction produced no usable text");
            return None;
        }
    };

    let document = Document::new(text);
    if document.char_len() < config.min_text_len {
        warn!(
            %url,
            chars = document.char_len(),
            min = config.min_text_len,
            "Extracted text too short"
        );
        return None;
    }

    debug!(
        %url,
        chars = document.char_len(),
        preview = %truncate_for_log(&document.text, 200),
        "Extracted main text"
    );
    Some(document)
}

/// Download a page body as text.
async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String, Box<dyn Error>> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

/// Reduce an HTML document to its readable body text.
///
/// Collects the text of content elements, normalizes whitespace within each
/// block, and joins the blocks with newlines. HTML comments and non-content
/// elements (scripts, styles, navigation chrome outside content blocks)
/// contribute nothing. Returns `None` if the total text is shorter than
/// `min_extracted_hint` characters after trimming.
pub fn extract_text_from_html(html: &str, min_extracted_hint: usize) -> Option<String> {
    let document = Html::parse_document(html);

    let mut blocks = Vec::new();
    for element in document.select(&CONTENT_SELECTOR) {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = WHITESPACE.replace_all(&text, " ").trim().to_string();
        if !text.is_empty() {
            blocks.push(text);
        }
    }

    let text = blocks.join("\n").trim().to_string();
    if text.chars().count() < min_extracted_hint {
        return None;
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_paragraphs(n: usize) -> String {
        let paragraph = "<p>이 문단은 본문 추출 테스트를 위한 충분히 긴 한국어 문장입니다. \
                         내용은 반복되지만 길이 조건을 만족해야 합니다.</p>";
        format!(
            "<html><head><title>t</title><style>p {{ color: red }}</style></head>\
             <body><nav><span>메뉴</span></nav>{}\
             <script>var tracking = \"ignored\";</script>\
             <!-- 숨겨진 주석 -->\
             </body></html>",
            paragraph.repeat(n)
        )
    }

    #[test]
    fn test_markup_and_comments_are_stripped() {
        let text = extract_text_from_html(&page_with_paragraphs(10), 200).unwrap();
        assert!(!text.contains('<'));
        assert!(!text.contains("숨겨진 주석"));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color: red"));
        assert!(text.contains("본문 추출 테스트"));
    }

    #[test]
    fn test_navigation_chrome_excluded() {
        // nav text lives in a span, not a content element
        let text = extract_text_from_html(&page_with_paragraphs(10), 200).unwrap();
        assert!(!text.contains("메뉴"));
    }

    #[test]
    fn test_too_little_text_yields_none() {
        let html = "<html><body><p>짧다</p></body></html>";
        assert_eq!(extract_text_from_html(html, 200), None);
    }

    #[test]
    fn test_empty_page_yields_none() {
        assert_eq!(extract_text_from_html("<html><body></body></html>", 200), None);
    }

    #[test]
    fn test_headings_and_list_items_collected() {
        let html = format!(
            "<html><body><h1>제목입니다</h1><ul><li>첫 번째 항목</li><li>두 번째 항목</li></ul>{}</body></html>",
            "<p>본문 문장.</p>".repeat(40)
        );
        let text = extract_text_from_html(&html, 10).unwrap();
        assert!(text.contains("제목입니다"));
        assert!(text.contains("첫 번째 항목"));
    }

    #[test]
    fn test_whitespace_normalized_within_blocks() {
        let html = format!(
            "<html><body><p>공백이   여러 개\n들어간    문장</p>{}</body></html>",
            "<p>채움 문장.</p>".repeat(40)
        );
        let text = extract_text_from_html(&html, 10).unwrap();
        assert!(text.contains("공백이 여러 개 들어간 문장"));
    }

    #[tokio::test]
    async fn test_unresolvable_url_degrades_to_none() {
        let config = ReportConfig::default();
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .unwrap();
        let result = extract_main_text(&client, "http://invalid.localdomain.test/", &config).await;
        assert_eq!(result, None);
    }
}
