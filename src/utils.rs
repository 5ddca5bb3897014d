//! String helpers shared across the pipeline.
//!
//! This module provides:
//! - Character-based truncation for bounding the text sent to the LLM
//! - Log-friendly truncation for large strings (page bodies, model responses)

/// Truncate a string to at most `max` characters.
///
/// Truncation is character-based with no word-boundary awareness: the text
/// is cut at exactly `max` characters when longer, and returned unmodified
/// otherwise.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of characters to keep
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_chars("hello", 10), "hello");
/// assert_eq!(truncate_chars("hello", 3), "hel");
/// ```
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes with an ellipsis and
/// byte count indicator appended, so page bodies and model responses don't
/// flood logs. The cut backs up to the nearest character boundary, so
/// multibyte text (the usual case here, the pipeline handles Korean pages)
/// never panics the slice.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}
