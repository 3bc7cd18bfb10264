//! Text extraction helpers
//!
//! Turns fetched HTML into plain text and keeps tool output within budget.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("valid regex"));
static RE_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b.*?</style>").expect("valid regex"));
static RE_BLOCK_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</(p|div|h[1-6]|li|section|tr|table|figcaption)>|<br\s*/?>").expect("valid regex")
});
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\f]+").expect("valid regex"));
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").expect("valid regex"));

/// Extract readable text from an HTML page
pub fn html_to_text(html: &str) -> String {
    let text = RE_SCRIPT.replace_all(html, " ");
    let text = RE_STYLE.replace_all(&text, " ");
    // Keep paragraph structure before tags disappear
    let text = RE_BLOCK_END.replace_all(&text, "\n");
    let text = RE_TAG.replace_all(&text, " ");
    let text = decode_entities(&text);

    let text = RE_SPACES.replace_all(&text, " ");
    let text = RE_BLANK_LINES.replace_all(&text, "\n\n");

    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Basic HTML entity decoding
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Truncate to at most `max_chars` characters, marking the cut
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!(
            "{}\n... [truncated, showing first {} of {} chars]",
            &s[..byte_idx],
            max_chars,
            s.chars().count()
        ),
        None => s.to_string(),
    }
}
