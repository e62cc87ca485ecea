//! Text post-processing shared by both drivers

/// Marker appended to batch prompts; output extraction starts here
pub const CONTINUATION_MARKER: &str = "<c-begin>";

/// Padding marker removed from every decoded output
pub const PAD_MARKER: &str = "<pad>";

/// Number of words of reference text kept in batch output
pub const REFERENCE_WORD_LIMIT: usize = 400;

/// Slice of `text` from the first continuation marker up to the stop token.
///
/// Without a marker extraction starts at the beginning; without a stop token
/// (or when it does not occur after the start) it runs to the end.
pub fn extract_continuation<'a>(text: &'a str, stop_token: Option<&str>) -> &'a str {
    let start = text.find(CONTINUATION_MARKER).unwrap_or(0);
    truncate_at_stop(&text[start..], stop_token)
}

/// Slice of `text` before the first occurrence of the stop token
pub fn truncate_at_stop<'a>(text: &'a str, stop_token: Option<&str>) -> &'a str {
    match stop_token.and_then(|stop| text.find(stop)) {
        Some(end) => &text[..end],
        None => text,
    }
}

/// Remove a leading padding passage and the whitespace after it
pub fn strip_padding<'a>(text: &'a str, padding: &str) -> &'a str {
    let padding = padding.trim();
    if padding.is_empty() {
        return text;
    }
    match text.trim_start().strip_prefix(padding) {
        Some(rest) => rest.trim_start(),
        None => text,
    }
}

/// Remove padding and continuation markers, turn newlines into spaces and trim.
/// Applying it twice gives the same result as applying it once.
pub fn clean(text: &str) -> String {
    let mut cleaned = text.to_string();
    // Removing one marker can splice the halves of another together.
    while cleaned.contains(PAD_MARKER) || cleaned.contains(CONTINUATION_MARKER) {
        cleaned = cleaned.replace(PAD_MARKER, "").replace(CONTINUATION_MARKER, "");
    }
    cleaned.replace("\r\n", " ").replace(['\n', '\r'], " ").trim().to_string()
}

/// Keep at most `limit` whitespace-separated words, joined by single spaces
pub fn truncate_words(text: &str, limit: usize) -> String {
    text.split_whitespace().take(limit).collect::<Vec<_>>().join(" ")
}

/// Make a value safe to write as one tab-separated field
pub fn sanitize_field(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ").trim().to_string()
}
