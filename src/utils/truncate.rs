//! Truncation Utilities
//!
//! Keeps error diagnostics readable when a service answers with a large
//! body (HTML error pages, stack traces). Cuts on UTF-8 boundaries and
//! keeps both ends of the text.

/// Upper bound for response bodies carried inside error values.
pub const MAX_DIAGNOSTIC_BYTES: usize = 512;

pub fn truncate_body(content: &str, max_bytes: usize) -> String {
    let content = content.trim();
    if content.len() <= max_bytes {
        return content.to_string();
    }
    if max_bytes == 0 {
        return format!("[{} bytes omitted]", content.len());
    }

    let half = max_bytes / 2;

    let mut prefix_end = half.min(content.len());
    while !content.is_char_boundary(prefix_end) {
        prefix_end -= 1;
    }

    let mut suffix_start = content.len().saturating_sub(half).max(prefix_end);
    while !content.is_char_boundary(suffix_start) {
        suffix_start += 1;
    }

    let omitted = suffix_start - prefix_end;
    format!(
        "{} ... [{} bytes omitted] ... {}",
        &content[..prefix_end],
        omitted,
        &content[suffix_start..]
    )
}
