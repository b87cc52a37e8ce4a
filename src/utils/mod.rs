//! Utility modules for common functionality

pub mod retry;

pub use retry::RetryConfig;

/// Truncate a string to at most `max_bytes` bytes, ensuring the cut lands on a
/// valid UTF-8 char boundary. Returns the longest prefix that fits.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Split a message into chunks of at most `max_len` bytes, preferring to
/// break after a newline near the end of each chunk.
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len || max_len == 0 {
        return vec![text];
    }
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let window = truncate_str(rest, max_len);
        let window = if window.is_empty() {
            // A single char wider than max_len; emit it whole.
            rest.chars().next().map_or(rest, |c| &rest[..c.len_utf8()])
        } else {
            window
        };
        let cut = if window.len() < rest.len() {
            window
                .rfind('\n')
                .filter(|&pos| pos + 200 > window.len())
                .map_or(window.len(), |pos| pos + 1)
        } else {
            window.len()
        };
        chunks.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    chunks
}
