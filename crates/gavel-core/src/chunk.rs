//! Splitting outbound text into platform-size-limited messages.

/// Discord rejects messages longer than this many characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Split `text` into chunks that each fit in `limit` characters once
/// wrapped in `enclose_in` on both sides, preferring to break after the
/// last `separator` in the window so lines stay intact.
///
/// The separator stays with the earlier chunk. When no separator falls
/// inside the window the text is hard-cut at the budget boundary. The
/// final remainder is always appended, so callers get at least one chunk.
/// Limits count characters, not bytes; cuts never land inside a char.
///
/// Panics if `limit` leaves no room for content after the wrapping.
pub fn chunk(text: &str, enclose_in: &str, separator: &str, limit: usize) -> Vec<String> {
    let wrap_len = enclose_in.chars().count();
    assert!(
        limit > 2 * wrap_len,
        "chunk limit {limit} too small for wrapper {enclose_in:?}"
    );
    let budget = limit - 2 * wrap_len;

    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.chars().count() >= budget {
        // Byte offset just past the first `budget` characters.
        let cut = rest
            .char_indices()
            .nth(budget)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..cut];
        let split_at = match window.rfind(separator) {
            Some(i) if i > 0 => i + separator.len(),
            _ => cut,
        };
        chunks.push(format!("{enclose_in}{}{enclose_in}", &rest[..split_at]));
        rest = &rest[split_at..];
    }
    chunks.push(format!("{enclose_in}{rest}{enclose_in}"));
    chunks
}

/// Plain split at the Discord limit, breaking at newlines.
pub fn chunk_plain(text: &str) -> Vec<String> {
    chunk(text, "", "\n", MESSAGE_LIMIT)
}

/// Code-fenced split at the Discord limit.
pub fn chunk_fenced(text: &str) -> Vec<String> {
    chunk(text, "```", "\n", MESSAGE_LIMIT)
}
