//! Free-text note handling.
//!
//! All note and reason fields are trimmed and truncated to
//! [`MAX_NOTE_CHARS`] characters before storage. Callers cannot rely on
//! longer notes round-tripping; this truncation is an external contract.

/// Maximum stored note length in characters (after trimming).
pub const MAX_NOTE_CHARS: usize = 280;

/// Normalize a free-text note for storage.
///
/// Trims surrounding whitespace and truncates to [`MAX_NOTE_CHARS`]
/// characters on a `char` boundary. Returns `None` if the note is empty
/// after trimming.
pub fn clean_note(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cut = trimmed
        .char_indices()
        .nth(MAX_NOTE_CHARS)
        .map_or(trimmed.len(), |(idx, _)| idx);
    Some(trimmed[..cut].to_string())
}

/// Normalize an optional note parameter.
pub fn clean_opt_note(raw: Option<&str>) -> Option<String> {
    raw.and_then(clean_note)
}
