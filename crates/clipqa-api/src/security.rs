//! Input validation and sanitization for reviewer input.

/// Maximum stored length of a comment or skip reason.
pub const MAX_TEXT_LENGTH: usize = 2000;

/// Maximum video ID length.
const MAX_VIDEO_ID_LENGTH: usize = 128;

/// Sanitize reviewer free text for safe logging and storage.
///
/// Control characters other than newline and tab are removed, surrounding
/// whitespace is trimmed and the result is capped at `MAX_TEXT_LENGTH`
/// characters.
pub fn sanitize_text(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(MAX_TEXT_LENGTH)
        .collect()
}

/// Validate video ID format.
///
/// Valid format: alphanumeric, hyphens, underscores and dots, 1-128 chars.
/// No path traversal.
pub fn is_valid_video_id(id: &str) -> bool {
    if id.is_empty() || id.len() > MAX_VIDEO_ID_LENGTH {
        return false;
    }
    if id.contains("..") {
        return false;
    }
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
