//! Filename derivation for downloaded artifacts.

/// Characters that are unsafe in filenames on common platforms.
const UNSAFE_CHARS: [char; 10] = ['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Stem used when the title is empty after trimming.
const FALLBACK_STEM: &str = "download";

/// Replace every unsafe filename character in `title` with `_`.
pub fn sanitize_title(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        return FALLBACK_STEM.to_string();
    }
    title
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// `<sanitized title>.<extension>`
pub fn filename_for(title: &str, extension: &str) -> String {
    format!("{}.{}", sanitize_title(title), extension)
}
