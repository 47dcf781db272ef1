//! Filename and directory-name hygiene.
//!
//! Titles coming out of discovery are user-facing strings and may contain
//! characters that are illegal in paths, runs of whitespace, or marketing
//! boilerplate. Everything that ends up on disk goes through these helpers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length of a sanitized path component.
const MAX_COMPONENT_LEN: usize = 80;

static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

static SUBJECT_NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Marketing prefixes and suffixes around the subject proper
        r"(?i)^complete course of ",
        r"(?i)^basic course of ",
        r"(?i)^fundamentals of ",
        // Instructor credits and other parenthesized asides
        r"\([^)]*\)",
        // Trailing edition years
        r"\s*-\s*\d{4}\b",
        // Dangling separators left behind by the removals above
        r"^\s*-\s*|\s*-\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

/// Sanitize a title into a safe path component.
///
/// Replaces characters that are illegal on common filesystems with `_`,
/// collapses whitespace runs, and truncates to 80 characters at a word
/// boundary so deep course trees stay within path-length limits.
pub fn sanitize_component(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            // Whitespace controls (tab, newline) are left for the collapse
            // below; only non-whitespace controls become underscores
            c if c.is_control() && !c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let collapsed = WHITESPACE_RUNS.replace_all(&replaced, " ");
    let trimmed = collapsed.trim();

    if trimmed.chars().count() <= MAX_COMPONENT_LEN {
        return trimmed.to_string();
    }

    let cut: String = trimmed.chars().take(MAX_COMPONENT_LEN).collect();
    // Back up to the last word boundary so names do not end mid-word
    let at_boundary = match cut.rfind(' ') {
        Some(idx) => &cut[..idx],
        None => cut.as_str(),
    };
    at_boundary.trim_end_matches(['.', ' ']).to_string()
}

/// Extract the subject name from a full course title.
///
/// Course titles carry instructor credits, edition years and marketing
/// prefixes; the subject directory should only carry the subject. Falls back
/// to `"Unknown Subject"` when stripping leaves nothing.
pub fn subject_name(course_title: &str) -> String {
    let mut subject = course_title.to_string();
    for pattern in SUBJECT_NOISE.iter() {
        subject = pattern.replace_all(&subject, "").into_owned();
    }
    // A colon separates a series label from the subject proper
    if let Some((_, after)) = subject.split_once(':') {
        subject = after.to_string();
    }
    let subject = subject.trim();
    if subject.is_empty() {
        "Unknown Subject".to_string()
    } else {
        sanitize_component(subject)
    }
}

/// Stable ledger id for a primary item: `{lesson_id}-{title}-{index}`.
///
/// The index disambiguates repeated titles within a lesson; the id must stay
/// stable across runs for resume to work.
pub fn primary_item_id(lesson_id: &str, title: &str, index: usize) -> String {
    format!("{lesson_id}-{title}-{index}")
}

/// Stable ledger id for a companion material, derived from its primary item.
pub fn companion_item_id(primary_id: &str, material: crate::MaterialKind) -> String {
    format!("{primary_id}-{}", material.id_suffix())
}

/// Stable ledger id for a standalone lesson document.
pub fn document_item_id(lesson_id: &str, file_name: &str) -> String {
    format!("{lesson_id}-{file_name}")
}
