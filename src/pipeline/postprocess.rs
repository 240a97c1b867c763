//! Post-processing: deterministic cleanup of the model's outline response.
//!
//! Even when told to emit a bare JSON array, models wrap it in
//! ` ```json ... ``` ` fences, forget the closing fence, mix ASCII and
//! full-width semicolons, or drop the no-text directive from image prompts.
//! These rules fix such quirks without touching content. Each is a pure
//! function and independently testable.

use crate::prompts::NO_TEXT_DIRECTIVE;
use once_cell::sync::Lazy;
use regex::Regex;

// ── Rule 1: Strip an enclosing code fence ───────────────────────────────────
//
// The opening fence may carry a language tag; the closing fence is optional
// because truncated responses often lose it.

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)(?:\r?\n```\s*)?$").unwrap());

/// Trim the response and remove one enclosing code fence, if present.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCE.captures(trimmed) {
        caps[1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Rule 2: Bullet delimiters ────────────────────────────────────────────────
//
// `;` and the full-width `；` are interchangeable point separators.

static RE_POINT_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;；]").unwrap());

/// Split `content` into trimmed, non-empty points.
pub fn split_points(content: &str) -> Vec<String> {
    RE_POINT_DELIMITER
        .split(content)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join points with the ASCII delimiter.
pub fn join_points<S: AsRef<str>>(points: &[S]) -> String {
    points
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Render points on one line, separated by a middle dot.
pub fn inline_points(content: &str) -> String {
    split_points(content).join(" · ")
}

// ── Rule 3: No-text directive ────────────────────────────────────────────────

/// Append the no-text directive to a non-empty prompt that lacks it.
pub fn ensure_no_text_directive(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.is_empty() || trimmed.to_lowercase().contains(NO_TEXT_DIRECTIVE) {
        return trimmed.to_string();
    }
    format!("{}, {}", trimmed.trim_end_matches([',', '.']), NO_TEXT_DIRECTIVE)
}

// ── Tests ────────────────────────────────────────────────────────────────────
