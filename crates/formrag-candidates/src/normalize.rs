//! Candidate prompt and normalization of raw model output into tokens.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,;\n]+").unwrap());

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const BULLET_CHARS: &[char] = &['-', '•', '*'];

/// Instruction asking the model for a flat list of page labels and medication mentions.
pub fn default_prompt() -> &'static str {
    "Look at this clinical form page. \
     List all visible headings, labels, and short text snippets that look like variable names \
     or medication mentions (brands/abbreviations). \
     Return a comma-separated list (no explanations)."
}

/// Split raw model output into lowercased, deduplicated tokens.
///
/// Splits on runs of commas, semicolons and newlines, trims whitespace and
/// bullet characters, collapses inner whitespace, and keeps the first
/// occurrence of each token. Applying it to its own output is a no-op.
pub fn normalize_tokens(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for part in SEPARATORS.split(raw) {
        let token = part.trim().trim_matches(BULLET_CHARS).trim().to_lowercase();
        if token.is_empty() {
            continue;
        }
        let token = WHITESPACE_RUN.replace_all(&token, " ").into_owned();
        if seen.insert(token.clone()) {
            out.push(token);
        }
    }
    out
}
