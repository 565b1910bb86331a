//! Line diff of two rendered values.

use std::borrow::Cow;
use std::fmt::Write as _;

use similar::{ChangeTag, TextDiff};

use crate::redaction::parse_json_like;

/// One line of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Context(String),
    Removed(String),
    Added(String),
}

/// Computes a line diff from `old` to `new`.
#[must_use]
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffLine> {
    let old = terminated(old);
    let new = terminated(new);

    TextDiff::from_lines(old.as_ref(), new.as_ref())
        .iter_all_changes()
        .map(|change| {
            let text = change.value().trim_end_matches('\n').to_owned();
            match change.tag() {
                ChangeTag::Equal => DiffLine::Context(text),
                ChangeTag::Delete => DiffLine::Removed(text),
                ChangeTag::Insert => DiffLine::Added(text),
            }
        })
        .collect()
}

// A last line without a newline would otherwise never equal the same line
// followed by more text.
fn terminated(text: &str) -> Cow<'_, str> {
    if text.is_empty() || text.ends_with('\n') {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{text}\n"))
    }
}

/// Renders a diff with `-`, `+` and two-space prefixes.
#[must_use]
pub fn render(lines: &[DiffLine]) -> String {
    let mut out = String::new();
    for line in lines {
        let _ = match line {
            DiffLine::Context(text) => writeln!(out, "  {text}"),
            DiffLine::Removed(text) => writeln!(out, "- {text}"),
            DiffLine::Added(text) => writeln!(out, "+ {text}"),
        };
    }
    out
}

/// Diffs two displayed values.
///
/// JSON-like values are pretty-printed first so changes show per field.
#[must_use]
pub fn value_diff(old: &str, new: &str) -> String {
    let old = pretty(old);
    let new = pretty(new);
    render(&diff_lines(&old, &new))
}

fn pretty(text: &str) -> String {
    parse_json_like(text)
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| text.to_owned())
}
