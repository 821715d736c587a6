//! Pattern rules: line matchers, line rewriters, and the whole-prefix header rule.
//!
//! Every rule is anchored to a precise shape. A line rule's regex must cover
//! the whole physical line (`^...$`) so that an identifier appearing inside a
//! string literal or an unrelated expression never triggers a rewrite.

pub mod detect;
pub mod header;
pub mod line;

pub use detect::DetectRule;
pub use header::{HeaderRemoval, HeaderRule};
pub use line::LineRule;

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::ops::Range;
use thiserror::Error;

/// Result of testing one rule against one physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    /// 1-based line number
    pub line_number: usize,
    /// Byte span of the match within the line
    pub span: Range<usize>,
    /// Named capture groups that participated in the match
    pub captures: BTreeMap<String, String>,
}

impl LineMatch {
    pub(crate) fn from_captures(regex: &Regex, caps: &Captures<'_>, line_number: usize) -> Self {
        let span = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        let captures = regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Self {
            line_number,
            span,
            captures,
        }
    }

    /// Named capture text, empty when the group did not participate.
    pub fn capture(&self, name: &str) -> &str {
        self.captures.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Anything that can decide whether a single line has a given shape.
pub trait LineMatcher {
    fn id(&self) -> &str;

    fn test(&self, line: &str, line_number: usize) -> Option<LineMatch>;
}

/// A matcher that can also produce the replacement for a line it matched.
pub trait PatternRule: LineMatcher {
    fn render(&self, m: &LineMatch) -> String;
}

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("rule '{id}': invalid pattern: {source}")]
    Regex {
        id: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{id}': pattern must be anchored to the whole line (`^...$`): {pattern}")]
    Unanchored { id: String, pattern: String },

    #[error("rule '{id}': {field} must not be empty")]
    Empty { id: String, field: &'static str },

    #[error("rule '{id}': {field} must be a single line")]
    Multiline { id: String, field: &'static str },
}

/// Whether a per-line rewrite pattern spans the whole line.
pub fn is_line_anchored(pattern: &str) -> bool {
    pattern.starts_with('^') && pattern.ends_with('$') && !pattern.ends_with("\\$")
}

/// Whether a detection pattern is anchored at the start of the line.
pub fn is_start_anchored(pattern: &str) -> bool {
    pattern.starts_with('^')
}

pub(crate) fn compile(id: &str, pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::Regex {
        id: id.to_string(),
        source,
    })
}

/// Expand `${name}` and `$name` references from a match's captures.
///
/// `$$` produces a literal `$`. Unknown names expand to nothing.
pub fn expand_template(template: &str, m: &LineMatch) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    out.push_str(m.capture(&braced[..end]));
                    rest = &braced[end + 1..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if end == 0 {
                out.push('$');
            } else {
                out.push_str(m.capture(&after[..end]));
            }
            rest = &after[end..];
        }
    }

    out.push_str(rest);
    out
}
