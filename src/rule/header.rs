use crate::rule::RuleError;

/// Whole-prefix rule: removes an exact multi-line banner from the top of a file.
///
/// Matching ignores leading whitespace (which is kept as-is) and requires the
/// banner to appear verbatim. At most one line break directly after the
/// banner is removed with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRule {
    id: String,
    text: String,
}

/// Outcome of a successful header removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRemoval {
    /// Content with the banner removed
    pub content: String,
    /// 1-based line on which the banner started
    pub line_number: usize,
    /// Number of physical lines removed, including the collapsed blank line
    pub removed_lines: usize,
    /// First line of the removed banner, for reporting
    pub first_line: String,
}

impl HeaderRule {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Result<Self, RuleError> {
        let id = id.into();
        let text = text.into().replace("\r\n", "\n");
        if text.trim().is_empty() {
            return Err(RuleError::Empty { id, field: "text" });
        }
        Ok(Self { id, text })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Strip the banner from LF-normalized `content`.
    pub fn strip(&self, content: &str) -> Option<HeaderRemoval> {
        let body = content.trim_start();
        let leading = &content[..content.len() - body.len()];

        let after_header = body.strip_prefix(self.text.as_str())?;
        let rest = after_header.strip_prefix('\n').unwrap_or(after_header);
        let removed = &body[..body.len() - rest.len()];

        let mut removed_lines = removed.matches('\n').count();
        if !removed.ends_with('\n') {
            removed_lines += 1;
        }

        Some(HeaderRemoval {
            content: format!("{leading}{rest}"),
            line_number: leading.matches('\n').count() + 1,
            removed_lines,
            first_line: self.text.lines().next().unwrap_or_default().to_string(),
        })
    }
}
