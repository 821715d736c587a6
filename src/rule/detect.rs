use crate::rule::{compile, is_start_anchored, LineMatch, LineMatcher, RuleError};
use regex::Regex;

/// Detection-only rule: reports lines of a given shape, never rewrites them.
#[derive(Debug, Clone)]
pub struct DetectRule {
    id: String,
    pattern: Regex,
    hint: String,
}

impl DetectRule {
    pub fn new(
        id: impl Into<String>,
        pattern: &str,
        hint: impl Into<String>,
    ) -> Result<Self, RuleError> {
        let id = id.into();
        if !is_start_anchored(pattern) {
            return Err(RuleError::Unanchored {
                id,
                pattern: pattern.to_string(),
            });
        }
        let hint = hint.into();
        if hint.trim().is_empty() {
            return Err(RuleError::Empty { id, field: "hint" });
        }
        let pattern = compile(&id, pattern)?;
        Ok(Self { id, pattern, hint })
    }

    /// Remediation text printed once when findings exist.
    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Test every line of `content`, returning matches in line order.
    pub fn scan(&self, content: &str) -> Vec<LineMatch> {
        content
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| self.test(line, idx + 1))
            .collect()
    }
}

impl LineMatcher for DetectRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn test(&self, line: &str, line_number: usize) -> Option<LineMatch> {
        let caps = self.pattern.captures(line)?;
        Some(LineMatch::from_captures(&self.pattern, &caps, line_number))
    }
}
