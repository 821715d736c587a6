use crate::rule::{
    compile, expand_template, is_line_anchored, LineMatch, LineMatcher, PatternRule, RuleError,
};
use regex::Regex;

/// A per-line rewrite: an anchored regex plus a replacement template.
///
/// The `indent` capture is re-emitted in front of the rendered template and a
/// non-empty `comment` capture after it, so surrounding formatting survives
/// the rewrite. Other named captures are available to the template as
/// `${name}`.
#[derive(Debug, Clone)]
pub struct LineRule {
    id: String,
    pattern: Regex,
    template: String,
}

impl LineRule {
    pub fn new(
        id: impl Into<String>,
        pattern: &str,
        template: impl Into<String>,
    ) -> Result<Self, RuleError> {
        let id = id.into();
        let template = template.into();

        if !is_line_anchored(pattern) {
            return Err(RuleError::Unanchored {
                id,
                pattern: pattern.to_string(),
            });
        }
        if template.trim().is_empty() {
            return Err(RuleError::Empty {
                id,
                field: "replace",
            });
        }
        if template.contains('\n') {
            return Err(RuleError::Multiline {
                id,
                field: "replace",
            });
        }

        let pattern = compile(&id, pattern)?;
        Ok(Self {
            id,
            pattern,
            template,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the replacement for `line`, or `None` when the rule does not
    /// apply or the line is already in its target form.
    pub fn rewrite(&self, line: &str, line_number: usize) -> Option<String> {
        let m = self.test(line, line_number)?;
        let rendered = self.render(&m);
        (rendered != line).then_some(rendered)
    }
}

impl LineMatcher for LineRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn test(&self, line: &str, line_number: usize) -> Option<LineMatch> {
        let caps = self.pattern.captures(line)?;
        Some(LineMatch::from_captures(&self.pattern, &caps, line_number))
    }
}

impl PatternRule for LineRule {
    fn render(&self, m: &LineMatch) -> String {
        let body = expand_template(&self.template, m);
        let comment = m.capture("comment");

        if comment.is_empty() {
            format!("{}{}", m.capture("indent"), body)
        } else {
            format!("{}{} {}", m.capture("indent"), body, comment)
        }
    }
}
