use crate::rule::{is_line_anchored, is_start_anchored};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// A declarative tool: either a detection check or a rewrite rule set.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub header: Option<HeaderSpec>,
    #[serde(default)]
    pub rules: Vec<LineRuleSpec>,
    #[serde(default)]
    pub inject: Option<InjectSpec>,
    #[serde(default)]
    pub check: Option<CheckSpec>,
}

impl RuleConfig {
    pub fn is_check(&self) -> bool {
        self.check.is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        let rewrites = self.header.is_some() || !self.rules.is_empty();
        if !rewrites && !self.is_check() {
            issues.push(ValidationIssue::EmptyRuleSet);
        }
        if self.is_check() && (rewrites || self.inject.is_some()) {
            issues.push(ValidationIssue::InvalidCombo {
                rule_id: None,
                message: "[check] cannot be combined with [header], [[rules]] or [inject]"
                    .to_string(),
            });
        }
        if self.inject.is_some() && self.rules.is_empty() {
            issues.push(ValidationIssue::InvalidCombo {
                rule_id: None,
                message: "[inject] requires at least one [[rules]] entry".to_string(),
            });
        }

        if let Some(header) = &self.header {
            if header.text.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: Some(header.id.clone()),
                    field: "header.text",
                });
            }
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "rules.id",
                });
            } else if !seen.insert(rule.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId(rule.id.clone()));
            }
            if rule.pattern.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: Some(rule.id.clone()),
                    field: "rules.pattern",
                });
            } else if !is_line_anchored(&rule.pattern) {
                issues.push(ValidationIssue::Unanchored {
                    rule_id: rule.id.clone(),
                    expected: "^...$",
                });
            }
            if rule.replace.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: Some(rule.id.clone()),
                    field: "rules.replace",
                });
            } else if rule.replace.contains('\n') {
                issues.push(ValidationIssue::InvalidCombo {
                    rule_id: Some(rule.id.clone()),
                    message: "replacement must be a single line".to_string(),
                });
            }
        }

        if let Some(inject) = &self.inject {
            if inject.line.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "inject.line",
                });
            } else if inject.line.trim().contains('\n') {
                issues.push(ValidationIssue::InvalidCombo {
                    rule_id: None,
                    message: "injected declaration must be a single line".to_string(),
                });
            }
            if inject.keyword.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "inject.keyword",
                });
            }
            if inject.window == Some(0) {
                issues.push(ValidationIssue::InvalidCombo {
                    rule_id: None,
                    message: "inject.window must be at least 1".to_string(),
                });
            }
        }

        if let Some(check) = &self.check {
            if check.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "check.id",
                });
            }
            if check.pattern.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: Some(check.id.clone()),
                    field: "check.pattern",
                });
            } else if !is_start_anchored(&check.pattern) {
                issues.push(ValidationIssue::Unanchored {
                    rule_id: check.id.clone(),
                    expected: "^...",
                });
            }
            if check.hint.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: Some(check.id.clone()),
                    field: "check.hint",
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Default extension allow-list; empty means every file
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeaderSpec {
    #[serde(default = "default_header_id")]
    pub id: String,
    pub text: String,
}

fn default_header_id() -> String {
    "header".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LineRuleSpec {
    pub id: String,
    pub pattern: String,
    pub replace: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InjectSpec {
    pub line: String,
    pub keyword: String,
    /// Anchor search window; defaults to [`crate::inject::INSERTION_WINDOW`]
    #[serde(default)]
    pub window: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckSpec {
    pub id: String,
    pub pattern: String,
    pub hint: String,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyRuleSet,
    DuplicateId(String),
    MissingField {
        rule_id: Option<String>,
        field: &'static str,
    },
    Unanchored {
        rule_id: String,
        expected: &'static str,
    },
    InvalidCombo {
        rule_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyRuleSet => {
                write!(f, "rule file defines no [header], [[rules]] or [check]")
            }
            ValidationIssue::DuplicateId(id) => write!(f, "rule id '{id}' is used more than once"),
            ValidationIssue::MissingField { rule_id, field } => match rule_id {
                Some(id) => write!(f, "rule '{id}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::Unanchored { rule_id, expected } => {
                write!(f, "rule '{rule_id}' pattern must be anchored as `{expected}`")
            }
            ValidationIssue::InvalidCombo { rule_id, message } => match rule_id {
                Some(id) => write!(f, "rule '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid rule configuration: {message}"),
            },
        }
    }
}
