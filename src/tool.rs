//! Compiled tools: what a rule file turns into once its patterns are built.

use crate::config::schema::{Metadata, RuleConfig};
use crate::inject::Injector;
use crate::rule::{DetectRule, HeaderRule, LineRule, RuleError};

/// A runnable tool instance.
#[derive(Debug, Clone)]
pub struct Tool {
    pub meta: Metadata,
    pub kind: ToolKind,
}

#[derive(Debug, Clone)]
pub enum ToolKind {
    /// Report matching lines, never rewrite.
    Check(Check),
    /// Rewrite files in place (or report what would change).
    Rewrite(Codemod),
}

/// Detection-only tool.
#[derive(Debug, Clone)]
pub struct Check {
    pub rule: DetectRule,
}

/// Ordered rewrite rules applied by a session.
#[derive(Debug, Clone, Default)]
pub struct Codemod {
    pub header: Option<HeaderRule>,
    pub rules: Vec<LineRule>,
    pub injector: Option<Injector>,
}

impl Tool {
    pub fn from_config(config: &RuleConfig) -> Result<Self, RuleError> {
        let kind = match &config.check {
            Some(check) => ToolKind::Check(Check {
                rule: DetectRule::new(&check.id, &check.pattern, &check.hint)?,
            }),
            None => {
                let header = config
                    .header
                    .as_ref()
                    .map(|h| HeaderRule::new(&h.id, &h.text))
                    .transpose()?;
                let rules = config
                    .rules
                    .iter()
                    .map(|r| LineRule::new(&r.id, &r.pattern, &r.replace))
                    .collect::<Result<Vec<_>, _>>()?;
                let injector = config
                    .inject
                    .as_ref()
                    .map(|spec| {
                        let injector = Injector::new(&spec.line, &spec.keyword)?;
                        Ok::<_, RuleError>(match spec.window {
                            Some(window) => injector.with_window(window),
                            None => injector,
                        })
                    })
                    .transpose()?;
                ToolKind::Rewrite(Codemod {
                    header,
                    rules,
                    injector,
                })
            }
        };

        Ok(Self {
            meta: config.meta.clone(),
            kind,
        })
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn mode(&self) -> &'static str {
        match self.kind {
            ToolKind::Check(_) => "check",
            ToolKind::Rewrite(_) => "rewrite",
        }
    }
}
