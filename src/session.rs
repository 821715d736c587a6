//! Rewrite session: applies a [`Codemod`] to one file's content in memory.
//!
//! Nothing touches the filesystem here. The session returns the complete new
//! content plus one [`ChangeRecord`] per applied rewrite; the driver decides
//! whether to write it.

use crate::rule::{LineMatch, LineMatcher, LineRule, PatternRule};
use crate::tool::Codemod;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One applied (or proposed) rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
    pub before: String,
    pub after: String,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} -> {}",
            self.file.display(),
            self.line,
            shown(&self.before),
            shown(&self.after)
        )
    }
}

fn shown(text: &str) -> &str {
    let text = text.trim();
    if text.is_empty() {
        "(none)"
    } else {
        text
    }
}

/// Per-file outcome of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    /// New content; identical to the input when nothing changed
    pub content: String,
    pub records: Vec<ChangeRecord>,
}

impl RewriteResult {
    pub fn changed(&self) -> bool {
        !self.records.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{file}:{line}: rules '{first}' and '{second}' both match")]
    OverlappingRules {
        file: PathBuf,
        line: usize,
        first: String,
        second: String,
    },

    #[error("{file}:{line}: rule '{rule}' output would be rewritten again: {output}")]
    NotIdempotent {
        file: PathBuf,
        line: usize,
        rule: String,
        output: String,
    },
}

/// Apply `codemod` to `content`.
///
/// Order: header removal, then per-line rules top to bottom, then the
/// injector if at least one line rule fired. An injected declaration is
/// reported first.
pub fn apply(path: &Path, content: &str, codemod: &Codemod) -> Result<RewriteResult, SessionError> {
    let endings = crlf_endings(content);
    let mut text = content.replace("\r\n", "\n");
    let mut records = Vec::new();

    // Lines at or after `shift_from` sit `shift` lines lower in the original.
    let mut shift_from = usize::MAX;
    let mut shift = 0;

    if let Some(header) = &codemod.header {
        if let Some(removal) = header.strip(&text) {
            records.push(ChangeRecord {
                file: path.to_path_buf(),
                line: removal.line_number,
                before: removal.first_line.clone(),
                after: String::new(),
            });
            shift_from = removal.line_number;
            shift = removal.removed_lines;
            text = removal.content;
        }
    }

    let (mut lines, trailing_newline) = split_lines(&text);
    let mut crlf: Vec<bool> = (0..lines.len())
        .map(|idx| {
            let original = if idx + 1 >= shift_from { idx + shift } else { idx };
            endings.get(original).copied().unwrap_or(false)
        })
        .collect();

    let mut rewrites = Vec::new();
    for (idx, line) in lines.iter_mut().enumerate() {
        let number = if idx + 1 >= shift_from {
            idx + 1 + shift
        } else {
            idx + 1
        };

        let Some((rule, m)) = match_line(path, &codemod.rules, line, number)? else {
            continue;
        };
        let rendered = rule.render(&m);
        if rendered == *line {
            continue;
        }

        if let Some((again, m)) = match_line(path, &codemod.rules, &rendered, number)? {
            if again.render(&m) != rendered {
                return Err(SessionError::NotIdempotent {
                    file: path.to_path_buf(),
                    line: number,
                    rule: rule.id().to_string(),
                    output: rendered,
                });
            }
        }

        tracing::trace!(file = %path.display(), line = number, rule = rule.id(), "rewrite");
        rewrites.push(ChangeRecord {
            file: path.to_path_buf(),
            line: number,
            before: std::mem::replace(line, rendered.clone()),
            after: rendered,
        });
    }

    if !rewrites.is_empty() {
        if let Some(injector) = &codemod.injector {
            if let Some(at) = injector.ensure_declaration(&mut lines) {
                // The new line takes the ending of the line above it.
                let ending = match at {
                    0 => crlf.first().copied().unwrap_or(false),
                    _ => crlf[at - 1],
                };
                crlf.insert(at, ending);
                records.insert(
                    0,
                    ChangeRecord {
                        file: path.to_path_buf(),
                        line: at + 1,
                        before: String::new(),
                        after: injector.declaration().to_string(),
                    },
                );
            }
        }
    }
    records.extend(rewrites);

    if records.is_empty() {
        return Ok(RewriteResult {
            content: content.to_string(),
            records,
        });
    }

    let mut output = String::with_capacity(content.len() + 64);
    for (idx, line) in lines.iter().enumerate() {
        output.push_str(line);
        if idx + 1 < lines.len() || trailing_newline {
            output.push_str(if crlf[idx] { "\r\n" } else { "\n" });
        }
    }

    Ok(RewriteResult {
        content: output,
        records,
    })
}

/// Test every rule against `line`. More than one match is a rule-set defect.
fn match_line<'r>(
    path: &Path,
    rules: &'r [LineRule],
    line: &str,
    number: usize,
) -> Result<Option<(&'r LineRule, LineMatch)>, SessionError> {
    let mut hit: Option<(&LineRule, LineMatch)> = None;
    for rule in rules {
        let Some(m) = rule.test(line, number) else {
            continue;
        };
        if let Some((first, _)) = &hit {
            return Err(SessionError::OverlappingRules {
                file: path.to_path_buf(),
                line: number,
                first: first.id().to_string(),
                second: rule.id().to_string(),
            });
        }
        hit = Some((rule, m));
    }
    Ok(hit)
}

/// Per physical line of `content`, whether it ends in `\r\n`.
fn crlf_endings(content: &str) -> Vec<bool> {
    content
        .split_inclusive('\n')
        .map(|line| line.ends_with("\r\n"))
        .collect()
}

/// Split LF-normalized text into lines without terminators.
fn split_lines(text: &str) -> (Vec<String>, bool) {
    if text.is_empty() {
        return (Vec::new(), false);
    }
    let trailing = text.ends_with('\n');
    let body = text.strip_suffix('\n').unwrap_or(text);
    (body.split('\n').map(str::to_string).collect(), trailing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::Injector;
    use crate::rule::HeaderRule;

    const PAGE_SIZE: &str = r"^(?P<indent>\s*)(?P<vis>pub(?:\([^)]*\))?\s+)?const\s+PAGE_SIZE\s*:\s*usize\s*=\s*4096\s*;\s*(?P<comment>//.*)?$";
    const PAGE_SHIFT: &str = r"^(?P<indent>\s*)const\s+PAGE_SHIFT\s*:\s*usize\s*=\s*12\s*;\s*(?P<comment>//.*)?$";

    fn page_codemod() -> Codemod {
        Codemod {
            header: None,
            rules: vec![
                LineRule::new(
                    "page-size",
                    PAGE_SIZE,
                    "${vis}const PAGE_SIZE: usize = PageUtil::PAGE_SIZE_32KB;",
                )
                .unwrap(),
                LineRule::new("page-shift", PAGE_SHIFT, "const PAGE_SHIFT: usize = 15;").unwrap(),
            ],
            injector: Some(Injector::new("use crate::collections::PageUtil;", "use ").unwrap()),
        }
    }

    fn path() -> &'static Path {
        Path::new("src/page.rs")
    }

    #[test]
    fn untouched_file_has_no_records() {
        let input = "use std::fmt;\nconst PAGE_SIZE: usize = 8192;\n";
        let result = apply(path(), input, &page_codemod()).unwrap();
        assert!(!result.changed());
        assert_eq!(result.content, input);
    }

    #[test]
    fn rewrites_and_injects_after_leading_uses() {
        let input = "use std::fmt;\n\nconst PAGE_SIZE: usize = 4096; // bytes\nconst PAGE_SHIFT: usize = 12;\n";
        let result = apply(path(), input, &page_codemod()).unwrap();
        assert_eq!(
            result.content,
            "use std::fmt;\nuse crate::collections::PageUtil;\n\nconst PAGE_SIZE: usize = PageUtil::PAGE_SIZE_32KB; // bytes\nconst PAGE_SHIFT: usize = 15;\n"
        );

        assert_eq!(result.records.len(), 3);
        assert_eq!(result.records[0].line, 2);
        assert_eq!(result.records[0].after, "use crate::collections::PageUtil;");
        assert_eq!(result.records[1].line, 3);
        assert_eq!(result.records[1].before, "const PAGE_SIZE: usize = 4096; // bytes");
        assert_eq!(result.records[2].line, 4);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let input = "const PAGE_SIZE: usize = 4096;\n";
        let first = apply(path(), input, &page_codemod()).unwrap();
        assert!(first.changed());
        let second = apply(path(), &first.content, &page_codemod()).unwrap();
        assert!(!second.changed());
        assert_eq!(second.content, first.content);
    }

    #[test]
    fn existing_declaration_is_not_duplicated() {
        let input = "use crate::collections::PageUtil;\nconst PAGE_SIZE: usize = 4096;\n";
        let result = apply(path(), input, &page_codemod()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(
            result.content,
            "use crate::collections::PageUtil;\nconst PAGE_SIZE: usize = PageUtil::PAGE_SIZE_32KB;\n"
        );
    }

    #[test]
    fn crlf_line_endings_survive() {
        let input = "const PAGE_SHIFT: usize = 12;\r\nfn a() {}\r\n";
        let result = apply(path(), input, &page_codemod()).unwrap();
        assert_eq!(
            result.content,
            "use crate::collections::PageUtil;\r\nconst PAGE_SHIFT: usize = 15;\r\nfn a() {}\r\n"
        );
    }

    #[test]
    fn mixed_line_endings_are_kept_per_line() {
        let input = "use a::B;\r\nfn a() {}\nconst PAGE_SHIFT: usize = 12;\r\nfn b() {}\n";
        let result = apply(path(), input, &page_codemod()).unwrap();
        assert_eq!(
            result.content,
            "use a::B;\r\nuse crate::collections::PageUtil;\r\nfn a() {}\nconst PAGE_SHIFT: usize = 15;\r\nfn b() {}\n"
        );
    }

    #[test]
    fn crlf_endings_follow_removed_header() {
        let codemod = Codemod {
            header: Some(HeaderRule::new("banner", "// GENERATED\n").unwrap()),
            rules: vec![LineRule::new("x", r"^const X: u8 = 1;$", "const X: u8 = 2;").unwrap()],
            injector: None,
        };
        let input = "// GENERATED\r\n\r\nfn a() {}\nconst X: u8 = 1;\r\n";
        let result = apply(path(), input, &codemod).unwrap();
        assert_eq!(result.content, "fn a() {}\nconst X: u8 = 2;\r\n");
    }

    #[test]
    fn missing_trailing_newline_is_kept() {
        let input = "use a::B;\nconst PAGE_SHIFT: usize = 12;";
        let result = apply(path(), input, &page_codemod()).unwrap();
        assert!(result.content.ends_with("const PAGE_SHIFT: usize = 15;"));
    }

    #[test]
    fn overlapping_rules_are_rejected() {
        let codemod = Codemod {
            rules: vec![
                LineRule::new("a", r"^const X: u8 = 1;$", "const X: u8 = 2;").unwrap(),
                LineRule::new("b", r"^const X: u8 = \d;$", "const X: u8 = 3;").unwrap(),
            ],
            ..Codemod::default()
        };
        let err = apply(path(), "const X: u8 = 1;\n", &codemod).unwrap_err();
        assert!(matches!(err, SessionError::OverlappingRules { line: 1, .. }));
    }

    #[test]
    fn non_idempotent_rule_is_rejected() {
        let codemod = Codemod {
            rules: vec![LineRule::new("grow", r"^(?P<body>x+)$", "${body}x").unwrap()],
            ..Codemod::default()
        };
        let err = apply(path(), "xx\n", &codemod).unwrap_err();
        assert!(matches!(err, SessionError::NotIdempotent { .. }));
    }

    #[test]
    fn header_only_codemod_never_injects() {
        let codemod = Codemod {
            header: Some(HeaderRule::new("banner", "// GENERATED\n").unwrap()),
            injector: Some(Injector::new("use a::B;", "use ").unwrap()),
            ..Codemod::default()
        };
        let result = apply(path(), "// GENERATED\n\nfn main() {}\n", &codemod).unwrap();
        assert_eq!(result.content, "fn main() {}\n");
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].before, "// GENERATED");
    }

    #[test]
    fn line_numbers_account_for_removed_header() {
        let codemod = Codemod {
            header: Some(HeaderRule::new("banner", "// GENERATED\n").unwrap()),
            rules: vec![LineRule::new("x", r"^const X: u8 = 1;$", "const X: u8 = 2;").unwrap()],
            injector: None,
        };
        let result = apply(path(), "// GENERATED\n\nfn a() {}\nconst X: u8 = 1;\n", &codemod).unwrap();
        assert_eq!(result.content, "fn a() {}\nconst X: u8 = 2;\n");
        assert_eq!(result.records[1].line, 4);
    }

    #[test]
    fn empty_input_is_untouched() {
        let result = apply(path(), "", &page_codemod()).unwrap();
        assert!(!result.changed());
        assert_eq!(result.content, "");
    }

    #[test]
    fn record_display_format() {
        let record = ChangeRecord {
            file: PathBuf::from("src/a.rs"),
            line: 3,
            before: "    const A: u8 = 1;".to_string(),
            after: String::new(),
        };
        assert_eq!(record.to_string(), "src/a.rs:3: const A: u8 = 1; -> (none)");
    }
}
