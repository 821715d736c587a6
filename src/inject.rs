//! Declaration injection.
//!
//! After a rewrite introduces a reference to something that must be imported,
//! the injector makes sure the declaration line exists exactly once.
//!
//! The insertion anchor is the last line starting with the declaration keyword
//! within the first [`INSERTION_WINDOW`] lines. The window is deliberately
//! bounded: a later line with the same keyword usually sits inside a nested
//! scope (`mod tests { use super::*; }`) and must never become the anchor.
//! Presence, on the other hand, is checked across the whole file.

use crate::rule::RuleError;

/// Number of leading lines searched for an insertion anchor.
pub const INSERTION_WINDOW: usize = 50;

const INNER_DOC_PREFIX: &str = "//!";

/// Ensures a required declaration line is present in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injector {
    declaration: String,
    keyword: String,
    window: usize,
}

impl Injector {
    pub fn new(
        declaration: impl Into<String>,
        keyword: impl Into<String>,
    ) -> Result<Self, RuleError> {
        let declaration = declaration.into().trim().to_string();
        let keyword = keyword.into();
        let id = "inject".to_string();

        if declaration.is_empty() {
            return Err(RuleError::Empty {
                id,
                field: "line",
            });
        }
        if declaration.contains('\n') {
            return Err(RuleError::Multiline {
                id,
                field: "line",
            });
        }
        if keyword.trim().is_empty() {
            return Err(RuleError::Empty {
                id,
                field: "keyword",
            });
        }

        Ok(Self {
            declaration,
            keyword,
            window: INSERTION_WINDOW,
        })
    }

    /// Override the anchor search window.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn declaration(&self) -> &str {
        &self.declaration
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Whether the declaration already appears anywhere in `lines`.
    ///
    /// A line counts when, trimmed and without a leading visibility, it
    /// starts with the declaration minus its terminating `;`. So both
    /// `use a::B as C;` and `pub(crate) use a::B;` satisfy `use a::B;`.
    pub fn is_present<S: AsRef<str>>(&self, lines: &[S]) -> bool {
        let stem = strip_visibility(self.declaration.trim_end_matches(';').trim_end());
        lines.iter().any(|line| {
            let line = strip_visibility(line.as_ref().trim());
            line.strip_prefix(stem)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with([';', ' ', '\t']))
        })
    }

    /// Index at which the declaration would be inserted.
    pub fn anchor<S: AsRef<str>>(&self, lines: &[S]) -> usize {
        let window = &lines[..lines.len().min(self.window)];
        let last_keyword = window
            .iter()
            .rposition(|line| line.as_ref().trim_start().starts_with(self.keyword.as_str()));

        if let Some(idx) = last_keyword {
            return idx + 1;
        }

        lines
            .iter()
            .take_while(|line| line.as_ref().starts_with(INNER_DOC_PREFIX))
            .count()
    }

    /// Insert the declaration if absent. Returns the 0-based index of the
    /// inserted line.
    pub fn ensure_declaration(&self, lines: &mut Vec<String>) -> Option<usize> {
        if self.is_present(lines.as_slice()) {
            tracing::trace!(declaration = %self.declaration, "declaration already present");
            return None;
        }
        let at = self.anchor(lines.as_slice());
        tracing::debug!(declaration = %self.declaration, line = at + 1, "inserting declaration");
        lines.insert(at, self.declaration.clone());
        Some(at)
    }
}

/// Drop a leading `pub` or `pub(...)` qualifier.
fn strip_visibility(line: &str) -> &str {
    let Some(rest) = line.strip_prefix("pub") else {
        return line;
    };
    let rest = match rest.trim_start().strip_prefix('(') {
        Some(inner) => match inner.find(')') {
            Some(end) => &inner[end + 1..],
            None => return line,
        },
        None => rest,
    };
    if rest.starts_with(char::is_whitespace) {
        rest.trim_start()
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn injector() -> Injector {
        Injector::new("use crate::collections::PageUtil;", "use ").unwrap()
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn inserts_after_last_leading_use() {
        let mut file = lines("use std::fmt;\nuse std::io;\n\nconst A: u8 = 1;");
        assert_eq!(injector().ensure_declaration(&mut file), Some(2));
        assert_eq!(
            file,
            lines("use std::fmt;\nuse std::io;\nuse crate::collections::PageUtil;\n\nconst A: u8 = 1;")
        );
    }

    #[test]
    fn inserts_after_module_docs_without_uses() {
        let mut file = lines("//! Paging.\n//! More docs.\n\nconst A: u8 = 1;");
        assert_eq!(injector().ensure_declaration(&mut file), Some(2));
        assert_eq!(file[2], "use crate::collections::PageUtil;");
        assert_eq!(file[3], "");
    }

    #[test]
    fn inserts_at_top_otherwise() {
        let mut file = lines("const A: u8 = 1;");
        assert_eq!(injector().ensure_declaration(&mut file), Some(0));
        assert_eq!(file[0], "use crate::collections::PageUtil;");
        assert_eq!(file.len(), 2);
    }

    #[test]
    fn empty_file_gets_declaration() {
        let mut file = Vec::new();
        assert_eq!(injector().ensure_declaration(&mut file), Some(0));
        assert_eq!(file, vec!["use crate::collections::PageUtil;".to_string()]);
    }

    #[test]
    fn present_declaration_is_not_duplicated() {
        let mut file = lines("use crate::collections::PageUtil;\nconst A: u8 = 1;");
        let before = file.clone();
        assert_eq!(injector().ensure_declaration(&mut file), None);
        assert_eq!(file, before);
    }

    #[test]
    fn aliased_declaration_counts_as_present() {
        let file = lines("use crate::collections::PageUtil as PU;");
        assert!(injector().is_present(&file));
        let other = lines("use crate::collections::PageUtilExt;");
        assert!(!injector().is_present(&other));
    }

    #[test]
    fn reexported_declaration_counts_as_present() {
        for existing in [
            "pub use crate::collections::PageUtil;",
            "pub(crate) use crate::collections::PageUtil;",
            "    pub(super)  use crate::collections::PageUtil;",
        ] {
            let mut file = lines(&format!("{existing}\nconst A: u8 = 1;"));
            assert_eq!(injector().ensure_declaration(&mut file), None, "{existing}");
        }
        assert!(!injector().is_present(&lines("public use crate::collections::PageUtil;")));
        assert!(!injector().is_present(&lines("pub fn use_page_util() {}")));
    }

    #[test]
    fn declaration_beyond_window_is_still_present() {
        let mut text = String::from("use std::fmt;\n");
        for i in 0..(INSERTION_WINDOW + 10) {
            text.push_str(&format!("const C{i}: u8 = 0;\n"));
        }
        text.push_str("use crate::collections::PageUtil;\n");
        let mut file = lines(&text);
        let len = file.len();
        assert_eq!(injector().ensure_declaration(&mut file), None);
        assert_eq!(file.len(), len);
    }

    #[test]
    fn anchor_ignores_keyword_lines_beyond_window() {
        let mut text = String::from("use std::fmt;\n");
        for i in 0..INSERTION_WINDOW {
            text.push_str(&format!("const C{i}: u8 = 0;\n"));
        }
        text.push_str("mod tests {\n    use super::*;\n}\n");
        let file = lines(&text);
        assert_eq!(injector().anchor(&file), 1);
    }

    #[test]
    fn custom_window() {
        let file = lines("const A: u8 = 1;\nuse std::fmt;");
        assert_eq!(injector().with_window(1).anchor(&file), 0);
        assert_eq!(injector().with_window(2).anchor(&file), 2);
    }

    #[test]
    fn indented_use_is_an_anchor_inside_window() {
        let file = lines("mod a {\n    use std::fmt;\n}");
        assert_eq!(injector().anchor(&file), 2);
    }

    #[test]
    fn rejects_bad_declarations() {
        assert!(Injector::new("", "use ").is_err());
        assert!(Injector::new("use a;\nuse b;", "use ").is_err());
        assert!(Injector::new("use a;", " ").is_err());
    }
}
