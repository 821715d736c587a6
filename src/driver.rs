//! Apply/report driver.
//!
//! Runs discovery, then processes files strictly one at a time. Unreadable
//! files are skipped with a diagnostic; a file that fails to rewrite or write
//! is reported as failed and the run continues with the next one.

use crate::discovery::{discover, DiscoveryError, ExtensionFilter, IgnoreSet};
use crate::rule::LineMatcher;
use crate::session;
use crate::source::{FileWriter, SourceFile};
use crate::tool::{Check, Codemod};
use serde::Serialize;
use std::path::PathBuf;

/// Exit code for a clean run.
pub const EXIT_CLEAN: i32 = 0;
/// Exit code when one or more files could not be rewritten or written.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code when a check finds violations.
pub const EXIT_VIOLATIONS: i32 = 3;

/// What to scan and whether to write.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub roots: Vec<PathBuf>,
    pub extensions: ExtensionFilter,
    pub ignore: IgnoreSet,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    pub fn extensions(mut self, extensions: ExtensionFilter) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// A path the run could not process, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub reason: String,
}

/// A file whose content changed (or would change).
#[derive(Debug, Clone, Serialize)]
pub struct FileChange {
    pub file: PathBuf,
    pub records: Vec<session::ChangeRecord>,
    #[serde(skip)]
    pub before: String,
    #[serde(skip)]
    pub after: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub changed: Vec<FileChange>,
    /// Files that could not be rewritten or written; left untouched
    pub failed: Vec<Diagnostic>,
    /// Paths skipped before processing (unreadable, not UTF-8, unwalkable)
    pub skipped: Vec<Diagnostic>,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() {
            EXIT_CLEAN
        } else {
            EXIT_FAILURE
        }
    }
}

/// One line matched by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub file: PathBuf,
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub scanned: usize,
    pub findings: Vec<Finding>,
    pub hint: String,
    pub skipped: Vec<Diagnostic>,
}

impl CheckReport {
    pub fn files_with_findings(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for finding in &self.findings {
            if last != Some(&finding.file) {
                count += 1;
                last = Some(&finding.file);
            }
        }
        count
    }

    pub fn exit_code(&self) -> i32 {
        if self.findings.is_empty() {
            EXIT_CLEAN
        } else {
            EXIT_VIOLATIONS
        }
    }
}

fn discover_sources(options: &RunOptions, skipped: &mut Vec<Diagnostic>) -> Vec<PathBuf> {
    let found = discover(&options.roots, &options.ignore, &options.extensions);
    for error in found.errors {
        tracing::warn!(%error, "discovery");
        skipped.push(Diagnostic {
            path: match &error {
                DiscoveryError::MissingRoot(path) => path.clone(),
                DiscoveryError::Walk { path, .. } => path.clone(),
            },
            reason: error.to_string(),
        });
    }
    found.files
}

fn read_or_skip(path: PathBuf, skipped: &mut Vec<Diagnostic>) -> Option<SourceFile> {
    match SourceFile::read(&path) {
        Ok(source) => Some(source),
        Err(error) => {
            tracing::debug!(path = %path.display(), %error, "skipping file");
            skipped.push(Diagnostic {
                path,
                reason: error.to_string(),
            });
            None
        }
    }
}

/// Rewrite every discovered file with `codemod`.
pub fn run_rewrite(codemod: &Codemod, options: &RunOptions, writer: &dyn FileWriter) -> RunReport {
    let mut report = RunReport {
        dry_run: options.dry_run,
        ..RunReport::default()
    };

    for path in discover_sources(options, &mut report.skipped) {
        let Some(source) = read_or_skip(path, &mut report.skipped) else {
            continue;
        };
        report.scanned += 1;

        let result = match session::apply(&source.path, &source.content, codemod) {
            Ok(result) => result,
            Err(error) => {
                report.failed.push(Diagnostic {
                    path: source.path.clone(),
                    reason: error.to_string(),
                });
                continue;
            }
        };
        if !result.changed() {
            continue;
        }

        if !options.dry_run {
            if let Err(error) = source.commit(&result.content, writer) {
                tracing::warn!(path = %source.path.display(), %error, "write failed");
                report.failed.push(Diagnostic {
                    path: source.path.clone(),
                    reason: error.to_string(),
                });
                continue;
            }
        }

        tracing::debug!(
            path = %source.path.display(),
            records = result.records.len(),
            dry_run = options.dry_run,
            "file changed"
        );
        report.changed.push(FileChange {
            file: source.path,
            records: result.records,
            before: source.content,
            after: result.content,
        });
    }

    report
}

/// Report every line matching the check's rule.
pub fn run_check(check: &Check, options: &RunOptions) -> CheckReport {
    let mut report = CheckReport {
        hint: check.rule.hint().to_string(),
        ..CheckReport::default()
    };

    for path in discover_sources(options, &mut report.skipped) {
        let Some(source) = read_or_skip(path, &mut report.skipped) else {
            continue;
        };
        report.scanned += 1;

        let lines: Vec<&str> = source.content.lines().collect();
        for m in check.rule.scan(&source.content) {
            tracing::trace!(
                path = %source.path.display(),
                line = m.line_number,
                rule = check.rule.id(),
                "finding"
            );
            report.findings.push(Finding {
                file: source.path.clone(),
                line: m.line_number,
                text: lines[m.line_number - 1].trim().to_string(),
            });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{DetectRule, LineRule};
    use crate::source::AtomicWriter;
    use std::fs;
    use std::io;
    use std::path::Path;

    struct FailingWriter;

    impl FileWriter for FailingWriter {
        fn write(&self, _path: &Path, _content: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    fn codemod() -> Codemod {
        Codemod {
            rules: vec![LineRule::new(
                "bump",
                r"^(?P<indent>\s*)const VERSION: u32 = 1;\s*(?P<comment>//.*)?$",
                "const VERSION: u32 = 2;",
            )
            .unwrap()],
            ..Codemod::default()
        }
    }

    fn options(root: &Path) -> RunOptions {
        RunOptions::new(vec![root.to_path_buf()]).extensions(ExtensionFilter::new(["rs"]))
    }

    #[test]
    fn apply_writes_changed_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "const VERSION: u32 = 1;\n").unwrap();
        fs::write(dir.path().join("b.rs"), "const OTHER: u32 = 1;\n").unwrap();
        fs::write(dir.path().join("c.txt"), "const VERSION: u32 = 1;\n").unwrap();

        let report = run_rewrite(&codemod(), &options(dir.path()), &AtomicWriter);
        assert_eq!(report.scanned, 2);
        assert_eq!(report.changed.len(), 1);
        assert_eq!(report.exit_code(), EXIT_CLEAN);
        assert_eq!(
            fs::read_to_string(dir.path().join("a.rs")).unwrap(),
            "const VERSION: u32 = 2;\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("c.txt")).unwrap(),
            "const VERSION: u32 = 1;\n"
        );
    }

    #[test]
    fn dry_run_leaves_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.rs");
        fs::write(&file, "const VERSION: u32 = 1;\n").unwrap();

        let report = run_rewrite(&codemod(), &options(dir.path()).dry_run(true), &AtomicWriter);
        assert!(report.dry_run);
        assert_eq!(report.changed.len(), 1);
        assert_eq!(report.changed[0].after, "const VERSION: u32 = 2;\n");
        assert_eq!(fs::read_to_string(&file).unwrap(), "const VERSION: u32 = 1;\n");
    }

    #[test]
    fn write_failure_is_reported_and_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "const VERSION: u32 = 1;\n").unwrap();
        fs::write(dir.path().join("b.rs"), "const VERSION: u32 = 1;\n").unwrap();

        let report = run_rewrite(&codemod(), &options(dir.path()), &FailingWriter);
        assert_eq!(report.scanned, 2);
        assert!(report.changed.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.exit_code(), EXIT_FAILURE);
        for name in ["a.rs", "b.rs"] {
            assert_eq!(
                fs::read_to_string(dir.path().join(name)).unwrap(),
                "const VERSION: u32 = 1;\n"
            );
        }
    }

    #[test]
    fn unreadable_file_is_skipped_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.rs"), [0xc3, 0x28]).unwrap();
        fs::write(dir.path().join("good.rs"), "const VERSION: u32 = 1;\n").unwrap();

        let report = run_rewrite(&codemod(), &options(dir.path()), &AtomicWriter);
        assert_eq!(report.scanned, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("UTF-8"));
        assert_eq!(report.changed.len(), 1);
        assert_eq!(report.exit_code(), EXIT_CLEAN);
    }

    #[test]
    fn missing_root_is_a_skip() {
        let dir = tempfile::tempdir().unwrap();
        let opts = RunOptions::new(vec![dir.path().join("nope")]);
        let report = run_rewrite(&codemod(), &opts, &AtomicWriter);
        assert_eq!(report.scanned, 0);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn check_reports_findings_and_violation_code() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.rs"),
            "use crate::a::b::c::X;\nuse crate::a::X;\n",
        )
        .unwrap();
        fs::write(dir.path().join("b.rs"), "use crate::a::X;\n").unwrap();

        let check = Check {
            rule: DetectRule::new(
                "deep",
                r"^\s*use\s+crate::(?:[A-Za-z_][A-Za-z0-9_]*::){3,}",
                "use the re-export",
            )
            .unwrap(),
        };
        let report = run_check(&check, &options(dir.path()));
        assert_eq!(report.scanned, 2);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].line, 1);
        assert_eq!(report.findings[0].text, "use crate::a::b::c::X;");
        assert_eq!(report.files_with_findings(), 1);
        assert_eq!(report.hint, "use the re-export");
        assert_eq!(report.exit_code(), EXIT_VIOLATIONS);
    }

    #[test]
    fn clean_check_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "use crate::a::X;\n").unwrap();
        let check = Check {
            rule: DetectRule::new("deep", r"^use crate::a::b::", "hint").unwrap(),
        };
        let report = run_check(&check, &options(dir.path()));
        assert!(report.findings.is_empty());
        assert_eq!(report.exit_code(), EXIT_CLEAN);
    }

    #[test]
    fn report_serializes_without_contents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "const VERSION: u32 = 1;\n").unwrap();
        let report = run_rewrite(&codemod(), &options(dir.path()).dry_run(true), &AtomicWriter);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["scanned"], 1);
        assert_eq!(json["changed"][0]["records"][0]["line"], 1);
        assert!(json["changed"][0].get("before").is_none());
    }
}
