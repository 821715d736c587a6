//! Rewrite Kit: pattern-driven codemods and line linters
//!
//! A small engine for scanning a source tree for precise line shapes and
//! either reporting them or rewriting them in place.
//!
//! # Architecture
//!
//! - [`discovery`] walks roots, pruning ignored directories before descent.
//! - [`rule`] holds the matchers: anchored per-line rewrite rules, a
//!   whole-prefix header rule, and detection-only rules.
//! - [`session`] applies a [`Codemod`] to one file in memory and returns the
//!   new content with a [`ChangeRecord`] per rewrite.
//! - [`inject`] adds a required declaration once a rewrite depends on it.
//! - [`driver`] ties it together and produces a report and exit code.
//!
//! Tools are declared in TOML rule files ([`config`]); four ship built in.
//!
//! # Safety
//!
//! - Rules must match the whole line; loose substring matches are rejected
//! - Every rewrite is checked to be idempotent before it is recorded
//! - Files are written whole via tempfile + fsync + rename
//! - A file modified on disk mid-run is never overwritten
//!
//! # Example
//!
//! ```no_run
//! use rewrite_kit::{builtin, run_rewrite, AtomicWriter, RunOptions, Tool, ToolKind};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = builtin("page-constants").expect("built-in tool")?;
//! let tool = Tool::from_config(&config)?;
//! if let ToolKind::Rewrite(codemod) = &tool.kind {
//!     let options = RunOptions::new(vec![PathBuf::from("src")]).dry_run(true);
//!     let report = run_rewrite(codemod, &options, &AtomicWriter);
//!     for change in &report.changed {
//!         for record in &change.records {
//!             println!("{record}");
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod discovery;
pub mod driver;
pub mod inject;
pub mod rule;
pub mod session;
pub mod source;
pub mod tool;

// Re-exports
pub use config::{
    builtin, builtin_names, load_from_path, load_from_str, load_tool_from_path,
    load_tool_from_str, ConfigError, RuleConfig, ValidationError, ValidationIssue,
};
pub use discovery::{discover, Discovered, DiscoveryError, ExtensionFilter, IgnoreSet};
pub use driver::{
    run_check, run_rewrite, CheckReport, Diagnostic, FileChange, Finding, RunOptions, RunReport,
    EXIT_CLEAN, EXIT_FAILURE, EXIT_VIOLATIONS,
};
pub use inject::{Injector, INSERTION_WINDOW};
pub use rule::{
    DetectRule, HeaderRemoval, HeaderRule, LineMatch, LineMatcher, LineRule, PatternRule,
    RuleError,
};
pub use session::{ChangeRecord, RewriteResult, SessionError};
pub use source::{atomic_write, AtomicWriter, FileWriter, SourceError, SourceFile};
pub use tool::{Check, Codemod, Tool, ToolKind};
