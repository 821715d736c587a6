//! Candidate file discovery.
//!
//! Walks each root recursively, pruning ignored directories before descending
//! into them, and yields files whose extension passes the filter.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "target",
    "node_modules",
    "build",
    "dist",
    "__pycache__",
    ".venv",
    ".idea",
];

/// Immutable set of directory names pruned during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreSet {
    names: BTreeSet<String>,
}

impl IgnoreSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

impl Default for IgnoreSet {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_DIRS.iter().copied())
    }
}

/// Extension allow-list. Empty allows every file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    allowed: BTreeSet<String>,
}

impl ExtensionFilter {
    /// Entries may be given with or without a leading dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_string())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn allows(&self, path: &Path) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.allowed.contains(ext))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("path does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("cannot walk {path}: {message}")]
    Walk { path: PathBuf, message: String },
}

/// Files found under the roots plus anything that could not be walked.
#[derive(Debug, Default)]
pub struct Discovered {
    pub files: Vec<PathBuf>,
    pub errors: Vec<DiscoveryError>,
}

/// Walk `roots` in order. Each qualifying file appears exactly once; entries
/// within a directory are visited in file-name order.
pub fn discover(roots: &[PathBuf], ignore: &IgnoreSet, filter: &ExtensionFilter) -> Discovered {
    let mut found = Discovered::default();
    let mut seen = HashSet::new();

    for root in roots {
        if !root.exists() {
            found.errors.push(DiscoveryError::MissingRoot(root.clone()));
            continue;
        }

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_pruned(entry, ignore));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    found.errors.push(DiscoveryError::Walk {
                        path: err.path().unwrap_or(root.as_path()).to_path_buf(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() || !filter.allows(entry.path()) {
                continue;
            }

            let path = entry.into_path();
            if seen.insert(path.clone()) {
                found.files.push(path);
            }
        }
    }

    tracing::debug!(
        files = found.files.len(),
        errors = found.errors.len(),
        "discovery finished"
    );
    found
}

/// Roots are always walked, even when their own name is in the ignore set.
fn is_pruned(entry: &DirEntry, ignore: &IgnoreSet) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let pruned = entry
        .file_name()
        .to_str()
        .is_some_and(|name| ignore.contains(name));
    if pruned {
        tracing::trace!(dir = %entry.path().display(), "pruned");
    }
    pruned
}
