//! Reading source files and writing rewritten content back.
//!
//! Files are read fully into memory and written back in one piece through a
//! [`FileWriter`]. The default [`AtomicWriter`] writes a sibling tempfile,
//! fsyncs it and renames it over the target, so a failed write never leaves a
//! truncated file behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf },

    #[error("{path} was modified on disk during the run")]
    Stale { path: PathBuf },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A file's content as read at the start of its session.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
    fingerprint: u64,
}

impl SourceFile {
    pub fn read(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        let bytes = fs::read(&path).map_err(|source| SourceError::Read {
            path: path.clone(),
            source,
        })?;
        let fingerprint = xxh3_64(&bytes);
        let content =
            String::from_utf8(bytes).map_err(|_| SourceError::NotUtf8 { path: path.clone() })?;
        Ok(Self {
            path,
            content,
            fingerprint,
        })
    }

    /// xxh3 hash of the bytes that were read.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Whether the file on disk no longer matches what was read.
    pub fn is_stale(&self) -> Result<bool, SourceError> {
        let bytes = fs::read(&self.path).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(xxh3_64(&bytes) != self.fingerprint)
    }

    /// Replace the file with `content`, refusing if it changed since it was read.
    pub fn commit(&self, content: &str, writer: &dyn FileWriter) -> Result<(), SourceError> {
        if self.is_stale()? {
            return Err(SourceError::Stale {
                path: self.path.clone(),
            });
        }
        writer
            .write(&self.path, content.as_bytes())
            .map_err(|source| SourceError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// Destination for rewritten file content.
pub trait FileWriter {
    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()>;
}

/// Writes via tempfile + fsync + rename, keeping the original permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicWriter;

impl FileWriter for AtomicWriter {
    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        atomic_write(path, content)
    }
}

/// Atomic file write: tempfile + fsync + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    // Same directory keeps the rename on one filesystem.
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path has no parent directory",
            ))
        }
    };

    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions)?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
