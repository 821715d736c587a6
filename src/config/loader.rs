use crate::config::schema::{RuleConfig, ValidationError};
use crate::rule::RuleError;
use crate::tool::Tool;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to turn a rule file into a runnable tool.
///
/// Errors raised while parsing a string carry no path; the `*_from_path`
/// loaders attach the file they read.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read rule file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("rule file{} is not valid TOML: {source}", located(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },

    #[error("rule file{} is invalid: {source}", located(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },

    #[error("rule file{} has a rule that cannot be built: {source}", located(.path))]
    Rule {
        path: Option<PathBuf>,
        source: RuleError,
    },
}

fn located(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" {}", path.display()))
        .unwrap_or_default()
}

impl ConfigError {
    /// Attach `path` to errors that were raised without one.
    fn at(self, path: &Path) -> Self {
        let path = Some(path.to_path_buf());
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml { path, source },
            ConfigError::Validation { path: None, source } => {
                ConfigError::Validation { path, source }
            }
            ConfigError::Rule { path: None, source } => ConfigError::Rule { path, source },
            other => other,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<RuleConfig, ConfigError> {
    let config: RuleConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<RuleConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.at(path))
}

/// Parse, validate, and compile a rule file into a runnable tool.
pub fn load_tool_from_str(input: &str) -> Result<Tool, ConfigError> {
    let config = load_from_str(input)?;
    Tool::from_config(&config).map_err(|source| ConfigError::Rule { path: None, source })
}

pub fn load_tool_from_path(path: impl AsRef<Path>) -> Result<Tool, ConfigError> {
    let path = path.as_ref();
    let config = load_from_path(path)?;
    Tool::from_config(&config).map_err(|source| ConfigError::Rule {
        path: Some(path.to_path_buf()),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn string_errors_have_no_path() {
        let err = load_from_str("[meta]\nname = \"empty\"\n").unwrap_err();
        assert!(err.to_string().starts_with("rule file is invalid: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn path_is_attached_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[[rules]\n").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(&err, ConfigError::Toml { path: Some(p), .. } if p == &path));
        assert!(err
            .to_string()
            .starts_with(&format!("rule file {} is not valid TOML", path.display())));
    }
}
