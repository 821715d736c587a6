//! Rule files shipped with the binary.

use crate::config::loader::{load_from_str, ConfigError};
use crate::config::schema::RuleConfig;

/// `(name, rule file source)` for every built-in tool.
pub const BUILTIN_TOOLS: &[(&str, &str)] = &[
    ("deep-imports", include_str!("../../rules/deep-imports.toml")),
    ("strip-header", include_str!("../../rules/strip-header.toml")),
    ("page-constants", include_str!("../../rules/page-constants.toml")),
    ("array-length", include_str!("../../rules/array-length.toml")),
];

pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_TOOLS.iter().map(|(name, _)| *name)
}

/// Parsed and validated config of a built-in tool, `None` if no such tool.
pub fn builtin(name: &str) -> Option<Result<RuleConfig, ConfigError>> {
    BUILTIN_TOOLS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, source)| load_from_str(source))
}
