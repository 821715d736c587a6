pub mod builtin;
pub mod loader;
pub mod schema;

pub use builtin::{builtin, builtin_names, BUILTIN_TOOLS};
pub use loader::{
    load_from_path, load_from_str, load_tool_from_path, load_tool_from_str, ConfigError,
};
pub use schema::{
    CheckSpec, HeaderSpec, InjectSpec, LineRuleSpec, Metadata, RuleConfig, ValidationError,
    ValidationIssue,
};
