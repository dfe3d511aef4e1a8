//! Tool configuration
//!
//! Three layers, later wins:
//! 1. Built-in defaults
//! 2. Config file (`--config`, or split-settings.toml in the working directory)
//! 3. CLI flags

mod defaults;
mod merge;
mod tool;

pub use defaults::BuiltinDefaults;
pub use merge::{deep_merge, merge_layers};
pub use tool::{ConfigError, ConfigOrigin, ConfigSource, ToolConfig, DEFAULT_CONFIG_FILE};
