//! Engine configuration: YAML parsing, types, and validation.

pub mod parser;
pub mod types;
pub mod validator;

pub use parser::{parse_config, parse_config_str};
pub use types::EngineConfig;
pub use validator::validate_config;
