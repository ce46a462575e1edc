//! Configuration module for the Trellis runtime.
//!
//! Provides layered loading (defaults, files, environment) through figment and
//! validation of the loaded values.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, RouterConfig, SpanEventConfig,
    TrellisConfig,
};
pub use validation::validate_config;
