//! Configuration validation utilities.

use tracing_subscriber::filter::Directive;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, RouterConfig, TrellisConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &TrellisConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_router_config(&config.router)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    for (target, level) in &logging.filters {
        if target.is_empty() {
            return Err(ConfigError::validation("Log filter target cannot be empty"));
        }

        let directive = format!("{target}={level}");
        if let Err(e) = directive.parse::<Directive>() {
            return Err(ConfigError::InvalidFilter {
                directive,
                reason: e.to_string(),
            });
        }
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "File output requires logging.file_path",
        ));
    }

    Ok(())
}

/// Validates route table settings.
fn validate_router_config(router: &RouterConfig) -> ConfigResult<()> {
    let base = &router.base_path;
    if base.is_empty() {
        return Ok(());
    }

    if !base.starts_with('/') {
        return Err(ConfigError::invalid_path(base, "must start with '/'"));
    }
    if base.len() > 1 && base.ends_with('/') {
        return Err(ConfigError::invalid_path(base, "must not end with '/'"));
    }
    if base.contains("//") {
        return Err(ConfigError::invalid_path(base, "must not contain empty segments"));
    }

    Ok(())
}
