//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (socket mode, socket path length)
//! - Check addresses parse when the feature using them is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PluginConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::PluginConfig;

/// `sun_path` holds 108 bytes on Linux, including the trailing NUL.
const MAX_SOCKET_PATH_BYTES: usize = 107;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &PluginConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let path_len = config.listener.socket_path.as_os_str().len();
    if path_len == 0 {
        errors.push(ValidationError::new("listener.socket_path", "must not be empty"));
    } else if path_len > MAX_SOCKET_PATH_BYTES {
        errors.push(ValidationError::new(
            "listener.socket_path",
            format!("is {} bytes, limit is {}", path_len, MAX_SOCKET_PATH_BYTES),
        ));
    }

    if let Some(mode) = config.listener.socket_mode {
        if mode > 0o777 {
            errors.push(ValidationError::new(
                "listener.socket_mode",
                format!("{:o} is not a permission mode", mode),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
