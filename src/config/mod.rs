//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PluginConfig (validated, immutable)
//!     → loader.rs (command-line overrides, validated again)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the server starts
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_overrides, load_config, ConfigError, ConfigOverrides};
pub use schema::{ListenerConfig, ObservabilityConfig, PluginConfig, ShutdownConfig};
pub use validation::{validate_config, ValidationError};
