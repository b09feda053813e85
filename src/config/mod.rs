//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (AWS_LAMBDA_RUNTIME_API, _HANDLER, LOCAL_LAMBDA_SERVER_ENABLED)
//!     → validation.rs (semantic checks)
//!     → HostConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{env_config, load_config, read_config, ConfigError};
pub use validation::{validate_config, ValidationError};
pub use schema::{
    ClientConfig, HostConfig, LocalServerConfig, ObservabilityConfig, RuntimeConfig,
    ShutdownConfig, SignalKind,
};
