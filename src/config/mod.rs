//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (read & deserialize)
//!     → cli.rs overrides (port, data dir, upstream)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → pieces handed to each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults so an empty or absent file is valid
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{read_config, ConfigError};
pub use schema::{
    BufferConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, QueueConfig, TimeoutConfig,
    UploadConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
