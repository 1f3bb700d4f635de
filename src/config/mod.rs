//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the server at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::GatewayConfig;
pub use schema::GatewayListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::WorkerListenerConfig;
