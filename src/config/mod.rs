//! Configuration subsystem.
//!
//! Schema types deserialize from TOML with defaults carrying the canonical
//! class table; `load_config` layers file values over those defaults and
//! rejects inconsistent combinations before any service is constructed.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::GatewayConfig;
