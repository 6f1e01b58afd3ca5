//! # sqlx-backend-conn-mgr
//!
//! Builds pooled SQLx connection sources for one of two backend kinds:
//! an embedded SQLite file for single-server installs, or a networked
//! MySQL / MariaDB server shared by several servers.
//!
//! ## Core Types
//!
//! - **[`BackendConfig`]**: Tagged selection of the embedded or networked backend
//! - **[`ConnectionSource`]**: Capabilities of a backend kind (pool building, schema repair support)
//! - **[`PoolConfig`]**: Connection pool timeouts and sizing
//! - **[`Error`]**: Error type for connection source construction
//!
//! ## Behavior
//!
//! - **Driver fallback**: candidate driver identifiers are tried in order; exhaustion is
//!   [`Error::DriverUnavailable`]
//! - **Lazy pools**: no connection is opened until first use
//! - **Validated hand-out**: networked connections run `SELECT 1` (bounded by
//!   [`PoolConfig::validation_timeout`]) before every acquire

mod config;
mod driver;
mod error;
mod source;

// Re-export public types
pub use config::{
   BackendConfig, BackendKind, DEFAULT_NETWORKED_PROPERTIES, EMBEDDED_DATABASE_FILE,
   EmbeddedConfig, NetworkedConfig, PoolConfig,
};
pub use driver::{EMBEDDED_DRIVERS, NETWORKED_DRIVERS, compiled_drivers, resolve_driver};
pub use error::{Error, Result};
pub use source::{ConnectionSource, VALIDATION_QUERY, connect, connection_properties};
