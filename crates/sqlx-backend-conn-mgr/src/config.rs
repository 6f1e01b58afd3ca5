//! Configuration for backend connection pools

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Relative location of the embedded database file beneath the data directory.
pub const EMBEDDED_DATABASE_FILE: &str = "data/storage.db";

/// Properties used when the networked configuration does not provide any.
pub const DEFAULT_NETWORKED_PROPERTIES: &str = "verifyServerCertificate=false&useSSL=false&useUnicode=true&characterEncoding=utf8&allowPublicKeyRetrieval=true";

/// Which kind of backend a configuration (or a previous session) used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
   /// Embedded, file-backed SQLite database
   Embedded,
   /// Networked MySQL / MariaDB server
   Networked,
}

impl BackendKind {
   /// Token persisted for this kind in the storage marker file.
   pub fn token(self) -> &'static str {
      match self {
         BackendKind::Embedded => "sqlite",
         BackendKind::Networked => "mysql",
      }
   }
}

impl fmt::Display for BackendKind {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.token())
   }
}

/// Settings for the embedded backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedConfig {
   /// Base data directory; the database file lives at
   /// `<data_dir>/data/storage.db`.
   pub data_dir: PathBuf,
}

impl EmbeddedConfig {
   pub fn new(data_dir: impl Into<PathBuf>) -> Self {
      Self {
         data_dir: data_dir.into(),
      }
   }

   /// Full path of the embedded database file.
   pub fn database_file(&self) -> PathBuf {
      self.data_dir.join(EMBEDDED_DATABASE_FILE)
   }

   pub fn data_dir(&self) -> &Path {
      &self.data_dir
   }
}

/// Settings for the networked backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkedConfig {
   pub host: String,
   pub port: u16,
   pub database: String,
   pub username: String,
   pub password: String,
   /// Extra `key=value&key=value` connection properties
   pub properties: String,
}

impl Default for NetworkedConfig {
   fn default() -> Self {
      Self {
         host: "Unknown".to_string(),
         port: 3306,
         database: "Unknown".to_string(),
         username: "Unknown".to_string(),
         password: "Unknown".to_string(),
         properties: DEFAULT_NETWORKED_PROPERTIES.to_string(),
      }
   }
}

// Manual impl so the password never reaches a log line.
impl fmt::Debug for NetworkedConfig {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("NetworkedConfig")
         .field("host", &self.host)
         .field("port", &self.port)
         .field("database", &self.database)
         .field("username", &self.username)
         .field("password", &"***")
         .field("properties", &self.properties)
         .finish()
   }
}

/// Backend selection. Exactly one kind is active for a process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BackendConfig {
   Embedded(EmbeddedConfig),
   Networked(NetworkedConfig),
}

impl BackendConfig {
   pub fn kind(&self) -> BackendKind {
      match self {
         BackendConfig::Embedded(_) => BackendKind::Embedded,
         BackendConfig::Networked(_) => BackendKind::Networked,
      }
   }
}

/// Configuration for backend connection pools
///
/// # Examples
///
/// ```
/// use sqlx_backend_conn_mgr::PoolConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = PoolConfig::default();
///
/// // Override just one field
/// let config = PoolConfig {
///     max_connections: 4,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
   /// Maximum number of pooled connections
   ///
   /// Default: 10
   pub max_connections: u32,

   /// How long to wait for a connection before giving up
   ///
   /// Default: 5 seconds
   pub acquire_timeout: Duration,

   /// Upper bound for the `SELECT 1` validation query run on networked
   /// connections before they are handed out
   ///
   /// Default: 3 seconds
   pub validation_timeout: Duration,

   /// Connections idle for longer than this are closed
   ///
   /// Default: 10 minutes
   pub idle_timeout: Duration,
}

impl Default for PoolConfig {
   fn default() -> Self {
      Self {
         max_connections: 10,
         acquire_timeout: Duration::from_millis(5000),
         validation_timeout: Duration::from_millis(3000),
         idle_timeout: Duration::from_secs(600),
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_pool_config_defaults() {
      let config = PoolConfig::default();
      assert_eq!(config.acquire_timeout, Duration::from_millis(5000));
      assert_eq!(config.validation_timeout, Duration::from_millis(3000));
   }

   #[test]
   fn test_embedded_database_file() {
      let config = EmbeddedConfig::new("/srv/plugin");
      assert_eq!(
         config.database_file(),
         PathBuf::from("/srv/plugin/data/storage.db")
      );
   }

   #[test]
   fn test_networked_debug_hides_password() {
      let config = NetworkedConfig {
         password: "hunter2".into(),
         ..Default::default()
      };
      let rendered = format!("{config:?}");
      assert!(!rendered.contains("hunter2"));
      assert!(rendered.contains("3306"));
   }

   #[test]
   fn test_backend_kind_tokens() {
      assert_eq!(BackendKind::Embedded.token(), "sqlite");
      assert_eq!(BackendKind::Networked.to_string(), "mysql");
      let config = BackendConfig::Networked(NetworkedConfig::default());
      assert_eq!(config.kind(), BackendKind::Networked);
   }
}
