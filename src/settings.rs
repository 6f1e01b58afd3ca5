//! Host supplied configuration

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use sqlx_backend_conn_mgr::{BackendConfig, EmbeddedConfig, NetworkedConfig, PoolConfig};

use crate::{Error, Result};

const KEY_USE_NETWORKED: &str = "UseMySQL";
const KEY_HOST: &str = "MySQL.IP";
const KEY_PORT: &str = "MySQL.Port";
const KEY_DATABASE: &str = "MySQL.DB-Name";
const KEY_USERNAME: &str = "MySQL.Username";
const KEY_PASSWORD: &str = "MySQL.Password";
const KEY_PROPERTIES: &str = "MySQL.Properties";

/// Settings for [`crate::PersistenceService::open`].
///
/// # Examples
///
/// ```
/// use moderation_store::Settings;
///
/// let settings = Settings::embedded("/srv/proxy/plugins/moderation");
/// assert!(!settings.use_networked);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
   /// Data directory of the host; holds the marker and the embedded database
   pub data_dir: PathBuf,

   /// Use the networked backend instead of the embedded file
   #[serde(default)]
   pub use_networked: bool,

   #[serde(default)]
   pub networked: NetworkedConfig,

   #[serde(skip)]
   pub pool: PoolConfig,
}

impl Settings {
   pub fn embedded(data_dir: impl Into<PathBuf>) -> Self {
      Self {
         data_dir: data_dir.into(),
         use_networked: false,
         networked: NetworkedConfig::default(),
         pool: PoolConfig::default(),
      }
   }

   pub fn networked(data_dir: impl Into<PathBuf>, networked: NetworkedConfig) -> Self {
      Self {
         use_networked: true,
         networked,
         ..Self::embedded(data_dir)
      }
   }

   /// Build settings from already parsed configuration entries. Missing
   /// keys keep their defaults.
   pub fn from_map(data_dir: impl Into<PathBuf>, entries: &HashMap<String, String>) -> Result<Self> {
      let mut settings = Self::embedded(data_dir);

      if let Some(value) = entries.get(KEY_USE_NETWORKED) {
         settings.use_networked = parse_bool(KEY_USE_NETWORKED, value)?;
      }

      let networked = &mut settings.networked;
      for (key, field) in [
         (KEY_HOST, &mut networked.host),
         (KEY_DATABASE, &mut networked.database),
         (KEY_USERNAME, &mut networked.username),
         (KEY_PASSWORD, &mut networked.password),
         (KEY_PROPERTIES, &mut networked.properties),
      ] {
         if let Some(value) = entries.get(key) {
            *field = value.clone();
         }
      }

      if let Some(value) = entries.get(KEY_PORT) {
         networked.port = value.trim().parse().map_err(|_| Error::InvalidSetting {
            key: KEY_PORT.to_string(),
            value: value.clone(),
         })?;
      }

      Ok(settings)
   }

   /// The backend selected by these settings.
   pub fn backend_config(&self) -> BackendConfig {
      if self.use_networked {
         BackendConfig::Networked(self.networked.clone())
      } else {
         BackendConfig::Embedded(self.embedded_config())
      }
   }

   /// Embedded configuration for this data directory, also used as the
   /// migration source when the networked backend is active.
   pub fn embedded_config(&self) -> EmbeddedConfig {
      EmbeddedConfig::new(&self.data_dir)
   }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
   match value.trim().to_ascii_lowercase().as_str() {
      "true" | "yes" | "on" => Ok(true),
      "false" | "no" | "off" | "" => Ok(false),
      _ => Err(Error::InvalidSetting {
         key: key.to_string(),
         value: value.to_string(),
      }),
   }
}
