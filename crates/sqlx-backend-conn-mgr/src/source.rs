//! Connection sources for the embedded and networked backends

use std::fs::create_dir_all;
use std::str::FromStr;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use sqlx::AnyPool;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use tracing::{info, warn};
use url::Url;

use crate::config::{BackendConfig, BackendKind, EmbeddedConfig, NetworkedConfig, PoolConfig};
use crate::driver::{
   EMBEDDED_DRIVERS, NETWORKED_DRIVERS, compiled_drivers, install_drivers, resolve_driver,
};
use crate::{Error, Result};

/// Statement used to validate networked connections before they are handed out.
pub const VALIDATION_QUERY: &str = "SELECT 1";

const PUBLIC_KEY_RETRIEVAL: &str = "allowPublicKeyRetrieval";

/// Capabilities a backend kind exposes to the rest of the persistence layer.
///
/// Pools are built lazily: no connection is opened until first use.
pub trait ConnectionSource {
   /// Backend kind this source connects to
   fn kind(&self) -> BackendKind;

   /// Whether column-type/column-presence repair and index creation apply
   fn supports_schema_repair(&self) -> bool;

   /// Driver-specific connect options, with the driver already resolved
   fn connect_options(&self) -> Result<AnyConnectOptions>;

   /// Pool options derived from the shared pool configuration
   fn pool_options(&self, config: &PoolConfig) -> AnyPoolOptions {
      AnyPoolOptions::new()
         .max_connections(config.max_connections)
         .acquire_timeout(config.acquire_timeout)
         .idle_timeout(config.idle_timeout)
   }

   /// Build the pool. Must be called from within a tokio runtime.
   fn build_pool(&self, config: &PoolConfig) -> Result<AnyPool> {
      let options = self.connect_options()?;
      Ok(self.pool_options(config).connect_lazy_with(options))
   }
}

impl ConnectionSource for EmbeddedConfig {
   fn kind(&self) -> BackendKind {
      BackendKind::Embedded
   }

   fn supports_schema_repair(&self) -> bool {
      false
   }

   fn connect_options(&self) -> Result<AnyConnectOptions> {
      install_drivers();
      let driver = resolve_driver(EMBEDDED_DRIVERS, compiled_drivers())?;

      let file = std::path::absolute(self.database_file())?;
      if let Some(parent) = file.parent() {
         create_dir_all(parent)?;
      }

      let url = Url::parse(&format!(
         "{driver}://{}?{}",
         file.display(),
         embedded_parameters()
      ))?;
      Ok(AnyConnectOptions::from_str(url.as_str())?)
   }
}

/// Create the file on first use and, on Unix, disable file locking: the
/// embedded database is only ever opened by this process.
fn embedded_parameters() -> &'static str {
   if cfg!(unix) {
      "mode=rwc&vfs=unix-none"
   } else {
      "mode=rwc"
   }
}

impl ConnectionSource for NetworkedConfig {
   fn kind(&self) -> BackendKind {
      BackendKind::Networked
   }

   fn supports_schema_repair(&self) -> bool {
      true
   }

   fn connect_options(&self) -> Result<AnyConnectOptions> {
      install_drivers();
      let driver = resolve_driver(NETWORKED_DRIVERS, compiled_drivers())?;

      let mut url = Url::parse(&format!(
         "{driver}://{}:{}/{}",
         self.host, self.port, self.database
      ))?;
      // The driver percent-decodes userinfo, so encode every reserved byte
      // (including `%`) before handing credentials to the URL
      let username = utf8_percent_encode(&self.username, NON_ALPHANUMERIC).to_string();
      let password = utf8_percent_encode(&self.password, NON_ALPHANUMERIC).to_string();
      url
         .set_username(&username)
         .and_then(|()| url.set_password(Some(&password)))
         .map_err(|()| Error::InvalidUrl(url::ParseError::SetHostOnCannotBeABaseUrl))?;
      url.set_query(Some(&connection_properties(&self.properties)));

      Ok(AnyConnectOptions::from_str(url.as_str())?)
   }

   fn pool_options(&self, config: &PoolConfig) -> AnyPoolOptions {
      let validation_timeout = config.validation_timeout;

      AnyPoolOptions::new()
         .max_connections(config.max_connections)
         .acquire_timeout(config.acquire_timeout)
         .idle_timeout(config.idle_timeout)
         .test_before_acquire(false)
         .before_acquire(move |conn, _meta| {
            Box::pin(async move {
               let check = sqlx::query(VALIDATION_QUERY).execute(&mut *conn);
               match tokio::time::timeout(validation_timeout, check).await {
                  Ok(Ok(_)) => Ok(true),
                  Ok(Err(e)) => {
                     warn!(error = %e, "Discarding pooled connection that failed validation");
                     Ok(false)
                  }
                  Err(_) => {
                     warn!(
                        timeout_ms = validation_timeout.as_millis() as u64,
                        "Discarding pooled connection, validation timed out"
                     );
                     Ok(false)
                  }
               }
            })
         })
   }
}

/// Normalize the user supplied property string.
///
/// Modern servers refuse `caching_sha2_password` logins over plain
/// connections unless public key retrieval is allowed, so the flag is
/// appended when missing. A JDBC style `useSSL=false` is mirrored as
/// `ssl-mode=DISABLED`. Other keys pass through and are ignored by the driver.
pub fn connection_properties(properties: &str) -> String {
   let mut properties = properties.trim().trim_start_matches('?').to_string();

   if !properties
      .to_lowercase()
      .contains(&PUBLIC_KEY_RETRIEVAL.to_lowercase())
   {
      if !properties.is_empty() {
         properties.push('&');
      }
      properties.push_str(PUBLIC_KEY_RETRIEVAL);
      properties.push_str("=true");
   }

   let ssl_disabled = properties.split('&').any(|pair| {
      pair.split_once('=').is_some_and(|(key, value)| {
         key.eq_ignore_ascii_case("useSSL") && value.eq_ignore_ascii_case("false")
      })
   });
   let has_ssl_mode = properties.split('&').any(|pair| {
      // The driver only recognizes these exact lowercase keys
      let key = pair.split('=').next().unwrap_or_default();
      key == "ssl-mode" || key == "sslmode"
   });
   if ssl_disabled && !has_ssl_mode {
      properties.push_str("&ssl-mode=DISABLED");
   }

   properties
}

impl BackendConfig {
   /// Capability view of the active backend.
   pub fn source(&self) -> &dyn ConnectionSource {
      match self {
         BackendConfig::Embedded(config) => config,
         BackendConfig::Networked(config) => config,
      }
   }
}

/// Build the pooled connection source for `config`.
pub fn connect(config: &BackendConfig, pool: &PoolConfig) -> Result<AnyPool> {
   let source = config.source();
   let pool = source.build_pool(pool)?;

   match config {
      BackendConfig::Embedded(embedded) => info!(
         backend = %source.kind(),
         file = %embedded.database_file().display(),
         "Configured embedded connection pool"
      ),
      BackendConfig::Networked(networked) => info!(
         backend = %source.kind(),
         host = %networked.host,
         port = networked.port,
         database = %networked.database,
         "Configured networked connection pool"
      ),
   }

   Ok(pool)
}
