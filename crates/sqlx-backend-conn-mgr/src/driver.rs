//! Driver resolution
//!
//! Each backend kind names an ordered list of candidate driver identifiers.
//! The first candidate compiled into this build wins; the identifier doubles
//! as the URL scheme handed to `sqlx::any`.

use tracing::debug;

use crate::{Error, Result};

/// Candidates for the networked backend, modern driver first.
pub const NETWORKED_DRIVERS: &[&str] = &["mysql", "mariadb"];

/// Candidates for the embedded backend.
pub const EMBEDDED_DRIVERS: &[&str] = &["sqlite"];

/// Driver identifiers compiled into this build.
pub fn compiled_drivers() -> &'static [&'static str] {
   &[
      #[cfg(feature = "sqlite")]
      "sqlite",
      #[cfg(feature = "mysql")]
      "mysql",
      #[cfg(feature = "mysql")]
      "mariadb",
   ]
}

/// Pick the first candidate present in `installed`.
pub fn resolve_driver(candidates: &[&str], installed: &[&'static str]) -> Result<&'static str> {
   for candidate in candidates {
      if let Some(&found) = installed.iter().find(|d| d.eq_ignore_ascii_case(candidate)) {
         debug!(driver = found, "Resolved database driver");
         return Ok(found);
      }
      debug!(driver = candidate, "Database driver not available, trying next candidate");
   }

   Err(Error::DriverUnavailable {
      candidates: candidates.iter().map(|c| c.to_string()).collect(),
   })
}

/// Register the compiled drivers with `sqlx::any`. Safe to call repeatedly.
pub(crate) fn install_drivers() {
   sqlx::any::install_default_drivers();
}
