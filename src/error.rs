//! Error types for moderation-store

use thiserror::Error;

/// Errors surfaced by the persistence layer
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when reading or writing the storage marker
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Building the connection source failed (includes `DriverUnavailable`)
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_backend_conn_mgr::Error),

   /// Statement execution failed (includes `ConnectionInvalid`,
   /// `NotInitialized` and classified statement failures)
   #[error(transparent)]
   Toolkit(#[from] sqlx_backend_toolkit::Error),

   /// A column or index repair step could not be applied
   #[error("schema repair failed for {target}: {reason}")]
   SchemaRepairFailed { target: String, reason: String },

   /// The embedded to networked copy stopped part way
   #[error(
      "migration failed after copying {active} active and {history} history records: {reason}"
   )]
   MigrationFailed {
      active: u64,
      history: u64,
      reason: String,
   },

   /// A record read back from storage or supplied by a caller is malformed
   #[error("invalid punishment record: {0}")]
   InvalidRecord(String),

   /// A configuration value could not be parsed
   #[error("invalid value for setting {key}: {value}")]
   InvalidSetting { key: String, value: String },
}

impl Error {
   /// Machine-readable code for this error.
   pub fn error_code(&self) -> String {
      match self {
         Error::Io(_) => "IO_ERROR".to_string(),
         Error::ConnectionManager(e) => e.error_code().to_string(),
         Error::Toolkit(e) => e.error_code(),
         Error::SchemaRepairFailed { .. } => "SCHEMA_REPAIR_FAILED".to_string(),
         Error::MigrationFailed { .. } => "MIGRATION_FAILED".to_string(),
         Error::InvalidRecord(_) => "INVALID_RECORD".to_string(),
         Error::InvalidSetting { .. } => "INVALID_SETTING".to_string(),
      }
   }
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
