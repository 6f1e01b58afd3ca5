//! Error types for sqlx-backend-conn-mgr

use thiserror::Error;

/// Errors that may occur while building a connection source
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when preparing the embedded database directory
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// None of the candidate driver identifiers is compiled into this build
   #[error("no database driver available (tried: {})", candidates.join(", "))]
   DriverUnavailable { candidates: Vec<String> },

   /// The connection URI could not be assembled
   #[error("invalid connection url: {0}")]
   InvalidUrl(#[from] url::ParseError),
}

impl Error {
   /// Machine-readable code for this error.
   pub fn error_code(&self) -> &'static str {
      match self {
         Error::Io(_) => "IO_ERROR",
         Error::Sqlx(_) => "SQLX_ERROR",
         Error::DriverUnavailable { .. } => "DRIVER_UNAVAILABLE",
         Error::InvalidUrl(_) => "INVALID_URL",
      }
   }
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
