/// Result type alias for toolkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for statement execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Statement failed in the backend.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_backend_conn_mgr::Error),

   /// A statement was attempted before the pool existed, or after shutdown.
   #[error("connection pool is not initialized")]
   NotInitialized,

   /// The post-connect validation check failed or timed out.
   #[error("database connection is not valid: {0}")]
   ConnectionInvalid(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => match Diagnostic::from_sqlx(e) {
            Diagnostic {
               sql_state: Some(state),
               ..
            } => format!("STATEMENT_FAILED_{state}"),
            Diagnostic { code: Some(code), .. } => format!("STATEMENT_FAILED_{code}"),
            _ => "STATEMENT_FAILED".to_string(),
         },
         Error::ConnectionManager(e) => e.error_code().to_string(),
         Error::NotInitialized => "NOT_INITIALIZED".to_string(),
         Error::ConnectionInvalid(_) => "CONNECTION_INVALID".to_string(),
      }
   }

   /// Backend diagnostic for statement failures.
   pub fn diagnostic(&self) -> Option<Diagnostic> {
      match self {
         Error::Sqlx(e) => Some(Diagnostic::from_sqlx(e)),
         _ => None,
      }
   }

   /// Coarse classification used by schema repair.
   pub fn failure_kind(&self) -> FailureKind {
      self
         .diagnostic()
         .map(|d| d.failure_kind())
         .unwrap_or(FailureKind::Other)
   }
}

/// Backend specific details of a failed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
   pub message: String,
   /// Five character SQLSTATE, when the backend reports one
   pub sql_state: Option<String>,
   /// Vendor error number (MySQL) or extended result code (SQLite)
   pub code: Option<i64>,
}

impl Diagnostic {
   pub fn from_sqlx(err: &sqlx::Error) -> Self {
      let Some(db_err) = err.as_database_error() else {
         return Self {
            message: err.to_string(),
            sql_state: None,
            code: None,
         };
      };

      #[cfg(feature = "mysql")]
      if let Some(mysql) = db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
         return Self {
            message: mysql.message().to_string(),
            sql_state: mysql.code().map(str::to_string),
            code: Some(i64::from(mysql.number())),
         };
      }

      // SQLite reports its numeric result code as the error code
      let code = db_err.code();
      let numeric = code.as_deref().and_then(|c| c.parse::<i64>().ok());
      Self {
         message: db_err.message().to_string(),
         sql_state: match numeric {
            Some(_) => None,
            None => code.map(|c| c.into_owned()),
         },
         code: numeric,
      }
   }

   /// Classify a failure by vendor number, falling back to message text.
   pub fn failure_kind(&self) -> FailureKind {
      // Vendor numbers are only meaningful alongside an SQLSTATE (MySQL)
      let vendor = self.sql_state.as_ref().and(self.code);
      let message = self.message.as_str();

      if vendor == Some(ER_DUP_KEYNAME)
         || message.contains("Duplicate key name")
         || (message.contains("index") && message.contains("already exists"))
      {
         FailureKind::DuplicateIndex
      } else if vendor == Some(ER_BLOB_KEY_WITHOUT_LENGTH)
         || (message.contains("BLOB/TEXT") && message.contains("key length"))
      {
         FailureKind::UnindexableColumn
      } else if vendor == Some(ER_NO_SUCH_TABLE)
         || message.contains("doesn't exist")
         || message.contains("no such table")
      {
         FailureKind::MissingTable
      } else {
         FailureKind::Other
      }
   }
}

const ER_DUP_KEYNAME: i64 = 1061;
const ER_BLOB_KEY_WITHOUT_LENGTH: i64 = 1170;
const ER_NO_SUCH_TABLE: i64 = 1146;

/// Classification of backend failures that callers treat specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
   /// An index with the same name already exists
   DuplicateIndex,
   /// The indexed column is an unbounded text/blob type
   UnindexableColumn,
   /// The referenced table does not exist
   MissingTable,
   Other,
}
