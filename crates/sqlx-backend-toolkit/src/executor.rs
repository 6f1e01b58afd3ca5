use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::AnyPool;
use sqlx_backend_conn_mgr::{BackendKind, VALIDATION_QUERY};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::decode::bind_value;
use crate::{Error, Result, Snapshot};

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub rows_affected: u64,
   /// Backend generated key of the last inserted row, when reported.
   pub last_insert_id: Option<i64>,
}

/// Serialized access to a pooled backend.
///
/// Every statement runs inside one critical section: acquire a pooled
/// connection, prepare, bind, execute, drain the result, release. Throughput
/// is traded for freedom from pool exhaustion and driver thread-safety
/// surprises; moderation writes are rare.
pub struct QueryExecutor {
   pool: RwLock<Option<AnyPool>>,
   gate: Mutex<()>,
   kind: BackendKind,
}

impl QueryExecutor {
   pub fn new(pool: AnyPool, kind: BackendKind) -> Self {
      Self {
         pool: RwLock::new(Some(pool)),
         gate: Mutex::new(()),
         kind,
      }
   }

   /// An executor without a pool; every statement fails with `NotInitialized`.
   pub fn uninitialized(kind: BackendKind) -> Self {
      Self {
         pool: RwLock::new(None),
         gate: Mutex::new(()),
         kind,
      }
   }

   pub fn kind(&self) -> BackendKind {
      self.kind
   }

   /// Whether a pool exists and has not been closed.
   pub fn is_healthy(&self) -> bool {
      self
         .pool
         .read()
         .as_ref()
         .is_some_and(|pool| !pool.is_closed())
   }

   /// Clone of the pool handle, for callers that need a connection outside
   /// the critical section (bulk copies).
   pub fn pool(&self) -> Result<AnyPool> {
      self.pool.read().clone().ok_or(Error::NotInitialized)
   }

   /// Run the `SELECT 1` connectivity check. `timeout` bounds the statement
   /// only; acquiring the connection is governed by the pool's own timeout.
   pub async fn validate(&self, timeout: Duration) -> Result<()> {
      let pool = self.pool()?;
      let mut conn = pool
         .acquire()
         .await
         .map_err(|e| Error::ConnectionInvalid(e.to_string()))?;

      match tokio::time::timeout(timeout, sqlx::query(VALIDATION_QUERY).execute(&mut *conn)).await {
         Ok(Ok(_)) => Ok(()),
         Ok(Err(e)) => Err(Error::ConnectionInvalid(e.to_string())),
         Err(_) => Err(Error::ConnectionInvalid(format!(
            "validation query did not answer within {} ms",
            timeout.as_millis()
         ))),
      }
   }

   /// Execute a statement that produces no rows.
   pub async fn try_execute(&self, query: &str, values: &[JsonValue]) -> Result<WriteQueryResult> {
      let _guard = self.gate.lock().await;
      let pool = self.pool()?;
      let mut conn = pool.acquire().await?;

      let mut q = sqlx::query(query);
      for value in values {
         q = bind_value(q, value);
      }

      let result = q.execute(&mut *conn).await?;
      Ok(WriteQueryResult {
         rows_affected: result.rows_affected(),
         last_insert_id: result.last_insert_id(),
      })
   }

   /// Execute a statement without preparing it. Used for DDL, which some
   /// servers refuse to prepare.
   pub async fn try_execute_unprepared(&self, statement: &str) -> Result<()> {
      let _guard = self.gate.lock().await;
      let pool = self.pool()?;
      let mut conn = pool.acquire().await?;

      sqlx::raw_sql(statement).execute(&mut *conn).await?;
      Ok(())
   }

   /// Execute a query and return its rows as a detached snapshot.
   pub async fn try_fetch(&self, query: &str, values: &[JsonValue]) -> Result<Snapshot> {
      let _guard = self.gate.lock().await;
      let pool = self.pool()?;
      let mut conn = pool.acquire().await?;

      let mut q = sqlx::query(query);
      for value in values {
         q = bind_value(q, value);
      }

      // Drain fully while the connection is still held
      let rows = q.fetch_all(&mut *conn).await?;
      Snapshot::from_rows(rows)
   }

   /// Execute a statement, logging any failure. Returns whether it succeeded.
   pub async fn execute(&self, query: &str, values: &[JsonValue]) -> bool {
      match self.try_execute(query, values).await {
         Ok(_) => true,
         Err(e) => {
            self.log_failure(query, &e);
            false
         }
      }
   }

   /// Execute a query, logging any failure.
   ///
   /// `None` means the result is unavailable, not that there are no rows.
   pub async fn execute_for_result(&self, query: &str, values: &[JsonValue]) -> Option<Snapshot> {
      match self.try_fetch(query, values).await {
         Ok(snapshot) => Some(snapshot),
         Err(e) => {
            self.log_failure(query, &e);
            None
         }
      }
   }

   /// Log a failed statement. Statement text only goes to `debug`; bound
   /// values are never logged.
   pub fn log_failure(&self, query: &str, err: &Error) {
      match err {
         Error::NotInitialized => error!(
            backend = %self.kind,
            "Statement attempted before the connection pool was initialized"
         ),
         Error::Sqlx(e) => {
            let diagnostic = crate::Diagnostic::from_sqlx(e);
            error!(
               backend = %self.kind,
               message = %diagnostic.message,
               sql_state = diagnostic.sql_state.as_deref().unwrap_or("-"),
               code = diagnostic.code.unwrap_or_default(),
               "Failed to execute statement"
            );
            if self.kind == BackendKind::Networked {
               warn!("Verify the MySQL connection settings and that the server is reachable");
            }
         }
         other => error!(backend = %self.kind, error = %other, "Failed to execute statement"),
      }
      debug!(query = %query, "Failed statement");
   }

   /// Close the pool. `graceful` runs first when given (embedded backends
   /// use it to flush engine state). Later statements fail with
   /// `NotInitialized`.
   pub async fn close(&self, graceful: Option<&str>) {
      let _guard = self.gate.lock().await;
      let Some(pool) = self.pool.write().take() else {
         debug!("Connection pool already closed");
         return;
      };

      if let Some(statement) = graceful
         && let Err(e) = sqlx::raw_sql(statement).execute(&pool).await
      {
         warn!(error = %e, "An unexpected error occurred shutting down the database");
      }

      pool.close().await;
      debug!(backend = %self.kind, "Connection pool closed");
   }
}
