use std::time::Duration;

use serde_json::Value as JsonValue;
use sqlx_backend_conn_mgr::{BackendConfig, BackendKind, connect};
use sqlx_backend_toolkit::{QueryExecutor, Snapshot, WriteQueryResult};
use tracing::{error, info, warn};

use crate::marker::StorageMarker;
use crate::migration::{MigrationOutcome, Migrator};
use crate::schema::{SchemaManager, SchemaReport};
use crate::statements::SqlQuery;
use crate::{Result, Settings};

/// Statement run before closing an embedded pool so SQLite can persist
/// its planner statistics.
const EMBEDDED_SHUTDOWN_STATEMENT: &str = "PRAGMA optimize";

/// What happened while opening the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSummary {
   /// Backend kind recorded by the previous session
   pub previous_backend: Option<BackendKind>,
   pub schema: SchemaReport,
   pub migration: MigrationOutcome,
}

/// Entry point of the persistence layer.
///
/// Owns the connection pool for the selected backend. Create one with
/// [`PersistenceService::open`], share it by reference or `Arc`, and call
/// [`PersistenceService::shutdown`] when the host stops.
pub struct PersistenceService {
   executor: QueryExecutor,
   backend: BackendConfig,
   setup: SetupSummary,
}

impl PersistenceService {
   /// Connect to the configured backend and bring it up to date.
   ///
   /// Reads the storage marker, builds the pool, validates one connection,
   /// ensures the schema, migrates embedded data when the backend changed
   /// to networked, then records the active backend in the marker. Only
   /// driver and connectivity problems are returned as errors; schema and
   /// migration problems are logged and reported in [`SetupSummary`].
   pub async fn open(settings: Settings) -> Result<Self> {
      let marker = StorageMarker::new(&settings.data_dir);
      let previous_backend = marker.read();

      let backend = settings.backend_config();
      let kind = backend.kind();
      info!(backend = %kind, ?previous_backend, "Opening moderation storage");

      let pool = connect(&backend, &settings.pool).inspect_err(|e| {
         error!(backend = %kind, error = %e, code = e.error_code(), "Failed to set up connection pool");
      })?;
      let executor = QueryExecutor::new(pool, kind);

      if let Err(e) = executor.validate(settings.pool.validation_timeout).await {
         error!(backend = %kind, error = %e, "Database connection failed validation");
         if kind == BackendKind::Networked {
            warn!("Verify the MySQL connection settings and that the server is reachable");
         }
         executor.close(None).await;
         return Err(e.into());
      }

      let schema = SchemaManager::new(&executor, backend.source().supports_schema_repair())
         .ensure_schema()
         .await;

      let migration = Migrator::new(&executor, settings.embedded_config(), settings.pool.clone())
         .migrate_if_needed(previous_backend, kind)
         .await;

      if let Err(e) = marker.write(kind) {
         warn!(path = %marker.path().display(), error = %e, "Could not write storage marker");
      }

      Ok(Self {
         executor,
         backend,
         setup: SetupSummary {
            previous_backend,
            schema,
            migration,
         },
      })
   }

   /// Execute a statement, logging any failure. Returns whether it succeeded.
   pub async fn execute(&self, query: SqlQuery, values: &[JsonValue]) -> bool {
      self.executor.execute(&self.sql(query), values).await
   }

   /// Execute a query, logging any failure. `None` means the result is
   /// unavailable; an empty snapshot means no rows matched.
   pub async fn execute_for_result(&self, query: SqlQuery, values: &[JsonValue]) -> Option<Snapshot> {
      self.executor.execute_for_result(&self.sql(query), values).await
   }

   pub async fn try_execute(&self, query: SqlQuery, values: &[JsonValue]) -> Result<WriteQueryResult> {
      Ok(self.executor.try_execute(&self.sql(query), values).await?)
   }

   pub async fn try_fetch(&self, query: SqlQuery, values: &[JsonValue]) -> Result<Snapshot> {
      Ok(self.executor.try_fetch(&self.sql(query), values).await?)
   }

   fn sql(&self, query: SqlQuery) -> String {
      query.sql(self.backend_kind())
   }

   /// Whether the pool is open.
   pub fn is_backend_healthy(&self) -> bool {
      self.executor.is_healthy()
   }

   /// Run the connectivity check against the live backend.
   pub async fn check_connection(&self, timeout: Duration) -> Result<()> {
      Ok(self.executor.validate(timeout).await?)
   }

   pub fn is_networked_backend(&self) -> bool {
      self.backend_kind() == BackendKind::Networked
   }

   pub fn backend_kind(&self) -> BackendKind {
      self.backend.kind()
   }

   pub fn setup_summary(&self) -> &SetupSummary {
      &self.setup
   }

   /// Close the pool. Statements issued afterwards fail with
   /// `NotInitialized`.
   pub async fn shutdown(&self) {
      let graceful = match self.backend_kind() {
         BackendKind::Embedded => Some(EMBEDDED_SHUTDOWN_STATEMENT),
         BackendKind::Networked => None,
      };
      self.executor.close(graceful).await;
      info!(backend = %self.backend_kind(), "Moderation storage closed");
   }
}
