//! Idempotent creation and forward-only evolution of the punishment tables

use serde_json::json;
use sqlx_backend_conn_mgr::BackendKind;
use sqlx_backend_toolkit::{FailureKind, QueryExecutor};
use tracing::{debug, info, warn};

use crate::statements::{ACTIVE_TABLE, HISTORY_TABLE, SqlQuery};
use crate::{Error, Result};

/// Columns holding millisecond timestamps; older installs created them as text.
pub const TIMESTAMP_COLUMNS: [&str; 2] = ["start", "end"];

/// Column added after the first schema version.
pub const SERVER_COLUMN: &str = "server";

const SERVER_COLUMN_DEFINITION: &str = "VARCHAR(64) NULL DEFAULT NULL";

const LARGE_TEXT_TYPES: [&str; 3] = ["text", "mediumtext", "longtext"];

/// A secondary index the schema should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDescriptor {
   pub table: &'static str,
   pub name: &'static str,
   pub columns: &'static [&'static str],
}

impl IndexDescriptor {
   pub fn create_statement(&self) -> String {
      let columns = self
         .columns
         .iter()
         .map(|column| format!("`{column}`"))
         .collect::<Vec<_>>()
         .join(", ");
      format!("CREATE INDEX `{}` ON `{}` ({columns})", self.name, self.table)
   }
}

/// Indexes created on the networked backend.
pub const INDEXES: [IndexDescriptor; 6] = [
   IndexDescriptor {
      table: ACTIVE_TABLE,
      name: "idx_punishments_uuid_type_start",
      columns: &["uuid", "punishmentType", "start"],
   },
   IndexDescriptor {
      table: ACTIVE_TABLE,
      name: "idx_punishments_end",
      columns: &["end"],
   },
   IndexDescriptor {
      table: ACTIVE_TABLE,
      name: "idx_punishments_start",
      columns: &["start"],
   },
   IndexDescriptor {
      table: HISTORY_TABLE,
      name: "idx_history_uuid",
      columns: &["uuid"],
   },
   IndexDescriptor {
      table: HISTORY_TABLE,
      name: "idx_history_uuid_calculation",
      columns: &["uuid", "calculation"],
   },
   IndexDescriptor {
      table: HISTORY_TABLE,
      name: "idx_history_start",
      columns: &["start"],
   },
];

/// What one `ensure_schema` run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
   /// Base tables whose `CREATE TABLE IF NOT EXISTS` succeeded
   pub tables_ensured: usize,
   /// `table.column` entries converted from text to BIGINT
   pub columns_converted: Vec<String>,
   /// `table.column` entries added
   pub columns_added: Vec<String>,
   pub indexes_created: Vec<&'static str>,
   pub indexes_present: Vec<&'static str>,
   pub indexes_skipped: Vec<&'static str>,
   /// Rendered [`Error::SchemaRepairFailed`] messages
   pub repair_failures: Vec<String>,
}

impl SchemaReport {
   /// Number of index creation statements issued or found unnecessary.
   pub fn indexes_attempted(&self) -> usize {
      self.indexes_created.len() + self.indexes_present.len() + self.indexes_skipped.len()
   }
}

enum IndexOutcome {
   Created,
   Present,
   Skipped,
}

/// Creates and repairs the schema through a [`QueryExecutor`].
pub struct SchemaManager<'a> {
   executor: &'a QueryExecutor,
   repair: bool,
}

impl<'a> SchemaManager<'a> {
   /// `repair` enables the column and index passes; only backends that
   /// support schema repair should turn it on.
   pub fn new(executor: &'a QueryExecutor, repair: bool) -> Self {
      Self { executor, repair }
   }

   fn kind(&self) -> BackendKind {
      self.executor.kind()
   }

   /// Bring the schema up to date. Safe to run on every start; no step is
   /// fatal, failures are logged and recorded in the report.
   pub async fn ensure_schema(&self) -> SchemaReport {
      let mut report = SchemaReport::default();

      for query in [
         SqlQuery::CreateTablePunishment,
         SqlQuery::CreateTablePunishmentHistory,
      ] {
         let sql = query.sql(self.kind());
         match self.executor.try_execute_unprepared(&sql).await {
            Ok(()) => report.tables_ensured += 1,
            Err(e) => self.executor.log_failure(&sql, &e),
         }
      }

      if !self.repair {
         debug!(backend = %self.kind(), "Backend does not support schema repair, skipping");
         return report;
      }

      // Text timestamps cannot be indexed, so convert them first
      self.repair_column_types(&mut report).await;
      self.add_missing_columns(&mut report).await;
      self.create_indexes(&mut report).await;

      info!(
         tables = report.tables_ensured,
         converted = report.columns_converted.len(),
         added = report.columns_added.len(),
         indexes_created = report.indexes_created.len(),
         indexes_present = report.indexes_present.len(),
         indexes_skipped = report.indexes_skipped.len(),
         "Schema check finished"
      );
      report
   }

   async fn repair_column_types(&self, report: &mut SchemaReport) {
      for table in [ACTIVE_TABLE, HISTORY_TABLE] {
         for column in TIMESTAMP_COLUMNS {
            let target = format!("{table}.{column}");
            let data_type = match self.column_type(table, column).await {
               Ok(Some(data_type)) => data_type,
               Ok(None) => continue,
               Err(e) => {
                  record_failure(report, target, e.to_string());
                  continue;
               }
            };

            if !is_large_text_type(&data_type) {
               continue;
            }

            let Some(sql) = modify_column_statement(self.kind(), table, column) else {
               record_failure(
                  report,
                  target,
                  format!("cannot convert {data_type} column on this backend"),
               );
               continue;
            };

            info!(table, column, data_type = %data_type, "Converting text column to BIGINT");
            match self.executor.try_execute_unprepared(&sql).await {
               Ok(()) => report.columns_converted.push(target),
               Err(e) => record_failure(report, target, e.to_string()),
            }
         }
      }
   }

   async fn add_missing_columns(&self, report: &mut SchemaReport) {
      for table in [ACTIVE_TABLE, HISTORY_TABLE] {
         let target = format!("{table}.{SERVER_COLUMN}");
         match self.column_type(table, SERVER_COLUMN).await {
            Ok(Some(_)) => {}
            Ok(None) => {
               info!(table, column = SERVER_COLUMN, "Adding missing column");
               let sql = format!(
                  "ALTER TABLE `{table}` ADD COLUMN `{SERVER_COLUMN}` {SERVER_COLUMN_DEFINITION}"
               );
               match self.executor.try_execute_unprepared(&sql).await {
                  Ok(()) => report.columns_added.push(target),
                  Err(e) => record_failure(report, target, e.to_string()),
               }
            }
            Err(e) => record_failure(report, target, e.to_string()),
         }
      }
   }

   async fn create_indexes(&self, report: &mut SchemaReport) {
      for descriptor in &INDEXES {
         match self.ensure_index(descriptor).await {
            IndexOutcome::Created => report.indexes_created.push(descriptor.name),
            IndexOutcome::Present => report.indexes_present.push(descriptor.name),
            IndexOutcome::Skipped => report.indexes_skipped.push(descriptor.name),
         }
      }
   }

   async fn ensure_index(&self, descriptor: &IndexDescriptor) -> IndexOutcome {
      let index = descriptor.name;
      let table = descriptor.table;

      match self.index_exists(table, index).await {
         Ok(true) => {
            debug!(index, table, "Index already exists");
            return IndexOutcome::Present;
         }
         Ok(false) => {}
         Err(e) => warn!(index, table, error = %e, "Index lookup failed, attempting creation"),
      }

      info!(index, table, "Creating index");
      let sql = descriptor.create_statement();
      if let Err(e) = self.executor.try_execute_unprepared(&sql).await {
         return match e.failure_kind() {
            FailureKind::DuplicateIndex => {
               debug!(index, table, "Index already exists");
               IndexOutcome::Present
            }
            FailureKind::UnindexableColumn => {
               warn!(
                  index,
                  table,
                  columns = ?descriptor.columns,
                  "Cannot index a TEXT/BLOB column; convert it to BIGINT and restart to create this index"
               );
               IndexOutcome::Skipped
            }
            _ => {
               warn!(index, table, error = %e, code = %e.error_code(), "Failed to create index");
               IndexOutcome::Skipped
            }
         };
      }

      match self.index_exists(table, index).await {
         Ok(true) => info!(index, table, "Index created"),
         Ok(false) => warn!(index, table, "Index was created but could not be found afterwards"),
         Err(e) => warn!(index, table, error = %e, "Could not verify index creation"),
      }
      IndexOutcome::Created
   }

   /// Whether `table` carries an index named `index` (compared
   /// case-insensitively).
   ///
   /// Backends fold table names differently, so the lookup tries the name
   /// as given, lower case and upper case within the current database, then
   /// as given without restricting the database. A lookup reporting that the
   /// table does not exist counts as "not found".
   pub async fn index_exists(&self, table: &str, index: &str) -> Result<bool> {
      let variants = [
         (table.to_string(), true),
         (table.to_lowercase(), true),
         (table.to_uppercase(), true),
         (table.to_string(), false),
      ];

      for (name, current_catalog) in variants {
         let sql = index_list_query(self.kind(), current_catalog);
         let snapshot = match self.executor.try_fetch(sql, &[json!(name)]).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.failure_kind() == FailureKind::MissingTable => continue,
            Err(e) => return Err(e.into()),
         };

         let found = (0..snapshot.len()).any(|row| {
            snapshot
               .get(row, "INDEX_NAME")
               .and_then(|value| value.as_str())
               .is_some_and(|name| name.eq_ignore_ascii_case(index))
         });
         if found {
            return Ok(true);
         }
      }

      Ok(false)
   }

   /// Reported data type of `table.column`, `None` when the column is absent.
   pub async fn column_type(&self, table: &str, column: &str) -> Result<Option<String>> {
      let snapshot = self
         .executor
         .try_fetch(column_type_query(self.kind()), &[json!(table), json!(column)])
         .await?;

      Ok(snapshot
         .get(0, "DATA_TYPE")
         .and_then(|value| value.as_str())
         .map(str::to_string))
   }
}

fn record_failure(report: &mut SchemaReport, target: String, reason: String) {
   let err = Error::SchemaRepairFailed { target, reason };
   warn!(error = %err, code = %err.error_code(), "Schema repair step failed");
   report.repair_failures.push(err.to_string());
}

/// Whether a reported column type is one of the large text types that
/// must be converted to BIGINT before indexing.
pub fn is_large_text_type(data_type: &str) -> bool {
   let data_type = data_type.trim();
   LARGE_TEXT_TYPES
      .iter()
      .any(|large| large.eq_ignore_ascii_case(data_type))
}

/// DDL converting a timestamp column to BIGINT, when the backend can
/// change a column type in place.
pub fn modify_column_statement(kind: BackendKind, table: &str, column: &str) -> Option<String> {
   match kind {
      BackendKind::Networked => Some(format!(
         "ALTER TABLE `{table}` MODIFY COLUMN `{column}` BIGINT DEFAULT NULL"
      )),
      BackendKind::Embedded => None,
   }
}

fn column_type_query(kind: BackendKind) -> &'static str {
   match kind {
      BackendKind::Networked => {
         "SELECT CAST(DATA_TYPE AS CHAR) AS DATA_TYPE FROM information_schema.COLUMNS \
          WHERE TABLE_SCHEMA = DATABASE() AND LOWER(TABLE_NAME) = LOWER(?) AND COLUMN_NAME = ?"
      }
      BackendKind::Embedded => {
         "SELECT type AS DATA_TYPE FROM pragma_table_info(?) WHERE name = ? COLLATE NOCASE"
      }
   }
}

fn index_list_query(kind: BackendKind, current_catalog: bool) -> &'static str {
   match (kind, current_catalog) {
      (BackendKind::Networked, true) => {
         "SELECT DISTINCT CAST(INDEX_NAME AS CHAR) AS INDEX_NAME FROM information_schema.STATISTICS \
          WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
      }
      (BackendKind::Networked, false) => {
         "SELECT DISTINCT CAST(INDEX_NAME AS CHAR) AS INDEX_NAME FROM information_schema.STATISTICS \
          WHERE TABLE_NAME = ?"
      }
      (BackendKind::Embedded, true) => {
         "SELECT name AS INDEX_NAME FROM main.sqlite_master WHERE type = 'index' AND tbl_name = ?"
      }
      (BackendKind::Embedded, false) => "SELECT name AS INDEX_NAME FROM pragma_index_list(?)",
   }
}
