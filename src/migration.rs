//! One-time copy of embedded records into a freshly selected networked backend

use futures::TryStreamExt;
use serde_json::json;
use sqlx::any::AnyRow;
use sqlx::pool::PoolConnection;
use sqlx::{Any, Row};
use sqlx_backend_conn_mgr::{BackendKind, ConnectionSource, EmbeddedConfig, PoolConfig};
use sqlx_backend_toolkit::QueryExecutor;
use tracing::{debug, error, info};

use crate::Error;
use crate::statements::SqlQuery;

/// Why a required migration did not copy anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
   /// The networked active table already holds records
   TargetPopulated,
   /// There is no embedded database file to copy from
   NoSourceData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
   /// The backend did not change from embedded to networked
   NotRequired,
   Skipped(SkipReason),
   Completed {
      active: u64,
      history: u64,
   },
   /// The copy stopped at the first error; rows copied so far stay in place
   Failed {
      active: u64,
      history: u64,
      reason: String,
   },
}

/// Whether switching from `previous` to `current` calls for a migration.
/// A missing marker counts as embedded.
pub fn is_required(previous: Option<BackendKind>, current: BackendKind) -> bool {
   current == BackendKind::Networked
      && previous.unwrap_or(BackendKind::Embedded) == BackendKind::Embedded
}

/// Copies the embedded tables into the backend behind `target`.
pub struct Migrator<'a> {
   target: &'a QueryExecutor,
   source: EmbeddedConfig,
   pool_config: PoolConfig,
}

#[derive(Default)]
struct Counts {
   active: u64,
   history: u64,
}

impl<'a> Migrator<'a> {
   pub fn new(target: &'a QueryExecutor, source: EmbeddedConfig, pool_config: PoolConfig) -> Self {
      Self {
         target,
         source,
         pool_config,
      }
   }

   pub async fn migrate_if_needed(
      &self,
      previous: Option<BackendKind>,
      current: BackendKind,
   ) -> MigrationOutcome {
      if !is_required(previous, current) {
         debug!(?previous, %current, "No storage migration required");
         return MigrationOutcome::NotRequired;
      }

      info!("Storage switched from embedded to networked, checking for data to migrate");

      if self.target_has_records().await {
         info!("Networked database already contains punishments, skipping migration");
         return MigrationOutcome::Skipped(SkipReason::TargetPopulated);
      }

      let source_file = self.source.database_file();
      if !source_file.exists() {
         info!(path = %source_file.display(), "No embedded database found, nothing to migrate");
         return MigrationOutcome::Skipped(SkipReason::NoSourceData);
      }

      info!(path = %source_file.display(), "Migrating punishments to the networked database");

      let source_pool = match self.source.build_pool(&self.pool_config) {
         Ok(pool) => pool,
         Err(e) => return failed(&Counts::default(), e.to_string()),
      };

      let mut counts = Counts::default();
      let result = self.copy(&source_pool, &mut counts).await;
      source_pool.close().await;

      match result {
         Ok(()) => {
            info!(
               active = counts.active,
               history = counts.history,
               "Migration completed"
            );
            MigrationOutcome::Completed {
               active: counts.active,
               history: counts.history,
            }
         }
         Err(e) => failed(&counts, e.to_string()),
      }
   }

   async fn target_has_records(&self) -> bool {
      let sql = SqlQuery::SelectAllPunishmentsLimit.sql(self.target.kind());
      match self.target.try_fetch(&sql, &[json!(1)]).await {
         Ok(snapshot) => !snapshot.is_empty(),
         Err(e) => {
            debug!(error = %e, "Could not read networked punishments, treating as empty");
            false
         }
      }
   }

   async fn copy(&self, source_pool: &sqlx::AnyPool, counts: &mut Counts) -> Result<(), CopyError> {
      let target_pool = self.target.pool().map_err(CopyError::Target)?;
      let mut source = source_pool.acquire().await?;
      let mut target = target_pool.acquire().await?;
      let kind = self.target.kind();

      copy_table(
         &mut source,
         &mut target,
         &SqlQuery::SelectAllPunishments.sql(BackendKind::Embedded),
         &SqlQuery::InsertPunishment.sql(kind),
         &mut counts.active,
      )
      .await?;
      info!(count = counts.active, "Copied active punishments");

      copy_table(
         &mut source,
         &mut target,
         &SqlQuery::SelectAllPunishmentsHistory.sql(BackendKind::Embedded),
         &SqlQuery::InsertPunishmentHistory.sql(kind),
         &mut counts.history,
      )
      .await?;
      info!(count = counts.history, "Copied punishment history");

      Ok(())
   }
}

fn failed(counts: &Counts, reason: String) -> MigrationOutcome {
   let err = Error::MigrationFailed {
      active: counts.active,
      history: counts.history,
      reason: reason.clone(),
   };
   error!(error = %err, code = %err.error_code(), "Storage migration failed");

   MigrationOutcome::Failed {
      active: counts.active,
      history: counts.history,
      reason,
   }
}

#[derive(Debug, thiserror::Error)]
enum CopyError {
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),
   #[error(transparent)]
   Target(sqlx_backend_toolkit::Error),
}

async fn copy_table(
   source: &mut PoolConnection<Any>,
   target: &mut PoolConnection<Any>,
   select: &str,
   insert: &str,
   copied: &mut u64,
) -> Result<(), sqlx::Error> {
   let mut rows = sqlx::query(select).fetch(&mut **source);

   while let Some(row) = rows.try_next().await? {
      sqlx::query(insert)
         .bind(row.try_get::<Option<String>, _>("name")?)
         .bind(row.try_get::<Option<String>, _>("uuid")?)
         .bind(row.try_get::<Option<String>, _>("reason")?)
         .bind(row.try_get::<Option<String>, _>("operator")?)
         .bind(row.try_get::<Option<String>, _>("punishmentType")?)
         .bind(timestamp(&row, "start")?)
         .bind(timestamp(&row, "end")?)
         .bind(row.try_get::<Option<String>, _>("calculation")?)
         // Tables from before the column existed have no server
         .bind(row.try_get::<Option<String>, _>("server").unwrap_or(None))
         .execute(&mut **target)
         .await?;
      *copied += 1;
   }

   Ok(())
}

// Older embedded tables may hold timestamps as text
fn timestamp(row: &AnyRow, column: &str) -> Result<Option<i64>, sqlx::Error> {
   match row.try_get::<Option<i64>, _>(column) {
      Ok(value) => Ok(value),
      Err(e) => {
         let text = row.try_get::<Option<String>, _>(column).map_err(|_| e)?;
         text
            .map(|t| t.trim().parse::<i64>())
            .transpose()
            .map_err(|parse| sqlx::Error::ColumnDecode {
               index: column.to_string(),
               source: Box::new(parse),
            })
      }
   }
}
