//! # moderation-store
//!
//! Persistence and schema evolution for moderation records (bans, mutes,
//! warnings) on either an embedded SQLite file or a networked MySQL /
//! MariaDB server.
//!
//! - **[`PersistenceService`]**: opens the configured backend, ensures the schema,
//!   migrates embedded data once when switching to networked, executes statements
//! - **[`SqlQuery`]**: fixed statements rendered per backend dialect
//! - **[`PunishmentRecord`]**: typed view of a stored row
//! - **[`SchemaManager`]** / **[`Migrator`]**: usable on their own against a
//!   [`QueryExecutor`]
//!
//! ```no_run
//! use moderation_store::{PersistenceService, Settings, SqlQuery};
//!
//! # async fn run() -> moderation_store::Result<()> {
//! let service = PersistenceService::open(Settings::embedded("/srv/proxy/moderation")).await?;
//! let bans = service
//!    .execute_for_result(SqlQuery::SelectAllPunishments, &[])
//!    .await;
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod marker;
mod migration;
mod record;
mod schema;
mod service;
mod settings;
mod statements;

pub use error::{Error, Result};
pub use marker::{MARKER_FILE, StorageMarker};
pub use migration::{MigrationOutcome, Migrator, SkipReason, is_required as migration_required};
pub use record::{PERMANENT, PunishmentRecord, PunishmentType};
pub use schema::{
   INDEXES, IndexDescriptor, SERVER_COLUMN, SchemaManager, SchemaReport, TIMESTAMP_COLUMNS,
   is_large_text_type, modify_column_statement,
};
pub use service::{PersistenceService, SetupSummary};
pub use settings::Settings;
pub use statements::{ACTIVE_TABLE, HISTORY_TABLE, SqlQuery};

pub use sqlx_backend_conn_mgr::{
   BackendConfig, BackendKind, EmbeddedConfig, NetworkedConfig, PoolConfig,
};
pub use sqlx_backend_toolkit::{
   Diagnostic, FailureKind, QueryExecutor, Snapshot, SnapshotRow, WriteQueryResult,
};
