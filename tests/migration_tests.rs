mod common;

use common::{record, sqlite_executor};
use moderation_store::{
   BackendKind, EmbeddedConfig, MigrationOutcome, Migrator, PersistenceService, PoolConfig,
   PunishmentRecord, PunishmentType, QueryExecutor, SchemaManager, Settings, SkipReason, SqlQuery,
};
use serde_json::json;
use tempfile::TempDir;

/// Embedded install holding 3 active and 4 history records.
async fn seed_embedded(dir: &TempDir) {
   let service = PersistenceService::open(Settings::embedded(dir.path()))
      .await
      .expect("Failed to open embedded storage");

   for n in 0..3 {
      let r = record(n, PunishmentType::TempBan);
      assert!(service.execute(SqlQuery::InsertPunishment, &r.insert_values()).await);
      assert!(service.execute(SqlQuery::InsertPunishmentHistory, &r.insert_values()).await);
   }
   let kick = record(9, PunishmentType::Kick);
   assert!(
      service
         .execute(SqlQuery::InsertPunishmentHistory, &kick.insert_values())
         .await
   );

   service.shutdown().await;
}

/// Stand-in for the networked backend: a second SQLite file with the schema in place.
async fn target(dir: &TempDir) -> QueryExecutor {
   let db = sqlite_executor(dir.path());
   let report = SchemaManager::new(&db, false).ensure_schema().await;
   assert_eq!(report.tables_ensured, 2);
   db
}

async fn count(db: &QueryExecutor, query: SqlQuery) -> usize {
   db.try_fetch(&query.sql(db.kind()), &[]).await.unwrap().len()
}

#[tokio::test]
async fn test_migrates_once() {
   common::init_tracing();
   let source_dir = TempDir::new().unwrap();
   let target_dir = TempDir::new().unwrap();
   seed_embedded(&source_dir).await;
   let db = target(&target_dir).await;

   let migrator = Migrator::new(&db, EmbeddedConfig::new(source_dir.path()), PoolConfig::default());

   let outcome = migrator
      .migrate_if_needed(Some(BackendKind::Embedded), BackendKind::Networked)
      .await;
   assert_eq!(
      outcome,
      MigrationOutcome::Completed {
         active: 3,
         history: 4
      }
   );
   assert_eq!(count(&db, SqlQuery::SelectAllPunishments).await, 3);
   assert_eq!(count(&db, SqlQuery::SelectAllPunishmentsHistory).await, 4);

   // Next start: the marker now says networked
   let outcome = migrator
      .migrate_if_needed(Some(BackendKind::Networked), BackendKind::Networked)
      .await;
   assert_eq!(outcome, MigrationOutcome::NotRequired);

   // A lost marker still never copies twice
   let outcome = migrator.migrate_if_needed(None, BackendKind::Networked).await;
   assert_eq!(outcome, MigrationOutcome::Skipped(SkipReason::TargetPopulated));
   assert_eq!(count(&db, SqlQuery::SelectAllPunishments).await, 3);

   let copied = db
      .try_fetch(
         &SqlQuery::SelectUserPunishments.sql(db.kind()),
         &[json!(common::uuid_for(1))],
      )
      .await
      .unwrap();
   let copied = PunishmentRecord::from_row(copied.first().unwrap()).unwrap();
   assert_eq!(
      PunishmentRecord { id: None, ..copied },
      record(1, PunishmentType::TempBan)
   );

   db.close(None).await;
}

#[tokio::test]
async fn test_large_history_is_copied_row_by_row() {
   let source_dir = TempDir::new().unwrap();
   let target_dir = TempDir::new().unwrap();
   let source = sqlite_executor(source_dir.path());
   SchemaManager::new(&source, false).ensure_schema().await;
   for n in 0..500 {
      source
         .try_execute(
            &SqlQuery::InsertPunishmentHistory.sql(source.kind()),
            &record(n, PunishmentType::Warning).insert_values(),
         )
         .await
         .unwrap();
   }
   source.close(None).await;
   let db = target(&target_dir).await;

   let outcome = Migrator::new(&db, EmbeddedConfig::new(source_dir.path()), PoolConfig::default())
      .migrate_if_needed(Some(BackendKind::Embedded), BackendKind::Networked)
      .await;
   assert_eq!(
      outcome,
      MigrationOutcome::Completed {
         active: 0,
         history: 500
      }
   );
   assert_eq!(count(&db, SqlQuery::SelectAllPunishmentsHistory).await, 500);

   db.close(None).await;
}

#[tokio::test]
async fn test_populated_target_is_left_alone() {
   let source_dir = TempDir::new().unwrap();
   let target_dir = TempDir::new().unwrap();
   seed_embedded(&source_dir).await;
   let db = target(&target_dir).await;

   let existing = record(42, PunishmentType::Mute);
   db.try_execute(
      &SqlQuery::InsertPunishment.sql(db.kind()),
      &existing.insert_values(),
   )
   .await
   .unwrap();

   let outcome = Migrator::new(&db, EmbeddedConfig::new(source_dir.path()), PoolConfig::default())
      .migrate_if_needed(Some(BackendKind::Embedded), BackendKind::Networked)
      .await;
   assert_eq!(outcome, MigrationOutcome::Skipped(SkipReason::TargetPopulated));
   assert_eq!(count(&db, SqlQuery::SelectAllPunishments).await, 1);
   assert_eq!(count(&db, SqlQuery::SelectAllPunishmentsHistory).await, 0);

   db.close(None).await;
}

#[tokio::test]
async fn test_fresh_networked_install_has_nothing_to_copy() {
   let data_dir = TempDir::new().unwrap();
   let target_dir = TempDir::new().unwrap();
   let db = target(&target_dir).await;

   let outcome = Migrator::new(&db, EmbeddedConfig::new(data_dir.path()), PoolConfig::default())
      .migrate_if_needed(None, BackendKind::Networked)
      .await;
   assert_eq!(outcome, MigrationOutcome::Skipped(SkipReason::NoSourceData));
   assert!(!data_dir.path().join("data").exists());

   db.close(None).await;
}

#[tokio::test]
async fn test_legacy_source_without_server_column() {
   let source_dir = TempDir::new().unwrap();
   let target_dir = TempDir::new().unwrap();

   let legacy = sqlite_executor(source_dir.path());
   for table in ["Punishments", "PunishmentHistory"] {
      legacy
         .try_execute_unprepared(&format!(
            "CREATE TABLE `{table}` (`id` INTEGER PRIMARY KEY AUTOINCREMENT, `name` VARCHAR(16), \
             `uuid` VARCHAR(35), `reason` VARCHAR(100), `operator` VARCHAR(16), \
             `punishmentType` VARCHAR(16), `start` TEXT, `end` TEXT, `calculation` VARCHAR(50))"
         ))
         .await
         .unwrap();
   }
   legacy
      .try_execute(
         "INSERT INTO `Punishments` (`name`, `uuid`, `reason`, `operator`, `punishmentType`, \
          `start`, `end`, `calculation`) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
         &[
            json!("Notch"),
            json!("069a79f444e94726a5befca90e38aaf5"),
            json!("Griefing"),
            json!("Console"),
            json!("BAN"),
            json!("1600000000000"),
            json!("-1"),
            json!(""),
         ],
      )
      .await
      .unwrap();
   legacy.close(None).await;

   let db = target(&target_dir).await;
   let outcome = Migrator::new(&db, EmbeddedConfig::new(source_dir.path()), PoolConfig::default())
      .migrate_if_needed(Some(BackendKind::Embedded), BackendKind::Networked)
      .await;
   assert_eq!(
      outcome,
      MigrationOutcome::Completed {
         active: 1,
         history: 0
      }
   );

   let rows = db
      .try_fetch(&SqlQuery::SelectAllPunishments.sql(db.kind()), &[])
      .await
      .unwrap();
   let copied = PunishmentRecord::from_row(rows.first().unwrap()).unwrap();
   assert_eq!(copied.server, None);
   assert_eq!(copied.start, 1_600_000_000_000);
   assert!(copied.is_permanent());
   assert_eq!(copied.punishment_type, PunishmentType::Ban);

   db.close(None).await;
}

#[tokio::test]
async fn test_source_without_tables_fails_partway() {
   common::init_tracing();
   let source_dir = TempDir::new().unwrap();
   let target_dir = TempDir::new().unwrap();

   // A database file with no punishment tables in it
   let empty = sqlite_executor(source_dir.path());
   empty
      .try_execute_unprepared("CREATE TABLE unrelated (id INTEGER)")
      .await
      .unwrap();
   empty.close(None).await;

   let db = target(&target_dir).await;
   let outcome = Migrator::new(&db, EmbeddedConfig::new(source_dir.path()), PoolConfig::default())
      .migrate_if_needed(Some(BackendKind::Embedded), BackendKind::Networked)
      .await;

   match outcome {
      MigrationOutcome::Failed {
         active,
         history,
         reason,
      } => {
         assert_eq!((active, history), (0, 0));
         assert!(reason.contains("no such table"), "{reason}");
      }
      other => panic!("expected failure, got {other:?}"),
   }

   db.close(None).await;
}
