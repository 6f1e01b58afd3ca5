mod common;

use std::sync::Arc;

use common::{record, uuid_for};
use moderation_store::{
   BackendKind, Error, MigrationOutcome, PersistenceService, PunishmentRecord, PunishmentType,
   Settings, SqlQuery, StorageMarker,
};
use serde_json::json;
use tempfile::TempDir;

async fn open_embedded(temp_dir: &TempDir) -> PersistenceService {
   PersistenceService::open(Settings::embedded(temp_dir.path()))
      .await
      .expect("Failed to open embedded storage")
}

async fn insert(service: &PersistenceService, record: &PunishmentRecord) {
   record.validate().unwrap();
   assert!(
      service
         .execute(SqlQuery::InsertPunishment, &record.insert_values())
         .await
   );
   assert!(
      service
         .execute(SqlQuery::InsertPunishmentHistory, &record.insert_values())
         .await
   );
}

#[tokio::test]
async fn test_embedded_fresh_install() {
   common::init_tracing();
   let temp_dir = TempDir::new().unwrap();
   let service = open_embedded(&temp_dir).await;

   let summary = service.setup_summary();
   assert_eq!(summary.previous_backend, None);
   assert_eq!(summary.schema.tables_ensured, 2);
   assert_eq!(summary.schema.indexes_attempted(), 0);
   assert_eq!(summary.migration, MigrationOutcome::NotRequired);

   assert!(service.is_backend_healthy());
   assert!(!service.is_networked_backend());
   assert_eq!(service.backend_kind(), BackendKind::Embedded);
   assert!(temp_dir.path().join("data").join("storage.db").exists());
   assert_eq!(
      StorageMarker::new(temp_dir.path()).read(),
      Some(BackendKind::Embedded)
   );
   assert_eq!(
      std::fs::read_to_string(temp_dir.path().join(".storage")).unwrap(),
      "sqlite"
   );

   let active = service
      .execute_for_result(SqlQuery::SelectAllPunishments, &[])
      .await
      .unwrap();
   assert!(active.is_empty());

   service.shutdown().await;
}

#[tokio::test]
async fn test_record_round_trip() {
   let temp_dir = TempDir::new().unwrap();
   let service = open_embedded(&temp_dir).await;

   let original = record(1, PunishmentType::TempBan);
   insert(&service, &original).await;

   let rows = service
      .try_fetch(SqlQuery::SelectUserPunishments, &[json!(original.uuid)])
      .await
      .unwrap();
   assert_eq!(rows.len(), 1);

   let stored = PunishmentRecord::from_row(rows.first().unwrap()).unwrap();
   assert!(stored.id.is_some());
   assert_eq!(PunishmentRecord { id: None, ..stored }, original);

   let history = service
      .execute_for_result(SqlQuery::SelectUserPunishmentsHistory, &[json!(original.uuid)])
      .await
      .unwrap();
   assert_eq!(history.len(), 1);

   service.shutdown().await;
}

#[tokio::test]
async fn test_reopen_is_idempotent() {
   let temp_dir = TempDir::new().unwrap();

   let service = open_embedded(&temp_dir).await;
   insert(&service, &record(1, PunishmentType::Ban)).await;
   service.shutdown().await;

   let service = open_embedded(&temp_dir).await;
   let summary = service.setup_summary();
   assert_eq!(summary.previous_backend, Some(BackendKind::Embedded));
   assert_eq!(summary.schema.tables_ensured, 2);
   assert!(summary.schema.repair_failures.is_empty());

   let active = service
      .execute_for_result(SqlQuery::SelectAllPunishments, &[])
      .await
      .unwrap();
   assert_eq!(active.len(), 1);

   service.shutdown().await;
}

#[tokio::test]
async fn test_statements_after_shutdown_fail_fast() {
   let temp_dir = TempDir::new().unwrap();
   let service = open_embedded(&temp_dir).await;
   service.shutdown().await;

   assert!(!service.is_backend_healthy());
   assert!(
      service
         .execute_for_result(SqlQuery::SelectAllPunishments, &[])
         .await
         .is_none()
   );
   let err = service
      .try_fetch(SqlQuery::SelectAllPunishments, &[])
      .await
      .unwrap_err();
   assert_eq!(err.error_code(), "NOT_INITIALIZED");
   assert!(matches!(err, Error::Toolkit(_)));
}

#[tokio::test]
async fn test_maintenance_statements() {
   let temp_dir = TempDir::new().unwrap();
   let service = open_embedded(&temp_dir).await;

   let permanent = record(1, PunishmentType::Ban);
   let expired = PunishmentRecord {
      end: 1_700_000_005_000,
      ..record(2, PunishmentType::TempMute)
   };
   let running = PunishmentRecord {
      end: 4_000_000_000_000,
      ..record(3, PunishmentType::TempBan)
   };
   for r in [&permanent, &expired, &running] {
      insert(&service, r).await;
   }

   let exact = service
      .try_fetch(
         SqlQuery::SelectExactPunishment,
         &[json!(running.uuid), json!(running.start), json!("TEMP_BAN")],
      )
      .await
      .unwrap();
   assert_eq!(exact.len(), 1);
   let id = exact.get(0, "id").cloned().unwrap();

   let updated = service
      .try_execute(SqlQuery::UpdatePunishmentReason, &[json!("Appeal denied"), id.clone()])
      .await
      .unwrap();
   assert_eq!(updated.rows_affected, 1);
   let by_id = service
      .try_fetch(SqlQuery::SelectPunishmentById, &[id.clone()])
      .await
      .unwrap();
   assert_eq!(by_id.get(0, "reason"), Some(&json!("Appeal denied")));

   // Purge leaves permanent and still running punishments alone
   let purged = service
      .try_execute(SqlQuery::DeleteOldPunishments, &[json!(2_000_000_000_000_i64)])
      .await
      .unwrap();
   assert_eq!(purged.rows_affected, 1);

   let latest = service
      .try_fetch(SqlQuery::SelectAllPunishmentsLimit, &[json!(1)])
      .await
      .unwrap();
   assert_eq!(latest.get(0, "uuid"), Some(&json!(uuid_for(3))));

   assert!(service.execute(SqlQuery::DeletePunishment, &[id]).await);
   let remaining = service
      .try_fetch(SqlQuery::SelectAllPunishments, &[])
      .await
      .unwrap();
   assert_eq!(remaining.len(), 1);

   let history = service
      .try_fetch(SqlQuery::SelectAllPunishmentsHistoryLimit, &[json!(10)])
      .await
      .unwrap();
   assert_eq!(history.len(), 3);

   service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers() {
   let temp_dir = TempDir::new().unwrap();
   let service = Arc::new(open_embedded(&temp_dir).await);

   let mut handles = Vec::new();
   for n in 0..24 {
      let service = Arc::clone(&service);
      handles.push(tokio::spawn(async move {
         let r = record(n, PunishmentType::Warning);
         assert!(
            service
               .execute(SqlQuery::InsertPunishment, &r.insert_values())
               .await
         );
         let rows = service
            .execute_for_result(SqlQuery::SelectUserPunishments, &[serde_json::json!(r.uuid)])
            .await
            .expect("query result");
         assert_eq!(rows.len(), 1);
         assert_eq!(PunishmentRecord::from_row(&rows.rows()[0]).unwrap().uuid, r.uuid);
      }));
   }
   for handle in handles {
      handle.await.unwrap();
   }

   let all = service
      .execute_for_result(SqlQuery::SelectAllPunishments, &[])
      .await
      .unwrap();
   assert_eq!(all.len(), 24);

   service.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_networked_backend_fails_open() {
   common::init_tracing();
   let temp_dir = TempDir::new().unwrap();
   let mut settings = Settings::networked(
      temp_dir.path(),
      moderation_store::NetworkedConfig {
         host: "127.0.0.1".into(),
         port: 1,
         ..Default::default()
      },
   );
   settings.pool.validation_timeout = std::time::Duration::from_millis(500);
   settings.pool.acquire_timeout = std::time::Duration::from_millis(500);

   let err = match PersistenceService::open(settings).await {
      Ok(_) => panic!("expected the connection check to fail"),
      Err(e) => e,
   };
   assert_eq!(err.error_code(), "CONNECTION_INVALID");

   // Nothing was set up, so the marker stays untouched
   assert_eq!(StorageMarker::new(temp_dir.path()).read(), None);
}
