#![allow(dead_code)]

use std::path::Path;

use moderation_store::{
   BackendConfig, BackendKind, EmbeddedConfig, PoolConfig, PunishmentRecord, PunishmentType,
   QueryExecutor,
};

/// Executor over the SQLite file beneath `dir`.
pub fn sqlite_executor(dir: &Path) -> QueryExecutor {
   let config = BackendConfig::Embedded(EmbeddedConfig::new(dir));
   let pool = sqlx_backend_conn_mgr::connect(&config, &PoolConfig::default())
      .expect("Failed to build pool");
   QueryExecutor::new(pool, BackendKind::Embedded)
}

pub fn uuid_for(n: u32) -> String {
   format!("{n:032x}")
}

pub fn record(n: u32, punishment_type: PunishmentType) -> PunishmentRecord {
   let start = 1_700_000_000_000 + i64::from(n) * 1_000;
   PunishmentRecord {
      id: None,
      name: format!("Player{n}"),
      uuid: uuid_for(n),
      reason: format!("Reason {n}"),
      operator: "Console".to_string(),
      punishment_type,
      start,
      end: if punishment_type.is_temporary() {
         start + 86_400_000
      } else {
         moderation_store::PERMANENT
      },
      calculation: String::new(),
      server: Some("lobby".to_string()),
   }
}

/// Route log output through the test harness. Safe to call from every test.
pub fn init_tracing() {
   let _ = tracing_subscriber::fmt()
      .with_test_writer()
      .with_max_level(tracing::Level::DEBUG)
      .try_init();
}
