//! Fixed statements, one per identifier, rendered for a backend dialect

use sqlx_backend_conn_mgr::BackendKind;

/// Name of the table holding currently active punishments.
pub const ACTIVE_TABLE: &str = "Punishments";

/// Name of the table holding every punishment ever issued.
pub const HISTORY_TABLE: &str = "PunishmentHistory";

/// Statement identifiers.
///
/// Identifiers are quoted with backticks, which both MySQL and SQLite
/// accept, so only the table definitions differ between dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlQuery {
   CreateTablePunishment,
   CreateTablePunishmentHistory,
   /// Params: name, uuid, reason, operator, punishmentType, start, end, calculation, server
   InsertPunishment,
   /// Params: same as [`SqlQuery::InsertPunishment`]
   InsertPunishmentHistory,
   SelectAllPunishments,
   SelectAllPunishmentsHistory,
   /// Params: limit
   SelectAllPunishmentsLimit,
   /// Params: limit
   SelectAllPunishmentsHistoryLimit,
   /// Params: id
   SelectPunishmentById,
   /// Params: uuid
   SelectUserPunishments,
   /// Params: uuid
   SelectUserPunishmentsHistory,
   /// Params: uuid, start, punishmentType
   SelectExactPunishment,
   /// Params: id
   DeletePunishment,
   /// Params: now (ms since epoch). Permanent records are kept.
   DeleteOldPunishments,
   /// Params: reason, id
   UpdatePunishmentReason,
}

const INSERT_COLUMNS: &str = "(`name`, `uuid`, `reason`, `operator`, `punishmentType`, `start`, `end`, `calculation`, `server`) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

impl SqlQuery {
   /// Statement text for the given backend.
   pub fn sql(self, kind: BackendKind) -> String {
      match self {
         SqlQuery::CreateTablePunishment => create_table(ACTIVE_TABLE, kind),
         SqlQuery::CreateTablePunishmentHistory => create_table(HISTORY_TABLE, kind),
         SqlQuery::InsertPunishment => format!("INSERT INTO `{ACTIVE_TABLE}` {INSERT_COLUMNS}"),
         SqlQuery::InsertPunishmentHistory => {
            format!("INSERT INTO `{HISTORY_TABLE}` {INSERT_COLUMNS}")
         }
         SqlQuery::SelectAllPunishments => format!("SELECT * FROM `{ACTIVE_TABLE}`"),
         SqlQuery::SelectAllPunishmentsHistory => format!("SELECT * FROM `{HISTORY_TABLE}`"),
         SqlQuery::SelectAllPunishmentsLimit => {
            format!("SELECT * FROM `{ACTIVE_TABLE}` ORDER BY `start` DESC LIMIT ?")
         }
         SqlQuery::SelectAllPunishmentsHistoryLimit => {
            format!("SELECT * FROM `{HISTORY_TABLE}` ORDER BY `start` DESC LIMIT ?")
         }
         SqlQuery::SelectPunishmentById => format!("SELECT * FROM `{ACTIVE_TABLE}` WHERE `id` = ?"),
         SqlQuery::SelectUserPunishments => {
            format!("SELECT * FROM `{ACTIVE_TABLE}` WHERE `uuid` = ?")
         }
         SqlQuery::SelectUserPunishmentsHistory => {
            format!("SELECT * FROM `{HISTORY_TABLE}` WHERE `uuid` = ?")
         }
         SqlQuery::SelectExactPunishment => format!(
            "SELECT * FROM `{ACTIVE_TABLE}` WHERE `uuid` = ? AND `start` = ? AND `punishmentType` = ?"
         ),
         SqlQuery::DeletePunishment => format!("DELETE FROM `{ACTIVE_TABLE}` WHERE `id` = ?"),
         SqlQuery::DeleteOldPunishments => {
            format!("DELETE FROM `{ACTIVE_TABLE}` WHERE `end` <= ? AND `end` != -1")
         }
         SqlQuery::UpdatePunishmentReason => {
            format!("UPDATE `{ACTIVE_TABLE}` SET `reason` = ? WHERE `id` = ?")
         }
      }
   }

   /// Whether the statement returns rows.
   pub fn is_query(self) -> bool {
      matches!(
         self,
         SqlQuery::SelectAllPunishments
            | SqlQuery::SelectAllPunishmentsHistory
            | SqlQuery::SelectAllPunishmentsLimit
            | SqlQuery::SelectAllPunishmentsHistoryLimit
            | SqlQuery::SelectPunishmentById
            | SqlQuery::SelectUserPunishments
            | SqlQuery::SelectUserPunishmentsHistory
            | SqlQuery::SelectExactPunishment
      )
   }
}

fn create_table(table: &str, kind: BackendKind) -> String {
   match kind {
      BackendKind::Networked => format!(
         "CREATE TABLE IF NOT EXISTS `{table}` (\
          `id` INT NOT NULL AUTO_INCREMENT, \
          `name` VARCHAR(16) NULL DEFAULT NULL, \
          `uuid` VARCHAR(35) NULL DEFAULT NULL, \
          `reason` VARCHAR(100) NULL DEFAULT NULL, \
          `operator` VARCHAR(16) NULL DEFAULT NULL, \
          `punishmentType` VARCHAR(16) NULL DEFAULT NULL, \
          `start` BIGINT DEFAULT NULL, \
          `end` BIGINT DEFAULT NULL, \
          `calculation` VARCHAR(50) NULL DEFAULT NULL, \
          `server` VARCHAR(64) NULL DEFAULT NULL, \
          PRIMARY KEY (`id`)) DEFAULT CHARSET=utf8mb4"
      ),
      BackendKind::Embedded => format!(
         "CREATE TABLE IF NOT EXISTS `{table}` (\
          `id` INTEGER PRIMARY KEY AUTOINCREMENT, \
          `name` VARCHAR(16), \
          `uuid` VARCHAR(35), \
          `reason` VARCHAR(100), \
          `operator` VARCHAR(16), \
          `punishmentType` VARCHAR(16), \
          `start` BIGINT, \
          `end` BIGINT, \
          `calculation` VARCHAR(50), \
          `server` VARCHAR(64))"
      ),
   }
}
