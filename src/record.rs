//! Moderation records as stored in the active and history tables

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use sqlx_backend_toolkit::SnapshotRow;

use crate::{Error, Result};

/// `end` value of a punishment that never expires.
pub const PERMANENT: i64 = -1;

/// Kind of moderation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PunishmentType {
   Ban,
   TempBan,
   IpBan,
   TempIpBan,
   Mute,
   TempMute,
   Warning,
   TempWarning,
   Kick,
   Note,
}

impl PunishmentType {
   pub const ALL: [PunishmentType; 10] = [
      PunishmentType::Ban,
      PunishmentType::TempBan,
      PunishmentType::IpBan,
      PunishmentType::TempIpBan,
      PunishmentType::Mute,
      PunishmentType::TempMute,
      PunishmentType::Warning,
      PunishmentType::TempWarning,
      PunishmentType::Kick,
      PunishmentType::Note,
   ];

   /// Token stored in the `punishmentType` column.
   pub fn as_str(self) -> &'static str {
      match self {
         PunishmentType::Ban => "BAN",
         PunishmentType::TempBan => "TEMP_BAN",
         PunishmentType::IpBan => "IP_BAN",
         PunishmentType::TempIpBan => "TEMP_IP_BAN",
         PunishmentType::Mute => "MUTE",
         PunishmentType::TempMute => "TEMP_MUTE",
         PunishmentType::Warning => "WARNING",
         PunishmentType::TempWarning => "TEMP_WARNING",
         PunishmentType::Kick => "KICK",
         PunishmentType::Note => "NOTE",
      }
   }

   pub fn is_temporary(self) -> bool {
      matches!(
         self,
         PunishmentType::TempBan
            | PunishmentType::TempIpBan
            | PunishmentType::TempMute
            | PunishmentType::TempWarning
      )
   }
}

impl fmt::Display for PunishmentType {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}

impl FromStr for PunishmentType {
   type Err = Error;

   fn from_str(s: &str) -> Result<Self> {
      let s = s.trim();
      PunishmentType::ALL
         .into_iter()
         .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
         .ok_or_else(|| Error::InvalidRecord(format!("unknown punishment type '{s}'")))
   }
}

/// One row of the `Punishments` or `PunishmentHistory` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PunishmentRecord {
   /// Backend assigned key, `None` until stored
   pub id: Option<i64>,
   pub name: String,
   /// Unhyphenated 32 hex digit player id (or an IP for IP bans)
   pub uuid: String,
   pub reason: String,
   pub operator: String,
   pub punishment_type: PunishmentType,
   /// Milliseconds since the epoch
   pub start: i64,
   /// Milliseconds since the epoch, or [`PERMANENT`]
   pub end: i64,
   /// Layout used to compute the duration, empty when none
   pub calculation: String,
   /// Originating server; `None` for records written before the column existed
   pub server: Option<String>,
}

impl PunishmentRecord {
   pub fn is_permanent(&self) -> bool {
      self.end == PERMANENT
   }

   /// Check the invariants every stored record must hold.
   pub fn validate(&self) -> Result<()> {
      if self.end != PERMANENT && self.end < self.start {
         return Err(Error::InvalidRecord(format!(
            "end {} lies before start {}",
            self.end, self.start
         )));
      }

      let is_ip = self.matches_ip_kind();
      if !is_ip && !is_unhyphenated_uuid(&self.uuid) {
         return Err(Error::InvalidRecord(format!(
            "'{}' is not an unhyphenated uuid",
            self.uuid
         )));
      }

      if self.server.as_ref().is_some_and(|server| server.len() > 64) {
         return Err(Error::InvalidRecord(
            "server name longer than 64 characters".to_string(),
         ));
      }

      Ok(())
   }

   fn matches_ip_kind(&self) -> bool {
      matches!(
         self.punishment_type,
         PunishmentType::IpBan | PunishmentType::TempIpBan
      ) && self.uuid.parse::<std::net::IpAddr>().is_ok()
   }

   /// Bind values for [`crate::SqlQuery::InsertPunishment`] and
   /// [`crate::SqlQuery::InsertPunishmentHistory`], in column order.
   pub fn insert_values(&self) -> Vec<JsonValue> {
      vec![
         json!(self.name),
         json!(self.uuid),
         json!(self.reason),
         json!(self.operator),
         json!(self.punishment_type.as_str()),
         json!(self.start),
         json!(self.end),
         json!(self.calculation),
         self.server.as_ref().map_or(JsonValue::Null, |s| json!(s)),
      ]
   }

   /// Build a record from a fetched row. Column names match
   /// case-insensitively; a missing `server` column reads as `None`.
   pub fn from_row(row: &SnapshotRow) -> Result<Self> {
      let punishment_type = text(row, "punishmentType")?.parse()?;

      Ok(Self {
         id: column(row, "id").and_then(integer),
         name: text(row, "name")?,
         uuid: text(row, "uuid")?,
         reason: text(row, "reason")?,
         operator: text(row, "operator")?,
         punishment_type,
         start: timestamp(row, "start")?,
         end: timestamp(row, "end")?,
         calculation: text(row, "calculation")?,
         server: column(row, "server")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
      })
   }
}

fn is_unhyphenated_uuid(value: &str) -> bool {
   value.len() == 32 && uuid::Uuid::try_parse(value).is_ok()
}

fn column<'a>(row: &'a SnapshotRow, name: &str) -> Option<&'a JsonValue> {
   row.get(name).or_else(|| {
      row.iter()
         .find(|(column, _)| column.eq_ignore_ascii_case(name))
         .map(|(_, value)| value)
   })
}

fn text(row: &SnapshotRow, name: &str) -> Result<String> {
   match column(row, name) {
      Some(JsonValue::String(s)) => Ok(s.clone()),
      Some(JsonValue::Null) => Ok(String::new()),
      Some(other) => Ok(other.to_string()),
      None => Err(Error::InvalidRecord(format!("missing column '{name}'"))),
   }
}

fn integer(value: &JsonValue) -> Option<i64> {
   match value {
      JsonValue::Number(n) => n.as_i64(),
      // Legacy tables stored timestamps as text
      JsonValue::String(s) => s.trim().parse().ok(),
      _ => None,
   }
}

fn timestamp(row: &SnapshotRow, name: &str) -> Result<i64> {
   let value =
      column(row, name).ok_or_else(|| Error::InvalidRecord(format!("missing column '{name}'")))?;
   integer(value)
      .ok_or_else(|| Error::InvalidRecord(format!("column '{name}' is not a timestamp: {value}")))
}
