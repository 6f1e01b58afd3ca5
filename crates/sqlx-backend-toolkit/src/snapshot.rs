//! Detached result sets

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::any::AnyRow;
use sqlx::{Column, Row};

use crate::Result;

/// One fetched row: column name to value, in select-list order.
pub type SnapshotRow = IndexMap<String, JsonValue>;

/// Fully materialized copy of a result set.
///
/// Built by draining the backend cursor before the pooled connection is
/// released, so it stays valid after the statement's connection went back
/// to the pool. An empty snapshot is a well-formed "no rows" answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
   columns: Vec<String>,
   rows: Vec<SnapshotRow>,
}

impl Snapshot {
   pub(crate) fn from_rows(rows: Vec<AnyRow>) -> Result<Self> {
      let columns = rows
         .first()
         .map(|row| {
            row.columns()
               .iter()
               .map(|column| column.name().to_string())
               .collect()
         })
         .unwrap_or_default();

      let mut decoded = Vec::with_capacity(rows.len());
      for row in rows {
         let mut value = IndexMap::default();
         for (i, column) in row.columns().iter().enumerate() {
            let v = row.try_get_raw(i)?;
            let v = crate::decode::to_json(v)?;
            value.insert(column.name().to_string(), v);
         }
         decoded.push(value);
      }

      Ok(Self {
         columns,
         rows: decoded,
      })
   }

   /// Column names of the result, empty when no row came back.
   pub fn columns(&self) -> &[String] {
      &self.columns
   }

   pub fn rows(&self) -> &[SnapshotRow] {
      &self.rows
   }

   pub fn len(&self) -> usize {
      self.rows.len()
   }

   pub fn is_empty(&self) -> bool {
      self.rows.is_empty()
   }

   pub fn first(&self) -> Option<&SnapshotRow> {
      self.rows.first()
   }

   /// Value of `column` in row `index`. Column lookup is case-insensitive,
   /// since backends differ in how they fold result column names.
   pub fn get(&self, index: usize, column: &str) -> Option<&JsonValue> {
      let row = self.rows.get(index)?;
      row.get(column).or_else(|| {
         row.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
      })
   }

   pub fn iter(&self) -> std::slice::Iter<'_, SnapshotRow> {
      self.rows.iter()
   }

   pub fn into_rows(self) -> Vec<SnapshotRow> {
      self.rows
   }
}

impl IntoIterator for Snapshot {
   type Item = SnapshotRow;
   type IntoIter = std::vec::IntoIter<SnapshotRow>;

   fn into_iter(self) -> Self::IntoIter {
      self.rows.into_iter()
   }
}

impl<'a> IntoIterator for &'a Snapshot {
   type Item = &'a SnapshotRow;
   type IntoIter = std::slice::Iter<'a, SnapshotRow>;

   fn into_iter(self) -> Self::IntoIter {
      self.rows.iter()
   }
}
