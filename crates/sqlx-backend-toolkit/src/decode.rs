//! Conversion between JSON values and backend values

use base64::Engine;
use serde_json::Value as JsonValue;
use sqlx::any::{Any, AnyArguments, AnyTypeInfoKind, AnyValueRef};
use sqlx::query::Query;
use sqlx::{Decode, ValueRef};

use crate::{Error, Result};

/// Decode one column value of a fetched row into JSON.
///
/// Integers keep full 64-bit precision. See [`blob_to_json`] for blobs.
pub(crate) fn to_json(value: AnyValueRef<'_>) -> Result<JsonValue> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let type_info = value.type_info().into_owned();
   let json = match type_info.kind() {
      AnyTypeInfoKind::Null => JsonValue::Null,
      AnyTypeInfoKind::Bool => JsonValue::Bool(decode::<bool>(value)?),
      AnyTypeInfoKind::SmallInt => JsonValue::from(decode::<i16>(value)?),
      AnyTypeInfoKind::Integer => JsonValue::from(decode::<i32>(value)?),
      AnyTypeInfoKind::BigInt => JsonValue::from(decode::<i64>(value)?),
      AnyTypeInfoKind::Real => float(f64::from(decode::<f32>(value)?)),
      AnyTypeInfoKind::Double => float(decode::<f64>(value)?),
      AnyTypeInfoKind::Text => JsonValue::String(decode::<String>(value)?),
      AnyTypeInfoKind::Blob => blob_to_json(decode::<Vec<u8>>(value)?),
   };

   Ok(json)
}

/// MySQL reports every TEXT column (TEXT, MEDIUMTEXT, LONGTEXT) as a blob,
/// so UTF-8 content comes back as a string. Other bytes become base64.
pub(crate) fn blob_to_json(bytes: Vec<u8>) -> JsonValue {
   match String::from_utf8(bytes) {
      Ok(text) => JsonValue::String(text),
      Err(e) => {
         JsonValue::String(base64::engine::general_purpose::STANDARD.encode(e.into_bytes()))
      }
   }
}

fn decode<'r, T: Decode<'r, Any>>(value: AnyValueRef<'r>) -> Result<T> {
   T::decode(value).map_err(|e| Error::Sqlx(sqlx::Error::Decode(e)))
}

// NaN and infinities have no JSON representation
fn float(value: f64) -> JsonValue {
   serde_json::Number::from_f64(value)
      .map(JsonValue::Number)
      .unwrap_or(JsonValue::Null)
}

/// Bind a JSON value to a query as the next positional parameter.
pub(crate) fn bind_value<'q>(
   query: Query<'q, Any, AnyArguments<'q>>,
   value: &JsonValue,
) -> Query<'q, Any, AnyArguments<'q>> {
   match value {
      JsonValue::Null => query.bind(None::<String>),
      JsonValue::Bool(flag) => query.bind(*flag),
      JsonValue::String(text) => query.bind(text.clone()),
      JsonValue::Number(number) => {
         // Preserve integer precision by binding as i64 when possible
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            // Too large for i64, use f64 (will lose precision)
            query.bind(uint_val as f64)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      // Arrays and objects are stored as their JSON text
      other => query.bind(other.to_string()),
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   #[test]
   fn test_text_blob_decodes_as_string() {
      // A legacy MEDIUMTEXT timestamp column
      assert_eq!(blob_to_json(b"1600000000000".to_vec()), json!("1600000000000"));
      assert_eq!(blob_to_json(Vec::new()), json!(""));
   }

   #[test]
   fn test_binary_blob_decodes_as_base64() {
      assert_eq!(blob_to_json(vec![0xff, 0x00, 0xfe]), json!("/wD+"));
   }

   #[test]
   fn test_float_without_json_form_is_null() {
      assert_eq!(float(f64::NAN), JsonValue::Null);
      assert_eq!(float(2.5), json!(2.5));
   }
}
