//! Opaque cursor encodings.
//!
//! Two interchangeable strategies are provided:
//!
//! - **Value-based** ([`CursorData`]): the cursor carries the primary key plus
//!   one JSON value per `orderBy` column. Re-deriving the same node later with
//!   the same sort key yields a byte-identical cursor, no matter what was
//!   inserted or deleted elsewhere in the set.
//! - **Offset-based** ([`OffsetCursor`]): the cursor carries the primary key
//!   and the node's 1-based position in the ordered set. Cheap, but positions
//!   shift under mutation, so use it only for append-only or rarely mutated
//!   sets. It cannot drive backward pagination.

use std::fmt::Display;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Separates the primary key from the sort values.
pub const SEPARATION_TOKEN: &str = "_*_";
/// Separates consecutive sort values of a composite sort key.
pub const ARRAY_DATA_SEPARATION_TOKEN: &str = "_%_";
/// Separates the primary key from the position in offset cursors.
pub const OFFSET_SEPARATION_TOKEN: &str = "___";

/// Opaque pagination cursor, as handed to and received from clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode as a value-based cursor.
    pub fn decode_data(&self) -> Result<CursorData, Error> {
        decode(self)
    }

    /// Decode as an offset cursor.
    pub fn decode_offset(&self) -> Result<OffsetCursor, Error> {
        OffsetCursor::decode(self)
    }

    fn decode_text(&self) -> Result<String, Error> {
        let bytes = STANDARD
            .decode(self.0.as_bytes())
            .map_err(|e| Error::InvalidCursor(format!("{}: {}", self.0, e)))?;
        String::from_utf8(bytes).map_err(|e| Error::InvalidCursor(format!("{}: {}", self.0, e)))
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Decoded content of a value-based cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorData {
    pub primary_key: Value,
    /// One value per `orderBy` column, in column order.
    pub sort_values: Vec<Value>,
}

impl CursorData {
    pub fn new(primary_key: Value, sort_values: Vec<Value>) -> Self {
        Self {
            primary_key,
            sort_values,
        }
    }

    pub fn encode(&self) -> Cursor {
        let mut raw = self.primary_key.to_string();
        raw.push_str(SEPARATION_TOKEN);
        for (i, value) in self.sort_values.iter().enumerate() {
            if i > 0 {
                raw.push_str(ARRAY_DATA_SEPARATION_TOKEN);
            }
            raw.push_str(&value.to_string());
        }
        Cursor(STANDARD.encode(raw))
    }
}

/// Decode a value-based cursor into its primary key and sort values.
pub fn decode(cursor: &Cursor) -> Result<CursorData, Error> {
    let text = cursor.decode_text()?;
    let invalid = || Error::InvalidCursor(cursor.to_string());

    let (primary_key, mut rest) = match take_value(&text) {
        Some((pk, rest)) if rest.starts_with(SEPARATION_TOKEN) => {
            (pk, &rest[SEPARATION_TOKEN.len()..])
        }
        // Keys written as raw text rather than JSON.
        _ => {
            let (raw, rest) = text.split_once(SEPARATION_TOKEN).ok_or_else(invalid)?;
            (Value::String(raw.to_string()), rest)
        }
    };

    let mut sort_values = Vec::new();
    loop {
        let (value, tail) = take_value(rest).ok_or_else(invalid)?;
        sort_values.push(value);
        if tail.is_empty() {
            break;
        }
        rest = tail
            .strip_prefix(ARRAY_DATA_SEPARATION_TOKEN)
            .ok_or_else(invalid)?;
    }

    Ok(CursorData {
        primary_key,
        sort_values,
    })
}

/// Splits the JSON value at the start of `input` from whatever follows it.
fn take_value(input: &str) -> Option<(Value, &str)> {
    let len = json_value_len(input.as_bytes())?;
    let value = serde_json::from_str(&input[..len]).ok()?;
    Some((value, &input[len..]))
}

/// Byte length of the JSON value at the start of `bytes`, judged by syntax only.
fn json_value_len(bytes: &[u8]) -> Option<usize> {
    match bytes.first()? {
        b'"' => json_string_len(bytes),
        b'[' | b'{' => {
            let mut depth = 0usize;
            let mut i = 0;
            while i < bytes.len() {
                match bytes[i] {
                    b'"' => {
                        i += json_string_len(&bytes[i..])?;
                        continue;
                    }
                    b'[' | b'{' => depth += 1,
                    b']' | b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(i + 1);
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            None
        }
        _ => {
            let len = bytes
                .iter()
                .position(|b| !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'+' | b'.')))
                .unwrap_or(bytes.len());
            (len > 0).then_some(len)
        }
    }
}

fn json_string_len(bytes: &[u8]) -> Option<usize> {
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Decoded content of an offset cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetCursor {
    pub primary_key: Value,
    /// 1-based position of the node in the ordered, unfiltered set.
    pub offset: u64,
}

impl OffsetCursor {
    pub fn new(primary_key: Value, offset: u64) -> Self {
        Self {
            primary_key,
            offset,
        }
    }

    pub fn encode(&self) -> Cursor {
        let key = match &self.primary_key {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Cursor(STANDARD.encode(format!(
            "{}{}{}",
            key, OFFSET_SEPARATION_TOKEN, self.offset
        )))
    }

    pub fn decode(cursor: &Cursor) -> Result<Self, Error> {
        let text = cursor.decode_text()?;
        let (key, offset) = text
            .rsplit_once(OFFSET_SEPARATION_TOKEN)
            .ok_or_else(|| Error::InvalidCursor(cursor.to_string()))?;
        let offset = offset
            .parse::<u64>()
            .map_err(|_| Error::InvalidCursor(cursor.to_string()))?;
        let primary_key = match serde_json::from_str::<Value>(key) {
            Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
            _ => Value::String(key.to_string()),
        };
        Ok(Self {
            primary_key,
            offset,
        })
    }
}
