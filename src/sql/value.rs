// SQL Value Runtime
//
// Tagged runtime values carried between operators. Every value knows its
// null flag; the payload is only meaningful when the flag is clear.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::NaiveDate;
use thiserror::Error;

use crate::sql::types::{SqlTypeId, VARCHAR_WINDOW};

/// Errors raised by the fixed-width value codec
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("varchar of {0} bytes exceeds the {VARCHAR_WINDOW}-byte window")]
    VarcharTooLong(usize),
    #[error("value {0:?} cannot be encoded as column type {1}")]
    TypeMismatch(SqlTypeId, SqlTypeId),
    #[error("buffer too short while decoding {0}")]
    ShortBuffer(SqlTypeId),
    #[error("invalid date payload {0}")]
    BadDate(i32),
}

/// A runtime SQL value: a null flag plus a typed payload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum SqlValue {
    Integer { is_null: bool, val: i64 },
    Real { is_null: bool, val: f64 },
    Bool { is_null: bool, val: bool },
    Date { is_null: bool, val: NaiveDate },
    Str { is_null: bool, val: String },
}

impl SqlValue {
    pub fn integer(val: i64) -> Self {
        SqlValue::Integer { is_null: false, val }
    }

    pub fn real(val: f64) -> Self {
        SqlValue::Real { is_null: false, val }
    }

    pub fn boolean(val: bool) -> Self {
        SqlValue::Bool { is_null: false, val }
    }

    pub fn date(val: NaiveDate) -> Self {
        SqlValue::Date { is_null: false, val }
    }

    pub fn string(val: impl Into<String>) -> Self {
        SqlValue::Str { is_null: false, val: val.into() }
    }

    /// Null value of the given column type.
    pub fn null_of(type_id: SqlTypeId) -> Self {
        match type_id {
            t if t.is_integer_family() => SqlValue::Integer { is_null: true, val: 0 },
            SqlTypeId::Boolean => SqlValue::Bool { is_null: true, val: false },
            SqlTypeId::Decimal => SqlValue::Real { is_null: true, val: 0.0 },
            SqlTypeId::Date => SqlValue::Date {
                is_null: true,
                val: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            },
            _ => SqlValue::Str { is_null: true, val: String::new() },
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Integer { is_null, .. }
            | SqlValue::Real { is_null, .. }
            | SqlValue::Bool { is_null, .. }
            | SqlValue::Date { is_null, .. }
            | SqlValue::Str { is_null, .. } => *is_null,
        }
    }

    /// Column type this value belongs to.
    pub fn type_id(&self) -> SqlTypeId {
        match self {
            SqlValue::Integer { .. } => SqlTypeId::Integer,
            SqlValue::Real { .. } => SqlTypeId::Decimal,
            SqlValue::Bool { .. } => SqlTypeId::Boolean,
            SqlValue::Date { .. } => SqlTypeId::Date,
            SqlValue::Str { .. } => SqlTypeId::Varchar,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer { is_null: false, val } => Some(*val),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            SqlValue::Real { is_null: false, val } => Some(*val),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool { is_null: false, val } => Some(*val),
            _ => None,
        }
    }

    /// Encode this value into `out` at the fixed width of `type_id`.
    pub fn write_to(&self, type_id: SqlTypeId, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let start = out.len();
        out.push(self.is_null() as u8);
        match (self, type_id) {
            (SqlValue::Integer { val, .. }, t) if t.is_integer_family() => {
                out.write_i64::<LittleEndian>(*val).unwrap();
            }
            (SqlValue::Real { val, .. }, SqlTypeId::Decimal) => {
                out.write_f64::<LittleEndian>(*val).unwrap();
            }
            (SqlValue::Bool { val, .. }, SqlTypeId::Boolean) => {
                out.push(*val as u8);
            }
            (SqlValue::Date { val, .. }, SqlTypeId::Date) => {
                let days = val.signed_duration_since(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days();
                out.write_i32::<LittleEndian>(days as i32).unwrap();
            }
            (SqlValue::Str { val, .. }, SqlTypeId::Varchar) => {
                let bytes = val.as_bytes();
                if bytes.len() > VARCHAR_WINDOW {
                    out.truncate(start);
                    return Err(CodecError::VarcharTooLong(bytes.len()));
                }
                out.write_u32::<LittleEndian>(bytes.len() as u32).unwrap();
                out.extend_from_slice(bytes);
                out.resize(start + type_id.encoded_size(), 0);
            }
            _ => {
                out.truncate(start);
                return Err(CodecError::TypeMismatch(self.type_id(), type_id));
            }
        }
        debug_assert_eq!(out.len() - start, type_id.encoded_size());
        Ok(())
    }

    /// Decode one value of `type_id` from the front of `buf`.
    pub fn read_from(type_id: SqlTypeId, buf: &[u8]) -> Result<SqlValue, CodecError> {
        if buf.len() < type_id.encoded_size() {
            return Err(CodecError::ShortBuffer(type_id));
        }
        let is_null = buf[0] != 0;
        let mut cur = Cursor::new(&buf[1..]);
        let value = match type_id {
            t if t.is_integer_family() => SqlValue::Integer {
                is_null,
                val: cur.read_i64::<LittleEndian>().unwrap(),
            },
            SqlTypeId::Decimal => SqlValue::Real {
                is_null,
                val: cur.read_f64::<LittleEndian>().unwrap(),
            },
            SqlTypeId::Boolean => SqlValue::Bool { is_null, val: buf[1] != 0 },
            SqlTypeId::Date => {
                let days = cur.read_i32::<LittleEndian>().unwrap();
                let base = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
                let val = base
                    .checked_add_signed(chrono::Duration::days(days as i64))
                    .ok_or(CodecError::BadDate(days))?;
                SqlValue::Date { is_null, val }
            }
            _ => {
                let len = cur.read_u32::<LittleEndian>().unwrap() as usize;
                if len > VARCHAR_WINDOW {
                    return Err(CodecError::ShortBuffer(type_id));
                }
                let bytes = &buf[5..5 + len];
                SqlValue::Str {
                    is_null,
                    val: String::from_utf8_lossy(bytes).into_owned(),
                }
            }
        };
        Ok(value)
    }
}

impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        if self.is_null() || other.is_null() {
            // Null compares equal only to null.
            return self.is_null() && other.is_null();
        }
        match (self, other) {
            (SqlValue::Integer { val: a, .. }, SqlValue::Integer { val: b, .. }) => a == b,
            (SqlValue::Real { val: a, .. }, SqlValue::Real { val: b, .. }) => a == b,
            (SqlValue::Integer { val: a, .. }, SqlValue::Real { val: b, .. }) => (*a as f64) == *b,
            (SqlValue::Real { val: a, .. }, SqlValue::Integer { val: b, .. }) => *a == (*b as f64),
            (SqlValue::Bool { val: a, .. }, SqlValue::Bool { val: b, .. }) => a == b,
            (SqlValue::Date { val: a, .. }, SqlValue::Date { val: b, .. }) => a == b,
            (SqlValue::Str { val: a, .. }, SqlValue::Str { val: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for SqlValue {}

impl PartialOrd for SqlValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        match (self, other) {
            (SqlValue::Integer { val: a, .. }, SqlValue::Integer { val: b, .. }) => a.partial_cmp(b),
            (SqlValue::Real { val: a, .. }, SqlValue::Real { val: b, .. }) => a.partial_cmp(b),
            (SqlValue::Integer { val: a, .. }, SqlValue::Real { val: b, .. }) => (*a as f64).partial_cmp(b),
            (SqlValue::Real { val: a, .. }, SqlValue::Integer { val: b, .. }) => a.partial_cmp(&(*b as f64)),
            (SqlValue::Bool { val: a, .. }, SqlValue::Bool { val: b, .. }) => a.partial_cmp(b),
            (SqlValue::Date { val: a, .. }, SqlValue::Date { val: b, .. }) => a.partial_cmp(b),
            (SqlValue::Str { val: a, .. }, SqlValue::Str { val: b, .. }) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Discriminant first so different types never collide structurally.
        match self {
            SqlValue::Integer { is_null, val } => {
                0u8.hash(state);
                is_null.hash(state);
                if !is_null {
                    val.hash(state);
                }
            }
            SqlValue::Real { is_null, val } => {
                1u8.hash(state);
                is_null.hash(state);
                if !is_null {
                    val.to_bits().hash(state);
                }
            }
            SqlValue::Bool { is_null, val } => {
                2u8.hash(state);
                is_null.hash(state);
                if !is_null {
                    val.hash(state);
                }
            }
            SqlValue::Date { is_null, val } => {
                3u8.hash(state);
                is_null.hash(state);
                if !is_null {
                    val.hash(state);
                }
            }
            SqlValue::Str { is_null, val } => {
                4u8.hash(state);
                is_null.hash(state);
                if !is_null {
                    val.hash(state);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_integer() {
        let mut buf = Vec::new();
        SqlValue::integer(-77).write_to(SqlTypeId::BigInt, &mut buf).unwrap();
        assert_eq!(buf.len(), SqlTypeId::BigInt.encoded_size());
        let back = SqlValue::read_from(SqlTypeId::BigInt, &buf).unwrap();
        assert_eq!(back.as_integer(), Some(-77));
    }

    #[test]
    fn test_roundtrip_null() {
        let mut buf = Vec::new();
        SqlValue::null_of(SqlTypeId::Integer).write_to(SqlTypeId::Integer, &mut buf).unwrap();
        let back = SqlValue::read_from(SqlTypeId::Integer, &buf).unwrap();
        assert!(back.is_null());
    }

    #[test]
    fn test_varchar_window() {
        let mut buf = Vec::new();
        SqlValue::string("hello").write_to(SqlTypeId::Varchar, &mut buf).unwrap();
        assert_eq!(buf.len(), SqlTypeId::Varchar.encoded_size());
        let back = SqlValue::read_from(SqlTypeId::Varchar, &buf).unwrap();
        assert_eq!(back, SqlValue::string("hello"));

        let long = "x".repeat(VARCHAR_WINDOW + 1);
        let mut buf2 = Vec::new();
        assert!(SqlValue::string(long).write_to(SqlTypeId::Varchar, &mut buf2).is_err());
        assert!(buf2.is_empty());
    }

    #[test]
    fn test_null_compares_only_to_null() {
        let null = SqlValue::null_of(SqlTypeId::Integer);
        assert_eq!(null, SqlValue::null_of(SqlTypeId::Integer));
        assert_ne!(null, SqlValue::integer(0));
        assert!(null.partial_cmp(&SqlValue::integer(0)).is_none());
    }

    #[test]
    fn test_date_roundtrip() {
        let d = NaiveDate::from_ymd_opt(2019, 4, 1).unwrap();
        let mut buf = Vec::new();
        SqlValue::date(d).write_to(SqlTypeId::Date, &mut buf).unwrap();
        let back = SqlValue::read_from(SqlTypeId::Date, &buf).unwrap();
        assert_eq!(back, SqlValue::date(d));
    }
}
