//! Column values as they travel between engines.
//!
//! The reader keeps whatever typed form the driver hands back and the writer
//! binds it again on the other side. Anything without a dedicated variant
//! (decimals, JSON, enums, UUIDs) travels as text so the destination server
//! does the parsing.

use std::borrow::Cow;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{MigrateError, Result};

/// A single column value. String and byte payloads may borrow.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    Null,
    I64(i64),
    F32(f32),
    F64(f64),
    Text(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl SqlValue<'_> {
    /// Detach from any borrowed buffer.
    #[must_use]
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
            SqlValue::Null => SqlValue::Null,
            SqlValue::I64(v) => SqlValue::I64(v),
            SqlValue::F32(v) => SqlValue::F32(v),
            SqlValue::F64(v) => SqlValue::F64(v),
            SqlValue::DateTime(v) => SqlValue::DateTime(v),
            SqlValue::Date(v) => SqlValue::Date(v),
            SqlValue::Time(v) => SqlValue::Time(v),
        }
    }

    /// Input text a server accepts for this value; `None` for NULL.
    ///
    /// Non-UTF-8 bytes are replaced, so binary columns need their own path.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        Some(match self {
            SqlValue::Null => return None,
            SqlValue::I64(v) => v.to_string().into(),
            SqlValue::F32(v) => float_text(f64::from(*v)).into(),
            SqlValue::F64(v) => float_text(*v).into(),
            SqlValue::Text(v) => Cow::Borrowed(v.as_ref()),
            SqlValue::Bytes(v) => String::from_utf8_lossy(v),
            SqlValue::DateTime(v) => v.format("%Y-%m-%d %H:%M:%S%.f").to_string().into(),
            SqlValue::Date(v) => v.format("%Y-%m-%d").to_string().into(),
            SqlValue::Time(v) => v.format("%H:%M:%S%.f").to_string().into(),
        })
    }

    /// Integer reading of a catalog value.
    ///
    /// Counts and sizes come back as BIGINT, as DECIMAL text, or as plain
    /// text depending on server and protocol. Fractions are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I64(v) => Some(*v),
            SqlValue::F32(v) => Some(*v as i64),
            SqlValue::F64(v) => Some(*v as i64),
            SqlValue::Text(_) | SqlValue::Bytes(_) => parse_integer(self.as_text()?.trim()),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        if let SqlValue::Text(_) | SqlValue::Bytes(_) = self {
            let text = self.as_text()?;
            match text.trim().to_ascii_lowercase().as_str() {
                "t" | "true" | "yes" | "y" | "on" => return Some(true),
                "f" | "false" | "no" | "n" | "off" => return Some(false),
                _ => {}
            }
        }
        self.as_i64().map(|v| v != 0)
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    if let Ok(v) = text.parse::<i64>() {
        return Some(v);
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
        .and_then(|d| d.trunc().to_i64())
}

// PostgreSQL's spelling of non-finite floats; Rust's Display differs.
fn float_text(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        let sign = if v < 0.0 { "-" } else { "" };
        format!("{}Infinity", sign)
    } else {
        v.to_string()
    }
}

impl From<String> for SqlValue<'static> {
    fn from(v: String) -> Self {
        SqlValue::Text(Cow::Owned(v))
    }
}

impl<'a> From<&'a str> for SqlValue<'a> {
    fn from(v: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(v))
    }
}

impl From<Vec<u8>> for SqlValue<'static> {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(Cow::Owned(v))
    }
}

/// One result row, with column access by position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<SqlValue<'static>>,
}

impl Row {
    pub fn new(values: Vec<SqlValue<'static>>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[SqlValue<'static>] {
        &self.values
    }

    pub fn get(&self, idx: usize) -> Option<&SqlValue<'static>> {
        self.values.get(idx)
    }

    pub fn get_string(&self, idx: usize) -> Result<String> {
        self.get_opt_string(idx)
            .ok_or_else(|| bad_column(idx, "is NULL or missing"))
    }

    /// `None` when the column is NULL or past the end of the row.
    pub fn get_opt_string(&self, idx: usize) -> Option<String> {
        self.get(idx)?.as_text().map(Cow::into_owned)
    }

    pub fn get_i64(&self, idx: usize) -> Result<i64> {
        self.get(idx)
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| bad_column(idx, "is not an integer"))
    }

    pub fn get_bool(&self, idx: usize) -> Result<bool> {
        self.get(idx)
            .and_then(SqlValue::as_bool)
            .ok_or_else(|| bad_column(idx, "is not a boolean"))
    }
}

fn bad_column(idx: usize, problem: &str) -> MigrateError {
    MigrateError::query(format!("column {} {}", idx, problem), "reading row")
}
