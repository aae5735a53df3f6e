//! MySQL/MariaDB session built on mysql_async.
//!
//! Queries go through the binary protocol so that integers, floats and
//! temporal values arrive typed; statements with no parameters use the text
//! protocol.

use std::borrow::Cow;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::*;
use mysql_async::{Column, Conn, OptsBuilder, Value};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::core::traits::Connection;
use crate::core::value::{Row, SqlValue};
use crate::drivers::common::message_matches;
use crate::error::{MigrateError, Result};

/// Server error code for `Unknown database`.
const ER_BAD_DB_ERROR: u16 = 1049;

/// Collation id the protocol reports for binary columns.
const BINARY_CHARSET: u16 = 63;

/// One MySQL session.
pub struct MysqlConnection {
    conn: Conn,
}

impl MysqlConnection {
    /// Connect to the configured database.
    ///
    /// Returns [`MigrateError::DatabaseNotExists`] when the server rejects
    /// the database name.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Self::open(config, Some(&config.database)).await
    }

    /// Create the configured database through a session with no default
    /// database selected.
    pub async fn create_database(config: &DatabaseConfig) -> Result<()> {
        let mut admin = Self::open(config, None).await?;
        let sql = format!("CREATE DATABASE `{}`", config.database.replace('`', "``"));
        admin.execute(&sql).await?;
        info!("Created MySQL database {}", config.database);
        Box::new(admin).close().await;
        Ok(())
    }

    async fn open(config: &DatabaseConfig, database: Option<&str>) -> Result<Self> {
        let builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.effective_port())
            .db_name(database)
            .user(Some(&config.user))
            .pass(Some(&config.password))
            .init(vec!["SET NAMES utf8mb4"]);

        let mut conn = Conn::new(builder)
            .await
            .map_err(|e| classify_connect_error(e, config))?;

        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(config.display_target(), e))?;

        info!(
            "Connected to MySQL: {}:{}/{}",
            config.host,
            config.effective_port(),
            database.unwrap_or("")
        );

        Ok(Self { conn })
    }
}

fn classify_connect_error(err: mysql_async::Error, config: &DatabaseConfig) -> MigrateError {
    let not_exists = match &err {
        mysql_async::Error::Server(server) => server.code == ER_BAD_DB_ERROR,
        _ => false,
    };
    if not_exists || message_matches(&err.to_string(), &["unknown database"]) {
        return MigrateError::DatabaseNotExists {
            database: config.database.clone(),
        };
    }
    MigrateError::connection(config.display_target(), err)
}

fn context(sql: &str) -> String {
    const MAX: usize = 120;
    match sql.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.conn
            .query_drop(sql)
            .await
            .map_err(|e| MigrateError::query(e, context(sql)))?;
        Ok(self.conn.affected_rows())
    }

    async fn execute_with(&mut self, sql: &str, params: &[SqlValue<'_>]) -> Result<u64> {
        let values: Vec<Value> = params.iter().map(sql_value_to_mysql).collect();
        self.conn
            .exec_drop(sql, values)
            .await
            .map_err(|e| MigrateError::query(e, context(sql)))?;
        Ok(self.conn.affected_rows())
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        // SHOW statements cannot always be prepared; they go over the text protocol.
        let rows: Vec<mysql_async::Row> = if is_show_statement(sql) {
            self.conn.query(sql).await
        } else {
            self.conn.exec(sql, ()).await
        }
        .map_err(|e| MigrateError::query(e, context(sql)))?;

        Ok(rows.iter().map(convert_row).collect())
    }

    async fn column_names(&mut self, sql: &str) -> Result<Vec<String>> {
        let stmt = self
            .conn
            .prep(sql)
            .await
            .map_err(|e| MigrateError::query(e, context(sql)))?;
        Ok(stmt
            .columns()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect())
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.conn.disconnect().await {
            debug!("MySQL disconnect failed: {}", e);
        }
    }
}

fn is_show_statement(sql: &str) -> bool {
    sql.trim_start()
        .get(..5)
        .is_some_and(|head| head.eq_ignore_ascii_case("SHOW "))
}

fn convert_row(row: &mysql_async::Row) -> Row {
    let columns = row.columns_ref();
    let values = (0..row.len())
        .map(|i| match (row.as_ref(i), columns.get(i)) {
            (Some(value), Some(column)) => mysql_to_sql_value(value, column),
            _ => SqlValue::Null,
        })
        .collect();
    Row::new(values)
}

/// Whether a byte payload should stay binary rather than be decoded as text.
///
/// Numeric and temporal columns also report the binary collation, so the
/// column type has to be checked as well.
fn is_binary_column(column: &Column) -> bool {
    column.character_set() == BINARY_CHARSET
        && matches!(
            column.column_type(),
            ColumnType::MYSQL_TYPE_TINY_BLOB
                | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
                | ColumnType::MYSQL_TYPE_LONG_BLOB
                | ColumnType::MYSQL_TYPE_BLOB
                | ColumnType::MYSQL_TYPE_STRING
                | ColumnType::MYSQL_TYPE_VAR_STRING
                | ColumnType::MYSQL_TYPE_VARCHAR
                | ColumnType::MYSQL_TYPE_BIT
                | ColumnType::MYSQL_TYPE_GEOMETRY
        )
}

/// Convert a mysql_async value into an owned SqlValue.
fn mysql_to_sql_value(value: &Value, column: &Column) -> SqlValue<'static> {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::I64(*i),
        Value::UInt(u) => match i64::try_from(*u) {
            Ok(i) => SqlValue::I64(i),
            Err(_) => SqlValue::Text(Cow::Owned(u.to_string())),
        },
        Value::Float(f) => SqlValue::F32(*f),
        Value::Double(d) => SqlValue::F64(*d),
        Value::Bytes(bytes) => {
            if is_binary_column(column) {
                SqlValue::Bytes(Cow::Owned(bytes.clone()))
            } else {
                SqlValue::Text(Cow::Owned(String::from_utf8_lossy(bytes).into_owned()))
            }
        }
        Value::Date(year, month, day, hour, minute, second, micros) => {
            convert_date(*year, *month, *day, *hour, *minute, *second, *micros, column)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            convert_time(*negative, *days, *hours, *minutes, *seconds, *micros)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn convert_date(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    micros: u32,
    column: &Column,
) -> SqlValue<'static> {
    let date = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day));
    let time = NaiveTime::from_hms_micro_opt(
        u32::from(hour),
        u32::from(minute),
        u32::from(second),
        micros,
    );

    match (date, time) {
        (Some(date), Some(_)) if column.column_type() == ColumnType::MYSQL_TYPE_DATE => {
            SqlValue::Date(date)
        }
        (Some(date), Some(time)) => SqlValue::DateTime(NaiveDateTime::new(date, time)),
        // Zero dates ('0000-00-00') have no chrono form; pass them through as text.
        _ if column.column_type() == ColumnType::MYSQL_TYPE_DATE => {
            SqlValue::Text(Cow::Owned(format!("{:04}-{:02}-{:02}", year, month, day)))
        }
        _ => SqlValue::Text(Cow::Owned(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            year, month, day, hour, minute, second
        ))),
    }
}

fn convert_time(
    negative: bool,
    days: u32,
    hours: u8,
    minutes: u8,
    seconds: u8,
    micros: u32,
) -> SqlValue<'static> {
    if !negative && days == 0 {
        if let Some(t) = NaiveTime::from_hms_micro_opt(
            u32::from(hours),
            u32::from(minutes),
            u32::from(seconds),
            micros,
        ) {
            return SqlValue::Time(t);
        }
    }

    // TIME spans -838:59:59..838:59:59, wider than a time of day.
    let total_hours = days * 24 + u32::from(hours);
    let sign = if negative { "-" } else { "" };
    let text = if micros > 0 {
        format!(
            "{}{:02}:{:02}:{:02}.{:06}",
            sign, total_hours, minutes, seconds, micros
        )
    } else {
        format!("{}{:02}:{:02}:{:02}", sign, total_hours, minutes, seconds)
    };
    SqlValue::Text(Cow::Owned(text))
}

/// Convert SqlValue to mysql_async::Value.
fn sql_value_to_mysql(value: &SqlValue<'_>) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::I64(i) => Value::from(*i),
        SqlValue::F32(f) => Value::from(*f),
        SqlValue::F64(f) => Value::from(*f),
        SqlValue::Text(s) => Value::from(s.as_ref()),
        SqlValue::Bytes(b) => Value::from(b.as_ref()),
        SqlValue::DateTime(dt) => datetime_value(dt),
        SqlValue::Date(d) => Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        SqlValue::Time(t) => Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1_000,
        ),
    }
}

fn datetime_value(dt: &NaiveDateTime) -> Value {
    Value::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.nanosecond() / 1_000,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(column_type: ColumnType, charset: u16) -> Column {
        Column::new(column_type).with_character_set(charset)
    }

    #[test]
    fn test_blob_stays_binary() {
        let col = column(ColumnType::MYSQL_TYPE_BLOB, BINARY_CHARSET);
        let value = mysql_to_sql_value(&Value::Bytes(vec![0, 159, 146]), &col);
        assert_eq!(value, SqlValue::Bytes(Cow::Owned(vec![0, 159, 146])));
    }

    #[test]
    fn test_text_and_decimal_decode_as_text() {
        let text = column(ColumnType::MYSQL_TYPE_VAR_STRING, 45);
        assert_eq!(
            mysql_to_sql_value(&Value::Bytes(b"hello".to_vec()), &text),
            SqlValue::Text(Cow::Owned("hello".into()))
        );

        let decimal = column(ColumnType::MYSQL_TYPE_NEWDECIMAL, BINARY_CHARSET);
        assert_eq!(
            mysql_to_sql_value(&Value::Bytes(b"12.50".to_vec()), &decimal),
            SqlValue::Text(Cow::Owned("12.50".into()))
        );
    }

    #[test]
    fn test_large_unsigned_falls_back_to_text() {
        let col = column(ColumnType::MYSQL_TYPE_LONGLONG, BINARY_CHARSET);
        assert_eq!(mysql_to_sql_value(&Value::UInt(7), &col), SqlValue::I64(7));
        assert_eq!(
            mysql_to_sql_value(&Value::UInt(u64::MAX), &col),
            SqlValue::Text(Cow::Owned(u64::MAX.to_string()))
        );
    }

    #[test]
    fn test_date_conversions() {
        let date_col = column(ColumnType::MYSQL_TYPE_DATE, BINARY_CHARSET);
        assert_eq!(
            mysql_to_sql_value(&Value::Date(2024, 2, 29, 0, 0, 0, 0), &date_col),
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );

        let dt_col = column(ColumnType::MYSQL_TYPE_DATETIME, BINARY_CHARSET);
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_micro_opt(3, 4, 5, 6)
            .unwrap();
        assert_eq!(
            mysql_to_sql_value(&Value::Date(2024, 1, 2, 3, 4, 5, 6), &dt_col),
            SqlValue::DateTime(expected)
        );

        assert_eq!(
            mysql_to_sql_value(&Value::Date(0, 0, 0, 0, 0, 0, 0), &dt_col),
            SqlValue::Text(Cow::Owned("0000-00-00 00:00:00".into()))
        );
    }

    #[test]
    fn test_time_outside_day_is_text() {
        let col = column(ColumnType::MYSQL_TYPE_TIME, BINARY_CHARSET);
        assert_eq!(
            mysql_to_sql_value(&Value::Time(true, 1, 2, 3, 4, 0), &col),
            SqlValue::Text(Cow::Owned("-26:03:04".into()))
        );
        assert_eq!(
            mysql_to_sql_value(&Value::Time(false, 0, 10, 30, 0, 0), &col),
            SqlValue::Time(NaiveTime::from_hms_opt(10, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_sql_value_to_mysql() {
        assert_eq!(sql_value_to_mysql(&SqlValue::Null), Value::NULL);
        assert_eq!(sql_value_to_mysql(&SqlValue::I64(5)), Value::Int(5));
        assert_eq!(
            sql_value_to_mysql(&SqlValue::Text(Cow::Borrowed("x"))),
            Value::Bytes(b"x".to_vec())
        );
        let dt = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        assert_eq!(
            sql_value_to_mysql(&SqlValue::DateTime(dt)),
            Value::Date(2023, 12, 31, 23, 59, 58, 0)
        );
    }

    #[test]
    fn test_show_statement_detection() {
        assert!(is_show_statement("SHOW CREATE TABLE `t`"));
        assert!(is_show_statement("  show variables"));
        assert!(!is_show_statement("SELECT 1"));
        assert!(!is_show_statement("SHO"));
    }

    #[test]
    fn test_context_truncates_long_sql() {
        let sql = "x".repeat(200);
        let ctx = context(&sql);
        assert!(ctx.ends_with("..."));
        assert_eq!(ctx.len(), 123);
        assert_eq!(context("SELECT 1"), "SELECT 1");
    }
}
