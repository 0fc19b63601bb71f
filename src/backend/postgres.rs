//! PostgreSQL session over the synchronous `postgres` client
//!
//! Statements are prepared first. When every result column has a binary
//! decoder, the statement runs on the extended protocol, rows are streamed
//! and cells become typed [`Value`]s. Otherwise it runs on the simple
//! protocol and each text cell is parsed back by its column's type; cells of
//! types without a parser (uuid, interval, money, ...) stay text.
//!
//! A multi-command string cannot be prepared. It runs on the simple protocol
//! and its last statement is prepared afterwards for the column types.
//!
//! `timestamptz` columns always take the text path: the server renders them
//! in the session `TimeZone`, so their date is the session-local date rather
//! than the UTC date the binary format carries.
//!
//! Row-returning statements are capped at `max_rows`. The extended protocol
//! stops reading one row past the cap; the simple protocol reads every row
//! first.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use postgres::error::SqlState;
use postgres::fallible_iterator::FallibleIterator;
use postgres::types::{Kind, ToSql, Type};
use postgres::{Client, Config, NoTls, SimpleQueryMessage, Statement};
use rust_decimal::Decimal;
use serde_json::Value as Json;

use crate::observability::Logger;
use crate::sanitize::strip_comments;
use crate::session::{Connector, Session, SessionError, SessionResult};
use crate::value::{Row, Value};

/// Connection parameters shared by every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    /// Database used for administrative commands (drop/create)
    pub maintenance_database: String,
    /// Per-statement time budget enforced by the server
    pub statement_timeout_secs: u64,
    /// Row cap for `SELECT`/`WITH` results
    pub max_rows: usize,
    pub connect_timeout_secs: u64,
    /// Suffix naming the pristine copy of each database
    pub template_suffix: String,
    /// Recreate each database from its template after grading
    pub reset_after_instance: bool,
}

/// Opens sessions against one PostgreSQL server
#[derive(Debug, Clone)]
pub struct PgConnector {
    settings: PgSettings,
}

impl PgConnector {
    pub fn new(settings: PgSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PgSettings {
        &self.settings
    }

    fn client(&self, database: &str) -> SessionResult<Client> {
        let mut config = Config::new();
        config
            .host(&self.settings.host)
            .port(self.settings.port)
            .user(&self.settings.user)
            .dbname(database)
            .connect_timeout(Duration::from_secs(self.settings.connect_timeout_secs));
        if let Some(password) = &self.settings.password {
            config.password(password);
        }
        config
            .connect(NoTls)
            .map_err(|e| SessionError::Connection(e.to_string()))
    }

    /// Opens a session on `database` with the statement timeout applied
    pub fn open(&self, database: &str) -> SessionResult<PgSession> {
        let mut client = self.client(database)?;
        client
            .batch_execute(&format!(
                "SET statement_timeout = '{}s'",
                self.settings.statement_timeout_secs
            ))
            .map_err(classify_error)?;

        Logger::info(
            "PG_SESSION_OPEN",
            &[("database", database), ("host", &self.settings.host)],
        );

        Ok(PgSession {
            client,
            max_rows: self.settings.max_rows,
        })
    }

    /// Drops `database` and recreates it from `template`.
    ///
    /// Other backends connected to `database` are terminated first; the
    /// commands run on the maintenance database.
    pub fn reset_database(&self, database: &str, template: &str) -> SessionResult<()> {
        let mut client = self.client(&self.settings.maintenance_database)?;
        drop_database(&mut client, database)?;
        client
            .batch_execute(&format!(
                "CREATE DATABASE {} TEMPLATE {}",
                quote_ident(database),
                quote_ident(template)
            ))
            .map_err(classify_error)?;

        Logger::info(
            "PG_DATABASE_RESET",
            &[("database", database), ("template", template)],
        );
        Ok(())
    }

    fn template_of(&self, database: &str) -> String {
        format!("{}{}", database, self.settings.template_suffix)
    }
}

impl Connector for PgConnector {
    type Session = PgSession;

    fn connect(&mut self, database: &str) -> SessionResult<PgSession> {
        self.open(database)
    }

    fn restore(&mut self, database: &str, target: &str) -> SessionResult<()> {
        if !self.settings.reset_after_instance {
            return Ok(());
        }
        self.reset_database(target, &self.template_of(database))
    }

    fn create_copy(&mut self, database: &str, copy: &str) -> SessionResult<()> {
        self.reset_database(copy, &self.template_of(database))
    }

    fn drop_copy(&mut self, copy: &str) -> SessionResult<()> {
        let mut client = self.client(&self.settings.maintenance_database)?;
        drop_database(&mut client, copy)?;
        Logger::info("PG_DATABASE_DROPPED", &[("database", copy)]);
        Ok(())
    }
}

/// Terminates other backends on `database`, then drops it if it exists
fn drop_database(client: &mut Client, database: &str) -> SessionResult<()> {
    client
        .execute(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = $1 AND pid <> pg_backend_pid()",
            &[&database],
        )
        .map_err(classify_error)?;
    client
        .batch_execute(&format!("DROP DATABASE IF EXISTS {}", quote_ident(database)))
        .map_err(classify_error)?;
    Ok(())
}

/// A live PostgreSQL connection
pub struct PgSession {
    client: Client,
    max_rows: usize,
}

impl PgSession {
    /// Streams rows, stopping one past `cap`
    fn query_typed(&mut self, statement: &Statement, cap: Option<usize>) -> SessionResult<Vec<Row>> {
        let stream = self
            .client
            .query_raw(statement, std::iter::empty::<&dyn ToSql>())
            .map_err(classify_error)?;
        read_capped(stream, cap, |row| decode_row(&row))
    }

    /// Runs `sql` on the simple protocol; `types` are the result column
    /// types when known
    fn query_text(&mut self, sql: &str, types: Option<Vec<Type>>) -> SessionResult<Vec<Row>> {
        let messages = self.client.simple_query(sql).map_err(classify_error)?;
        let cells = last_result_cells(messages);

        let types = match types {
            Some(types) => types,
            None => self.last_statement_types(sql),
        };
        Ok(text_rows(cells, &types))
    }

    /// Column types of the final statement of a multi-command string
    fn last_statement_types(&mut self, sql: &str) -> Vec<Type> {
        let Some(last) = last_statement(sql) else {
            return Vec::new();
        };
        match self.client.prepare(last) {
            Ok(statement) => column_types(&statement),
            Err(e) => {
                Logger::trace("PG_TEXT_COLUMNS_UNTYPED", &[("error", &e.to_string())]);
                Vec::new()
            }
        }
    }
}

impl Session for PgSession {
    fn execute(&mut self, sql: &str) -> SessionResult<Vec<Row>> {
        let cap = returns_rows(sql).then_some(self.max_rows);

        let mut rows = match self.client.prepare(sql) {
            Ok(statement) => {
                let binary = statement
                    .columns()
                    .iter()
                    .all(|c| column_kind(c.type_()).map_or(false, reads_binary));
                if binary {
                    self.query_typed(&statement, cap)?
                } else {
                    self.query_text(sql, Some(column_types(&statement)))?
                }
            }
            Err(e) if is_multi_command(&e) => self.query_text(sql, None)?,
            Err(e) => return Err(classify_error(e)),
        };

        if let Some(cap) = cap {
            if rows.len() > cap {
                Logger::warn(
                    "PG_ROWS_TRUNCATED",
                    &[("max_rows", &cap.to_string()), ("rows", &rows.len().to_string())],
                );
                rows.truncate(cap);
            }
        }
        Ok(rows)
    }
}

/// Reads `stream` until it ends or holds one row more than `cap`
fn read_capped<I, R>(
    mut stream: I,
    cap: Option<usize>,
    mut decode: impl FnMut(R) -> SessionResult<Row>,
) -> SessionResult<Vec<Row>>
where
    I: FallibleIterator<Item = R, Error = postgres::Error>,
{
    let mut rows = Vec::new();
    while let Some(row) = stream.next().map_err(classify_error)? {
        rows.push(decode(row)?);
        if cap.map_or(false, |cap| rows.len() > cap) {
            break;
        }
    }
    Ok(rows)
}

fn column_types(statement: &Statement) -> Vec<Type> {
    statement.columns().iter().map(|c| c.type_().clone()).collect()
}

/// Cells of the last result set among `messages`
fn last_result_cells(messages: Vec<SimpleQueryMessage>) -> Vec<Vec<Option<String>>> {
    let mut current = Vec::new();
    let mut last = Vec::new();
    for message in messages {
        match message {
            SimpleQueryMessage::Row(row) => {
                let cells = (0..row.len())
                    .map(|i| row.get(i).map(str::to_string))
                    .collect();
                current.push(cells);
            }
            SimpleQueryMessage::CommandComplete(_) => {
                last = std::mem::take(&mut current);
            }
            _ => {}
        }
    }
    if !current.is_empty() {
        last = current;
    }
    last
}

/// Parses text cells by column type; columns past `types` stay text
fn text_rows(cells: Vec<Vec<Option<String>>>, types: &[Type]) -> Vec<Row> {
    cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(i, cell)| match (cell, types.get(i)) {
                    (None, _) => Value::Null,
                    (Some(text), Some(ty)) => parse_text(ty, &text),
                    (Some(text), None) => Value::Text(text),
                })
                .collect()
        })
        .collect()
}

/// Column types decoded into typed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    Numeric,
    Text,
    Date,
    Timestamp,
    TimestampTz,
    Time,
    Json,
    BoolArray,
    Int4Array,
    Int8Array,
    Float8Array,
    TextArray,
    NumericArray,
}

fn column_kind(ty: &Type) -> Option<ColumnKind> {
    let kinds = [
        (Type::BOOL, ColumnKind::Bool),
        (Type::INT2, ColumnKind::Int2),
        (Type::INT4, ColumnKind::Int4),
        (Type::INT8, ColumnKind::Int8),
        (Type::OID, ColumnKind::Oid),
        (Type::FLOAT4, ColumnKind::Float4),
        (Type::FLOAT8, ColumnKind::Float8),
        (Type::NUMERIC, ColumnKind::Numeric),
        (Type::TEXT, ColumnKind::Text),
        (Type::VARCHAR, ColumnKind::Text),
        (Type::BPCHAR, ColumnKind::Text),
        (Type::NAME, ColumnKind::Text),
        (Type::DATE, ColumnKind::Date),
        (Type::TIMESTAMP, ColumnKind::Timestamp),
        (Type::TIMESTAMPTZ, ColumnKind::TimestampTz),
        (Type::TIME, ColumnKind::Time),
        (Type::JSON, ColumnKind::Json),
        (Type::JSONB, ColumnKind::Json),
        (Type::BOOL_ARRAY, ColumnKind::BoolArray),
        (Type::INT4_ARRAY, ColumnKind::Int4Array),
        (Type::INT8_ARRAY, ColumnKind::Int8Array),
        (Type::FLOAT8_ARRAY, ColumnKind::Float8Array),
        (Type::TEXT_ARRAY, ColumnKind::TextArray),
        (Type::VARCHAR_ARRAY, ColumnKind::TextArray),
        (Type::NUMERIC_ARRAY, ColumnKind::NumericArray),
    ];
    kinds.iter().find(|(t, _)| t == ty).map(|(_, kind)| *kind)
}

fn decode_row(row: &postgres::Row) -> SessionResult<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            decode_cell(row, idx, column.type_()).map_err(|e| {
                SessionError::Execution(format!(
                    "cannot decode column \"{}\" of type {}: {}",
                    column.name(),
                    column.type_(),
                    e
                ))
            })
        })
        .collect()
}

fn decode_cell(row: &postgres::Row, idx: usize, ty: &Type) -> Result<Value, postgres::Error> {
    let kind = match column_kind(ty) {
        Some(kind) => kind,
        None => return Ok(Value::Null),
    };

    let value = match kind {
        ColumnKind::Bool => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        ColumnKind::Int2 => row.try_get::<_, Option<i16>>(idx)?.map(|v| Value::Int(v as i64)),
        ColumnKind::Int4 => row.try_get::<_, Option<i32>>(idx)?.map(|v| Value::Int(v as i64)),
        ColumnKind::Int8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        ColumnKind::Oid => row.try_get::<_, Option<u32>>(idx)?.map(|v| Value::Int(v as i64)),
        ColumnKind::Float4 => row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::Float(widen_f32(v))),
        ColumnKind::Float8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        ColumnKind::Numeric => row.try_get::<_, Option<Decimal>>(idx)?.map(Value::Decimal),
        ColumnKind::Text => row.try_get::<_, Option<String>>(idx)?.map(Value::Text),
        ColumnKind::Date => row.try_get::<_, Option<NaiveDate>>(idx)?.map(Value::Date),
        ColumnKind::Timestamp => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(Value::Timestamp),
        ColumnKind::TimestampTz => row
            .try_get::<_, Option<DateTime<FixedOffset>>>(idx)?
            .map(Value::TimestampTz),
        ColumnKind::Time => row.try_get::<_, Option<NaiveTime>>(idx)?.map(Value::Time),
        ColumnKind::Json => row.try_get::<_, Option<Json>>(idx)?.map(Value::Nested),
        ColumnKind::BoolArray => array_value(row.try_get::<_, Option<Vec<Option<bool>>>>(idx)?, Json::from),
        ColumnKind::Int4Array => array_value(row.try_get::<_, Option<Vec<Option<i32>>>>(idx)?, Json::from),
        ColumnKind::Int8Array => array_value(row.try_get::<_, Option<Vec<Option<i64>>>>(idx)?, Json::from),
        ColumnKind::Float8Array => {
            array_value(row.try_get::<_, Option<Vec<Option<f64>>>>(idx)?, Json::from)
        }
        ColumnKind::TextArray => {
            array_value(row.try_get::<_, Option<Vec<Option<String>>>>(idx)?, Json::from)
        }
        ColumnKind::NumericArray => array_value(
            row.try_get::<_, Option<Vec<Option<Decimal>>>>(idx)?,
            |d: Decimal| Json::String(d.to_string()),
        ),
    };

    Ok(value.unwrap_or(Value::Null))
}

fn reads_binary(kind: ColumnKind) -> bool {
    kind != ColumnKind::TimestampTz
}

/// Reads one text-format cell of type `ty`
fn parse_text(ty: &Type, text: &str) -> Value {
    let parsed = match ty.kind() {
        Kind::Array(element) => parse_text_array(element, text),
        _ => column_kind(ty).and_then(|kind| parse_text_scalar(kind, text)),
    };
    parsed.unwrap_or_else(|| Value::Text(text.to_string()))
}

fn parse_text_scalar(kind: ColumnKind, text: &str) -> Option<Value> {
    let value = match kind {
        ColumnKind::Bool => match text {
            "t" => Value::Bool(true),
            "f" => Value::Bool(false),
            _ => return None,
        },
        ColumnKind::Int2 | ColumnKind::Int4 | ColumnKind::Int8 | ColumnKind::Oid => {
            Value::Int(text.parse().ok()?)
        }
        ColumnKind::Float4 | ColumnKind::Float8 => Value::Float(text.parse().ok()?),
        ColumnKind::Numeric => Value::Decimal(text.parse::<Decimal>().ok()?),
        ColumnKind::Text => Value::Text(text.to_string()),
        ColumnKind::Date => Value::Date(NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?),
        ColumnKind::Timestamp => {
            Value::Timestamp(NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").ok()?)
        }
        ColumnKind::TimestampTz => Value::TimestampTz(
            DateTime::<FixedOffset>::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z").ok()?,
        ),
        ColumnKind::Time => Value::Time(NaiveTime::parse_from_str(text, "%H:%M:%S%.f").ok()?),
        ColumnKind::Json => Value::Nested(serde_json::from_str(text).ok()?),
        ColumnKind::BoolArray
        | ColumnKind::Int4Array
        | ColumnKind::Int8Array
        | ColumnKind::Float8Array
        | ColumnKind::TextArray
        | ColumnKind::NumericArray => return None,
    };
    Some(value)
}

/// Reads a one-dimensional array literal; elements keep their JSON shape
fn parse_text_array(element: &Type, text: &str) -> Option<Value> {
    let kind = column_kind(element);
    let items = split_array_literal(text)?
        .into_iter()
        .map(|item| match item {
            None => Json::Null,
            Some(item) => match kind.and_then(|kind| parse_text_scalar(kind, &item)) {
                Some(Value::Bool(b)) => Json::Bool(b),
                Some(Value::Int(i)) => Json::from(i),
                Some(Value::Float(f)) => Json::from(f),
                Some(Value::Nested(json)) => json,
                _ => Json::String(item),
            },
        })
        .collect();
    Some(Value::Nested(Json::Array(items)))
}

/// Splits `{a,NULL,"b,c"}` into its elements; `None` for anything that is
/// not a one-dimensional literal
fn split_array_literal(text: &str) -> Option<Vec<Option<String>>> {
    let inner = text.strip_prefix('{')?.strip_suffix('}')?;
    let mut items = Vec::new();
    if inner.is_empty() {
        return Some(items);
    }

    let mut chars = inner.chars();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes => current.push(chars.next()?),
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            '{' | '}' if !in_quotes => return None,
            ',' if !in_quotes => {
                items.push(array_item(std::mem::take(&mut current), quoted));
                quoted = false;
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return None;
    }
    items.push(array_item(current, quoted));
    Some(items)
}

fn array_item(text: String, quoted: bool) -> Option<String> {
    if !quoted && text.eq_ignore_ascii_case("NULL") {
        None
    } else {
        Some(text)
    }
}

/// The final statement of a multi-command string that holds more than
/// comments
fn last_statement(sql: &str) -> Option<&str> {
    let bytes = sql.as_bytes();
    let mut last = None;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = skip_quoted(bytes, i),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = find_from(bytes, i, b"\n").unwrap_or(bytes.len())
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find_from(bytes, i + 2, b"*/").map_or(bytes.len(), |end| end + 2)
            }
            b'$' => i = skip_dollar_quoted(sql, i),
            b';' => {
                if has_code(&sql[start..i]) {
                    last = Some(sql[start..i].trim());
                }
                start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    if has_code(&sql[start..]) {
        Some(sql[start..].trim())
    } else {
        last
    }
}

fn has_code(segment: &str) -> bool {
    strip_comments(&[segment])
        .iter()
        .any(|stripped| !stripped.trim().is_empty())
}

/// Index just past the quoted literal or identifier starting at `start`
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Index just past the `$tag$...$tag$` body starting at `start`, or the
/// next byte when `$` does not open one
fn skip_dollar_quoted(sql: &str, start: usize) -> usize {
    let rest = &sql[start + 1..];
    let Some(tag_len) = rest.find('$') else {
        return start + 1;
    };
    let tag_name = &rest[..tag_len];
    let valid = tag_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !tag_name.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        return start + 1;
    }

    let tag = &sql[start..start + tag_len + 2];
    let body = start + tag.len();
    sql[body..]
        .find(tag)
        .map_or(sql.len(), |end| body + end + tag.len())
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|position| position + from)
}

fn array_value<T>(items: Option<Vec<Option<T>>>, to_json: impl Fn(T) -> Json) -> Option<Value> {
    items.map(|items| {
        Value::Nested(Json::Array(
            items
                .into_iter()
                .map(|item| item.map(&to_json).unwrap_or(Json::Null))
                .collect(),
        ))
    })
}

/// Widens a `real` through its shortest text so `0.1::real` reads as 0.1
fn widen_f32(v: f32) -> f64 {
    v.to_string().parse().unwrap_or(v as f64)
}

fn returns_rows(sql: &str) -> bool {
    let lower = sql.trim_start().to_ascii_lowercase();
    lower.starts_with("select") || lower.starts_with("with")
}

fn is_multi_command(e: &postgres::Error) -> bool {
    e.as_db_error()
        .map(|db| db.message().contains("multiple commands"))
        .unwrap_or(false)
}

fn classify_error(e: postgres::Error) -> SessionError {
    match e.as_db_error() {
        Some(db) if db.code() == &SqlState::QUERY_CANCELED => {
            SessionError::Timeout(db.message().to_string())
        }
        Some(db) => SessionError::Execution(format!("{}: {}", db.code().code(), db.message())),
        None if e.is_closed() => SessionError::Connection(e.to_string()),
        None => SessionError::Execution(e.to_string()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_kinds() {
        assert_eq!(column_kind(&Type::INT4), Some(ColumnKind::Int4));
        assert_eq!(column_kind(&Type::VARCHAR), Some(ColumnKind::Text));
        assert_eq!(column_kind(&Type::JSONB), Some(ColumnKind::Json));
        assert_eq!(column_kind(&Type::UUID), None);
        assert_eq!(column_kind(&Type::INTERVAL), None);
    }

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("  select 1"));
        assert!(returns_rows("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!returns_rows("UPDATE t SET a = 1 RETURNING a"));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("shop_process_1"), "\"shop_process_1\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_widen_f32() {
        assert_eq!(widen_f32(0.1), 0.1);
        assert_eq!(widen_f32(2.5), 2.5);
    }

    #[test]
    fn test_read_capped_stops_one_past_cap() {
        let pulled = std::cell::Cell::new(0);
        let stream = postgres::fallible_iterator::convert((0..).map(|n: i64| {
            pulled.set(pulled.get() + 1);
            Ok::<_, postgres::Error>(n)
        }));

        let rows = read_capped(stream, Some(3), |n| Ok(vec![Value::Int(n)])).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(pulled.get(), 4);
    }

    #[test]
    fn test_read_capped_without_cap_reads_all() {
        let stream = postgres::fallible_iterator::convert((0..5).map(Ok::<i64, postgres::Error>));
        let rows = read_capped(stream, None, |n| Ok(vec![Value::Int(n)])).unwrap();
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn test_text_cells_are_typed_by_column() {
        let cells = vec![vec![
            Some("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11".to_string()),
            Some("42".to_string()),
            Some("12.50".to_string()),
            Some("0.25".to_string()),
            Some("t".to_string()),
            Some("2024-03-07".to_string()),
            Some("2024-03-07 10:00:00.5".to_string()),
            Some(r#"{"b": 1, "a": 2}"#.to_string()),
            Some("1 day 02:00:00".to_string()),
            None,
        ]];
        let types = [
            Type::UUID,
            Type::INT8,
            Type::NUMERIC,
            Type::FLOAT8,
            Type::BOOL,
            Type::DATE,
            Type::TIMESTAMP,
            Type::JSONB,
            Type::INTERVAL,
            Type::TEXT,
        ];

        let rows = text_rows(cells, &types);
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Value::from("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11"),
                Value::Int(42),
                Value::Decimal(Decimal::new(1250, 2)),
                Value::Float(0.25),
                Value::Bool(true),
                Value::Date(date),
                Value::Timestamp(date.and_hms_milli_opt(10, 0, 0, 500).unwrap()),
                Value::Nested(serde_json::json!({"a": 2, "b": 1})),
                Value::from("1 day 02:00:00"),
                Value::Null,
            ]]
        );
    }

    #[test]
    fn test_text_cells_without_types_stay_text() {
        let rows = text_rows(vec![vec![Some("5".to_string())]], &[]);
        assert_eq!(rows, vec![vec![Value::from("5")]]);
    }

    #[test]
    fn test_unparseable_text_stays_text() {
        assert_eq!(parse_text(&Type::NUMERIC, "NaN"), Value::from("NaN"));
        assert_eq!(parse_text(&Type::TIMESTAMP, "infinity"), Value::from("infinity"));
        assert_eq!(parse_text(&Type::INT4, "x"), Value::from("x"));
    }

    #[test]
    fn test_timestamptz_keeps_session_offset() {
        let value = parse_text(&Type::TIMESTAMPTZ, "2024-03-07 23:30:00-05");
        assert_eq!(
            crate::normalize::normalize_value(&value),
            Value::from("2024-03-07")
        );
        assert!(!reads_binary(ColumnKind::TimestampTz));
        assert!(reads_binary(ColumnKind::Timestamp));
    }

    #[test]
    fn test_text_result_matches_binary_result() {
        let stamp = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let text = text_rows(
            vec![vec![
                Some("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11".to_string()),
                Some("2024-03-07 10:00:00".to_string()),
                Some("5".to_string()),
            ]],
            &[Type::UUID, Type::TIMESTAMP, Type::INT4],
        );
        let binary = vec![vec![
            Value::from("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11"),
            Value::Timestamp(stamp),
            Value::Int(5),
        ]];

        assert_eq!(
            crate::equivalence::result_sets_match(&text, &binary, None),
            crate::verdict::Verdict::Pass
        );
    }

    #[test]
    fn test_text_arrays() {
        assert_eq!(
            parse_text(&Type::INT2_ARRAY, "{1,NULL,3}"),
            Value::Nested(serde_json::json!([1, null, 3]))
        );
        assert_eq!(
            parse_text(&Type::FLOAT4_ARRAY, "{0.5,2}"),
            Value::Nested(serde_json::json!([0.5, 2.0]))
        );
        assert_eq!(
            parse_text(&Type::TIMESTAMP_ARRAY, r#"{"2024-03-07 10:00:00"}"#),
            Value::Nested(serde_json::json!(["2024-03-07 10:00:00"]))
        );
        assert_eq!(
            parse_text(&Type::INT4_ARRAY, "{{1,2},{3,4}}"),
            Value::from("{{1,2},{3,4}}")
        );
    }

    #[test]
    fn test_split_array_literal() {
        assert_eq!(
            split_array_literal(r#"{a,"b,c","NULL",NULL,"q\"x"}"#),
            Some(vec![
                Some("a".to_string()),
                Some("b,c".to_string()),
                Some("NULL".to_string()),
                None,
                Some("q\"x".to_string()),
            ])
        );
        assert_eq!(split_array_literal("{}"), Some(Vec::new()));
        assert_eq!(split_array_literal("[0:1]={1,2}"), None);
    }

    #[test]
    fn test_last_statement() {
        assert_eq!(
            last_statement("CREATE TABLE t (a int); SELECT a FROM t;"),
            Some("SELECT a FROM t")
        );
        assert_eq!(
            last_statement("SELECT ';' AS a; SELECT $$;$$ AS b -- done;"),
            Some("SELECT $$;$$ AS b -- done;")
        );
        assert_eq!(
            last_statement("UPDATE t SET a = 1; SELECT a FROM t; -- trailing"),
            Some("SELECT a FROM t")
        );
        assert_eq!(
            last_statement("SELECT 1; /* a; b */ SELECT \"x;y\" FROM t"),
            Some("/* a; b */ SELECT \"x;y\" FROM t")
        );
        assert_eq!(last_statement(" ; -- nothing"), None);
    }

    #[test]
    fn test_array_value() {
        let v = array_value(Some(vec![Some(1i32), None, Some(3)]), Json::from);
        assert_eq!(v, Some(Value::Nested(serde_json::json!([1, null, 3]))));
        assert_eq!(array_value(None::<Vec<Option<i32>>>, Json::from), None);
    }
}
