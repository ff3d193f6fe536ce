//! Parameter binding and row decoding for MySQL statements.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use recordkit::{BoxError, ExecResult, OrmError, Result, Row, Value};
use sqlx::mysql::{MySqlArguments, MySqlColumn, MySqlRow};
use sqlx::types::Json;
use sqlx::{Arguments, Column as _, Executor, MySql, Row as _, TypeInfo as _};
use tracing::{debug, error};

/// Bind a Value to MySqlArguments.
fn bind_value(args: &mut MySqlArguments, value: &Value) -> Result<(), BoxError> {
    match value {
        Value::Null => args.add(None::<String>),
        Value::Bool(b) => args.add(*b),
        Value::Int(n) => args.add(*n),
        Value::UInt(n) => args.add(*n),
        Value::Float(n) => args.add(*n),
        Value::String(s) => args.add(s.as_str()),
        // Sessions run at +00:00, so a naive UTC value fits DATETIME and TIMESTAMP alike
        Value::Datetime(dt) => args.add(dt.naive_utc()),
        Value::Json(_) | Value::List(_) => args.add(serde_json::Value::from(value).to_string()),
    }
}

fn arguments(sql: &str, params: &[Value]) -> Result<MySqlArguments> {
    let mut args = MySqlArguments::default();
    for value in params {
        bind_value(&mut args, value).map_err(|e| OrmError::query(sql, params, e))?;
    }
    Ok(args)
}

fn statement_failed(sql: &str, params: &[Value], err: sqlx::Error) -> OrmError {
    error!(sql, ?params, error = %err, "statement failed");
    OrmError::query(sql, params, err)
}

/// Run `sql` and decode every returned row.
pub(crate) async fn fetch_rows<'c, E>(executor: E, sql: &str, params: &[Value]) -> Result<Vec<Row>>
where
    E: Executor<'c, Database = MySql>,
{
    debug!(sql, ?params, "query");
    let args = arguments(sql, params)?;
    let rows = sqlx::query_with(sql, args)
        .fetch_all(executor)
        .await
        .map_err(|e| statement_failed(sql, params, e))?;

    rows.iter().map(decode_row).collect()
}

/// Run a data-modifying statement. MySQL reports no rows for these.
pub(crate) async fn execute<'c, E>(executor: E, sql: &str, params: &[Value]) -> Result<ExecResult>
where
    E: Executor<'c, Database = MySql>,
{
    debug!(sql, ?params, "execute");
    let args = arguments(sql, params)?;
    let result = sqlx::query_with(sql, args)
        .execute(executor)
        .await
        .map_err(|e| statement_failed(sql, params, e))?;

    let last_insert_id = result.last_insert_id();
    Ok(ExecResult {
        rows: Vec::new(),
        affected_rows: result.rows_affected(),
        last_insert_id: (last_insert_id != 0).then_some(last_insert_id),
    })
}

/// Decode a MySQL row into a column-ordered [`Row`].
pub(crate) fn decode_row(row: &MySqlRow) -> Result<Row> {
    let mut decoded = Row::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        decoded.insert(column.name(), extract_column_value(row, idx, column)?);
    }
    Ok(decoded)
}

fn get<'r, T>(row: &'r MySqlRow, idx: usize) -> Result<Option<T>>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get(idx).map_err(|e| OrmError::Decode(e.to_string()))
}

fn get_unchecked<'r, T>(row: &'r MySqlRow, idx: usize) -> Result<Option<T>>
where
    T: sqlx::Decode<'r, MySql>,
{
    row.try_get_unchecked(idx)
        .map_err(|e| OrmError::Decode(e.to_string()))
}

/// Text when the column decodes as a string, otherwise its raw bytes read as lossy UTF-8.
fn text_or_bytes(row: &MySqlRow, idx: usize) -> Result<Value> {
    if let Ok(text) = row.try_get::<Option<String>, _>(idx) {
        return Ok(text.into());
    }
    Ok(get_unchecked::<Vec<u8>>(row, idx)?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .into())
}

/// BIT(n) arrives as big-endian bytes, at most eight of them.
fn bit_value(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

/// Extract a column value by its MySQL type name.
fn extract_column_value(row: &MySqlRow, idx: usize, column: &MySqlColumn) -> Result<Value> {
    let type_name = column.type_info().name();

    let value = match type_name {
        "NULL" => Value::Null,
        "BOOLEAN" => get::<bool>(row, idx)?.into(),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => get::<i64>(row, idx)?.into(),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => get::<u64>(row, idx)?.into(),
        "FLOAT" => get::<f32>(row, idx)?.map(f64::from).into(),
        "DOUBLE" => get::<f64>(row, idx)?.into(),
        "DECIMAL" => {
            // Exact decimals stay textual; aggregates and number casts parse them
            let v: Option<String> = row
                .try_get_unchecked(idx)
                .map_err(|e| OrmError::Decode(e.to_string()))?;
            v.into()
        }
        "DATETIME" => get::<NaiveDateTime>(row, idx)?.map(|dt| dt.and_utc()).into(),
        "TIMESTAMP" => get::<DateTime<Utc>>(row, idx)?.into(),
        "DATE" => get::<NaiveDate>(row, idx)?
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            .into(),
        "TIME" => get::<NaiveTime>(row, idx)?.map(|t| t.to_string()).into(),
        "YEAR" => get_unchecked::<i64>(row, idx)?.into(),
        "BIT" => get_unchecked::<Vec<u8>>(row, idx)?
            .map(|bytes| bit_value(&bytes))
            .into(),
        "JSON" => get::<Json<serde_json::Value>>(row, idx)?
            .map(|json| Value::Json(json.0))
            .unwrap_or(Value::Null),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            get::<Vec<u8>>(row, idx)?
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .into()
        }
        // VARCHAR, CHAR, TEXT, ENUM, SET, GEOMETRY and the rest
        _ => text_or_bytes(row, idx)?,
    };

    Ok(value)
}
