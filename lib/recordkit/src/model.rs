//! Per-table schema: table, key, mass-assignment rules, hidden columns and casts.

use std::str::FromStr;

use crate::time::{from_epoch_millis, parse_datetime};
use crate::{OrmError, Result, Row, Value};

/// Column type applied to values when a row is hydrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Number,
    Boolean,
    Date,
    Json,
}

impl FromStr for Cast {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "number" => Ok(Cast::Number),
            "boolean" => Ok(Cast::Boolean),
            "date" => Ok(Cast::Date),
            "json" => Ok(Cast::Json),
            other => Err(OrmError::InvalidArgument(format!("unknown cast: {other}"))),
        }
    }
}

impl Cast {
    /// Coerce a non-null value. Values that cannot be coerced are returned unchanged.
    pub fn apply(self, value: Value) -> Value {
        if value.is_null() {
            return value;
        }
        match self {
            Cast::Number => match value.as_f64() {
                Some(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Value::Int(n as i64),
                Some(n) => Value::Float(n),
                None => value,
            },
            Cast::Boolean => Value::Bool(truthy(&value)),
            Cast::Date => match &value {
                Value::Datetime(_) => value,
                Value::String(s) => parse_datetime(s).map(Value::Datetime).unwrap_or(value),
                Value::Int(_) | Value::UInt(_) => value
                    .as_i64()
                    .and_then(from_epoch_millis)
                    .map(Value::Datetime)
                    .unwrap_or(value),
                _ => value,
            },
            Cast::Json => match &value {
                Value::String(s) => serde_json::from_str::<serde_json::Value>(s)
                    .map(Value::from)
                    .unwrap_or(value),
                _ => value,
            },
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::UInt(n) => *n != 0,
        Value::Float(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !matches!(s.as_str(), "" | "0" | "false"),
        Value::Datetime(_) | Value::Json(_) | Value::List(_) => true,
    }
}

/// Schema of a table-backed record type.
///
/// Usually implemented with `#[derive(Model)]`:
///
/// ```
/// use recordkit::Model;
///
/// #[derive(Model)]
/// #[model(table = "users", fillable(name, email), hidden(password), casts(age = "number"))]
/// struct User;
///
/// assert_eq!(User::table_name(), "users");
/// assert_eq!(User::primary_key(), "id");
/// ```
pub trait Model: Send + Sync + 'static {
    fn table_name() -> &'static str;

    fn primary_key() -> &'static str {
        "id"
    }

    /// Columns accepted by mass assignment. Takes precedence over `guarded`.
    fn fillable() -> &'static [&'static str] {
        &[]
    }

    /// Columns rejected by mass assignment when no `fillable` list is set.
    fn guarded() -> &'static [&'static str] {
        &[]
    }

    /// Columns stripped from `to_json` output.
    fn hidden() -> &'static [&'static str] {
        &[]
    }

    fn casts() -> &'static [(&'static str, Cast)] {
        &[]
    }

    /// Timestamp column marking soft-deleted rows. When set, default queries
    /// skip marked rows and `delete()` stamps the column instead of removing
    /// the row.
    const SOFT_DELETE_COLUMN: Option<&'static str> = None;
}

/// Models whose `delete()` marks rows instead of removing them.
///
/// The column is always [`Model::SOFT_DELETE_COLUMN`]. Implementing this
/// trait for a model that leaves it unset is a compile error as soon as a
/// soft-delete operation is used on it.
///
/// ```
/// use recordkit::{Model, Record, SoftDeletes};
///
/// struct Post;
///
/// impl Model for Post {
///     const SOFT_DELETE_COLUMN: Option<&'static str> = Some("removed_at");
///
///     fn table_name() -> &'static str {
///         "posts"
///     }
/// }
///
/// impl SoftDeletes for Post {}
///
/// assert_eq!(Post::DELETED_AT, "removed_at");
/// assert_eq!(
///     Record::<Post>::query().compile().sql,
///     "SELECT * FROM posts WHERE removed_at IS NULL"
/// );
/// ```
pub trait SoftDeletes: Model {
    #[allow(clippy::panic)]
    const DELETED_AT: &'static str = match Self::SOFT_DELETE_COLUMN {
        Some(column) => column,
        None => panic!("SoftDeletes requires Model::SOFT_DELETE_COLUMN"),
    };
}

/// Apply the model's mass-assignment rules to `data`.
pub fn fillable_data<M: Model>(data: &Row) -> Row {
    let fillable = M::fillable();
    let guarded = M::guarded();

    if !fillable.is_empty() {
        data.iter()
            .filter(|(column, _)| fillable.contains(column))
            .map(|(column, value)| (column, value.clone()))
            .collect()
    } else if !guarded.is_empty() {
        data.iter()
            .filter(|(column, _)| !guarded.contains(column))
            .map(|(column, value)| (column, value.clone()))
            .collect()
    } else {
        data.clone()
    }
}

/// Apply the model's casts to a fetched row.
pub fn cast_row<M: Model>(mut row: Row) -> Row {
    for (column, cast) in M::casts() {
        if let Some(slot) = row.get_mut(column) {
            let value = std::mem::replace(slot, Value::Null);
            *slot = cast.apply(value);
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use chrono::{TimeZone, Utc};

    struct Open;
    impl Model for Open {
        fn table_name() -> &'static str {
            "open"
        }
    }

    struct Guarded;
    impl Model for Guarded {
        fn table_name() -> &'static str {
            "guarded"
        }
        fn guarded() -> &'static [&'static str] {
            &["is_admin"]
        }
    }

    struct Both;
    impl Model for Both {
        fn table_name() -> &'static str {
            "both"
        }
        fn fillable() -> &'static [&'static str] {
            &["name"]
        }
        fn guarded() -> &'static [&'static str] {
            &["name"]
        }
    }

    #[test]
    fn fillable_resolution_modes() {
        let data = row! { "name" => "a", "is_admin" => true };

        assert_eq!(fillable_data::<Open>(&data), data);
        assert_eq!(
            fillable_data::<Guarded>(&data).keys().collect::<Vec<_>>(),
            vec!["name"]
        );
        // allow-list wins over deny-list
        assert_eq!(
            fillable_data::<Both>(&data).keys().collect::<Vec<_>>(),
            vec!["name"]
        );
    }

    #[test]
    fn number_cast() {
        assert_eq!(Cast::Number.apply(Value::from("42")), Value::Int(42));
        assert_eq!(Cast::Number.apply(Value::from("4.5")), Value::Float(4.5));
        assert_eq!(Cast::Number.apply(Value::from("abc")), Value::from("abc"));
        assert_eq!(Cast::Number.apply(Value::Null), Value::Null);
    }

    #[test]
    fn boolean_cast() {
        assert_eq!(Cast::Boolean.apply(Value::Int(1)), Value::Bool(true));
        assert_eq!(Cast::Boolean.apply(Value::Int(0)), Value::Bool(false));
        assert_eq!(Cast::Boolean.apply(Value::from("0")), Value::Bool(false));
        assert_eq!(Cast::Boolean.apply(Value::from("yes")), Value::Bool(true));
    }

    #[test]
    fn date_cast() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            Cast::Date.apply(Value::from("2024-03-01 12:30:00")),
            Value::Datetime(expected)
        );
        assert_eq!(
            Cast::Date.apply(Value::Int(expected.timestamp_millis())),
            Value::Datetime(expected)
        );
        assert_eq!(Cast::Date.apply(Value::from("never")), Value::from("never"));
    }

    #[test]
    fn json_cast() {
        assert_eq!(
            Cast::Json.apply(Value::from(r#"{"a":1}"#)),
            Value::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(Cast::Json.apply(Value::from("{oops")), Value::from("{oops"));
        assert_eq!(Cast::Json.apply(Value::Int(3)), Value::Int(3));
    }

    #[test]
    fn unknown_cast_name_is_rejected() {
        assert!("decimal".parse::<Cast>().is_err());
        assert_eq!("json".parse::<Cast>().unwrap(), Cast::Json);
    }
}
