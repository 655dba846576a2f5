//! SQL literals and engine identification.
//!
//! The driver contract only accepts SQL text, so every value that ends up
//! in a statement is rendered inline through [`SqlValue::to_sql_inline`],
//! which escapes according to the target engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Database engine a statement is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// MySQL / MariaDB.
    Mysql,
    /// PostgreSQL.
    Postgresql,
    /// SQLite.
    Sqlite,
}

impl Engine {
    /// Statement opening a transaction.
    #[must_use]
    pub const fn begin_statement(self) -> &'static str {
        match self {
            Self::Mysql => "START TRANSACTION",
            Self::Postgresql | Self::Sqlite => "BEGIN",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mysql => write!(f, "mysql"),
            Self::Postgresql => write!(f, "postgresql"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// A scalar SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl SqlValue {
    /// Converts a JSON scalar into a SQL value.
    ///
    /// Arrays and objects are stored as their JSON text.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }

    /// Returns true for NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the SQL representation for inline use, escaped for `engine`.
    ///
    /// Single quotes are doubled on every engine; MySQL additionally
    /// treats backslash as an escape character inside string literals.
    #[must_use]
    pub fn to_sql_inline(&self, engine: Engine) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => match (engine, b) {
                (Engine::Sqlite, true) => String::from("1"),
                (Engine::Sqlite, false) => String::from("0"),
                (_, true) => String::from("TRUE"),
                (_, false) => String::from("FALSE"),
            },
            Self::Int(n) => format!("{n}"),
            Self::Float(f) if f.is_finite() => format!("{f}"),
            Self::Float(_) => String::from("NULL"),
            Self::Text(s) => {
                let mut escaped = s.replace('\'', "''");
                if engine == Engine::Mysql {
                    escaped = escaped.replace('\\', "\\\\");
                }
                format!("'{escaped}'")
            }
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_null_and_numbers() {
        assert_eq!(SqlValue::Null.to_sql_inline(Engine::Sqlite), "NULL");
        assert_eq!(SqlValue::Int(-100).to_sql_inline(Engine::Mysql), "-100");
        assert_eq!(SqlValue::Float(1.5).to_sql_inline(Engine::Postgresql), "1.5");
        assert_eq!(SqlValue::Float(f64::NAN).to_sql_inline(Engine::Sqlite), "NULL");
    }

    #[test]
    fn test_inline_bool_per_engine() {
        assert_eq!(SqlValue::Bool(true).to_sql_inline(Engine::Sqlite), "1");
        assert_eq!(SqlValue::Bool(false).to_sql_inline(Engine::Sqlite), "0");
        assert_eq!(SqlValue::Bool(true).to_sql_inline(Engine::Postgresql), "TRUE");
        assert_eq!(SqlValue::Bool(false).to_sql_inline(Engine::Mysql), "FALSE");
    }

    #[test]
    fn test_inline_text_escaping() {
        assert_eq!(
            SqlValue::from("it's").to_sql_inline(Engine::Sqlite),
            "'it''s'"
        );
        assert_eq!(
            SqlValue::from("'; DROP TABLE users; --").to_sql_inline(Engine::Postgresql),
            "'''; DROP TABLE users; --'"
        );
    }

    #[test]
    fn test_inline_backslash_only_escaped_on_mysql() {
        let value = SqlValue::from(r"a\b");
        assert_eq!(value.to_sql_inline(Engine::Sqlite), r"'a\b'");
        assert_eq!(value.to_sql_inline(Engine::Postgresql), r"'a\b'");
        assert_eq!(value.to_sql_inline(Engine::Mysql), r"'a\\b'");
    }

    #[test]
    fn test_from_json() {
        assert_eq!(SqlValue::from_json(&json!(null)), SqlValue::Null);
        assert_eq!(SqlValue::from_json(&json!(7)), SqlValue::Int(7));
        assert_eq!(SqlValue::from_json(&json!(2.5)), SqlValue::Float(2.5));
        assert_eq!(SqlValue::from_json(&json!("x")), SqlValue::from("x"));
        assert_eq!(
            SqlValue::from_json(&json!({"a": [1, 2]})),
            SqlValue::from(r#"{"a":[1,2]}"#)
        );
    }

    #[test]
    fn test_begin_statement() {
        assert_eq!(Engine::Mysql.begin_statement(), "START TRANSACTION");
        assert_eq!(Engine::Sqlite.begin_statement(), "BEGIN");
    }
}
