//! Field type registry.
//!
//! Every column is described by a [`FieldDefinition`]: a closed
//! [`FieldKind`] plus nullability, uniqueness, defaults and the validators
//! and transforms applied on write. Definitions are created with the
//! builder functions in this module and attached to a model with
//! [`ModelBuilder::field`](crate::ModelBuilder::field).

mod validate;

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::{Engine, SqlValue};

pub use validate::{Transform, Validator};

static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok()
});

/// Semantic column kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FieldKind {
    /// Auto-incrementing integer key.
    Id,
    /// UUID stored as text.
    Uuid,
    /// Bounded string.
    String {
        /// Maximum length in characters.
        max_length: u32,
    },
    /// Unbounded text.
    Text,
    /// E-mail address.
    Email,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Double precision float.
    Float,
    /// Fixed precision decimal.
    Decimal {
        /// Total digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Boolean.
    Boolean,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// Timestamp (RFC 3339 or `YYYY-MM-DD HH:MM:SS`).
    DateTime,
    /// One of a fixed set of strings.
    Enum {
        /// Allowed values.
        variants: Vec<String>,
    },
    /// Arbitrary JSON document.
    Json,
    /// Homogeneous array.
    Array {
        /// Element kind.
        items: Box<FieldKind>,
    },
    /// JSON object with a known shape.
    Object,
    /// JSON object used as a string-keyed map.
    Record,
    /// Fixed-length heterogeneous array.
    Tuple {
        /// Element kinds, by position.
        items: Vec<FieldKind>,
    },
}

impl FieldKind {
    /// Kinds compared with string operators.
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::String { .. } | Self::Text | Self::Email | Self::Uuid | Self::Enum { .. }
        )
    }

    /// Kinds usable with `sum` and `avg`.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Id | Self::Integer | Self::BigInt | Self::Float | Self::Decimal { .. }
        )
    }

    /// Kinds stored as serialized JSON; these never appear in predicates.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(
            self,
            Self::Json | Self::Array { .. } | Self::Object | Self::Record | Self::Tuple { .. }
        )
    }

    /// Checks that a non-null JSON value fits this kind.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        let ok = match self {
            Self::Id | Self::Integer | Self::BigInt => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Decimal { .. } => {
                value.is_number()
                    || value.as_str().is_some_and(|s| s.parse::<f64>().is_ok())
            }
            Self::Boolean => value.is_boolean(),
            Self::String { max_length } => {
                return match value.as_str() {
                    Some(s) if s.chars().count() > *max_length as usize => Err(format!(
                        "must be at most {max_length} characters"
                    )),
                    Some(_) => Ok(()),
                    None => Err(String::from("expected a string")),
                };
            }
            Self::Text => value.is_string(),
            Self::Email => {
                return match value.as_str() {
                    Some(s) if EMAIL_RE.as_ref().is_some_and(|re| re.is_match(s)) => Ok(()),
                    _ => Err(String::from("enter a valid email address")),
                };
            }
            Self::Uuid => value
                .as_str()
                .is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
            Self::Date => value
                .as_str()
                .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
            Self::DateTime => value.as_str().is_some_and(|s| {
                DateTime::parse_from_rfc3339(s).is_ok()
                    || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
            }),
            Self::Enum { variants } => {
                return match value.as_str() {
                    Some(s) if variants.iter().any(|v| v == s) => Ok(()),
                    _ => Err(format!("must be one of: {}", variants.join(", "))),
                };
            }
            Self::Json => true,
            Self::Object | Self::Record => value.is_object(),
            Self::Array { items } => {
                return match value.as_array() {
                    Some(values) => values.iter().try_for_each(|v| items.check(v)),
                    None => Err(String::from("expected an array")),
                };
            }
            Self::Tuple { items } => {
                return match value.as_array() {
                    Some(values) if values.len() == items.len() => values
                        .iter()
                        .zip(items)
                        .try_for_each(|(v, kind)| kind.check(v)),
                    _ => Err(format!("expected an array of {} items", items.len())),
                };
            }
        };

        if ok {
            Ok(())
        } else {
            Err(format!("expected {}", self.describe()))
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Id | Self::Integer | Self::BigInt => "an integer",
            Self::Float | Self::Decimal { .. } => "a number",
            Self::Boolean => "a boolean",
            Self::Uuid => "a valid UUID",
            Self::Date => "a date (YYYY-MM-DD)",
            Self::DateTime => "a datetime",
            Self::Object | Self::Record => "an object",
            Self::Array { .. } | Self::Tuple { .. } => "an array",
            Self::String { .. } | Self::Text | Self::Email | Self::Enum { .. } | Self::Json => {
                "a string"
            }
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => write!(f, "id"),
            Self::Uuid => write!(f, "uuid"),
            Self::String { max_length } => write!(f, "string({max_length})"),
            Self::Text => write!(f, "text"),
            Self::Email => write!(f, "email"),
            Self::Integer => write!(f, "integer"),
            Self::BigInt => write!(f, "bigint"),
            Self::Float => write!(f, "float"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision}, {scale})"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date => write!(f, "date"),
            Self::DateTime => write!(f, "datetime"),
            Self::Enum { .. } => write!(f, "enum"),
            Self::Json => write!(f, "json"),
            Self::Array { items } => write!(f, "array<{items}>"),
            Self::Object => write!(f, "object"),
            Self::Record => write!(f, "record"),
            Self::Tuple { .. } => write!(f, "tuple"),
        }
    }
}

/// Column default.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A literal value.
    Value(Value),
    /// The current timestamp at insert time.
    CurrentTimestamp,
}

impl DefaultValue {
    /// Renders the default as a SQL expression for `engine`.
    #[must_use]
    pub fn to_sql(&self, engine: Engine) -> String {
        match self {
            Self::Value(value) => SqlValue::from_json(value).to_sql_inline(engine),
            Self::CurrentTimestamp => String::from("CURRENT_TIMESTAMP"),
        }
    }
}

/// Target of a forward relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Referenced table.
    pub table: String,
    /// Referenced field (primary key or unique).
    pub field: String,
    /// Explicit name for the derived reverse relation.
    pub reverse_name: Option<String>,
}

/// Full description of one column.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// Column name, set when the field is attached to a model.
    pub name: String,
    /// Semantic kind.
    pub kind: FieldKind,
    /// Whether NULL is accepted.
    pub nullable: bool,
    /// Whether values must be unique.
    pub unique: bool,
    /// Whether the column gets a plain index.
    pub indexed: bool,
    /// Whether this is the model's primary key.
    pub primary_key: bool,
    /// Default applied when the value is omitted.
    pub default: Option<DefaultValue>,
    /// Checks run on write, after transforms.
    pub validators: Vec<Validator>,
    /// Rewrites applied on write, before validators.
    pub transforms: Vec<Transform>,
    /// Forward relation declared on this field.
    pub references: Option<Reference>,
}

impl FieldDefinition {
    /// Creates a non-null field of the given kind.
    #[must_use]
    pub const fn new(kind: FieldKind) -> Self {
        Self {
            name: String::new(),
            kind,
            nullable: false,
            unique: false,
            indexed: false,
            primary_key: false,
            default: None,
            validators: Vec::new(),
            transforms: Vec::new(),
            references: None,
        }
    }

    /// Marks this field as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Allows NULL.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Requires unique values.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds a plain index.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Sets a literal default.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Defaults to the current timestamp.
    #[must_use]
    pub fn default_now(mut self) -> Self {
        self.default = Some(DefaultValue::CurrentTimestamp);
        self
    }

    /// Adds a validator.
    #[must_use]
    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Requires a character count between `min` and `max`.
    #[must_use]
    pub fn length(self, min: usize, max: usize) -> Self {
        self.validate(Validator::Length {
            min: Some(min),
            max: Some(max),
        })
    }

    /// Requires a number between `min` and `max`.
    #[must_use]
    pub fn range(self, min: f64, max: f64) -> Self {
        self.validate(Validator::Range {
            min: Some(min),
            max: Some(max),
        })
    }

    /// Requires values to match `pattern`.
    #[must_use]
    pub fn pattern(self, pattern: Regex) -> Self {
        self.validate(Validator::Pattern(pattern))
    }

    /// Adds a transform.
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Trims surrounding whitespace on write.
    #[must_use]
    pub fn trim(self) -> Self {
        self.transform(Transform::Trim)
    }

    /// Lowercases on write.
    #[must_use]
    pub fn lowercase(self) -> Self {
        self.transform(Transform::Lowercase)
    }

    /// Declares a forward relation to `table.field`.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.references = Some(Reference {
            table: table.into(),
            field: field.into(),
            reverse_name: None,
        });
        self
    }

    /// Names the reverse relation derived from this field's reference.
    #[must_use]
    pub fn reverse_name(mut self, name: impl Into<String>) -> Self {
        if let Some(reference) = self.references.as_mut() {
            reference.reverse_name = Some(name.into());
        }
        self
    }

    /// Whether the database fills this column when it is omitted.
    #[must_use]
    pub const fn is_auto_increment(&self) -> bool {
        self.primary_key && matches!(self.kind, FieldKind::Id)
    }

    /// Applies transforms, kind checks and validators to a written value.
    ///
    /// Returns the value to store, or every message that applies.
    pub fn clean(&self, value: Value) -> Result<Value, Vec<String>> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(vec![String::from("this field cannot be null")])
            };
        }

        let value = self
            .transforms
            .iter()
            .fold(value, |value, transform| transform.apply(value));

        if let Err(message) = self.kind.check(&value) {
            return Err(vec![message]);
        }

        let messages: Vec<String> = self
            .validators
            .iter()
            .filter_map(|validator| validator.check(&value).err())
            .collect();

        if messages.is_empty() {
            Ok(value)
        } else {
            Err(messages)
        }
    }
}

/// Auto-incrementing integer primary key.
#[must_use]
pub fn id() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Id).primary_key()
}

/// UUID column.
#[must_use]
pub const fn uuid() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Uuid)
}

/// Bounded string column.
#[must_use]
pub const fn string(max_length: u32) -> FieldDefinition {
    FieldDefinition::new(FieldKind::String { max_length })
}

/// Unbounded text column.
#[must_use]
pub const fn text() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Text)
}

/// E-mail column.
#[must_use]
pub const fn email() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Email)
}

/// 32-bit integer column.
#[must_use]
pub const fn integer() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Integer)
}

/// 64-bit integer column.
#[must_use]
pub const fn big_int() -> FieldDefinition {
    FieldDefinition::new(FieldKind::BigInt)
}

/// Float column.
#[must_use]
pub const fn float() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Float)
}

/// Decimal column.
#[must_use]
pub const fn decimal(precision: u8, scale: u8) -> FieldDefinition {
    FieldDefinition::new(FieldKind::Decimal { precision, scale })
}

/// Boolean column.
#[must_use]
pub const fn boolean() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Boolean)
}

/// Date column.
#[must_use]
pub const fn date() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Date)
}

/// Timestamp column.
#[must_use]
pub const fn datetime() -> FieldDefinition {
    FieldDefinition::new(FieldKind::DateTime)
}

/// Enumerated string column.
#[must_use]
pub fn enumeration<S: AsRef<str>>(variants: &[S]) -> FieldDefinition {
    FieldDefinition::new(FieldKind::Enum {
        variants: variants.iter().map(|v| v.as_ref().to_string()).collect(),
    })
}

/// JSON document column.
#[must_use]
pub const fn json() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Json)
}

/// Array column.
#[must_use]
pub fn array(items: FieldKind) -> FieldDefinition {
    FieldDefinition::new(FieldKind::Array {
        items: Box::new(items),
    })
}

/// Object column.
#[must_use]
pub const fn object() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Object)
}

/// Record column.
#[must_use]
pub const fn record() -> FieldDefinition {
    FieldDefinition::new(FieldKind::Record)
}

/// Tuple column.
#[must_use]
pub const fn tuple(items: Vec<FieldKind>) -> FieldDefinition {
    FieldDefinition::new(FieldKind::Tuple { items })
}
