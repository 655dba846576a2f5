//! Declared validators and transforms.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

type CheckFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;
type TransformFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A check applied to a written value after transforms.
#[derive(Clone)]
pub enum Validator {
    /// Character count bounds for strings.
    Length {
        /// Minimum length.
        min: Option<usize>,
        /// Maximum length.
        max: Option<usize>,
    },
    /// Numeric bounds.
    Range {
        /// Minimum value.
        min: Option<f64>,
        /// Maximum value.
        max: Option<f64>,
    },
    /// String must match the pattern.
    Pattern(Regex),
    /// Value must be one of the listed values.
    OneOf(Vec<Value>),
    /// Application-defined check.
    Custom {
        /// Name used in debug output.
        name: String,
        /// The check.
        check: CheckFn,
    },
}

impl Validator {
    /// Creates a custom validator.
    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Checks a value, returning the failure message.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::Length { min, max } => {
                let Some(s) = value.as_str() else {
                    return Ok(());
                };
                let len = s.chars().count();
                if min.is_some_and(|min| len < min) || max.is_some_and(|max| len > max) {
                    Err(bounds_message(*min, *max, " characters"))
                } else {
                    Ok(())
                }
            }
            Self::Range { min, max } => {
                let Some(n) = value.as_f64() else {
                    return Ok(());
                };
                if min.is_some_and(|min| n < min) || max.is_some_and(|max| n > max) {
                    Err(bounds_message(*min, *max, ""))
                } else {
                    Ok(())
                }
            }
            Self::Pattern(re) => match value.as_str() {
                Some(s) if !re.is_match(s) => {
                    Err(String::from("does not match the required pattern"))
                }
                _ => Ok(()),
            },
            Self::OneOf(allowed) => {
                if allowed.contains(value) {
                    Ok(())
                } else {
                    let listed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
                    Err(format!("must be one of: {}", listed.join(", ")))
                }
            }
            Self::Custom { check, .. } => check(value),
        }
    }
}

fn bounds_message<T: fmt::Display>(min: Option<T>, max: Option<T>, unit: &str) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("must be between {min} and {max}{unit}"),
        (Some(min), None) => format!("must be at least {min}{unit}"),
        (None, Some(max)) => format!("must be at most {max}{unit}"),
        (None, None) => String::from("is out of range"),
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::OneOf(values) => f.debug_tuple("OneOf").field(values).finish(),
            Self::Custom { name, .. } => f.debug_tuple("Custom").field(name).finish(),
        }
    }
}

/// A rewrite applied to a written value before validation.
#[derive(Clone)]
pub enum Transform {
    /// Strip surrounding whitespace.
    Trim,
    /// Lowercase.
    Lowercase,
    /// Uppercase.
    Uppercase,
    /// Application-defined rewrite.
    Custom {
        /// Name used in debug output.
        name: String,
        /// The rewrite.
        apply: TransformFn,
    },
}

impl Transform {
    /// Creates a custom transform.
    pub fn custom<F>(name: impl Into<String>, apply: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            apply: Arc::new(apply),
        }
    }

    /// Applies the transform. Built-in transforms leave non-strings alone.
    #[must_use]
    pub fn apply(&self, value: Value) -> Value {
        match (self, value) {
            (Self::Trim, Value::String(s)) => Value::String(s.trim().to_string()),
            (Self::Lowercase, Value::String(s)) => Value::String(s.to_lowercase()),
            (Self::Uppercase, Value::String(s)) => Value::String(s.to_uppercase()),
            (Self::Custom { apply, .. }, value) => apply(value),
            (_, value) => value,
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trim => write!(f, "Trim"),
            Self::Lowercase => write!(f, "Lowercase"),
            Self::Uppercase => write!(f, "Uppercase"),
            Self::Custom { name, .. } => f.debug_tuple("Custom").field(name).finish(),
        }
    }
}
