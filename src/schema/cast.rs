//! Casting functions
//!
//! A cast turns an arbitrary input value into the canonical stored value or
//! fails with a typed `CastError`. Casts are pure and total: they never panic.

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::CastError;
use super::record_id::RecordId;

/// Caller-supplied cast function
pub type CastFn = Arc<dyn Fn(&Value) -> Result<Value, CastError> + Send + Sync>;

const INTEGER_SOURCE: &str = r"^-?\d+$";

static INTEGER_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn integer_pattern() -> Result<&'static Regex, CastError> {
    INTEGER_PATTERN
        .get_or_init(|| Regex::new(INTEGER_SOURCE).ok())
        .as_ref()
        .ok_or_else(|| {
            CastError::new("integer", format!("grammar '{}' does not compile", INTEGER_SOURCE))
        })
}

/// Built-in casting families, nameable from raw definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CastKind {
    /// Collapse whitespace runs and trim
    String,
    /// `String` then lowercase
    Lowercase,
    /// `String`, rejecting the empty result
    NonEmptyString,
    /// `Lowercase`, rejecting the empty result
    LowercaseNonEmpty,
    /// Strict integer (`^-?\d+$` for strings)
    Integer,
    Boolean,
    /// Record id, leading `#` optional
    RecordId,
    /// Record id, leading `#` required
    RecordIdStrict,
    /// Any JSON object, unchanged
    Object,
}

impl CastKind {
    pub fn name(&self) -> &'static str {
        match self {
            CastKind::String => "string",
            CastKind::Lowercase => "lowercase",
            CastKind::NonEmptyString => "nonEmptyString",
            CastKind::LowercaseNonEmpty => "lowercaseNonEmpty",
            CastKind::Integer => "integer",
            CastKind::Boolean => "boolean",
            CastKind::RecordId => "recordId",
            CastKind::RecordIdStrict => "recordIdStrict",
            CastKind::Object => "object",
        }
    }

    pub fn apply(&self, value: &Value) -> Result<Value, CastError> {
        match self {
            CastKind::String => cast_string(value).map(Value::String),
            CastKind::Lowercase => cast_lowercase_string(value).map(Value::String),
            CastKind::NonEmptyString => cast_non_empty_string(value).map(Value::String),
            CastKind::LowercaseNonEmpty => {
                cast_lowercase_non_empty_string(value).map(Value::String)
            }
            CastKind::Integer => cast_integer(value).map(Value::from),
            CastKind::Boolean => cast_boolean(value).map(Value::Bool),
            CastKind::RecordId => cast_record_id(value, false).map(Value::from),
            CastKind::RecordIdStrict => cast_record_id(value, true).map(Value::from),
            CastKind::Object => cast_object(value),
        }
    }
}

/// The cast attached to a property: a built-in family or an opaque callable.
#[derive(Clone)]
pub enum Cast {
    Builtin(CastKind),
    Custom { name: String, func: CastFn },
}

impl Cast {
    /// Wrap a caller-supplied function
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, CastError> + Send + Sync + 'static,
    {
        Cast::Custom {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Cast::Builtin(kind) => kind.name(),
            Cast::Custom { name, .. } => name,
        }
    }

    pub fn apply(&self, value: &Value) -> Result<Value, CastError> {
        match self {
            Cast::Builtin(kind) => kind.apply(value),
            Cast::Custom { func, .. } => func(value),
        }
    }
}

impl From<CastKind> for Cast {
    fn from(kind: CastKind) -> Self {
        Cast::Builtin(kind)
    }
}

impl fmt::Debug for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cast::Builtin(kind) => write!(f, "Cast::Builtin({:?})", kind),
            Cast::Custom { name, .. } => write!(f, "Cast::Custom({})", name),
        }
    }
}

impl PartialEq for Cast {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cast::Builtin(a), Cast::Builtin(b)) => a == b,
            (Cast::Custom { func: a, .. }, Cast::Custom { func: b, .. }) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Collapse internal whitespace runs to one space and trim.
///
/// Numbers and booleans are stringified; null, arrays and objects are rejected.
pub fn cast_string(value: &Value) -> Result<String, CastError> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => return Err(CastError::new("string", "null")),
        other => {
            return Err(CastError::new(
                "string",
                format!("{} is not a scalar", json_type_name(other)),
            ))
        }
    };
    Ok(raw.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn cast_lowercase_string(value: &Value) -> Result<String, CastError> {
    cast_string(value).map(|s| s.to_lowercase())
}

pub fn cast_non_empty_string(value: &Value) -> Result<String, CastError> {
    let s = cast_string(value)?;
    if s.is_empty() {
        return Err(CastError::new("non-empty string", "empty string"));
    }
    Ok(s)
}

pub fn cast_lowercase_non_empty_string(value: &Value) -> Result<String, CastError> {
    cast_non_empty_string(value).map(|s| s.to_lowercase())
}

/// Strict integer parsing: whole JSON numbers, or strings matching `^-?\d+$`
/// after trimming.
pub fn cast_integer(value: &Value) -> Result<i64, CastError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| CastError::new("integer", format!("{} is not an integer", n))),
        Value::String(s) => {
            let trimmed = s.trim();
            if !integer_pattern()?.is_match(trimmed) {
                return Err(CastError::new(
                    "integer",
                    format!("'{}' is not an integer", trimmed),
                ));
            }
            trimmed
                .parse()
                .map_err(|_| CastError::new("integer", format!("'{}' is out of range", trimmed)))
        }
        other => Err(CastError::new(
            "integer",
            format!("{} is not an integer", json_type_name(other)),
        )),
    }
}

/// Booleans, or the strings `true`/`false` in any case
pub fn cast_boolean(value: &Value) -> Result<bool, CastError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(CastError::new("boolean", format!("'{}' is not a boolean", s))),
        },
        other => Err(CastError::new(
            "boolean",
            format!("{} is not a boolean", json_type_name(other)),
        )),
    }
}

/// Reference casting, see [`RecordId::from_value`]
pub fn cast_record_id(value: &Value, require_hash: bool) -> Result<RecordId, CastError> {
    RecordId::from_value(value, require_hash)
}

pub fn cast_object(value: &Value) -> Result<Value, CastError> {
    if value.is_object() {
        Ok(value.clone())
    } else {
        Err(CastError::new(
            "object",
            format!("{} is not an object", json_type_name(value)),
        ))
    }
}

/// Returns the JSON type name for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_grammar_compiles() {
        let pattern = integer_pattern().unwrap();
        assert!(pattern.is_match("-42"));
        assert!(!pattern.is_match("4.2"));
    }

    #[test]
    fn test_string_normalization() {
        assert_eq!(cast_string(&json!("  a   b  ")).unwrap(), "a b");
        assert_eq!(cast_string(&json!("a\t\nb")).unwrap(), "a b");
        assert_eq!(cast_string(&json!(12)).unwrap(), "12");
        assert!(cast_string(&json!(null)).is_err());
        assert!(cast_string(&json!(["a"])).is_err());
    }

    #[test]
    fn test_lowercase_non_empty() {
        assert_eq!(cast_lowercase_non_empty_string(&json!(" KRAS ")).unwrap(), "kras");
        assert!(cast_lowercase_non_empty_string(&json!("")).is_err());
        assert!(cast_lowercase_non_empty_string(&json!("   ")).is_err());
        assert!(cast_lowercase_non_empty_string(&json!(null)).is_err());
    }

    #[test]
    fn test_integer() {
        assert_eq!(cast_integer(&json!("42")).unwrap(), 42);
        assert_eq!(cast_integer(&json!("-3")).unwrap(), -3);
        assert_eq!(cast_integer(&json!(" 7 ")).unwrap(), 7);
        assert_eq!(cast_integer(&json!(9)).unwrap(), 9);
        assert!(cast_integer(&json!("4.2")).is_err());
        assert!(cast_integer(&json!(4.2)).is_err());
        assert!(cast_integer(&json!("1e3")).is_err());
        assert!(cast_integer(&json!("99999999999999999999")).is_err());
    }

    #[test]
    fn test_boolean() {
        assert!(cast_boolean(&json!(true)).unwrap());
        assert!(!cast_boolean(&json!("FALSE")).unwrap());
        assert!(cast_boolean(&json!("yes")).is_err());
        assert!(cast_boolean(&json!(1)).is_err());
    }

    #[test]
    fn test_record_id_kinds() {
        assert_eq!(CastKind::RecordId.apply(&json!("4:10")).unwrap(), json!("#4:10"));
        assert!(CastKind::RecordIdStrict.apply(&json!("4:10")).is_err());
        assert_eq!(
            CastKind::RecordIdStrict.apply(&json!({"@rid": "#4:10"})).unwrap(),
            CastKind::RecordIdStrict.apply(&json!("#4:10")).unwrap()
        );
    }

    #[test]
    fn test_custom_cast() {
        let cast = Cast::custom("upper", |v: &Value| {
            cast_string(v).map(|s| Value::String(s.to_uppercase()))
        });
        assert_eq!(cast.name(), "upper");
        assert_eq!(cast.apply(&json!("brca1")).unwrap(), json!("BRCA1"));
        assert_eq!(cast.clone(), cast);
        assert_ne!(cast, Cast::Builtin(CastKind::String));
    }

    #[test]
    fn test_cast_kind_names_round_trip_through_serde() {
        let kind: CastKind = serde_json::from_value(json!("lowercaseNonEmpty")).unwrap();
        assert_eq!(kind, CastKind::LowercaseNonEmpty);
        assert_eq!(kind.name(), "lowercaseNonEmpty");
    }
}
