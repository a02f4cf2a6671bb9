//! Error types for the metamodel compiler
//!
//! Two disjoint families:
//! - `DefinitionError`: compile-time, FATAL. The registry is never partially usable.
//! - `ValidationErrors`: per-record, REJECT. Every failure on one record is
//!   aggregated so the caller can report all of them at once.
//!
//! Error codes:
//! - META_DEFINITION_* (FATAL)
//! - META_ATTRIBUTE_* (REJECT)
//! - META_VALIDATION_FAILED (REJECT)

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Severity levels for metamodel errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Record rejected, caller may retry with corrected input
    Reject,
    /// Misconfigured definitions, the process must not start
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Definition errors raised while compiling class definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("class '{0}' is declared by more than one definition set")]
    DuplicateClass(String),

    #[error("class '{class}' inherits unknown class '{parent}'")]
    UnknownParent { class: String, parent: String },

    #[error("class '{class}' declares '{parent}' as a parent more than once")]
    DuplicateParent { class: String, parent: String },

    #[error("property '{class}.{property}' links unknown class '{linked_class}'")]
    UnknownLinkedClass {
        class: String,
        property: String,
        linked_class: String,
    },

    #[error("class '{class}' has no property '{property}'")]
    UnknownProperty { class: String, property: String },

    #[error("property '{class}.{property}' is already linked")]
    AlreadyResolved { class: String, property: String },

    #[error("property '{property}' is declared more than once on class '{class}'")]
    DuplicateProperty { class: String, property: String },

    #[error("index '{index}' targets unknown class '{class}'")]
    UnknownIndexClass { index: String, class: String },

    #[error("index '{index}' targets property '{property}' which class '{class}' does not have")]
    UnknownIndexProperty {
        index: String,
        class: String,
        property: String,
    },

    #[error("index '{index}' on class '{class}' names no properties")]
    EmptyIndex { index: String, class: String },

    #[error("circular inheritance: {cycle}")]
    CircularInheritance { class: String, cycle: String },

    #[error("property '{class}.{property}' has an invalid pattern: {reason}")]
    InvalidPattern {
        class: String,
        property: String,
        reason: String,
    },

    #[error("class '{class}' grants role '{role}' an invalid permission mask {bits}")]
    InvalidPermission { class: String, role: String, bits: u8 },

    #[error("class '{0}' is already linked")]
    ClassFrozen(String),

    #[error("malformed definitions in '{path}': {reason}")]
    Malformed { path: String, reason: String },
}

impl DefinitionError {
    /// Create an error for an unreadable or unparsable definition source
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateClass(_) => "META_DEFINITION_DUPLICATE_CLASS",
            Self::UnknownParent { .. } => "META_DEFINITION_UNKNOWN_PARENT",
            Self::DuplicateParent { .. } => "META_DEFINITION_DUPLICATE_PARENT",
            Self::UnknownLinkedClass { .. } => "META_DEFINITION_UNKNOWN_LINKED_CLASS",
            Self::UnknownProperty { .. } => "META_DEFINITION_UNKNOWN_PROPERTY",
            Self::AlreadyResolved { .. } => "META_DEFINITION_ALREADY_RESOLVED",
            Self::DuplicateProperty { .. } => "META_DEFINITION_DUPLICATE_PROPERTY",
            Self::UnknownIndexClass { .. } => "META_DEFINITION_UNKNOWN_INDEX_CLASS",
            Self::UnknownIndexProperty { .. } => "META_DEFINITION_UNKNOWN_INDEX_PROPERTY",
            Self::EmptyIndex { .. } => "META_DEFINITION_EMPTY_INDEX",
            Self::CircularInheritance { .. } => "META_DEFINITION_CIRCULAR_INHERITANCE",
            Self::InvalidPattern { .. } => "META_DEFINITION_INVALID_PATTERN",
            Self::InvalidPermission { .. } => "META_DEFINITION_INVALID_PERMISSION",
            Self::ClassFrozen(_) => "META_DEFINITION_CLASS_FROZEN",
            Self::Malformed { .. } => "META_DEFINITION_MALFORMED",
        }
    }

    /// Definition errors always abort startup
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

/// Result type for compile-time operations
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Typed casting failure. Casts never raise anything else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot cast to {expected}: {reason}")]
pub struct CastError {
    expected: String,
    reason: String,
}

impl CastError {
    pub fn new(expected: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            reason: reason.into(),
        }
    }

    /// The canonical form the cast was aiming for
    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// What went wrong with one property of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Value could not be coerced to the declared type
    Cast(CastError),
    /// Mandatory, non-nullable property absent with no default
    MissingRequired,
    /// Null supplied for a non-nullable property
    NullNotAllowed,
    /// Empty string or collection where non-empty is required
    Empty,
    /// Value outside the closed `choices` set
    NotInChoices,
    /// String does not match the declared pattern
    PatternMismatch(String),
    /// Integer below `min`
    BelowMinimum(i64),
    /// Integer above `max`
    AboveMaximum(i64),
    /// Collection smaller than `minItems`
    TooFewItems(usize),
    /// Mutation of a read-only property
    ReadOnly,
    /// Attribute not declared on the class
    UnexpectedAttribute,
    /// Unknown class name
    UnknownClass,
    /// Abstract classes cannot be instantiated directly
    AbstractClass,
    /// Embedded classes are only stored nested inside another record
    EmbeddedClass,
    /// Default-value function reported a failure
    DefaultFailed(String),
}

impl FailureKind {
    /// Returns the stable error code for this failure
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cast(_) => "META_ATTRIBUTE_CAST",
            Self::MissingRequired => "META_ATTRIBUTE_MISSING_REQUIRED",
            Self::NullNotAllowed => "META_ATTRIBUTE_NULL",
            Self::Empty => "META_ATTRIBUTE_EMPTY",
            Self::NotInChoices => "META_ATTRIBUTE_NOT_IN_CHOICES",
            Self::PatternMismatch(_) => "META_ATTRIBUTE_PATTERN",
            Self::BelowMinimum(_) => "META_ATTRIBUTE_BELOW_MINIMUM",
            Self::AboveMaximum(_) => "META_ATTRIBUTE_ABOVE_MAXIMUM",
            Self::TooFewItems(_) => "META_ATTRIBUTE_TOO_FEW_ITEMS",
            Self::ReadOnly => "META_ATTRIBUTE_READ_ONLY",
            Self::UnexpectedAttribute => "META_ATTRIBUTE_UNEXPECTED",
            Self::UnknownClass => "META_ATTRIBUTE_UNKNOWN_CLASS",
            Self::AbstractClass => "META_ATTRIBUTE_ABSTRACT_CLASS",
            Self::EmbeddedClass => "META_ATTRIBUTE_EMBEDDED_CLASS",
            Self::DefaultFailed(_) => "META_ATTRIBUTE_DEFAULT_FAILED",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cast(e) => write!(f, "{}", e),
            Self::MissingRequired => write!(f, "missing required value"),
            Self::NullNotAllowed => write!(f, "null is not allowed"),
            Self::Empty => write!(f, "must not be empty"),
            Self::NotInChoices => write!(f, "not one of the allowed choices"),
            Self::PatternMismatch(p) => write!(f, "does not match pattern {}", p),
            Self::BelowMinimum(min) => write!(f, "below minimum {}", min),
            Self::AboveMaximum(max) => write!(f, "above maximum {}", max),
            Self::TooFewItems(min) => write!(f, "fewer than {} items", min),
            Self::ReadOnly => write!(f, "read-only property cannot be changed"),
            Self::UnexpectedAttribute => write!(f, "unexpected attribute"),
            Self::UnknownClass => write!(f, "unknown class"),
            Self::AbstractClass => write!(f, "abstract class cannot be instantiated"),
            Self::EmbeddedClass => write!(f, "embedded class cannot be stored on its own"),
            Self::DefaultFailed(reason) => write!(f, "default value failed: {}", reason),
        }
    }
}

/// A single failure: the property and the rejected value, never the whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Property path (nested embedded properties use dots, e.g. "source.name")
    pub property: String,
    /// The offending value, `Null` when absent
    pub value: Value,
    pub kind: FailureKind,
}

impl ValidationFailure {
    pub fn new(property: impl Into<String>, value: Value, kind: FailureKind) -> Self {
        Self {
            property: property.into(),
            value,
            kind,
        }
    }

    pub fn missing(property: impl Into<String>) -> Self {
        Self::new(property, Value::Null, FailureKind::MissingRequired)
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// JSON form for caller-facing rejections
    pub fn describe(&self) -> Value {
        serde_json::json!({
            "property": self.property,
            "code": self.code(),
            "message": self.kind.to_string(),
            "value": self.value,
        })
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "property '{}': {} (got {})", self.property, self.kind, self.value)
    }
}

/// Every failure found on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    class: String,
    failures: Vec<ValidationFailure>,
}

impl ValidationErrors {
    pub fn new(class: impl Into<String>, failures: Vec<ValidationFailure>) -> Self {
        Self {
            class: class.into(),
            failures,
        }
    }

    pub fn code(&self) -> &'static str {
        "META_VALIDATION_FAILED"
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }

    /// Class the record was validated against
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures reported against one property path
    pub fn for_property<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a ValidationFailure> {
        self.failures.iter().filter(move |f| f.property == property)
    }

    pub fn into_failures(self) -> Vec<ValidationFailure> {
        self.failures
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} problem(s) with record of class '{}'",
            self.severity(),
            self.code(),
            self.failures.len(),
            self.class
        )?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
