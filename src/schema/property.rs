//! Compiled property descriptors
//!
//! A `PropertyDescriptor` is an immutable value describing one field of one
//! class. Construction normalizes a raw `PropertyDefinition`; it never runs the
//! cast or the default. Only the registry sets the derived index flags and
//! resolves `linked_class`.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::cast::{Cast, CastKind};
use super::class::ClassId;
use super::errors::{CastError, DefinitionError, DefinitionResult};
use super::types::{PropertyDefinition, PropertyKind};

/// A record: property name to value
pub type Record = Map<String, Value>;

/// Default computed from the partially built record. It only sees an immutable
/// view and reports failures as a message.
pub type DefaultFn = Arc<dyn Fn(&Record) -> Result<Value, String> + Send + Sync>;

/// Built-in default generators nameable from raw definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefaultGenerator {
    /// Random v4 UUID string
    Uuid,
    /// Milliseconds since the Unix epoch
    Timestamp,
}

impl DefaultGenerator {
    pub fn generate(&self) -> Value {
        match self {
            DefaultGenerator::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            DefaultGenerator::Timestamp => Value::from(chrono::Utc::now().timestamp_millis()),
        }
    }
}

/// Default-value policy
#[derive(Clone)]
pub enum DefaultValue {
    Constant(Value),
    Generator(DefaultGenerator),
    Function(DefaultFn),
}

impl DefaultValue {
    /// Produce the default for a record missing this property
    pub fn resolve(&self, partial: &Record) -> Result<Value, String> {
        match self {
            DefaultValue::Constant(value) => Ok(value.clone()),
            DefaultValue::Generator(generator) => Ok(generator.generate()),
            DefaultValue::Function(func) => func(partial),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Constant(v) => write!(f, "Constant({})", v),
            DefaultValue::Generator(g) => write!(f, "Generator({:?})", g),
            DefaultValue::Function(_) => write!(f, "Function(<fn>)"),
        }
    }
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DefaultValue::Constant(a), DefaultValue::Constant(b)) => a == b,
            (DefaultValue::Generator(a), DefaultValue::Generator(b)) => a == b,
            (DefaultValue::Function(a), DefaultValue::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Property type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Boolean,
    Link,
    LinkSet,
    Embedded,
    EmbeddedList,
    EmbeddedSet,
}

impl PropertyType {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Boolean => "boolean",
            PropertyType::Link => "link",
            PropertyType::LinkSet => "linkset",
            PropertyType::Embedded => "embedded",
            PropertyType::EmbeddedList => "embeddedlist",
            PropertyType::EmbeddedSet => "embeddedset",
        }
    }

    /// Types holding several values
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            PropertyType::LinkSet | PropertyType::EmbeddedList | PropertyType::EmbeddedSet
        )
    }

    /// Types with set semantics (duplicates dropped after casting)
    pub fn is_set(&self) -> bool {
        matches!(self, PropertyType::LinkSet | PropertyType::EmbeddedSet)
    }

    pub fn is_embedded(&self) -> bool {
        matches!(
            self,
            PropertyType::Embedded | PropertyType::EmbeddedList | PropertyType::EmbeddedSet
        )
    }

    /// Cast applied (element-wise for collections) when the definition names none
    pub fn default_cast(&self) -> Option<CastKind> {
        match self {
            PropertyType::String => Some(CastKind::String),
            PropertyType::Integer => Some(CastKind::Integer),
            PropertyType::Boolean => Some(CastKind::Boolean),
            PropertyType::Link | PropertyType::LinkSet => Some(CastKind::RecordId),
            PropertyType::Embedded => Some(CastKind::Object),
            PropertyType::EmbeddedList | PropertyType::EmbeddedSet => None,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl From<&PropertyKind> for PropertyType {
    fn from(kind: &PropertyKind) -> Self {
        match kind {
            PropertyKind::String { .. } => PropertyType::String,
            PropertyKind::Integer { .. } => PropertyType::Integer,
            PropertyKind::Boolean {} => PropertyType::Boolean,
            PropertyKind::Link { .. } => PropertyType::Link,
            PropertyKind::LinkSet { .. } => PropertyType::LinkSet,
            PropertyKind::Embedded { .. } => PropertyType::Embedded,
            PropertyKind::EmbeddedList { .. } => PropertyType::EmbeddedList,
            PropertyKind::EmbeddedSet { .. } => PropertyType::EmbeddedSet,
        }
    }
}

/// A class reference: by name until linking, by id afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkedClass {
    Pending(String),
    Resolved { id: ClassId, name: String },
}

impl LinkedClass {
    pub fn name(&self) -> &str {
        match self {
            LinkedClass::Pending(name) | LinkedClass::Resolved { name, .. } => name,
        }
    }

    pub fn id(&self) -> Option<ClassId> {
        match self {
            LinkedClass::Pending(_) => None,
            LinkedClass::Resolved { id, .. } => Some(*id),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, LinkedClass::Resolved { .. })
    }
}

/// A compiled format constraint
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// The compiled description of one field
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    name: String,
    property_type: PropertyType,
    linked_class: Option<LinkedClass>,
    mandatory: bool,
    nullable: bool,
    non_empty: bool,
    choices: Option<Vec<Value>>,
    pattern: Option<Pattern>,
    min: Option<i64>,
    max: Option<i64>,
    min_items: Option<usize>,
    cast: Option<Cast>,
    default: Option<DefaultValue>,
    generated: bool,
    read_only: bool,
    description: Option<String>,
    indexed: bool,
    fulltext_indexed: bool,
    synthesized: bool,
    declared_on: String,
}

impl PropertyDescriptor {
    /// Normalize a raw definition declared on `class`.
    ///
    /// Index flags start unset; linking sets them once every index target is known.
    pub fn from_definition(class: &str, def: &PropertyDefinition) -> DefinitionResult<Self> {
        let property_type = PropertyType::from(&def.kind);

        let (non_empty, choices, pattern, min, max, min_items) = match &def.kind {
            PropertyKind::String {
                non_empty,
                choices,
                pattern,
            } => {
                let pattern = pattern
                    .as_deref()
                    .map(Pattern::new)
                    .transpose()
                    .map_err(|e| DefinitionError::InvalidPattern {
                        class: class.to_string(),
                        property: def.name.clone(),
                        reason: e.to_string(),
                    })?;
                let choices = choices
                    .as_ref()
                    .map(|c| c.iter().cloned().map(Value::String).collect());
                (*non_empty, choices, pattern, None, None, None)
            }
            PropertyKind::Integer { min, max, choices } => {
                let choices = choices
                    .as_ref()
                    .map(|c| c.iter().copied().map(Value::from).collect());
                (false, choices, None, *min, *max, None)
            }
            PropertyKind::LinkSet { min_items, .. }
            | PropertyKind::EmbeddedList { min_items, .. }
            | PropertyKind::EmbeddedSet { min_items, .. } => {
                (false, None, None, None, None, *min_items)
            }
            PropertyKind::Boolean {} | PropertyKind::Link { .. } | PropertyKind::Embedded { .. } => {
                (false, None, None, None, None, None)
            }
        };

        let cast = def
            .hooks
            .cast
            .clone()
            .or_else(|| def.cast.map(Cast::Builtin))
            .or_else(|| property_type.default_cast().map(Cast::Builtin));

        let default = match (&def.default, def.default_generator, &def.hooks.default_fn) {
            (Some(value), _, _) => Some(DefaultValue::Constant(value.clone())),
            (None, Some(generator), _) => Some(DefaultValue::Generator(generator)),
            (None, None, Some(func)) => Some(DefaultValue::Function(func.clone())),
            (None, None, None) => None,
        };

        Ok(Self {
            name: def.name.clone(),
            property_type,
            linked_class: def
                .kind
                .linked_class()
                .map(|name| LinkedClass::Pending(name.to_string())),
            mandatory: def.mandatory,
            nullable: def.nullable,
            non_empty,
            choices,
            pattern,
            min,
            max,
            min_items,
            cast,
            default,
            generated: def.generated,
            read_only: def.read_only,
            description: def.description.clone(),
            indexed: false,
            fulltext_indexed: false,
            synthesized: false,
            declared_on: class.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn linked_class(&self) -> Option<&LinkedClass> {
        self.linked_class.as_ref()
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_non_empty(&self) -> bool {
        self.non_empty
    }

    pub fn choices(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    pub fn min(&self) -> Option<i64> {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }

    pub fn min_items(&self) -> Option<usize> {
        self.min_items
    }

    pub fn cast(&self) -> Option<&Cast> {
        self.cast.as_ref()
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_fulltext_indexed(&self) -> bool {
        self.fulltext_indexed
    }

    /// Class whose definition declared this property
    pub fn declared_on(&self) -> &str {
        &self.declared_on
    }

    /// Cast one input value. Collections are cast element-wise; sets drop
    /// duplicates after casting.
    pub fn cast_value(&self, value: &Value) -> Result<Value, CastError> {
        if !self.property_type.is_collection() {
            return match &self.cast {
                Some(cast) => cast.apply(value),
                None => Ok(value.clone()),
            };
        }

        let items = value.as_array().ok_or_else(|| {
            CastError::new(
                self.property_type.type_name(),
                format!("{} is not an array", super::cast::json_type_name(value)),
            )
        })?;

        let mut cast_items: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            let cast_item = match &self.cast {
                Some(cast) => cast.apply(item)?,
                None => item.clone(),
            };
            if self.property_type.is_set() && cast_items.contains(&cast_item) {
                continue;
            }
            cast_items.push(cast_item);
        }
        Ok(Value::Array(cast_items))
    }

    pub(crate) fn resolve_link(&mut self, id: ClassId) {
        if let Some(LinkedClass::Pending(name)) = self.linked_class.take() {
            self.linked_class = Some(LinkedClass::Resolved { id, name });
        }
    }

    /// Edge endpoint added by linking rather than declared
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    pub(crate) fn mark_synthesized(&mut self) {
        self.synthesized = true;
    }

    pub(crate) fn mark_indexed(&mut self, fulltext: bool) {
        if fulltext {
            self.fulltext_indexed = true;
        } else {
            self.indexed = true;
        }
    }

    /// JSON summary for tooling
    pub fn describe(&self) -> Value {
        let mut summary = json!({
            "name": self.name,
            "type": self.property_type.type_name(),
            "mandatory": self.mandatory,
            "nullable": self.nullable,
            "generated": self.generated,
            "readOnly": self.read_only,
            "indexed": self.indexed,
            "fulltextIndexed": self.fulltext_indexed,
            "declaredOn": self.declared_on,
        });
        if let Value::Object(map) = &mut summary {
            if let Some(linked) = &self.linked_class {
                map.insert("linkedClass".into(), Value::String(linked.name().to_string()));
            }
            if let Some(cast) = &self.cast {
                map.insert("cast".into(), Value::String(cast.name().to_string()));
            }
            if self.non_empty {
                map.insert("nonEmpty".into(), Value::Bool(true));
            }
            if let Some(choices) = &self.choices {
                map.insert("choices".into(), Value::Array(choices.clone()));
            }
            if let Some(pattern) = &self.pattern {
                map.insert("pattern".into(), Value::String(pattern.as_str().to_string()));
            }
            if let Some(min) = self.min {
                map.insert("min".into(), Value::from(min));
            }
            if let Some(max) = self.max {
                map.insert("max".into(), Value::from(max));
            }
            if let Some(min_items) = self.min_items {
                map.insert("minItems".into(), Value::from(min_items));
            }
            if let Some(DefaultValue::Constant(value)) = &self.default {
                map.insert("default".into(), value.clone());
            }
            if let Some(description) = &self.description {
                map.insert("description".into(), Value::String(description.clone()));
            }
        }
        summary
    }
}
