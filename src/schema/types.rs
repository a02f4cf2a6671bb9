//! Raw class definitions
//!
//! These are the declarative inputs to the compiler: one `DefinitionSet` maps
//! class names to `ClassDefinition`s. Property definitions are tagged by their
//! `type`, so each shape only carries the constraints that make sense for it.
//!
//! ```json
//! {
//!   "Disease": {
//!     "inherits": ["Ontology"],
//!     "expose": ["QUERY", "GET", "POST", "PATCH", "DELETE"],
//!     "properties": [
//!       {"name": "name", "type": "string", "mandatory": true, "nullable": false,
//!        "cast": "lowercaseNonEmpty"}
//!     ],
//!     "indices": [
//!       {"name": "Disease.name", "type": "NOTUNIQUE_HASH_INDEX", "properties": ["name"]}
//!     ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cast::{Cast, CastKind};
use super::errors::CastError;
use super::property::{DefaultFn, DefaultGenerator, Record};

/// One input set of class definitions, keyed by class name
pub type DefinitionSet = BTreeMap<String, ClassDefinition>;

/// Operations a class may expose to the route layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Query,
    Get,
    Post,
    Patch,
    Delete,
    /// Any operation name this compiler has no permission mapping for
    #[serde(other)]
    Other,
}

impl Operation {
    /// Every operation with a permission mapping
    pub const ALL: [Operation; 5] = [
        Operation::Query,
        Operation::Get,
        Operation::Post,
        Operation::Patch,
        Operation::Delete,
    ];
}

/// Raw definition of one class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinition {
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_edge: bool,
    /// Embedded classes are only stored nested inside another record
    #[serde(default)]
    pub embedded: bool,
    /// Parent class names, in declaration order
    #[serde(default)]
    pub inherits: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
    #[serde(default)]
    pub indices: Vec<IndexDefinition>,
    /// Role name to permission bits; derived from `expose` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<BTreeMap<String, u8>>,
    #[serde(default)]
    pub expose: Vec<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ClassDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn edge(mut self) -> Self {
        self.is_edge = true;
        self
    }

    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn inherits<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inherits.extend(parents.into_iter().map(Into::into));
        self
    }

    pub fn property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indices.push(index);
        self
    }

    pub fn expose<I: IntoIterator<Item = Operation>>(mut self, operations: I) -> Self {
        self.expose.extend(operations);
        self
    }

    pub fn permission(mut self, role: impl Into<String>, bits: u8) -> Self {
        self.permissions
            .get_or_insert_with(BTreeMap::new)
            .insert(role.into(), bits);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The type tag of a property together with the constraints valid for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum PropertyKind {
    String {
        #[serde(default)]
        non_empty: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        choices: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    #[serde(alias = "long")]
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        choices: Option<Vec<i64>>,
    },
    Boolean {},
    Link {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        linked_class: Option<String>,
    },
    LinkSet {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        linked_class: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
    },
    Embedded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        linked_class: Option<String>,
    },
    EmbeddedList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        linked_class: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
    },
    EmbeddedSet {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        linked_class: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
    },
}

impl PropertyKind {
    /// The class this property refers to, for the shapes that can carry one
    pub fn linked_class(&self) -> Option<&str> {
        match self {
            PropertyKind::Link { linked_class }
            | PropertyKind::LinkSet { linked_class, .. }
            | PropertyKind::Embedded { linked_class }
            | PropertyKind::EmbeddedList { linked_class, .. }
            | PropertyKind::EmbeddedSet { linked_class, .. } => linked_class.as_deref(),
            _ => None,
        }
    }
}

fn default_nullable() -> bool {
    true
}

/// Callables attached by Rust callers; never part of the serialized form
#[derive(Clone, Default)]
pub struct PropertyHooks {
    pub cast: Option<Cast>,
    pub default_fn: Option<DefaultFn>,
}

impl fmt::Debug for PropertyHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyHooks")
            .field("cast", &self.cast)
            .field("default_fn", &self.default_fn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Raw definition of one property
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(flatten)]
    pub kind: PropertyKind,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Constant default, used only when the input omits the property
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Built-in default generator, used only when no constant default is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_generator: Option<DefaultGenerator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast: Option<CastKind>,
    #[serde(default)]
    pub generated: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub hooks: PropertyHooks,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            mandatory: false,
            nullable: true,
            default: None,
            default_generator: None,
            cast: None,
            generated: false,
            read_only: false,
            description: None,
            hooks: PropertyHooks::default(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(
            name,
            PropertyKind::String {
                non_empty: false,
                choices: None,
                pattern: None,
            },
        )
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(
            name,
            PropertyKind::Integer {
                min: None,
                max: None,
                choices: None,
            },
        )
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Boolean {})
    }

    /// A link; `None` accepts a reference to any class
    pub fn link(name: impl Into<String>, linked_class: Option<&str>) -> Self {
        Self::new(
            name,
            PropertyKind::Link {
                linked_class: linked_class.map(str::to_string),
            },
        )
    }

    pub fn link_set(name: impl Into<String>, linked_class: Option<&str>) -> Self {
        Self::new(
            name,
            PropertyKind::LinkSet {
                linked_class: linked_class.map(str::to_string),
                min_items: None,
            },
        )
    }

    pub fn embedded(name: impl Into<String>, linked_class: Option<&str>) -> Self {
        Self::new(
            name,
            PropertyKind::Embedded {
                linked_class: linked_class.map(str::to_string),
            },
        )
    }

    pub fn embedded_list(name: impl Into<String>, linked_class: Option<&str>) -> Self {
        Self::new(
            name,
            PropertyKind::EmbeddedList {
                linked_class: linked_class.map(str::to_string),
                min_items: None,
            },
        )
    }

    pub fn embedded_set(name: impl Into<String>, linked_class: Option<&str>) -> Self {
        Self::new(
            name,
            PropertyKind::EmbeddedSet {
                linked_class: linked_class.map(str::to_string),
                min_items: None,
            },
        )
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn non_empty(mut self) -> Self {
        if let PropertyKind::String { non_empty, .. } = &mut self.kind {
            *non_empty = true;
        }
        self
    }

    /// Closed set of allowed string values
    pub fn choices<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let PropertyKind::String { choices, .. } = &mut self.kind {
            *choices = Some(values.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn pattern(mut self, regex: impl Into<String>) -> Self {
        if let PropertyKind::String { pattern, .. } = &mut self.kind {
            *pattern = Some(regex.into());
        }
        self
    }

    pub fn min(mut self, bound: i64) -> Self {
        if let PropertyKind::Integer { min, .. } = &mut self.kind {
            *min = Some(bound);
        }
        self
    }

    pub fn max(mut self, bound: i64) -> Self {
        if let PropertyKind::Integer { max, .. } = &mut self.kind {
            *max = Some(bound);
        }
        self
    }

    pub fn min_items(mut self, bound: usize) -> Self {
        match &mut self.kind {
            PropertyKind::LinkSet { min_items, .. }
            | PropertyKind::EmbeddedList { min_items, .. }
            | PropertyKind::EmbeddedSet { min_items, .. } => *min_items = Some(bound),
            _ => {}
        }
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn default_generator(mut self, generator: DefaultGenerator) -> Self {
        self.default_generator = Some(generator);
        self
    }

    /// Default computed from the partially built record
    pub fn default_fn<F>(mut self, func: F) -> Self
    where
        F: Fn(&Record) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.hooks.default_fn = Some(Arc::new(func));
        self
    }

    pub fn cast(mut self, kind: CastKind) -> Self {
        self.cast = Some(kind);
        self
    }

    pub fn custom_cast<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, CastError> + Send + Sync + 'static,
    {
        self.hooks.cast = Some(Cast::custom(name, func));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Physical index kinds understood by the storage layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    #[serde(rename = "UNIQUE")]
    Unique,
    #[serde(rename = "NOTUNIQUE_HASH_INDEX")]
    NotUniqueHash,
    #[serde(rename = "FULLTEXT_HASH_INDEX")]
    FulltextHash,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Unique => "UNIQUE",
            IndexKind::NotUniqueHash => "NOTUNIQUE_HASH_INDEX",
            IndexKind::FulltextHash => "FULLTEXT_HASH_INDEX",
        }
    }

    pub fn is_fulltext(&self) -> bool {
        matches!(self, IndexKind::FulltextHash)
    }
}

/// Null handling for an index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    #[serde(default)]
    pub ignore_null_values: bool,
}

/// Raw index declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    pub name: String,
    /// Target class; defaults to the declaring class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(rename = "type")]
    pub kind: IndexKind,
    pub properties: Vec<String>,
    #[serde(default)]
    pub metadata: IndexMetadata,
}

impl IndexDefinition {
    pub fn new<I, S>(name: impl Into<String>, kind: IndexKind, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            class: None,
            kind,
            properties: properties.into_iter().map(Into::into).collect(),
            metadata: IndexMetadata::default(),
        }
    }

    pub fn on_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn ignore_nulls(mut self) -> Self {
        self.metadata.ignore_null_values = true;
        self
    }

    /// Class this index lands on when declared on `declaring`
    pub fn target_class<'a>(&'a self, declaring: &'a str) -> &'a str {
        self.class.as_deref().unwrap_or(declaring)
    }
}
