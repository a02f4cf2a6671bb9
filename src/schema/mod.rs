//! Metamodel compiler
//!
//! Turns declarative class definitions into a linked, immutable `Registry` of
//! class models and property descriptors, and validates records against it.
//!
//! # Design Principles
//!
//! - Definition errors abort compilation; nothing partial is returned
//! - The registry never changes after `compile` returns
//! - Casts are pure and fail with a typed `CastError`
//! - Validation reports every failure on a record in one pass

mod cast;
mod class;
mod errors;
mod loader;
mod permissions;
mod property;
mod record_id;
mod registry;
mod types;
mod validator;

pub use cast::{
    cast_boolean, cast_integer, cast_lowercase_non_empty_string, cast_lowercase_string,
    cast_non_empty_string, cast_object, cast_record_id, cast_string, Cast, CastFn, CastKind,
};
pub use class::{ClassId, ClassModel, ClassState, Index, EDGE_IN, EDGE_OUT};
pub use errors::{
    CastError, DefinitionError, DefinitionResult, FailureKind, Severity, ValidationErrors,
    ValidationFailure,
};
pub use loader::DefinitionLoader;
pub use permissions::{Permission, PermissionTable, DEFAULT_ROLE, READONLY_ROLE};
pub use property::{
    DefaultFn, DefaultGenerator, DefaultValue, LinkedClass, Pattern, PropertyDescriptor,
    PropertyType, Record,
};
pub use record_id::{RecordId, MAX_CLUSTER_ID, RID_FIELD};
pub use registry::{Registry, PERMISSIONS_CLASS};
pub use types::{
    ClassDefinition, DefinitionSet, IndexDefinition, IndexKind, IndexMetadata, Operation,
    PropertyDefinition, PropertyHooks, PropertyKind,
};
pub use validator::{RecordValidator, ValidateOptions, WriteMode, ROOT_PATH};
