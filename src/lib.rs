//! metamodel - compiles declarative class definitions into a linked, immutable
//! registry of class models and property descriptors, and validates records
//! against it.

pub mod cli;
pub mod observability;
pub mod schema;
