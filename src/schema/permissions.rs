//! Role permission masks
//!
//! Each class carries a table from role name to a CREATE/READ/UPDATE/DELETE
//! mask. When a definition omits the table, the `default` role is derived from
//! the operations the class exposes. The `readonly` role always gets exactly READ.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde_json::Value;

use super::errors::{DefinitionError, DefinitionResult};
use super::types::Operation;

/// Role used when no more specific role entry exists
pub const DEFAULT_ROLE: &str = "default";

/// Role that may only read, whatever the class exposes
pub const READONLY_ROLE: &str = "readonly";

bitflags! {
    /// Permission bits granted to a role for one class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permission: u8 {
        const CREATE = 0b1000;
        const READ = 0b0100;
        const UPDATE = 0b0010;
        const DELETE = 0b0001;

        const NONE = 0;
        const ALL = Self::CREATE.bits()
            | Self::READ.bits()
            | Self::UPDATE.bits()
            | Self::DELETE.bits();
    }
}

impl Permission {
    /// Mask for one exposed operation
    pub fn for_operation(operation: Operation) -> Self {
        match operation {
            Operation::Query | Operation::Get => Permission::READ,
            Operation::Post => Permission::CREATE,
            Operation::Patch => Permission::UPDATE,
            Operation::Delete => Permission::DELETE,
            Operation::Other => Permission::NONE,
        }
    }

    /// Union of the masks of every exposed operation
    pub fn from_operations(operations: &[Operation]) -> Self {
        operations
            .iter()
            .fold(Permission::NONE, |acc, op| acc | Self::for_operation(*op))
    }

    /// Whether this mask allows `operation`. Operations without a mapping are
    /// never allowed.
    pub fn allows(&self, operation: Operation) -> bool {
        let required = Self::for_operation(operation);
        !required.is_empty() && self.contains(required)
    }
}

/// Role name to permission mask for one class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTable {
    roles: BTreeMap<String, Permission>,
}

impl PermissionTable {
    /// Build the table for `class`.
    ///
    /// Explicit entries must fit within ALL. The `default` role falls back to
    /// the mask derived from `expose`; `readonly` is forced to READ.
    pub fn from_definition(
        class: &str,
        explicit: Option<&BTreeMap<String, u8>>,
        expose: &[Operation],
    ) -> DefinitionResult<Self> {
        let mut roles = BTreeMap::new();

        if let Some(explicit) = explicit {
            for (role, bits) in explicit {
                let mask = Permission::from_bits(*bits).ok_or_else(|| {
                    DefinitionError::InvalidPermission {
                        class: class.to_string(),
                        role: role.clone(),
                        bits: *bits,
                    }
                })?;
                roles.insert(role.clone(), mask);
            }
        }

        roles
            .entry(DEFAULT_ROLE.to_string())
            .or_insert_with(|| Permission::from_operations(expose));
        roles.insert(READONLY_ROLE.to_string(), Permission::READ);

        Ok(Self { roles })
    }

    /// Mask for `role`, falling back to the `default` role
    pub fn get(&self, role: &str) -> Permission {
        self.roles
            .get(role)
            .or_else(|| self.roles.get(DEFAULT_ROLE))
            .copied()
            .unwrap_or(Permission::NONE)
    }

    pub fn allows(&self, role: &str, operation: Operation) -> bool {
        self.get(role).allows(operation)
    }

    pub fn roles(&self) -> impl Iterator<Item = (&str, Permission)> {
        self.roles.iter().map(|(role, mask)| (role.as_str(), *mask))
    }

    pub fn describe(&self) -> Value {
        Value::Object(
            self.roles
                .iter()
                .map(|(role, mask)| (role.clone(), Value::from(mask.bits())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_values() {
        assert_eq!(Permission::CREATE.bits(), 0b1000);
        assert_eq!(Permission::READ.bits(), 0b0100);
        assert_eq!(Permission::UPDATE.bits(), 0b0010);
        assert_eq!(Permission::DELETE.bits(), 0b0001);
        assert_eq!(Permission::ALL.bits(), 0b1111);
        assert!(Permission::NONE.is_empty());
    }

    #[test]
    fn test_read_only_exposure_yields_read() {
        let mask = Permission::from_operations(&[Operation::Query, Operation::Get]);
        assert_eq!(mask, Permission::READ);
    }

    #[test]
    fn test_full_exposure_yields_all() {
        assert_eq!(Permission::from_operations(&Operation::ALL), Permission::ALL);
    }

    #[test]
    fn test_unmapped_operation_yields_none() {
        assert_eq!(Permission::for_operation(Operation::Other), Permission::NONE);
        assert!(!Permission::ALL.allows(Operation::Other));
    }

    #[test]
    fn test_readonly_is_always_read() {
        let table =
            PermissionTable::from_definition("Thing", None, &Operation::ALL).unwrap();
        assert_eq!(table.get(READONLY_ROLE), Permission::READ);
        assert_eq!(table.get(DEFAULT_ROLE), Permission::ALL);

        let mut explicit = BTreeMap::new();
        explicit.insert(READONLY_ROLE.to_string(), 0b1111);
        let table =
            PermissionTable::from_definition("Thing", Some(&explicit), &[]).unwrap();
        assert_eq!(table.get(READONLY_ROLE), Permission::READ);
    }

    #[test]
    fn test_explicit_table_and_fallback() {
        let mut explicit = BTreeMap::new();
        explicit.insert("admin".to_string(), 0b1111);
        explicit.insert(DEFAULT_ROLE.to_string(), 0b0100);
        let table =
            PermissionTable::from_definition("Thing", Some(&explicit), &Operation::ALL).unwrap();

        assert_eq!(table.get("admin"), Permission::ALL);
        assert_eq!(table.get(DEFAULT_ROLE), Permission::READ);
        assert_eq!(table.get("curator"), Permission::READ);
        assert!(table.allows("admin", Operation::Delete));
        assert!(!table.allows("curator", Operation::Post));
    }

    #[test]
    fn test_invalid_mask_rejected() {
        let mut explicit = BTreeMap::new();
        explicit.insert("admin".to_string(), 0b1_0000);
        let err = PermissionTable::from_definition("Thing", Some(&explicit), &[]).unwrap_err();
        assert_eq!(err.code(), "META_DEFINITION_INVALID_PERMISSION");
    }
}
