//! Registry compilation
//!
//! `Registry::compile` merges definition sets, drafts one class model per
//! definition, links ancestry and linked classes by name, composes effective
//! properties parents-first and attaches indices. The result is frozen:
//! every accessor takes `&self`, so a compiled registry can be shared across
//! threads behind an `Arc` with no locking.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::class::{ClassArena, ClassId, ClassModel, Index};
use super::errors::{DefinitionError, DefinitionResult};
use super::permissions::Permission;
use super::property::PropertyDescriptor;
use super::types::{ClassDefinition, DefinitionSet, IndexDefinition, PropertyDefinition};
use crate::observability::{log_event_with_fields, Event, ObservationScope};

/// Embedded class carrying one permission mask per class
pub const PERMISSIONS_CLASS: &str = "Permissions";

/// The immutable, linked set of class models
#[derive(Debug, Clone)]
pub struct Registry {
    arena: ClassArena,
}

impl Registry {
    /// Compile one or more definition sets into a linked registry.
    ///
    /// Fails on the first definition error; nothing partial is returned.
    pub fn compile<I>(definition_sets: I) -> DefinitionResult<Self>
    where
        I: IntoIterator<Item = DefinitionSet>,
    {
        let scope = ObservationScope::new("COMPILE");

        match Self::link(definition_sets) {
            Ok(registry) => {
                scope.complete_with_fields(&[("classes", &registry.len().to_string())]);
                Ok(registry)
            }
            Err(err) => {
                scope.fail_fatal(&err.to_string());
                Err(err)
            }
        }
    }

    fn link<I>(definition_sets: I) -> DefinitionResult<Self>
    where
        I: IntoIterator<Item = DefinitionSet>,
    {
        let mut merged = merge(definition_sets)?;
        synthesize_permissions_carrier(&mut merged);

        let (mut arena, declared_indices) = instantiate(&merged)?;

        for (index, def) in merged.values().enumerate() {
            let child = ClassId::new(index);
            for parent_name in &def.inherits {
                let parent = arena.id_of(parent_name).ok_or_else(|| {
                    DefinitionError::UnknownParent {
                        class: arena_name(&arena, child),
                        parent: parent_name.clone(),
                    }
                })?;
                arena.add_parent(child, parent)?;
            }
        }

        arena.resolve_links()?;

        let order = arena.topological_order()?;
        arena.compose_effective_properties(&order)?;
        arena.attach_indices(declared_indices)?;
        arena.freeze();

        for model in arena.iter() {
            log_event_with_fields(
                Event::ClassLinked,
                &[
                    ("class", model.name()),
                    ("parents", &model.parents().len().to_string()),
                    ("properties", &model.effective_properties().len().to_string()),
                ],
            );
        }

        Ok(Self { arena })
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.arena.id_of(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&ClassModel> {
        self.arena.by_name(name)
    }

    /// Look up the class a resolved link points at
    pub fn by_id(&self, id: ClassId) -> Option<&ClassModel> {
        self.arena.get(id)
    }

    /// Class names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arena.iter().map(|model| model.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassModel> {
        self.arena.iter()
    }

    /// Direct parents of `class`, in declaration order
    pub fn parents(&self, class: &ClassModel) -> Vec<&ClassModel> {
        self.resolve_ids(class.parents())
    }

    /// Every ancestor of `class`, nearest declared parent first
    pub fn ancestors(&self, class: &ClassModel) -> Vec<&ClassModel> {
        self.resolve_ids(&self.arena.ancestors(class.id()))
    }

    /// Whether `class` inherits, directly or not, from `ancestor`
    pub fn is_descendant_of(&self, class: &str, ancestor: &str) -> bool {
        match (self.arena.id_of(class), self.arena.id_of(ancestor)) {
            (Some(class), Some(ancestor)) => self.arena.is_descendant_of(class, ancestor),
            _ => false,
        }
    }

    /// Names of every transitive subclass of `class`
    pub fn subclass_names(&self, class: &str) -> Vec<&str> {
        match self.arena.id_of(class) {
            Some(id) => self
                .resolve_ids(&self.arena.descendants(id))
                .into_iter()
                .map(|model| model.name())
                .collect(),
            None => Vec::new(),
        }
    }

    /// The class a link or embedded property points at, if it names one
    pub fn linked_class(&self, property: &PropertyDescriptor) -> Option<&ClassModel> {
        property
            .linked_class()
            .and_then(|linked| linked.id())
            .and_then(|id| self.by_id(id))
    }

    /// Concrete, non-embedded classes whose default role may read them
    pub fn queryable_classes(&self) -> impl Iterator<Item = &ClassModel> {
        self.arena.iter().filter(|model| {
            !model.is_abstract()
                && !model.is_embedded()
                && model
                    .permissions()
                    .get(super::permissions::DEFAULT_ROLE)
                    .contains(Permission::READ)
        })
    }

    /// Every attached index across all classes
    pub fn indices(&self) -> impl Iterator<Item = &Index> {
        self.arena.iter().flat_map(|model| model.indices().iter())
    }

    /// JSON summary of one class, `None` when the class is unknown
    pub fn describe(&self, name: &str) -> Option<Value> {
        let model = self.get(name)?;
        let parents: Vec<&str> = self.parents(model).iter().map(|p| p.name()).collect();
        let ancestors: Vec<&str> = self.ancestors(model).iter().map(|p| p.name()).collect();
        let properties: Vec<Value> = model
            .effective_properties()
            .values()
            .map(|p| p.describe())
            .collect();
        let indices: Vec<Value> = model.indices().iter().map(|i| i.describe()).collect();
        let required: Vec<&str> = model.required_properties().map(|p| p.name()).collect();

        Some(json!({
            "name": model.name(),
            "abstract": model.is_abstract(),
            "isEdge": model.is_edge(),
            "embedded": model.is_embedded(),
            "description": model.description(),
            "inherits": parents,
            "ancestors": ancestors,
            "subclasses": self.subclass_names(name),
            "expose": model.expose(),
            "properties": properties,
            "required": required,
            "indices": indices,
            "permissions": model.permissions().describe(),
        }))
    }

    fn resolve_ids(&self, ids: &[ClassId]) -> Vec<&ClassModel> {
        ids.iter().filter_map(|id| self.by_id(*id)).collect()
    }
}

fn arena_name(arena: &ClassArena, id: ClassId) -> String {
    arena
        .get(id)
        .map(|model| model.name().to_string())
        .unwrap_or_default()
}

/// Union of every set; a name defined twice is an error
fn merge<I>(definition_sets: I) -> DefinitionResult<BTreeMap<String, ClassDefinition>>
where
    I: IntoIterator<Item = DefinitionSet>,
{
    let mut merged = BTreeMap::new();
    for set in definition_sets {
        for (name, def) in set {
            match merged.entry(name) {
                Entry::Occupied(existing) => {
                    return Err(DefinitionError::DuplicateClass(existing.key().clone()))
                }
                Entry::Vacant(slot) => {
                    slot.insert(def);
                }
            }
        }
    }
    Ok(merged)
}

/// Ensure the Permissions class exists and carries one mask property per
/// non-embedded class.
fn synthesize_permissions_carrier(merged: &mut BTreeMap<String, ClassDefinition>) {
    let targets: Vec<String> = merged
        .iter()
        .filter(|(name, def)| !def.embedded && name.as_str() != PERMISSIONS_CLASS)
        .map(|(name, _)| name.clone())
        .collect();

    let carrier = merged
        .entry(PERMISSIONS_CLASS.to_string())
        .or_insert_with(|| ClassDefinition::new().embedded());

    let mut added = 0usize;
    for name in targets {
        if carrier.properties.iter().any(|p| p.name == name) {
            continue;
        }
        carrier.properties.push(
            PropertyDefinition::integer(name)
                .min(i64::from(Permission::NONE.bits()))
                .max(i64::from(Permission::ALL.bits()))
                .not_null()
                .default_value(json!(0)),
        );
        added += 1;
    }

    log_event_with_fields(
        Event::PermissionsCarrierSynthesized,
        &[("properties_added", &added.to_string())],
    );
}

/// Draft every class in name order so `ClassId::new(i)` is the i-th merged
/// definition.
fn instantiate(
    merged: &BTreeMap<String, ClassDefinition>,
) -> DefinitionResult<(ClassArena, Vec<(String, IndexDefinition)>)> {
    let mut arena = ClassArena::new();
    let mut declared_indices = Vec::new();

    for (name, def) in merged {
        let mut own = BTreeMap::new();
        for property in &def.properties {
            let descriptor = PropertyDescriptor::from_definition(name, property)?;
            if own.insert(property.name.clone(), descriptor).is_some() {
                return Err(DefinitionError::DuplicateProperty {
                    class: name.clone(),
                    property: property.name.clone(),
                });
            }
        }

        let model = ClassModel::new(arena.next_id(), name, def, own)?;
        arena.insert(model)?;

        declared_indices.extend(def.indices.iter().cloned().map(|index| (name.clone(), index)));
    }

    Ok((arena, declared_indices))
}
