//! Class models and the linking arena
//!
//! Classes live in a `ClassArena` and refer to each other by `ClassId`, so
//! parent/child edges and linked-class references never own each other.
//!
//! Lifecycle: Draft (own properties only) → Linking (ancestry and link
//! resolution in progress) → Linked (frozen). There is no way back from Linked.

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};

use super::errors::{DefinitionError, DefinitionResult};
use super::permissions::PermissionTable;
use super::property::{LinkedClass, PropertyDescriptor};
use super::types::{ClassDefinition, IndexDefinition, IndexKind, Operation, PropertyDefinition};
use crate::observability::{log_event_with_fields, Event};

/// Endpoint properties every edge class carries
pub const EDGE_OUT: &str = "out";
pub const EDGE_IN: &str = "in";

/// Position of a class inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

impl ClassId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Construction state of a class model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    Draft,
    Linking,
    Linked,
}

/// A compiled index declaration, attached to its target class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub class: String,
    pub kind: IndexKind,
    pub properties: Vec<String>,
    pub ignore_null_values: bool,
}

impl Index {
    pub(crate) fn from_definition(declaring: &str, def: &IndexDefinition) -> Self {
        Self {
            name: def.name.clone(),
            class: def.target_class(declaring).to_string(),
            kind: def.kind,
            properties: def.properties.clone(),
            ignore_null_values: def.metadata.ignore_null_values,
        }
    }

    pub fn is_single_property(&self) -> bool {
        self.properties.len() == 1
    }

    pub fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "class": self.class,
            "type": self.kind.as_str(),
            "properties": self.properties,
            "metadata": {"ignoreNullValues": self.ignore_null_values},
        })
    }
}

/// The compiled description of one record type
#[derive(Debug, Clone)]
pub struct ClassModel {
    id: ClassId,
    name: String,
    is_abstract: bool,
    is_edge: bool,
    embedded: bool,
    description: Option<String>,
    expose: Vec<Operation>,
    own_properties: BTreeMap<String, PropertyDescriptor>,
    effective_properties: BTreeMap<String, PropertyDescriptor>,
    parents: Vec<ClassId>,
    children: Vec<ClassId>,
    indices: Vec<Index>,
    permissions: PermissionTable,
    state: ClassState,
}

impl ClassModel {
    /// Draft a class from its definition and compiled own properties
    pub(crate) fn new(
        id: ClassId,
        name: &str,
        def: &ClassDefinition,
        own_properties: BTreeMap<String, PropertyDescriptor>,
    ) -> DefinitionResult<Self> {
        let permissions =
            PermissionTable::from_definition(name, def.permissions.as_ref(), &def.expose)?;

        Ok(Self {
            id,
            name: name.to_string(),
            is_abstract: def.is_abstract,
            is_edge: def.is_edge,
            embedded: def.embedded,
            description: def.description.clone(),
            expose: def.expose.clone(),
            own_properties,
            effective_properties: BTreeMap::new(),
            parents: Vec::new(),
            children: Vec::new(),
            indices: Vec::new(),
            permissions,
            state: ClassState::Draft,
        })
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_edge(&self) -> bool {
        self.is_edge
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn expose(&self) -> &[Operation] {
        &self.expose
    }

    pub fn state(&self) -> ClassState {
        self.state
    }

    /// Properties declared directly on this class
    pub fn own_properties(&self) -> &BTreeMap<String, PropertyDescriptor> {
        &self.own_properties
    }

    /// Own properties composed with every ancestor's, own declarations winning
    pub fn effective_properties(&self) -> &BTreeMap<String, PropertyDescriptor> {
        &self.effective_properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.effective_properties.get(name)
    }

    /// Effective properties an input must supply (mandatory, non-null, no default)
    pub fn required_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.effective_properties.values().filter(|p| {
            p.is_mandatory() && !p.is_nullable() && p.default().is_none() && !p.is_generated()
        })
    }

    /// Direct parents in declaration order
    pub fn parents(&self) -> &[ClassId] {
        &self.parents
    }

    /// Direct children, in the order they declared this class as parent
    pub fn children(&self) -> &[ClassId] {
        &self.children
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    pub fn permissions(&self) -> &PermissionTable {
        &self.permissions
    }

    /// Replace the pending link on `property` with the resolved class.
    ///
    /// Fails when the class has no such own property, when the property
    /// carries no link, or when it was already resolved.
    pub(crate) fn resolve_link(&mut self, property: &str, target: ClassId) -> DefinitionResult<()> {
        self.ensure_not_frozen()?;

        let descriptor = self.own_properties.get_mut(property).ok_or_else(|| {
            DefinitionError::UnknownProperty {
                class: self.name.clone(),
                property: property.to_string(),
            }
        })?;

        let already_resolved = match descriptor.linked_class() {
            Some(linked) => linked.is_resolved(),
            None => {
                return Err(DefinitionError::UnknownProperty {
                    class: self.name.clone(),
                    property: property.to_string(),
                })
            }
        };
        if already_resolved {
            return Err(DefinitionError::AlreadyResolved {
                class: self.name.clone(),
                property: property.to_string(),
            });
        }

        descriptor.resolve_link(target);
        self.state = ClassState::Linking;
        Ok(())
    }

    fn ensure_not_frozen(&self) -> DefinitionResult<()> {
        if self.state == ClassState::Linked {
            return Err(DefinitionError::ClassFrozen(self.name.clone()));
        }
        Ok(())
    }

    /// Attach an index targeting this class. Single-property indices flag the
    /// effective (and own) descriptor.
    fn attach_index(&mut self, index: Index) -> DefinitionResult<()> {
        if index.properties.is_empty() {
            return Err(DefinitionError::EmptyIndex {
                index: index.name,
                class: self.name.clone(),
            });
        }
        for property in &index.properties {
            if !self.effective_properties.contains_key(property) {
                return Err(DefinitionError::UnknownIndexProperty {
                    index: index.name.clone(),
                    class: self.name.clone(),
                    property: property.clone(),
                });
            }
        }

        if index.is_single_property() {
            let fulltext = index.kind.is_fulltext();
            let property = &index.properties[0];
            if let Some(descriptor) = self.effective_properties.get_mut(property) {
                descriptor.mark_indexed(fulltext);
            }
            if let Some(descriptor) = self.own_properties.get_mut(property) {
                descriptor.mark_indexed(fulltext);
            }
        }

        self.indices.push(index);
        Ok(())
    }
}

/// Every class of one compilation, addressable by id and by name
#[derive(Debug, Clone, Default)]
pub struct ClassArena {
    classes: Vec<ClassModel>,
    by_name: HashMap<String, ClassId>,
}

impl ClassArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reserve the id the next inserted class will get
    pub(crate) fn next_id(&self) -> ClassId {
        ClassId(self.classes.len())
    }

    pub(crate) fn insert(&mut self, model: ClassModel) -> DefinitionResult<ClassId> {
        if self.by_name.contains_key(model.name()) {
            return Err(DefinitionError::DuplicateClass(model.name().to_string()));
        }
        let id = model.id();
        debug_assert_eq!(id, self.next_id());
        self.by_name.insert(model.name().to_string(), id);
        self.classes.push(model);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassModel> {
        self.classes.get(id.0)
    }

    pub fn by_name(&self, name: &str) -> Option<&ClassModel> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassModel> {
        self.classes.iter()
    }

    pub(crate) fn get_mut(&mut self, id: ClassId) -> Option<&mut ClassModel> {
        self.classes.get_mut(id.0)
    }

    /// Append `parent` to `child`'s parents and `child` to `parent`'s children.
    pub(crate) fn add_parent(&mut self, child: ClassId, parent: ClassId) -> DefinitionResult<()> {
        let child_name = self.name_of(child).to_string();
        let parent_name = self.name_of(parent).to_string();

        if child == parent {
            return Err(DefinitionError::CircularInheritance {
                class: child_name.clone(),
                cycle: format!("{} -> {}", child_name, child_name),
            });
        }

        let child_model = &mut self.classes[child.0];
        child_model.ensure_not_frozen()?;
        if child_model.parents.contains(&parent) {
            return Err(DefinitionError::DuplicateParent {
                class: child_name,
                parent: parent_name,
            });
        }
        child_model.parents.push(parent);
        child_model.state = ClassState::Linking;

        self.classes[parent.0].children.push(child);
        Ok(())
    }

    /// Parents-first order of every class. Fails on circular inheritance.
    pub(crate) fn topological_order(&self) -> DefinitionResult<Vec<ClassId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        fn visit(
            arena: &ClassArena,
            id: ClassId,
            marks: &mut [Mark],
            path: &mut Vec<ClassId>,
            order: &mut Vec<ClassId>,
        ) -> DefinitionResult<()> {
            match marks[id.0] {
                Mark::Done => return Ok(()),
                Mark::Visiting => {
                    let start = path.iter().position(|p| *p == id).unwrap_or(0);
                    let mut cycle: Vec<&str> =
                        path[start..].iter().map(|p| arena.name_of(*p)).collect();
                    cycle.push(arena.name_of(id));
                    return Err(DefinitionError::CircularInheritance {
                        class: arena.name_of(id).to_string(),
                        cycle: cycle.join(" -> "),
                    });
                }
                Mark::Unvisited => {}
            }

            marks[id.0] = Mark::Visiting;
            path.push(id);
            for parent in &arena.classes[id.0].parents {
                visit(arena, *parent, marks, path, order)?;
            }
            path.pop();
            marks[id.0] = Mark::Done;
            order.push(id);
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; self.classes.len()];
        let mut order = Vec::with_capacity(self.classes.len());
        let mut path = Vec::new();
        for index in 0..self.classes.len() {
            visit(self, ClassId(index), &mut marks, &mut path, &mut order)?;
        }
        Ok(order)
    }

    /// Resolve every pending `linked_class` on every class's own properties
    pub(crate) fn resolve_links(&mut self) -> DefinitionResult<()> {
        for index in 0..self.classes.len() {
            let pending: Vec<(String, String)> = self.classes[index]
                .own_properties
                .values()
                .filter_map(|p| match p.linked_class() {
                    Some(LinkedClass::Pending(target)) => {
                        Some((p.name().to_string(), target.clone()))
                    }
                    _ => None,
                })
                .collect();

            for (property, target_name) in pending {
                let target = self.id_of(&target_name).ok_or_else(|| {
                    DefinitionError::UnknownLinkedClass {
                        class: self.classes[index].name.clone(),
                        property: property.clone(),
                        linked_class: target_name.clone(),
                    }
                })?;
                self.classes[index].resolve_link(&property, target)?;
            }
        }
        Ok(())
    }

    /// Fold every ancestor's effective properties into each class, parents
    /// visited in declaration order, own properties applied last. Edge classes
    /// missing an endpoint get a mandatory, non-null link for it.
    pub(crate) fn compose_effective_properties(&mut self, order: &[ClassId]) -> DefinitionResult<()> {
        for &id in order {
            let mut composed: BTreeMap<String, PropertyDescriptor> = BTreeMap::new();
            let model = &self.classes[id.0];

            for parent in &model.parents {
                for (name, inherited) in &self.classes[parent.0].effective_properties {
                    if let Some(existing) = composed.get(name) {
                        if !model.own_properties.contains_key(name)
                            && self.is_ambiguous(existing, inherited)
                        {
                            log_event_with_fields(
                                Event::AmbiguousInheritance,
                                &[
                                    ("class", model.name()),
                                    ("property", name.as_str()),
                                    ("kept", inherited.declared_on()),
                                    ("dropped", existing.declared_on()),
                                ],
                            );
                        }
                    }
                    composed.insert(name.clone(), inherited.clone());
                }
            }

            for (name, own) in &model.own_properties {
                composed.insert(name.clone(), own.clone());
            }

            if model.is_edge {
                for endpoint in [EDGE_OUT, EDGE_IN] {
                    if !composed.contains_key(endpoint) {
                        let def = PropertyDefinition::link(endpoint, None).mandatory().not_null();
                        let mut descriptor = PropertyDescriptor::from_definition(model.name(), &def)?;
                        descriptor.mark_synthesized();
                        composed.insert(endpoint.to_string(), descriptor);
                    }
                }
            }

            self.classes[id.0].effective_properties = composed;
        }
        Ok(())
    }

    /// Two inherited declarations conflict when neither origin class is the
    /// other or one of its ancestors.
    fn is_ambiguous(&self, a: &PropertyDescriptor, b: &PropertyDescriptor) -> bool {
        if a.declared_on() == b.declared_on() || (a.is_synthesized() && b.is_synthesized()) {
            return false;
        }
        match (self.id_of(a.declared_on()), self.id_of(b.declared_on())) {
            (Some(a), Some(b)) => {
                !self.is_descendant_of(a, b) && !self.is_descendant_of(b, a)
            }
            _ => true,
        }
    }

    /// Attach each declared index to its target class.
    ///
    /// Runs after composition. A single-property index flags the target's
    /// descriptor and every descendant's copy of that same declaration, so an
    /// inherited descriptor always equals the ancestor's no matter which class
    /// declared the index.
    pub(crate) fn attach_indices(
        &mut self,
        declared: Vec<(String, IndexDefinition)>,
    ) -> DefinitionResult<()> {
        for (declaring, def) in declared {
            let index = Index::from_definition(&declaring, &def);
            let target = self.id_of(&index.class).ok_or_else(|| {
                DefinitionError::UnknownIndexClass {
                    index: index.name.clone(),
                    class: index.class.clone(),
                }
            })?;
            let flag = index
                .is_single_property()
                .then(|| (index.properties[0].clone(), index.kind.is_fulltext()));

            self.classes[target.0].attach_index(index)?;

            if let Some((property, fulltext)) = flag {
                self.flag_inherited_copies(target, &property, fulltext);
            }
        }
        Ok(())
    }

    fn flag_inherited_copies(&mut self, target: ClassId, property: &str, fulltext: bool) {
        let origin = match self.classes[target.0].effective_properties.get(property) {
            Some(descriptor) => descriptor.declared_on().to_string(),
            None => return,
        };
        for id in self.descendants(target) {
            if let Some(descriptor) = self.classes[id.0].effective_properties.get_mut(property) {
                if descriptor.declared_on() == origin {
                    descriptor.mark_indexed(fulltext);
                }
            }
        }
    }

    pub(crate) fn freeze(&mut self) {
        for model in &mut self.classes {
            model.state = ClassState::Linked;
        }
    }

    fn name_of(&self, id: ClassId) -> &str {
        &self.classes[id.0].name
    }

    /// Every ancestor of `id`, depth-first in declaration order, without duplicates
    pub fn ancestors(&self, id: ClassId) -> Vec<ClassId> {
        let mut seen = Vec::new();
        let mut stack: Vec<ClassId> = self.classes[id.0].parents.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if seen.contains(&next) {
                continue;
            }
            seen.push(next);
            stack.extend(self.classes[next.0].parents.iter().rev().copied());
        }
        seen
    }

    /// Reachability over `parents`
    pub fn is_descendant_of(&self, id: ClassId, ancestor: ClassId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Every transitive subclass of `id`, reachability over `children`
    pub fn descendants(&self, id: ClassId) -> Vec<ClassId> {
        let mut seen = Vec::new();
        let mut stack: Vec<ClassId> = self.classes[id.0].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if seen.contains(&next) {
                continue;
            }
            seen.push(next);
            stack.extend(self.classes[next.0].children.iter().rev().copied());
        }
        seen
    }
}
