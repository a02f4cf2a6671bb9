//! Registry Linking Tests
//!
//! - Effective properties compose parents first, own declarations winning
//! - Every named parent, linked class and index target must exist
//! - Inheritance is acyclic
//! - Permissions derive from exposed operations
//! - Index flags land on the indexed class only

use metamodel::schema::{
    ClassDefinition, ClassState, DefinitionError, DefinitionSet, IndexDefinition, IndexKind,
    Operation, Permission, PropertyDefinition, PropertyType, Registry, DEFAULT_ROLE,
    PERMISSIONS_CLASS, READONLY_ROLE,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn set(classes: Vec<(&str, ClassDefinition)>) -> DefinitionSet {
    classes
        .into_iter()
        .map(|(name, def)| (name.to_string(), def))
        .collect()
}

fn compile(classes: Vec<(&str, ClassDefinition)>) -> Result<Registry, DefinitionError> {
    Registry::compile(vec![set(classes)])
}

// =============================================================================
// Inheritance Tests
// =============================================================================

/// A parent property appears on the child, declared on the parent.
#[test]
fn test_inherited_property_present() {
    let registry = compile(vec![
        ("V", ClassDefinition::new().property(PropertyDefinition::string("uuid"))),
        ("Disease", ClassDefinition::new().inherits(["V"])),
    ])
    .unwrap();

    let disease = registry.get("Disease").unwrap();
    assert!(disease.own_properties().is_empty());
    assert_eq!(disease.property("uuid").unwrap().declared_on(), "V");
    assert_eq!(disease.state(), ClassState::Linked);
}

/// An own declaration overrides the inherited one without touching the parent.
#[test]
fn test_override_wins() {
    let registry = compile(vec![
        ("Base", ClassDefinition::new().property(PropertyDefinition::string("name"))),
        (
            "Child",
            ClassDefinition::new()
                .inherits(["Base"])
                .property(PropertyDefinition::integer("name").mandatory()),
        ),
    ])
    .unwrap();

    let child = registry.get("Child").unwrap().property("name").unwrap();
    assert_eq!(child.property_type(), PropertyType::Integer);
    assert!(child.is_mandatory());

    let base = registry.get("Base").unwrap().property("name").unwrap();
    assert_eq!(base.property_type(), PropertyType::String);
}

/// Children may be declared before their parents in the merged map.
#[test]
fn test_parent_declared_after_child() {
    let registry = compile(vec![
        ("Aaa", ClassDefinition::new().inherits(["Zzz"])),
        ("Zzz", ClassDefinition::new().property(PropertyDefinition::boolean("flag"))),
    ])
    .unwrap();

    assert!(registry.get("Aaa").unwrap().property("flag").is_some());
    assert!(registry.is_descendant_of("Aaa", "Zzz"));
    assert_eq!(registry.subclass_names("Zzz"), vec!["Aaa"]);
}

/// Multi-level hierarchy: ancestors, descendants and composed properties.
#[test]
fn test_multi_level_walks() {
    let registry = compile(vec![
        ("V", ClassDefinition::new().abstract_class().property(PropertyDefinition::string("uuid"))),
        ("Ontology", ClassDefinition::new().abstract_class().inherits(["V"])
            .property(PropertyDefinition::string("name"))),
        ("Disease", ClassDefinition::new().inherits(["Ontology"])),
        ("Therapy", ClassDefinition::new().inherits(["Ontology"])),
    ])
    .unwrap();

    let disease = registry.get("Disease").unwrap();
    let ancestors: Vec<&str> = registry.ancestors(disease).iter().map(|c| c.name()).collect();
    assert_eq!(ancestors, vec!["Ontology", "V"]);
    assert!(disease.property("uuid").is_some());
    assert!(disease.property("name").is_some());

    let mut subclasses = registry.subclass_names("V");
    subclasses.sort_unstable();
    assert_eq!(subclasses, vec!["Disease", "Ontology", "Therapy"]);
    assert!(!registry.is_descendant_of("V", "Disease"));
}

/// Diamond inheritance of one origin keeps that origin's declaration.
#[test]
fn test_diamond_inheritance() {
    let registry = compile(vec![
        ("A", ClassDefinition::new().property(PropertyDefinition::string("x"))),
        ("B", ClassDefinition::new().inherits(["A"])),
        ("C", ClassDefinition::new().inherits(["A"])),
        ("D", ClassDefinition::new().inherits(["B", "C"])),
    ])
    .unwrap();

    let d = registry.get("D").unwrap();
    assert_eq!(d.property("x").unwrap().declared_on(), "A");
    let ancestors: Vec<&str> = registry.ancestors(d).iter().map(|c| c.name()).collect();
    assert_eq!(ancestors, vec!["B", "A", "C"]);
}

/// Unrelated ancestors declaring the same property: the last declared wins.
#[test]
fn test_ambiguous_inheritance_last_parent_wins() {
    let registry = compile(vec![
        ("B", ClassDefinition::new().property(PropertyDefinition::string("code"))),
        ("C", ClassDefinition::new().property(PropertyDefinition::integer("code"))),
        ("D", ClassDefinition::new().inherits(["B", "C"])),
    ])
    .unwrap();

    let code = registry.get("D").unwrap().property("code").unwrap();
    assert_eq!(code.declared_on(), "C");
    assert_eq!(code.property_type(), PropertyType::Integer);
}

/// Circular inheritance fails compilation.
#[test]
fn test_cycle_rejected() {
    let err = compile(vec![
        ("A", ClassDefinition::new().inherits(["B"])),
        ("B", ClassDefinition::new().inherits(["A"])),
    ])
    .unwrap_err();
    assert_eq!(err.code(), "META_DEFINITION_CIRCULAR_INHERITANCE");

    let err = compile(vec![("A", ClassDefinition::new().inherits(["A"]))]).unwrap_err();
    assert_eq!(err.code(), "META_DEFINITION_CIRCULAR_INHERITANCE");
}

/// Naming the same parent twice fails compilation.
#[test]
fn test_duplicate_parent_rejected() {
    let err = compile(vec![
        ("A", ClassDefinition::new()),
        ("B", ClassDefinition::new().inherits(["A", "A"])),
    ])
    .unwrap_err();
    assert_eq!(err.code(), "META_DEFINITION_DUPLICATE_PARENT");
}

// =============================================================================
// Link Resolution Tests
// =============================================================================

/// A link to a class nobody defines fails compilation.
#[test]
fn test_dangling_link_rejected() {
    let err = compile(vec![(
        "Statement",
        ClassDefinition::new().property(PropertyDefinition::link("source", Some("Source"))),
    )])
    .unwrap_err();

    assert_eq!(
        err,
        DefinitionError::UnknownLinkedClass {
            class: "Statement".into(),
            property: "source".into(),
            linked_class: "Source".into(),
        }
    );
}

/// Resolved links point at the registry's class model.
#[test]
fn test_link_resolves_across_sets() {
    let statements = set(vec![(
        "Statement",
        ClassDefinition::new().property(PropertyDefinition::link_set("evidence", Some("Evidence"))),
    )]);
    let evidence = set(vec![("Evidence", ClassDefinition::new())]);
    let registry = Registry::compile(vec![statements, evidence]).unwrap();

    let property = registry.get("Statement").unwrap().property("evidence").unwrap();
    assert!(property.linked_class().unwrap().is_resolved());
    assert_eq!(registry.linked_class(property).unwrap().name(), "Evidence");
}

/// The same class name in two sets is rejected.
#[test]
fn test_duplicate_class_across_sets() {
    let a = set(vec![("Disease", ClassDefinition::new())]);
    let b = set(vec![("Disease", ClassDefinition::new())]);
    let err = Registry::compile(vec![a, b]).unwrap_err();
    assert_eq!(err, DefinitionError::DuplicateClass("Disease".into()));
}

/// An invalid regex fails compilation, not validation.
#[test]
fn test_invalid_pattern_rejected() {
    let err = compile(vec![(
        "Gene",
        ClassDefinition::new().property(PropertyDefinition::string("hgnc").pattern("([")),
    )])
    .unwrap_err();
    assert_eq!(err.code(), "META_DEFINITION_INVALID_PATTERN");
}

// =============================================================================
// Permission Tests
// =============================================================================

/// Read-only exposure yields exactly READ; full exposure yields ALL.
#[test]
fn test_permission_derivation() {
    let registry = compile(vec![
        ("Reader", ClassDefinition::new().expose([Operation::Query, Operation::Get])),
        ("Writer", ClassDefinition::new().expose(Operation::ALL)),
    ])
    .unwrap();

    let reader = registry.get("Reader").unwrap().permissions();
    assert_eq!(reader.get(DEFAULT_ROLE), Permission::READ);

    let writer = registry.get("Writer").unwrap().permissions();
    assert_eq!(writer.get(DEFAULT_ROLE), Permission::ALL);
    assert_eq!(writer.get(READONLY_ROLE), Permission::READ);
}

/// An explicit mask above ALL is a definition error.
#[test]
fn test_invalid_permission_rejected() {
    let err = compile(vec![("Thing", ClassDefinition::new().permission("admin", 16))]).unwrap_err();
    assert_eq!(err.code(), "META_DEFINITION_INVALID_PERMISSION");
}

/// A declared Permissions class is extended, not replaced.
#[test]
fn test_declared_permissions_carrier_extended() {
    let registry = compile(vec![
        (
            PERMISSIONS_CLASS,
            ClassDefinition::new()
                .embedded()
                .property(PropertyDefinition::string("label")),
        ),
        ("Disease", ClassDefinition::new()),
    ])
    .unwrap();

    let carrier = registry.get(PERMISSIONS_CLASS).unwrap();
    assert!(carrier.property("label").is_some());
    assert!(carrier.property("Disease").is_some());
}

// =============================================================================
// Index Tests
// =============================================================================

/// Single-property indices flag their property; composite ones do not.
#[test]
fn test_index_flags() {
    let registry = compile(vec![(
        "Disease",
        ClassDefinition::new()
            .property(PropertyDefinition::string("name"))
            .property(PropertyDefinition::string("sourceId"))
            .property(PropertyDefinition::string("source"))
            .index(IndexDefinition::new("Disease.name", IndexKind::FulltextHash, ["name"]))
            .index(
                IndexDefinition::new("Disease.active", IndexKind::Unique, ["source", "sourceId"])
                    .ignore_nulls(),
            ),
    )])
    .unwrap();

    let disease = registry.get("Disease").unwrap();
    assert!(disease.property("name").unwrap().is_fulltext_indexed());
    assert!(!disease.property("name").unwrap().is_indexed());
    assert!(!disease.property("sourceId").unwrap().is_indexed());
    assert_eq!(disease.indices().len(), 2);
    assert!(disease.indices()[1].ignore_null_values);
}

/// Indices do not propagate to subclasses.
#[test]
fn test_index_not_inherited() {
    let registry = compile(vec![
        (
            "Base",
            ClassDefinition::new()
                .property(PropertyDefinition::string("name"))
                .index(IndexDefinition::new("Base.name", IndexKind::Unique, ["name"])),
        ),
        ("Child", ClassDefinition::new().inherits(["Base"])),
    ])
    .unwrap();

    assert!(registry.get("Child").unwrap().indices().is_empty());
    assert_eq!(registry.indices().count(), 1);
}

/// An inherited descriptor equals its ancestor's when the ancestor's own
/// definition carries a single-property index.
#[test]
fn test_inherited_descriptor_matches_own_index() {
    let registry = compile(vec![
        (
            "Base",
            ClassDefinition::new()
                .property(PropertyDefinition::string("name"))
                .index(IndexDefinition::new("Base.name", IndexKind::Unique, ["name"])),
        ),
        ("Child", ClassDefinition::new().inherits(["Base"])),
    ])
    .unwrap();

    let base = registry.get("Base").unwrap().property("name").unwrap();
    let child = registry.get("Child").unwrap().property("name").unwrap();
    assert!(base.is_indexed());
    assert_eq!(child, base);
}

/// The same holds when another class declares the index against the ancestor.
#[test]
fn test_inherited_descriptor_matches_cross_class_index() {
    let registry = compile(vec![
        ("Base", ClassDefinition::new().property(PropertyDefinition::string("name"))),
        ("Child", ClassDefinition::new().inherits(["Base"])),
        ("Grandchild", ClassDefinition::new().inherits(["Child"])),
        (
            "Search",
            ClassDefinition::new().index(
                IndexDefinition::new("Base.name", IndexKind::Unique, ["name"]).on_class("Base"),
            ),
        ),
    ])
    .unwrap();

    let base = registry.get("Base").unwrap().property("name").unwrap();
    assert!(base.is_indexed());
    for name in ["Child", "Grandchild"] {
        assert_eq!(registry.get(name).unwrap().property("name").unwrap(), base);
        assert!(registry.get(name).unwrap().indices().is_empty());
    }
}

/// An override is a new declaration and does not pick up the ancestor's flag.
#[test]
fn test_override_not_flagged_by_ancestor_index() {
    let registry = compile(vec![
        (
            "Base",
            ClassDefinition::new()
                .property(PropertyDefinition::string("name"))
                .index(IndexDefinition::new("Base.name", IndexKind::FulltextHash, ["name"])),
        ),
        (
            "Child",
            ClassDefinition::new()
                .inherits(["Base"])
                .property(PropertyDefinition::string("name").mandatory()),
        ),
    ])
    .unwrap();

    let child = registry.get("Child").unwrap().property("name").unwrap();
    assert_eq!(child.declared_on(), "Child");
    assert!(!child.is_fulltext_indexed());
}

/// An index on a property the class lacks is rejected.
#[test]
fn test_index_on_unknown_property() {
    let err = compile(vec![(
        "Disease",
        ClassDefinition::new().index(IndexDefinition::new("x", IndexKind::NotUniqueHash, ["ghost"])),
    )])
    .unwrap_err();
    assert_eq!(err.code(), "META_DEFINITION_UNKNOWN_INDEX_PROPERTY");

    let err = compile(vec![(
        "Disease",
        ClassDefinition::new().index(IndexDefinition::new("y", IndexKind::Unique, Vec::<String>::new())),
    )])
    .unwrap_err();
    assert_eq!(err.code(), "META_DEFINITION_EMPTY_INDEX");
}
