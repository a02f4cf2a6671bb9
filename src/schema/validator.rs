//! Validation and casting entry point
//!
//! Runs against a linked class model and one raw input record, producing the
//! canonical record or every failure found on it. Three passes:
//! - present values are cast (read-only and null rules first)
//! - absent values take their default, then mandatory is enforced
//! - constraints are checked on the cast values
//!
//! Validation is a pure function of (class, record): nothing shared is mutated.

use serde_json::Value;

use super::class::ClassModel;
use super::errors::{CastError, FailureKind, ValidationErrors, ValidationFailure};
use super::property::{PropertyDescriptor, PropertyType, Record};
use super::registry::Registry;
use crate::observability::{log_event_with_fields, Event};

/// Path reported for failures about the record as a whole
pub const ROOT_PATH: &str = "$root";

/// Whether the record is new or a mutation of a stored one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    pub mode: WriteMode,
    /// Drop undeclared attributes instead of rejecting them
    pub ignore_extra: bool,
}

impl ValidateOptions {
    pub fn create() -> Self {
        Self::default()
    }

    pub fn update() -> Self {
        Self {
            mode: WriteMode::Update,
            ..Self::default()
        }
    }

    pub fn ignore_extra(mut self, ignore: bool) -> Self {
        self.ignore_extra = ignore;
        self
    }
}

/// Validates records against the classes of one registry.
pub struct RecordValidator<'a> {
    registry: &'a Registry,
}

impl<'a> RecordValidator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Validate `input` as a top-level record of `class_name`.
    ///
    /// Abstract and embedded classes cannot be created directly.
    pub fn validate(
        &self,
        class_name: &str,
        input: &Value,
        options: ValidateOptions,
    ) -> Result<Record, ValidationErrors> {
        let class = match self.registry.get(class_name) {
            Some(class) => class,
            None => {
                return Err(reject(
                    class_name,
                    vec![ValidationFailure::new(
                        ROOT_PATH,
                        Value::String(class_name.to_string()),
                        FailureKind::UnknownClass,
                    )],
                ))
            }
        };

        if options.mode == WriteMode::Create {
            let kind = if class.is_abstract() {
                Some(FailureKind::AbstractClass)
            } else if class.is_embedded() {
                Some(FailureKind::EmbeddedClass)
            } else {
                None
            };
            if let Some(kind) = kind {
                return Err(reject(
                    class_name,
                    vec![ValidationFailure::new(
                        ROOT_PATH,
                        Value::String(class_name.to_string()),
                        kind,
                    )],
                ));
            }
        }

        let record = input.as_object().ok_or_else(|| {
            reject(
                class_name,
                vec![ValidationFailure::new(
                    ROOT_PATH,
                    input.clone(),
                    FailureKind::Cast(not_an_object(input)),
                )],
            )
        })?;

        self.validate_record(class, record, options)
    }

    /// Validate `input` against `class` without the top-level class checks
    pub fn validate_record(
        &self,
        class: &ClassModel,
        input: &Record,
        options: ValidateOptions,
    ) -> Result<Record, ValidationErrors> {
        let mut failures = Vec::new();
        let record = self.check_record(class, input, options, "", &mut failures);

        if failures.is_empty() {
            Ok(record)
        } else {
            Err(reject(class.name(), failures))
        }
    }

    fn check_record(
        &self,
        class: &ClassModel,
        input: &Record,
        options: ValidateOptions,
        prefix: &str,
        failures: &mut Vec<ValidationFailure>,
    ) -> Record {
        let mut output = Record::new();

        if !options.ignore_extra {
            for (key, value) in input {
                if class.property(key).is_none() {
                    failures.push(ValidationFailure::new(
                        join_path(prefix, key),
                        value.clone(),
                        FailureKind::UnexpectedAttribute,
                    ));
                }
            }
        }

        for (name, property) in class.effective_properties() {
            let Some(raw) = input.get(name) else {
                continue;
            };
            let path = join_path(prefix, name);

            if options.mode == WriteMode::Update && property.is_read_only() {
                failures.push(ValidationFailure::new(path, raw.clone(), FailureKind::ReadOnly));
                continue;
            }

            if raw.is_null() {
                if property.is_nullable() {
                    output.insert(name.clone(), Value::Null);
                } else {
                    failures.push(ValidationFailure::new(
                        path,
                        Value::Null,
                        FailureKind::NullNotAllowed,
                    ));
                }
                continue;
            }

            match property.cast_value(raw) {
                Ok(value) => {
                    if let Some(value) = self.check_nested(property, value, options, &path, failures) {
                        output.insert(name.clone(), value);
                    }
                }
                Err(err) => {
                    failures.push(ValidationFailure::new(path, raw.clone(), FailureKind::Cast(err)))
                }
            }
        }

        if options.mode == WriteMode::Create {
            for (name, property) in class.effective_properties() {
                if input.contains_key(name) || property.is_generated() {
                    continue;
                }
                let path = join_path(prefix, name);

                if let Some(default) = property.default() {
                    match default.resolve(&output) {
                        Ok(Value::Null) => {}
                        Ok(value) => match property.cast_value(&value) {
                            Ok(cast) => {
                                output.insert(name.clone(), cast);
                                continue;
                            }
                            Err(err) => {
                                failures.push(ValidationFailure::new(
                                    path,
                                    value,
                                    FailureKind::Cast(err),
                                ));
                                continue;
                            }
                        },
                        Err(reason) => {
                            failures.push(ValidationFailure::new(
                                path,
                                Value::Null,
                                FailureKind::DefaultFailed(reason),
                            ));
                            continue;
                        }
                    }
                }

                if property.is_mandatory() {
                    if property.is_nullable() {
                        output.insert(name.clone(), Value::Null);
                    } else {
                        failures.push(ValidationFailure::missing(path));
                    }
                }
            }
        }

        for (name, value) in &output {
            let Some(property) = class.property(name) else {
                continue;
            };
            if property.is_generated() || value.is_null() {
                continue;
            }
            check_constraints(property, value, &join_path(prefix, name), failures);
        }

        output
    }

    /// Recurse into embedded values whose class is known. Returns `None` when
    /// an element could not be validated.
    fn check_nested(
        &self,
        property: &PropertyDescriptor,
        value: Value,
        options: ValidateOptions,
        path: &str,
        failures: &mut Vec<ValidationFailure>,
    ) -> Option<Value> {
        if !property.property_type().is_embedded() {
            return Some(value);
        }
        let Some(class) = self.registry.linked_class(property) else {
            return Some(value);
        };

        match (property.property_type(), value) {
            (PropertyType::Embedded, Value::Object(nested)) => {
                let before = failures.len();
                let checked = self.check_record(class, &nested, options, path, failures);
                (failures.len() == before).then_some(Value::Object(checked))
            }
            (_, Value::Array(items)) => {
                let before = failures.len();
                let mut checked = Vec::with_capacity(items.len());
                for (position, item) in items.into_iter().enumerate() {
                    let item_path = join_path(path, &position.to_string());
                    match item {
                        Value::Object(nested) => checked.push(Value::Object(
                            self.check_record(class, &nested, options, &item_path, failures),
                        )),
                        other => failures.push(ValidationFailure::new(
                            item_path,
                            other.clone(),
                            FailureKind::Cast(not_an_object(&other)),
                        )),
                    }
                }
                (failures.len() == before).then_some(Value::Array(checked))
            }
            (_, other) => Some(other),
        }
    }
}

/// Every constraint violation on one cast value is its own failure.
fn check_constraints(
    property: &PropertyDescriptor,
    value: &Value,
    path: &str,
    failures: &mut Vec<ValidationFailure>,
) {
    let mut fail = |kind| failures.push(ValidationFailure::new(path, value.clone(), kind));

    if property.is_non_empty() {
        let empty = match value {
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if empty {
            fail(FailureKind::Empty);
        }
    }

    if let Some(choices) = property.choices() {
        if !choices.contains(value) {
            fail(FailureKind::NotInChoices);
        }
    }

    if let (Some(pattern), Some(text)) = (property.pattern(), value.as_str()) {
        if !pattern.is_match(text) {
            fail(FailureKind::PatternMismatch(pattern.as_str().to_string()));
        }
    }

    if let Some(number) = value.as_i64() {
        if let Some(min) = property.min() {
            if number < min {
                fail(FailureKind::BelowMinimum(min));
            }
        }
        if let Some(max) = property.max() {
            if number > max {
                fail(FailureKind::AboveMaximum(max));
            }
        }
    }

    if let (Some(min_items), Some(items)) = (property.min_items(), value.as_array()) {
        if items.len() < min_items {
            fail(FailureKind::TooFewItems(min_items));
        }
    }
}

fn reject(class: &str, failures: Vec<ValidationFailure>) -> ValidationErrors {
    log_event_with_fields(
        Event::RecordRejected,
        &[("class", class), ("failures", &failures.len().to_string())],
    );
    ValidationErrors::new(class, failures)
}

fn not_an_object(value: &Value) -> CastError {
    CastError::new(
        "object",
        format!("{} is not an object", super::cast::json_type_name(value)),
    )
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::property::DefaultGenerator;
    use crate::schema::types::{ClassDefinition, DefinitionSet, PropertyDefinition};
    use serde_json::json;

    fn registry(classes: Vec<(&str, ClassDefinition)>) -> Registry {
        let set: DefinitionSet = classes
            .into_iter()
            .map(|(name, def)| (name.to_string(), def))
            .collect();
        Registry::compile(vec![set]).unwrap()
    }

    fn codes(errors: &ValidationErrors) -> Vec<&'static str> {
        errors.failures().iter().map(|f| f.code()).collect()
    }

    #[test]
    fn test_string_is_normalized() {
        let registry = registry(vec![(
            "Thing",
            ClassDefinition::new().property(PropertyDefinition::string("name")),
        )]);
        let record = RecordValidator::new(&registry)
            .validate("Thing", &json!({"name": "  a   b "}), ValidateOptions::create())
            .unwrap();
        assert_eq!(record["name"], json!("a b"));
    }

    #[test]
    fn test_cast_failure_reports_original_value() {
        let registry = registry(vec![(
            "Thing",
            ClassDefinition::new().property(PropertyDefinition::integer("count")),
        )]);
        let errors = RecordValidator::new(&registry)
            .validate("Thing", &json!({"count": "4.2"}), ValidateOptions::create())
            .unwrap_err();

        assert_eq!(errors.len(), 1);
        let failure = &errors.failures()[0];
        assert_eq!(failure.property, "count");
        assert_eq!(failure.value, json!("4.2"));
        assert!(matches!(failure.kind, FailureKind::Cast(_)));
    }

    #[test]
    fn test_null_rules() {
        let registry = registry(vec![(
            "Thing",
            ClassDefinition::new()
                .property(PropertyDefinition::string("strict").not_null())
                .property(PropertyDefinition::string("loose")),
        )]);
        let validator = RecordValidator::new(&registry);

        let errors = validator
            .validate("Thing", &json!({"strict": null}), ValidateOptions::create())
            .unwrap_err();
        assert_eq!(codes(&errors), vec!["META_ATTRIBUTE_NULL"]);

        let record = validator
            .validate("Thing", &json!({"loose": null}), ValidateOptions::create())
            .unwrap();
        assert_eq!(record["loose"], Value::Null);
    }

    #[test]
    fn test_defaults_and_mandatory() {
        let registry = registry(vec![(
            "Thing",
            ClassDefinition::new()
                .property(PropertyDefinition::string("name").mandatory().not_null())
                .property(PropertyDefinition::string("status").default_value(json!("active")))
                .property(
                    PropertyDefinition::string("display")
                        .default_fn(|partial| {
                            partial
                                .get("name")
                                .cloned()
                                .ok_or_else(|| "name not set".to_string())
                        }),
                )
                .property(PropertyDefinition::string("note").mandatory()),
        )]);
        let validator = RecordValidator::new(&registry);

        let record = validator
            .validate("Thing", &json!({"name": "kras"}), ValidateOptions::create())
            .unwrap();
        assert_eq!(record["status"], json!("active"));
        assert_eq!(record["display"], json!("kras"));
        assert_eq!(record["note"], Value::Null);

        let errors = validator
            .validate("Thing", &json!({}), ValidateOptions::create())
            .unwrap_err();
        assert_eq!(errors.for_property("name").count(), 1);
        assert_eq!(errors.for_property("display").count(), 1);
    }

    #[test]
    fn test_unexpected_attribute() {
        let registry = registry(vec![(
            "Thing",
            ClassDefinition::new().property(PropertyDefinition::string("name")),
        )]);
        let validator = RecordValidator::new(&registry);
        let input = json!({"name": "x", "color": "red"});

        let errors = validator
            .validate("Thing", &input, ValidateOptions::create())
            .unwrap_err();
        assert_eq!(codes(&errors), vec!["META_ATTRIBUTE_UNEXPECTED"]);

        let record = validator
            .validate("Thing", &input, ValidateOptions::create().ignore_extra(true))
            .unwrap();
        assert!(!record.contains_key("color"));
    }

    #[test]
    fn test_update_mode() {
        let registry = registry(vec![(
            "Thing",
            ClassDefinition::new()
                .property(PropertyDefinition::string("name").mandatory().not_null())
                .property(PropertyDefinition::string("uuid").read_only())
                .property(PropertyDefinition::string("status").default_value(json!("active"))),
        )]);
        let validator = RecordValidator::new(&registry);

        let record = validator
            .validate("Thing", &json!({}), ValidateOptions::update())
            .unwrap();
        assert!(record.is_empty());

        let errors = validator
            .validate("Thing", &json!({"uuid": "abc"}), ValidateOptions::update())
            .unwrap_err();
        assert_eq!(codes(&errors), vec!["META_ATTRIBUTE_READ_ONLY"]);
        assert_eq!(errors.failures()[0].value, json!("abc"));
    }

    #[test]
    fn test_abstract_and_embedded_rejected_on_create() {
        let registry = registry(vec![
            ("V", ClassDefinition::new().abstract_class()),
            ("Note", ClassDefinition::new().embedded()),
        ]);
        let validator = RecordValidator::new(&registry);

        let errors = validator.validate("V", &json!({}), ValidateOptions::create()).unwrap_err();
        assert_eq!(codes(&errors), vec!["META_ATTRIBUTE_ABSTRACT_CLASS"]);
        let errors = validator.validate("Note", &json!({}), ValidateOptions::create()).unwrap_err();
        assert_eq!(codes(&errors), vec!["META_ATTRIBUTE_EMBEDDED_CLASS"]);
        let errors = validator.validate("Ghost", &json!({}), ValidateOptions::create()).unwrap_err();
        assert_eq!(codes(&errors), vec!["META_ATTRIBUTE_UNKNOWN_CLASS"]);
    }

    #[test]
    fn test_non_object_record() {
        let registry = registry(vec![("Thing", ClassDefinition::new())]);
        let errors = RecordValidator::new(&registry)
            .validate("Thing", &json!([1, 2]), ValidateOptions::create())
            .unwrap_err();
        assert_eq!(errors.failures()[0].property, ROOT_PATH);
    }

    #[test]
    fn test_embedded_paths_are_dotted() {
        let registry = registry(vec![
            (
                "SourceRef",
                ClassDefinition::new()
                    .embedded()
                    .property(PropertyDefinition::string("name").mandatory().not_null()),
            ),
            (
                "Thing",
                ClassDefinition::new()
                    .property(PropertyDefinition::embedded("source", Some("SourceRef")))
                    .property(PropertyDefinition::embedded_list("history", Some("SourceRef"))),
            ),
        ]);
        let validator = RecordValidator::new(&registry);

        let errors = validator
            .validate(
                "Thing",
                &json!({"source": {}, "history": [{"name": "ok"}, {"extra": 1}]}),
                ValidateOptions::create(),
            )
            .unwrap_err();
        assert_eq!(errors.for_property("source.name").count(), 1);
        assert_eq!(errors.for_property("history.1.extra").count(), 1);
        assert_eq!(errors.for_property("history.1.name").count(), 1);

        let record = validator
            .validate("Thing", &json!({"source": {"name": "  x  y "}}), ValidateOptions::create())
            .unwrap();
        assert_eq!(record["source"], json!({"name": "x y"}));
    }

    #[test]
    fn test_constraints_all_reported() {
        let registry = registry(vec![(
            "Thing",
            ClassDefinition::new()
                .property(PropertyDefinition::string("code").pattern("^[A-Z]+$").choices(["ABC"]))
                .property(PropertyDefinition::integer("level").min(1).max(5))
                .property(PropertyDefinition::link_set("refs", None).min_items(2))
                .property(PropertyDefinition::string("label").non_empty()),
        )]);
        let errors = RecordValidator::new(&registry)
            .validate(
                "Thing",
                &json!({"code": "abc", "level": 9, "refs": ["#1:1"], "label": "   "}),
                ValidateOptions::create(),
            )
            .unwrap_err();

        let mut found = codes(&errors);
        found.sort_unstable();
        assert_eq!(
            found,
            vec![
                "META_ATTRIBUTE_ABOVE_MAXIMUM",
                "META_ATTRIBUTE_EMPTY",
                "META_ATTRIBUTE_NOT_IN_CHOICES",
                "META_ATTRIBUTE_PATTERN",
                "META_ATTRIBUTE_TOO_FEW_ITEMS",
            ]
        );
    }

    #[test]
    fn test_generated_skips_default_and_constraints() {
        let registry = registry(vec![(
            "Thing",
            ClassDefinition::new().property(
                PropertyDefinition::string("uuid")
                    .generated()
                    .mandatory()
                    .not_null()
                    .pattern("^[0-9]+$"),
            ),
        )]);
        let validator = RecordValidator::new(&registry);

        let record = validator
            .validate("Thing", &json!({}), ValidateOptions::create())
            .unwrap();
        assert!(record.get("uuid").is_none());

        let record = validator
            .validate("Thing", &json!({"uuid": "abc"}), ValidateOptions::create())
            .unwrap();
        assert_eq!(record["uuid"], json!("abc"));
    }

    #[test]
    fn test_default_generators() {
        let registry = registry(vec![(
            "Thing",
            ClassDefinition::new()
                .property(
                    PropertyDefinition::string("uuid").default_generator(DefaultGenerator::Uuid),
                )
                .property(
                    PropertyDefinition::integer("createdAt")
                        .default_generator(DefaultGenerator::Timestamp),
                ),
        )]);
        let validator = RecordValidator::new(&registry);

        let first = validator
            .validate("Thing", &json!({}), ValidateOptions::create())
            .unwrap();
        let second = validator
            .validate("Thing", &json!({}), ValidateOptions::create())
            .unwrap();
        assert_eq!(first["uuid"].as_str().unwrap().len(), 36);
        assert_ne!(first["uuid"], second["uuid"]);
        assert!(first["createdAt"].as_i64().unwrap() > 0);

        let kept = validator
            .validate("Thing", &json!({"createdAt": 7}), ValidateOptions::create())
            .unwrap();
        assert_eq!(kept["createdAt"], json!(7));
    }
}
