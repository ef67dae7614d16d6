#![allow(clippy::unwrap_used)]
use std::sync::{Arc, Mutex};

use crate::error::OksError;
use crate::schema::{Attribute, ClassChange, HighCardinality, LowCardinality, Relationship, SchemaEvent};
use crate::value::Kind;

use super::helpers::fixture;

#[test]
fn test_create_and_find_class() {
    let mut f = fixture();
    let id = f.kernel.create_class(f.schema, "Detector").unwrap();
    assert_eq!(f.kernel.find_class("Detector"), Some(id));
    assert_eq!(f.kernel.number_of_classes(), 1);
    assert!(f.kernel.file(f.schema).unwrap().is_updated());
}

#[test]
fn test_duplicate_class_name_is_rejected() {
    let mut f = fixture();
    f.kernel.create_class(f.schema, "Detector").unwrap();
    let error = f.kernel.create_class(f.schema, "Detector").unwrap_err();
    assert!(matches!(error, OksError::SchemaViolation(_)));
}

#[test]
fn test_flattened_tables_follow_inheritance_order() {
    let mut f = fixture();
    let base = f.kernel.create_class(f.schema, "Base").unwrap();
    let derived = f.kernel.create_class(f.schema, "Derived").unwrap();
    f.kernel
        .add_attribute(base, Attribute::new("a", Kind::S32).unwrap())
        .unwrap();
    f.kernel
        .add_attribute(derived, Attribute::new("b", Kind::S32).unwrap())
        .unwrap();
    f.kernel.add_super_class(derived, "Base").unwrap();

    let c = f.kernel.class(derived).unwrap();
    let names: Vec<&str> = c.all_attributes().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(c.all_super_classes(), &[base]);
    assert_eq!(f.kernel.class(base).unwrap().all_sub_classes(), &[derived]);
    assert!(f.kernel.is_subclass_of("Derived", "Base"));
    assert!(!f.kernel.is_subclass_of("Base", "Derived"));

    // offsets are assigned attributes-first in inheritance order
    assert_eq!(c.data_info("a").unwrap().offset, 0);
    assert_eq!(c.data_info("b").unwrap().offset, 1);
}

#[test]
fn test_diamond_inheritance_flattens_once() {
    let mut f = fixture();
    let root = f.kernel.create_class(f.schema, "Root").unwrap();
    f.kernel
        .add_attribute(root, Attribute::new("r", Kind::S32).unwrap())
        .unwrap();
    let left = f.kernel.create_class(f.schema, "Left").unwrap();
    let right = f.kernel.create_class(f.schema, "Right").unwrap();
    let bottom = f.kernel.create_class(f.schema, "Bottom").unwrap();
    f.kernel.add_super_class(left, "Root").unwrap();
    f.kernel.add_super_class(right, "Root").unwrap();
    f.kernel.add_super_class(bottom, "Left").unwrap();
    f.kernel.add_super_class(bottom, "Right").unwrap();

    let c = f.kernel.class(bottom).unwrap();
    let names: Vec<&str> = c.all_attributes().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["r"]);
    assert_eq!(c.all_super_classes().len(), 3);
}

#[test]
fn test_inheritance_cycle_is_rejected_and_rolled_back() {
    let mut f = fixture();
    let a = f.kernel.create_class(f.schema, "A").unwrap();
    let b = f.kernel.create_class(f.schema, "B").unwrap();
    f.kernel.add_super_class(a, "B").unwrap();
    let error = f.kernel.add_super_class(b, "A").unwrap_err();
    assert!(matches!(error, OksError::SchemaViolation(_)));
    // the failed edit did not stick
    assert!(f.kernel.class(b).unwrap().super_class_names().is_empty());
}

#[test]
fn test_duplicate_inherited_name_is_rejected() {
    let mut f = fixture();
    let base = f.kernel.create_class(f.schema, "Base").unwrap();
    let derived = f.kernel.create_class(f.schema, "Derived").unwrap();
    f.kernel
        .add_attribute(base, Attribute::new("x", Kind::S32).unwrap())
        .unwrap();
    f.kernel
        .add_attribute(derived, Attribute::new("x", Kind::S32).unwrap())
        .unwrap();
    let error = f.kernel.add_super_class(derived, "Base").unwrap_err();
    assert!(matches!(error, OksError::SchemaViolation(_)));
}

#[test]
fn test_unresolved_relationship_target_is_soft() {
    let mut f = fixture();
    let a = f.kernel.create_class(f.schema, "A").unwrap();
    f.kernel
        .add_relationship(
            a,
            Relationship::new("to", "Missing", LowCardinality::Zero, HighCardinality::One).unwrap(),
        )
        .unwrap();
    let status = f.kernel.get_bind_classes_status();
    assert!(status.contains("Missing"), "status: {status}");

    // loading the class later clears the status
    f.kernel.create_class(f.schema, "Missing").unwrap();
    assert!(f.kernel.get_bind_classes_status().is_empty());
}

#[test]
fn test_attribute_rename_and_retype() {
    let mut f = fixture();
    let class = f.module_class();
    f.kernel.rename_attribute(class, "label", "title").unwrap();
    assert!(f.kernel.class(class).unwrap().find_attribute("title").is_some());
    assert!(f.kernel.class(class).unwrap().find_attribute("label").is_none());

    f.kernel.set_attribute_type(class, "title", Kind::U16).unwrap();
    assert_eq!(
        f.kernel
            .class(class)
            .unwrap()
            .find_attribute("title")
            .unwrap()
            .data_type(),
        Kind::U16
    );
}

#[test]
fn test_bad_range_edit_rolls_back() {
    let mut f = fixture();
    let class = f.module_class();
    let error = f
        .kernel
        .set_attribute_range(class, "slots", "not-a-number..10")
        .unwrap_err();
    assert!(matches!(error, OksError::ValueRead { .. }));
    assert_eq!(
        f.kernel
            .class(class)
            .unwrap()
            .find_attribute("slots")
            .unwrap()
            .range(),
        "1..64"
    );
}

#[test]
fn test_change_notifications_carry_the_kind() {
    let mut f = fixture();
    let class = f.module_class();

    let seen: Arc<Mutex<Vec<(String, ClassChange)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    f.kernel.subscribe_schema(move |event| {
        if let SchemaEvent::ClassChanged { name, change, .. } = event {
            sink.lock().unwrap().push((name.to_string(), *change));
        }
    });

    f.kernel.set_attribute_description(class, "slots", "how many").unwrap();
    f.kernel.set_attribute_is_no_null(class, "slots", true).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("Module".to_string(), ClassChange::AttributeDescription),
            ("Module".to_string(), ClassChange::AttributeIsNoNull),
        ]
    );
}

#[test]
fn test_abstract_class_refuses_objects() {
    let mut f = fixture();
    let class = f.kernel.create_class(f.schema, "Abstract").unwrap();
    f.kernel.set_class_is_abstract(class, true).unwrap();
    let error = f.kernel.create_object(class, Some("x")).unwrap_err();
    assert!(matches!(error, OksError::SchemaViolation(_)));
}

#[test]
fn test_destroy_class_in_use_as_superclass() {
    let mut f = fixture();
    let base = f.kernel.create_class(f.schema, "Base").unwrap();
    let derived = f.kernel.create_class(f.schema, "Derived").unwrap();
    f.kernel.add_super_class(derived, "Base").unwrap();
    assert!(f.kernel.destroy_class(base).is_err());
    f.kernel.destroy_class(derived).unwrap();
    f.kernel.destroy_class(base).unwrap();
    assert_eq!(f.kernel.number_of_classes(), 0);
}
