#![allow(clippy::unwrap_used)]
use std::sync::Arc;

use crate::schema::Attribute;
use crate::value::{Kind, Value};

#[test]
fn test_enum_attribute_builds_shared_tokens() {
    let attribute = Attribute::new("state", Kind::Enum)
        .unwrap()
        .with_range("off,standby,on")
        .unwrap();
    assert_eq!(attribute.enumerators().len(), 3);

    let value = attribute.enum_value("standby").unwrap();
    assert_eq!(value.ord, 1);
    assert!(Arc::ptr_eq(&value.token, &attribute.enumerators()[1]));
    assert!(attribute.enum_value("broken").is_err());
}

#[test]
fn test_enum_with_empty_range_is_rejected() {
    assert!(Attribute::new("state", Kind::Enum).unwrap().with_range("").is_err());
    // an enum that never received a range reports on first default
    let bare = Attribute::new("state", Kind::Enum).unwrap();
    assert!(bare.init_data().is_err());
}

#[test]
fn test_init_data_uses_declared_default() {
    let attribute = Attribute::new("slots", Kind::U32)
        .unwrap()
        .with_init_value("16");
    assert_eq!(attribute.init_data().unwrap(), Value::U32(16));

    let plain = Attribute::new("slots", Kind::U32).unwrap();
    assert_eq!(plain.init_data().unwrap(), Value::U32(0));

    let multi = Attribute::new("slots", Kind::U32).unwrap().with_multi(true);
    assert_eq!(multi.init_data().unwrap(), Value::List(Vec::new()));
}

#[test]
fn test_multi_init_value_is_comma_separated() {
    let attribute = Attribute::new("ports", Kind::U16)
        .unwrap()
        .with_multi(true)
        .with_init_value("80, 443");
    assert_eq!(
        attribute.init_data().unwrap(),
        Value::List(vec![Value::U16(80), Value::U16(443)])
    );
}

#[test]
fn test_bool_range_is_rejected() {
    let error = Attribute::new("flag", Kind::Bool).unwrap().with_range("0..1");
    assert!(error.is_err());
}

#[test]
fn test_runtime_kinds_are_not_declarable() {
    assert!(Attribute::new("x", Kind::Object).is_err());
    assert!(Attribute::new("x", Kind::List).is_err());
    assert!(Attribute::new("x", Kind::Uid).is_err());
    // the schema token "uid" maps to the declarable deferred form
    assert_eq!(Kind::from_type_token("uid"), Some(Kind::Uid2));
    assert!(Attribute::new("x", Kind::Uid2).is_ok());
}

#[test]
fn test_string_range_keeps_regex_verbatim() {
    let attribute = Attribute::new("kind", Kind::String)
        .unwrap()
        .with_range("^host [0-9]{3}$")
        .unwrap();
    assert_eq!(attribute.range(), "^host [0-9]{3}$");
    assert!(attribute
        .check_range(&Value::String("host 042".into()), false)
        .is_ok());
    assert!(attribute
        .check_range(&Value::String("host 42".into()), false)
        .is_err());
}
