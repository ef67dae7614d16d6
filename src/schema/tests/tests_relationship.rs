#![allow(clippy::unwrap_used)]
use crate::schema::{HighCardinality, LowCardinality, Method, Relationship};

#[test]
fn test_cardinality_tokens() {
    assert_eq!(LowCardinality::from_token("zero"), Some(LowCardinality::Zero));
    assert_eq!(LowCardinality::from_token("one"), Some(LowCardinality::One));
    assert_eq!(LowCardinality::from_token("two"), None);
    assert_eq!(HighCardinality::from_token("many"), Some(HighCardinality::Many));
    assert_eq!(HighCardinality::Many.token(), "many");
}

#[test]
fn test_rcr_needs_all_three_flags() {
    let base = Relationship::new("r", "T", LowCardinality::Zero, HighCardinality::One).unwrap();
    assert!(!base.maintains_rcr());
    assert!(!base.clone().with_composite(true, true, false).maintains_rcr());
    assert!(!base.clone().with_composite(true, false, true).maintains_rcr());
    assert!(base.clone().with_composite(true, true, true).maintains_rcr());
}

#[test]
fn test_empty_names_are_rejected() {
    assert!(Relationship::new("", "T", LowCardinality::Zero, HighCardinality::One).is_err());
    assert!(Relationship::new("r", "", LowCardinality::Zero, HighCardinality::One).is_err());
    assert!(Method::new("").is_err());
}

#[test]
fn test_method_implementations_unique_per_language() {
    let mut method = Method::new("reset").unwrap();
    method.add_implementation("c++", "void reset()", "").unwrap();
    assert!(method.add_implementation("c++", "void reset(int)", "").is_err());
    method.add_implementation("java", "void reset()", "").unwrap();
    assert_eq!(method.implementations().len(), 2);
    assert!(method.find_implementation("java").is_some());

    method.remove_implementation("c++").unwrap();
    assert!(method.find_implementation("c++").is_none());
    assert!(method.remove_implementation("c++").is_err());
}
