#![allow(clippy::unwrap_used)]
use rstest::rstest;

use crate::value::{parse_token, Kind, RangeSpec, Value};

fn spec(range: &str, kind: Kind) -> RangeSpec {
    RangeSpec::parse(range, kind, &[]).unwrap().unwrap()
}

#[rstest]
#[case("1..10", 1, true)]
#[case("1..10", 10, true)]
#[case("1..10", 0, false)]
#[case("1..10", 11, false)]
#[case("*..99", -500, true)]
#[case("*..99", 100, false)]
#[case("16..*", 16, true)]
#[case("16..*", 15, false)]
#[case("1,3,5", 3, true)]
#[case("1,3,5", 4, false)]
#[case("1..3,7..9", 8, true)]
#[case("1..3,7..9", 5, false)]
fn test_integer_ranges_inclusive(#[case] range: &str, #[case] value: i64, #[case] ok: bool) {
    let spec = spec(range, Kind::S64);
    assert_eq!(spec.check(&Value::S64(value), false).is_ok(), ok);
}

#[test]
fn test_star_accepts_everything() {
    assert!(RangeSpec::parse("*", Kind::S32, &[]).unwrap().is_none());
    assert!(RangeSpec::parse("1..2,*", Kind::S32, &[]).unwrap().is_none());
    assert!(RangeSpec::parse("*..*", Kind::S32, &[]).unwrap().is_none());
    assert!(RangeSpec::parse("", Kind::S32, &[]).unwrap().is_none());
}

#[test]
fn test_string_range_is_regex() {
    let spec = spec("^host-[0-9]{3}$", Kind::String);
    assert!(spec.check(&Value::String("host-042".into()), false).is_ok());
    assert!(spec.check(&Value::String("host-42".into()), false).is_err());
    // the global toggle bypasses string checks entirely
    assert!(spec.check(&Value::String("host-42".into()), true).is_ok());
}

#[test]
fn test_bad_regex_is_reported() {
    assert!(RangeSpec::parse("[unclosed", Kind::String, &[]).is_err());
}

#[test]
fn test_list_elements_checked_individually() {
    let spec = spec("1..10", Kind::U32);
    let good = Value::List(vec![Value::U32(1), Value::U32(10)]);
    let bad = Value::List(vec![Value::U32(1), Value::U32(11)]);
    assert!(spec.check(&good, false).is_ok());
    assert!(spec.check(&bad, false).is_err());
}

#[test]
fn test_float_interval() {
    let spec = spec("0.5..1.5", Kind::Double);
    assert!(spec.check(&parse_token("1.0", Kind::Double, &[]).unwrap(), false).is_ok());
    assert!(spec.check(&parse_token("1.6", Kind::Double, &[]).unwrap(), false).is_err());
}
