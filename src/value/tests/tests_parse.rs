#![allow(clippy::unwrap_used)]
use std::sync::Arc;

use rstest::rstest;

use crate::value::{parse_token, parse_tokens, Kind, Value};

#[rstest]
#[case("42", Value::S32(42))]
#[case("-42", Value::S32(-42))]
#[case("0x2a", Value::S32(42))]
#[case("052", Value::S32(42))]
#[case("0", Value::S32(0))]
fn test_parse_s32(#[case] text: &str, #[case] expected: Value) {
    assert_eq!(parse_token(text, Kind::S32, &[]).unwrap(), expected);
}

#[test]
fn test_parse_unsigned_rejects_negative() {
    assert!(parse_token("-1", Kind::U16, &[]).is_err());
}

#[test]
fn test_parse_narrowing_bounds() {
    assert!(parse_token("127", Kind::S8, &[]).is_ok());
    assert!(parse_token("128", Kind::S8, &[]).is_err());
    assert!(parse_token("255", Kind::U8, &[]).is_ok());
    assert!(parse_token("256", Kind::U8, &[]).is_err());
}

#[rstest]
#[case("1", true)]
#[case("0", false)]
#[case("true", true)]
#[case("no", false)]
fn test_parse_bool(#[case] text: &str, #[case] expected: bool) {
    assert_eq!(parse_token(text, Kind::Bool, &[]).unwrap(), Value::Bool(expected));
}

#[test]
fn test_parse_date_formats() {
    let iso = parse_token("20240130", Kind::Date, &[]).unwrap();
    let slashed = parse_token("2024/01/30", Kind::Date, &[]).unwrap();
    assert_eq!(iso, slashed);
    assert_eq!(iso.format(crate::value::IntFormat::Dec), "20240130");
}

#[test]
fn test_parse_time_round_trip() {
    let t = parse_token("20240130T235959", Kind::Time, &[]).unwrap();
    assert_eq!(t.as_text(), "20240130T235959");
    assert!(parse_token("20240130T236000", Kind::Time, &[]).is_err());
}

#[test]
fn test_parse_enum_uses_declared_tokens() {
    let enumerators: Vec<Arc<str>> = vec![Arc::from("red"), Arc::from("green")];
    let v = parse_token("green", Kind::Enum, &enumerators).unwrap();
    match v {
        Value::Enum(e) => {
            assert_eq!(e.ord, 1);
            assert!(Arc::ptr_eq(&e.token, &enumerators[1]));
        }
        other => panic!("expected enum, got {other:?}"),
    }
    assert!(parse_token("blue", Kind::Enum, &enumerators).is_err());
}

#[test]
fn test_parse_uid_form() {
    let v = parse_token("obj-1@Module", Kind::Uid2, &[]).unwrap();
    assert_eq!(
        v,
        Value::Uid2 {
            class: "Module".into(),
            id: "obj-1".into()
        }
    );
    assert!(parse_token("garbage", Kind::Uid2, &[]).is_err());
}

#[test]
fn test_parse_multi_values() {
    let v = parse_tokens("1, 2, 3", Kind::U32, &[]).unwrap();
    assert_eq!(
        v,
        Value::List(vec![Value::U32(1), Value::U32(2), Value::U32(3)])
    );
}

#[test]
fn test_parse_multi_string_is_verbatim() {
    let v = parse_tokens("a, b", Kind::String, &[]).unwrap();
    assert_eq!(v, Value::List(vec![Value::String("a, b".into())]));
}

#[test]
fn test_format_hex_and_oct() {
    use crate::value::IntFormat;
    assert_eq!(Value::U32(255).format(IntFormat::Hex), "0xff");
    assert_eq!(Value::U32(8).format(IntFormat::Oct), "010");
    assert_eq!(Value::U32(0).format(IntFormat::Oct), "0");
    assert_eq!(Value::S32(-255).format(IntFormat::Hex), "-0xff");
}
