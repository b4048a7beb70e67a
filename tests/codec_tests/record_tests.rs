//! Tests for the record line codec
//!
//! These tests verify:
//! - Fixed-width layout (fields, separator, filler, flag, terminator)
//! - CSV quoting and its effect on measured width
//! - Rejection of lines that cannot fit
//! - Flag and field recovery on decode
//! - Value coercion per column type

use csvdb::codec::{self, RecordFlag, Value};
use csvdb::{ColumnType, CsvDbError};
use serde_json::json;

fn columns(defs: &[(&str, ColumnType)]) -> Vec<(String, ColumnType)> {
    defs.iter().map(|(n, t)| (n.to_string(), *t)).collect()
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_pads_to_exact_width() {
    let line = codec::encode(&["a", "b"], 100, RecordFlag::Live).unwrap();

    assert_eq!(line.len(), 101);
    assert!(line.starts_with(b"a,b,"));
    assert!(line[4..100].iter().all(|&b| b == b'_'));
    assert_eq!(line[100], b'\n');
}

#[test]
fn test_encode_with_no_fields_is_all_filler() {
    let fields: [&str; 0] = [];
    let line = codec::encode(&fields, 5, RecordFlag::Live).unwrap();

    assert_eq!(line, b"_____\n");
}

#[test]
fn test_encode_exact_fit_leaves_single_flag_byte() {
    let line = codec::encode(&["abc"], 5, RecordFlag::SoftDeleted).unwrap();
    assert_eq!(line, b"abc,x\n");
}

#[test]
fn test_encode_too_wide() {
    let result = codec::encode(&["abcd"], 5, RecordFlag::Live);

    match result {
        Err(CsvDbError::RecordTooWide { needed, max }) => {
            assert_eq!(needed, 6);
            assert_eq!(max, 5);
        }
        other => panic!("expected RecordTooWide, got {:?}", other),
    }
}

#[test]
fn test_encode_flags() {
    let soft = codec::encode(&["a"], 8, RecordFlag::SoftDeleted).unwrap();
    let hard = codec::encode(&["a"], 8, RecordFlag::HardDeleted).unwrap();

    assert_eq!(soft, b"a,_____x\n");
    assert_eq!(hard, b"a,_____X\n");
}

// =============================================================================
// Quoting / Measure Tests
// =============================================================================

#[test]
fn test_measure_plain_fields() {
    assert_eq!(codec::measure(&["a", "bc", ""]), 5);
    let none: [&str; 0] = [];
    assert_eq!(codec::measure(&none), 0);
}

#[test]
fn test_measure_counts_quoting() {
    // "a,b" → 3 + 2 quotes
    assert_eq!(codec::measure(&["a,b"]), 5);
    // say "hi" → 8 + 2 doubled quotes + 2 wrapping quotes
    assert_eq!(codec::measure(&["say \"hi\""]), 12);
    // line break forces quoting
    assert_eq!(codec::measure(&["x\ny"]), 5);
}

#[test]
fn test_encode_quotes_special_fields() {
    let line = codec::encode(&["he said \"hi\", ok", "plain"], 40, RecordFlag::Live).unwrap();
    let text = String::from_utf8(line).unwrap();

    assert!(text.starts_with("\"he said \"\"hi\"\", ok\",plain,_"));
    assert_eq!(text.len(), 41);
}

#[test]
fn test_quoted_field_counts_against_width() {
    // 3 content bytes become 5 once quoted, plus separator and flag
    assert!(codec::encode(&["a,b"], 6, RecordFlag::Live).is_err());
    assert!(codec::encode(&["a,b"], 7, RecordFlag::Live).is_ok());
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_recovers_fields_and_flag() {
    let fields = vec!["alice", "x,y", "multi\nline", "\"quoted\""];
    let line = codec::encode(&fields, 64, RecordFlag::Live).unwrap();

    let (decoded, flag) = codec::decode(&line, 64).unwrap();

    assert_eq!(decoded, fields);
    assert_eq!(flag, RecordFlag::Live);
}

#[test]
fn test_decode_deleted_flags() {
    let soft = codec::encode(&["a"], 10, RecordFlag::SoftDeleted).unwrap();
    let hard = codec::encode(&["", ""], 10, RecordFlag::HardDeleted).unwrap();

    assert_eq!(codec::decode(&soft, 10).unwrap().1, RecordFlag::SoftDeleted);

    let (fields, flag) = codec::decode(&hard, 10).unwrap();
    assert_eq!(flag, RecordFlag::HardDeleted);
    assert_eq!(fields, vec!["", ""]);
}

#[test]
fn test_decode_empty_field_list() {
    let fields: [&str; 0] = [];
    let line = codec::encode(&fields, 4, RecordFlag::Live).unwrap();

    let (decoded, _) = codec::decode(&line, 4).unwrap();
    assert!(decoded.is_empty());
}

#[test]
fn test_decode_rejects_wrong_length() {
    let line = codec::encode(&["a"], 10, RecordFlag::Live).unwrap();
    let result = codec::decode(&line, 12);
    assert!(matches!(result, Err(CsvDbError::Corrupt(_))));
}

#[test]
fn test_decode_rejects_unknown_flag() {
    let result = codec::decode(b"a,___?\n", 6);
    assert!(matches!(result, Err(CsvDbError::Corrupt(_))));
}

#[test]
fn test_decode_rejects_missing_terminator() {
    let result = codec::decode(b"a,____ ", 6);
    assert!(matches!(result, Err(CsvDbError::Corrupt(_))));
}

#[test]
fn test_split_fields_unterminated_quote() {
    let result = codec::split_fields("\"open,field");
    assert!(matches!(result, Err(CsvDbError::Corrupt(_))));
}

// =============================================================================
// Coercion Tests
// =============================================================================

#[test]
fn test_stringify_skips_text_and_drops_extras() {
    let cols = columns(&[
        ("name", ColumnType::String),
        ("bio", ColumnType::Text),
        ("age", ColumnType::Int),
    ]);
    let values = vec![
        Value::from("alice"),
        Value::Text("long".into()),
        Value::Int(30),
        Value::from("extra"),
    ];

    assert_eq!(codec::stringify(&values, &cols), vec!["alice", "30"]);
}

#[test]
fn test_stringify_missing_values_are_empty() {
    let cols = columns(&[("a", ColumnType::String), ("b", ColumnType::Int)]);
    assert_eq!(codec::stringify(&[Value::from("x")], &cols), vec!["x", ""]);
}

#[test]
fn test_stringify_value_coercions() {
    assert_eq!(codec::stringify_value(ColumnType::Bool, &Value::from("yes")), "1");
    assert_eq!(codec::stringify_value(ColumnType::Bool, &Value::from("0")), "0");
    assert_eq!(codec::stringify_value(ColumnType::Bool, &Value::Null), "0");
    assert_eq!(codec::stringify_value(ColumnType::Int, &Value::Int(-4)), "-4");
    assert_eq!(codec::stringify_value(ColumnType::Int, &Value::from("4")), "");
    assert_eq!(codec::stringify_value(ColumnType::Float, &Value::Float(1.5)), "1.5");
    assert_eq!(codec::stringify_value(ColumnType::Float, &Value::Int(2)), "2");
    assert_eq!(codec::stringify_value(ColumnType::Float, &Value::Float(f64::NAN)), "");
    assert_eq!(
        codec::stringify_value(ColumnType::Json, &Value::Json(json!({"k": [1, 2]}))),
        "{\"k\":[1,2]}"
    );
    assert_eq!(codec::stringify_value(ColumnType::Json, &Value::Json(json!(3))), "");
    assert_eq!(codec::stringify_value(ColumnType::String, &Value::Int(7)), "7");
}

#[test]
fn test_typecast_fields() {
    assert_eq!(codec::typecast_field(ColumnType::Bool, "1").unwrap(), Value::Bool(true));
    assert_eq!(codec::typecast_field(ColumnType::Bool, "0").unwrap(), Value::Bool(false));
    assert_eq!(codec::typecast_field(ColumnType::Int, "42").unwrap(), Value::Int(42));
    assert_eq!(codec::typecast_field(ColumnType::Int, "").unwrap(), Value::Null);
    assert_eq!(codec::typecast_field(ColumnType::Float, "2.25").unwrap(), Value::Float(2.25));
    assert_eq!(codec::typecast_field(ColumnType::Json, "").unwrap(), Value::Null);
    assert_eq!(
        codec::typecast_field(ColumnType::Json, "[1,\"a\"]").unwrap(),
        Value::Json(json!([1, "a"]))
    );
    assert_eq!(
        codec::typecast_field(ColumnType::String, "hi").unwrap(),
        Value::String("hi".into())
    );
}

#[test]
fn test_typecast_invalid_json_is_error() {
    let result = codec::typecast_field(ColumnType::Json, "{not json");
    assert!(matches!(result, Err(CsvDbError::Serialization(_))));
}

#[test]
fn test_typecast_pairs_inline_columns() {
    let cols = columns(&[
        ("name", ColumnType::String),
        ("notes", ColumnType::Text),
        ("score", ColumnType::Float),
        ("ok", ColumnType::Bool),
    ]);
    let fields = vec!["bob".to_string(), "9.5".to_string(), "1".to_string()];

    let values = codec::typecast(&fields, &cols).unwrap();

    assert_eq!(
        values,
        vec![
            ("name".to_string(), Value::String("bob".into())),
            ("score".to_string(), Value::Float(9.5)),
            ("ok".to_string(), Value::Bool(true)),
        ]
    );
}

#[test]
fn test_value_from_json() {
    assert_eq!(Value::from(json!(null)), Value::Null);
    assert_eq!(Value::from(json!(5)), Value::Int(5));
    assert_eq!(Value::from(json!(0.5)), Value::Float(0.5));
    assert_eq!(Value::from(json!("s")), Value::String("s".into()));
    assert_eq!(Value::from(json!({"a": 1})), Value::Json(json!({"a": 1})));
}
