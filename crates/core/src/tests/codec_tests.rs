use super::*;
use crate::allowlist::{Capability, TypeAllowList};
use crate::resource::ResourceLimiter;
use crate::structured::{Array, DType, Object};
use crate::validate::RejectReason;
use crate::value::{TypeName, Value};

fn evil() -> Value {
    Value::Object(Object::new(TypeName::new("app", "Evil"), Value::Int(7)))
}

fn doc(name: &str, value: Value) -> Document {
    Document::new().with(name, value).expect("valid name")
}

fn gated(bytes: &[u8]) -> PersistResult<Document> {
    decode(bytes, StructuralValidator::standard(), Trust::Gated)
}

fn trusted(bytes: &[u8]) -> PersistResult<Document> {
    decode(bytes, StructuralValidator::standard(), Trust::Trusted)
}

#[test]
fn header_layout() {
    let bytes = encode(&doc("x", Value::Int(1))).expect("encode");
    assert_eq!(&bytes[0..4], b"PPST");
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), FORMAT_VERSION);
    let declared = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]) as usize;
    assert_eq!(declared, bytes.len() - HEADER_LEN);

    let info = inspect(&bytes).expect("inspect");
    assert_eq!(info.payload_len, declared);
    assert_eq!(info.version, FORMAT_VERSION);
}

#[test]
fn envelope_damage_is_classified() {
    let bytes = encode(&doc("x", Value::from("payload"))).expect("encode");

    assert_eq!(unframe(&bytes[..5]), Err(FormatError::TooSmall(5)));

    let mut bad_magic = bytes.clone();
    bad_magic[0] = b'X';
    assert_eq!(unframe(&bad_magic), Err(FormatError::InvalidMagic));

    let mut bad_version = bytes.clone();
    bad_version[4..6].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    assert_eq!(
        unframe(&bad_version),
        Err(FormatError::IncompatibleVersion {
            found: FORMAT_VERSION + 1,
            expected: FORMAT_VERSION
        })
    );

    assert!(matches!(
        unframe(&bytes[..bytes.len() - 1]),
        Err(FormatError::LengthMismatch { .. })
    ));

    let mut flipped = bytes.clone();
    let last = flipped.len() - 1;
    flipped[last] ^= 0x01;
    assert_eq!(unframe(&flipped), Err(FormatError::ChecksumMismatch));
}

#[test]
fn gate_refuses_disallowed_object_with_save_time_path() {
    let value = Value::dict([("items", Value::List(vec![Value::Int(0), evil()]))]);
    let bytes = encode(&doc("alpha", value.clone())).expect("encode skips validation");

    let err = gated(&bytes).expect_err("gate must refuse");
    let rejection = err.rejection().expect("validation error");
    assert_eq!(rejection.path.to_string(), "alpha[\"items\"][1]");
    assert_eq!(rejection.type_name, TypeName::new("app", "Evil"));

    let save_time = StructuralValidator::standard()
        .validate_named("alpha", &value)
        .expect_err("save check agrees");
    assert_eq!(&save_time, rejection);
}

#[test]
fn trusted_decode_rebuilds_everything() {
    let value = Value::List(vec![evil(), Value::Float(0.5)]);
    let bytes = encode(&doc("v", value.clone())).expect("encode");
    let document = trusted(&bytes).expect("trusted load");
    assert_eq!(document.get("v"), Some(&value));
}

#[test]
fn gate_checks_node_invariants() {
    let duplicate = Value::Dict(vec![
        (Value::from("k"), Value::Int(1)),
        (Value::from("k"), Value::Int(2)),
    ]);
    let bytes = encode(&doc("d", duplicate)).expect("encode");
    let err = gated(&bytes).expect_err("duplicate keys");
    assert!(matches!(
        err.rejection().map(|r| &r.reason),
        Some(RejectReason::DuplicateKey(_))
    ));
    trusted(&bytes).expect("trusted load skips node checks");
}

#[test]
fn gate_accepts_float_keys_and_refuses_equal_ones() {
    let floats = Value::Set(vec![Value::Float(0.5), Value::Float(1.5)]);
    let bytes = encode(&doc("s", floats.clone())).expect("encode");
    assert_eq!(gated(&bytes).expect("float set").get("s"), Some(&floats));

    let zeros = Value::Dict(vec![
        (Value::Float(0.0), Value::Int(1)),
        (Value::Float(-0.0), Value::Int(2)),
    ]);
    let bytes = encode(&doc("d", zeros)).expect("encode");
    let err = gated(&bytes).expect_err("0.0 and -0.0 are one key");
    assert!(matches!(
        err.rejection().map(|r| &r.reason),
        Some(RejectReason::DuplicateKey(_))
    ));
}

#[test]
fn gate_refuses_object_dtype_before_reading_items() {
    let array = Array::new(DType::Object, vec![1], vec![evil()]);
    let bytes = encode(&doc("arr", Value::Array(array))).expect("encode");
    let err = gated(&bytes).expect_err("object dtype");
    let rejection = err.rejection().expect("validation error");
    assert_eq!(rejection.type_name, DType::Object.type_name());
    assert_eq!(rejection.path.to_string(), "arr");
}

#[test]
fn gate_uses_the_injected_allow_list() {
    let list = TypeAllowList::builder()
        .allow(TypeName::LIST, Capability::Sequence)
        .build();
    let validator = StructuralValidator::new(&list, &ResourceLimiter::default());
    let bytes = encode(&doc("t", Value::tuple([1, 2]))).expect("encode");
    let err = decode(&bytes, validator, Trust::Gated).expect_err("tuples not listed");
    assert_eq!(
        err.rejection().map(|r| r.type_name.clone()),
        Some(TypeName::TUPLE)
    );

    let bytes = encode(&doc("l", Value::from(vec![1, 2]))).expect("encode");
    decode(&bytes, validator, Trust::Gated).expect("lists are listed");
}

#[test]
fn depth_is_bounded_in_both_modes() {
    let limits = ResourceLimiter {
        max_depth: 3,
        ..ResourceLimiter::default()
    };
    let validator = StructuralValidator::new(TypeAllowList::standard(), &limits);
    let mut value = Value::Int(0);
    for _ in 0..5 {
        value = Value::List(vec![value]);
    }
    let bytes = encode(&doc("deep", value)).expect("encode");
    for trust in [Trust::Gated, Trust::Trusted] {
        let err = decode(&bytes, validator, trust).expect_err("too deep");
        assert!(matches!(err, PersistError::ResourceLimit(_)), "{err:?}");
    }
}

#[test]
fn payload_damage_is_a_format_error() {
    // one entry named "a" whose value has an unknown tag
    let unknown_tag = frame(&[1, 1, b'a', 99]).expect("frame");
    match gated(&unknown_tag) {
        Err(PersistError::Format(FormatError::Payload(message))) => {
            assert_eq!(message, "unknown value tag 99 at `a`");
        }
        other => panic!("unexpected result {other:?}"),
    }

    // object whose type name has no module
    let bare_name = frame(&[1, 1, b'a', 14, 3, b'b', b'a', b'd', 0]).expect("frame");
    match trusted(&bare_name) {
        Err(PersistError::Format(FormatError::Payload(message))) => {
            assert_eq!(message, "`bad` is not a qualified type name at `a`");
        }
        other => panic!("unexpected result {other:?}"),
    }

    // array whose dtype tag is out of range
    let bad_dtype = frame(&[1, 1, b'a', 11, 120]).expect("frame");
    match gated(&bad_dtype) {
        Err(PersistError::Format(FormatError::Payload(message))) => {
            assert!(message.starts_with("unreadable dtype"), "{message}");
        }
        other => panic!("unexpected result {other:?}"),
    }

    // stored variable name that is not an identifier
    let bad_name = frame(&[1, 2, b'1', b'x', 0]).expect("frame");
    assert!(matches!(
        gated(&bad_name),
        Err(PersistError::Format(FormatError::StoredName { .. }))
    ));

    // a valid entry followed by a stray byte
    let trailing = frame(&[1, 1, b'a', 0, 0]).expect("frame");
    assert!(matches!(
        gated(&trailing),
        Err(PersistError::Format(FormatError::TrailingBytes(1)))
    ));
}

#[test]
fn many_names_decode_and_repeats_are_refused() {
    let mut document = Document::new();
    for index in 0..20_000 {
        document.insert(format!("v{index}"), Value::Int(index)).expect("insert");
    }
    let bytes = encode(&document).expect("encode");
    let decoded = gated(&bytes).expect("decode");
    assert_eq!(decoded.len(), 20_000);
    assert_eq!(decoded.get("v19999"), Some(&Value::Int(19_999)));

    let repeated = frame(&[2, 1, b'a', 0, 1, b'a', 0]).expect("frame");
    assert!(matches!(
        gated(&repeated),
        Err(PersistError::Format(FormatError::StoredName { .. }))
    ));
}

#[test]
fn empty_document_round_trips() {
    let bytes = encode(&Document::new()).expect("encode");
    assert_eq!(bytes.len(), HEADER_LEN + 1);
    assert!(gated(&bytes).expect("decode").is_empty());
}
