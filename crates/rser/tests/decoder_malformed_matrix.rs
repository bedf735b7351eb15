use rser::{codec, CodecConfig, DecodeError, DecodeErrorKind, SymbolRegistry, Tag, Value};

/// Wraps `payload` in a message header with an int8 length.
fn framed(payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 127);
    let mut bytes = vec![
        Tag::MessageHeader.code(),
        Tag::Int8.code(),
        payload.len() as u8,
    ];
    bytes.extend_from_slice(payload);
    bytes
}

fn decode(bytes: &[u8]) -> Result<Value, DecodeError> {
    codec::decode_message(bytes, &mut SymbolRegistry::new(), &CodecConfig::default())
}

fn decode_err(payload: &[u8]) -> DecodeError {
    decode(&framed(payload)).expect_err("malformed payload must fail")
}

#[test]
fn well_formed_frame_decodes() {
    assert_eq!(decode(&framed(&[Tag::Null.code()])), Ok(Value::Null));
}

#[test]
fn unknown_tag() {
    let err = decode_err(&[0xfe]);
    assert_eq!(err.kind, DecodeErrorKind::UnknownTag(0xfe));
    assert_eq!(err.offset, 3);
}

#[test]
fn missing_message_header() {
    let err = decode(&[Tag::Null.code()]).expect_err("bare value must fail");
    assert!(matches!(err.kind, DecodeErrorKind::UnexpectedTag { .. }), "{err}");
    assert_eq!(err.offset, 0);
}

#[test]
fn unknown_error_class() {
    let err = decode_err(&[Tag::Error.code(), 99]);
    assert_eq!(
        err.kind,
        DecodeErrorKind::UnknownCode {
            registry: "error class",
            code: 99
        }
    );
    assert_eq!(err.offset, 4);
}

#[test]
fn unknown_view_kind() {
    let err = decode_err(&[Tag::ArrayBufferView.code(), 200]);
    assert!(
        matches!(err.kind, DecodeErrorKind::UnknownCode { code: 200, .. }),
        "{err}"
    );
}

#[test]
fn out_of_order_declaration() {
    let err = decode_err(&[
        Tag::DeclareReference.code(),
        Tag::PositiveOne.code(),
        Tag::Array.code(),
        Tag::PositiveZero.code(),
    ]);
    assert_eq!(
        err.kind,
        DecodeErrorKind::OutOfOrderDeclaration { id: 1, expected: 0 }
    );
}

#[test]
fn unknown_reference() {
    let err = decode_err(&[Tag::Reference.code(), Tag::PositiveZero.code()]);
    assert_eq!(err.kind, DecodeErrorKind::UnknownReference(0));
    assert_eq!(err.offset, 3);
}

#[test]
fn declaration_of_a_plain_value() {
    let err = decode_err(&[
        Tag::DeclareReference.code(),
        Tag::PositiveZero.code(),
        Tag::Null.code(),
    ]);
    assert!(matches!(err.kind, DecodeErrorKind::UnexpectedTag { .. }), "{err}");
    assert_eq!(err.offset, 5);
}

#[test]
fn fractional_reference_id() {
    let mut payload = vec![Tag::Reference.code(), Tag::Float.code()];
    payload.extend_from_slice(&0.5f64.to_le_bytes());
    let err = decode_err(&payload);
    assert!(matches!(err.kind, DecodeErrorKind::Invalid { .. }), "{err}");
    assert_eq!(err.offset, 4);
}

#[test]
fn payload_shorter_than_declared() {
    let err = decode_err(&[Tag::Null.code(), Tag::Null.code()]);
    assert_eq!(
        err.kind,
        DecodeErrorKind::LengthMismatch {
            declared: 2,
            consumed: 1
        }
    );
}

#[test]
fn invalid_utf8_string() {
    let err = decode_err(&[Tag::String.code(), Tag::Int8.code(), 2, 0xff, 0xfe]);
    assert_eq!(err.kind, DecodeErrorKind::InvalidUtf8);
    assert_eq!(err.offset, 6);
}

#[test]
fn negative_length() {
    let err = decode_err(&[Tag::Array.code(), Tag::NegativeOne.code()]);
    assert!(matches!(err.kind, DecodeErrorKind::Invalid { .. }), "{err}");
}

#[test]
fn unknown_system_error_property() {
    let payload = [
        Tag::Error.code(),
        0,
        Tag::PositiveOne.code(),
        b'E',
        Tag::PositiveZero.code(),
        Tag::Undefined.code(),
        Tag::Object.code(),
        Tag::PositiveOne.code(),
        Tag::Int8.code(),
        3,
        b'b',
        b'a',
        b'd',
        Tag::Null.code(),
    ];
    let err = decode_err(&payload);
    assert!(
        matches!(
            &err.kind,
            DecodeErrorKind::UnknownProperty { key, .. } if key == "bad"
        ),
        "{err}"
    );
}

#[test]
fn every_truncation_of_a_rich_message_fails_cleanly() {
    let value = Value::object([
        ("text", Value::from("héllo")),
        ("big", Value::BigInt(i128::from(i64::MAX))),
        ("rows", Value::array([
            Value::object([("a", Value::from(1.5))]),
            Value::object([("a", Value::from(-300))]),
        ])),
        ("bytes", Value::array_buffer(vec![1, 2, 3])),
    ]);
    let config = CodecConfig::default();
    let bytes = codec::encode_message(&value, &SymbolRegistry::new(), &config)
        .expect("encode must succeed");
    assert_eq!(decode(&bytes), Ok(value));
    for end in 0..bytes.len() {
        let err = decode(&bytes[..end]).expect_err("truncated message must fail");
        assert!(
            matches!(err.kind, DecodeErrorKind::EndOfBuffer { .. }),
            "prefix {end}: {err}"
        );
    }
}

#[test]
fn hostile_nesting_fails_instead_of_overflowing() {
    let depth = 200_000;
    let mut payload = Vec::with_capacity(depth * 2);
    for _ in 0..depth {
        payload.extend_from_slice(&[Tag::Array.code(), Tag::PositiveOne.code()]);
    }
    payload.push(Tag::Null.code());
    let mut bytes = vec![Tag::MessageHeader.code(), Tag::Int32.code()];
    bytes.extend_from_slice(&(payload.len() as i32).to_le_bytes());
    bytes.extend_from_slice(&payload);

    let err = decode(&bytes).expect_err("nesting past the limit must fail");
    let limit = CodecConfig::default().max_depth;
    assert_eq!(err.kind, DecodeErrorKind::TooDeep(limit));
    assert_eq!(err.offset, 6 + limit * 2);
}
