use std::cell::RefCell;
use std::rc::Rc;

use rser::{
    codec, ArrayBufferView, CodecConfig, ErrorClass, ErrorValue, Path, PathCollectionKind,
    PathMap, PathSet, ReferencePlan, SourceLocation, StackFrame, SymbolRegistry, Tag,
    TypedArrayKind, Value,
};

fn roundtrip(value: &Value) -> Value {
    let config = CodecConfig::default();
    let mut symbols = SymbolRegistry::new();
    let bytes = codec::encode_message(value, &symbols, &config).expect("encode must succeed");
    codec::decode_message(&bytes, &mut symbols, &config).expect("decode must succeed")
}

fn encoded(value: &Value) -> Vec<u8> {
    codec::encode_message(value, &SymbolRegistry::new(), &CodecConfig::default())
        .expect("encode must succeed")
}

fn count_tag(bytes: &[u8], tag: Tag) -> usize {
    bytes.iter().filter(|b| **b == tag.code()).count()
}

#[test]
fn shared_object_is_encoded_once() {
    let shared = Value::object([("payload", Value::from("x".repeat(64)))]);
    let value = Value::array([shared.clone(), shared.clone(), shared]);
    let bytes = encoded(&value);
    assert!(bytes.len() < 100, "payload duplicated: {} bytes", bytes.len());

    let decoded = roundtrip(&value);
    assert_eq!(decoded, value);
    let first = decoded.at(0).expect("first element");
    assert!(first.ptr_eq(&decoded.at(1).expect("second element")));
    assert!(first.ptr_eq(&decoded.at(2).expect("third element")));
}

#[test]
fn singly_seen_values_cost_nothing() {
    let value = Value::array([Value::array([]), Value::object([("a", Value::Null)])]);
    let bytes = encoded(&value);
    assert_eq!(count_tag(&bytes, Tag::DeclareReference), 0);
    assert_eq!(ReferencePlan::discover(&value).referenced_count(), 0);
}

#[test]
fn self_cycle_roundtrips() {
    let root = Value::object([("name", Value::from("root"))]);
    if let Value::Object(entries) = &root {
        entries.borrow_mut().push(("self".into(), root.clone()));
    }
    let decoded = roundtrip(&root);
    let inner = decoded.get("self").expect("self member");
    assert!(inner.ptr_eq(&decoded));
    assert_eq!(decoded.get("name"), Some(Value::from("root")));
}

#[test]
fn mutual_cycle_through_map_and_set_roundtrips() {
    let set = Value::set([]);
    let map = Value::map([(Value::from("set"), set.clone())]);
    if let Value::Set(items) = &set {
        items.borrow_mut().push(map.clone());
    }
    let decoded = roundtrip(&map);
    let Value::Map(entries) = &decoded else {
        panic!("expected a map, got {decoded:?}");
    };
    let inner_set = entries.borrow()[0].1.clone();
    let Value::Set(items) = &inner_set else {
        panic!("expected a set");
    };
    assert!(items.borrow()[0].ptr_eq(&decoded));
}

#[test]
fn declarations_are_numbered_in_order() {
    let a = Value::array([]);
    let b = Value::object([("k", Value::Null)]);
    let value = Value::array([a.clone(), b.clone(), b, a]);
    let bytes = encoded(&value);
    let declares: Vec<u8> = bytes
        .windows(2)
        .filter(|w| w[0] == Tag::DeclareReference.code())
        .map(|w| w[1])
        .collect();
    assert_eq!(
        declares,
        [Tag::PositiveZero.code(), Tag::PositiveOne.code()]
    );
}

#[test]
fn referenced_objects_are_not_templated() {
    let shared = Value::object([("x", Value::from(1))]);
    let value = Value::array([shared.clone(), shared]);
    let bytes = encoded(&value);
    assert_eq!(count_tag(&bytes, Tag::TemplatedObjectArray), 0);
    let decoded = roundtrip(&value);
    assert!(decoded
        .at(0)
        .expect("first")
        .ptr_eq(&decoded.at(1).expect("second")));
}

#[test]
fn shared_paths_keep_identity_across_kinds() {
    let path = Path::uid(["pkg", "mod.ts"]);
    let mut set = PathSet::new(PathCollectionKind::Uid);
    set.insert(path.clone()).expect("uid path");
    let mut map = PathMap::new(PathCollectionKind::Uid);
    map.insert(path.clone(), Value::from(1)).expect("uid path");
    let frame = StackFrame {
        path: Some(path.clone()),
        ..StackFrame::default()
    };
    let error = ErrorValue::new(ErrorClass::Error, "boom").with_frames(vec![frame]);
    let position = rser::Position::new(rser::OneIndexed::MIN, rser::ZeroIndexed::new(0));
    let value = Value::array([
        Value::Path(path.clone()),
        Value::path_set(set),
        Value::path_map(map),
        Value::error(error),
        Value::SourceLocation(SourceLocation {
            path,
            identifier_name: None,
            start: position,
            end: position,
        }),
    ]);
    let decoded = roundtrip(&value);
    assert_eq!(decoded, value);

    let Value::Path(first) = decoded.at(0).expect("path") else {
        panic!("expected a path");
    };
    let Value::PathSet(set) = decoded.at(1).expect("set") else {
        panic!("expected a path set");
    };
    let Value::Error(error) = decoded.at(3).expect("error") else {
        panic!("expected an error");
    };
    let Value::SourceLocation(location) = decoded.at(4).expect("location") else {
        panic!("expected a source location");
    };
    assert!(set.iter().all(|p| p.ptr_eq(&first)));
    assert!(error.frames[0]
        .path
        .as_ref()
        .is_some_and(|p| p.ptr_eq(&first)));
    assert!(location.path.ptr_eq(&first));
}

#[test]
fn views_sharing_a_buffer_share_it_after_decoding() {
    let buffer = Rc::new(RefCell::new(vec![0u8; 8]));
    let low = Value::ArrayBufferView(Rc::new(ArrayBufferView::new(
        TypedArrayKind::Uint8,
        buffer.clone(),
        0,
        4,
    )));
    let high = Value::ArrayBufferView(Rc::new(ArrayBufferView::new(
        TypedArrayKind::Uint8,
        buffer,
        4,
        4,
    )));
    let decoded = roundtrip(&Value::array([low, high]));
    let (Some(Value::ArrayBufferView(a)), Some(Value::ArrayBufferView(b))) =
        (decoded.at(0), decoded.at(1))
    else {
        panic!("expected two views, got {decoded:?}");
    };
    assert!(Rc::ptr_eq(&a.buffer, &b.buffer));
    a.buffer.borrow_mut()[5] = 9;
    assert_eq!(b.to_bytes(), [0, 9, 0, 0]);
}

#[test]
fn references_reset_between_messages() {
    let shared = Value::array([]);
    let value = Value::array([shared.clone(), shared]);
    let first = encoded(&value);
    let second = encoded(&value);
    assert_eq!(first, second);
}
