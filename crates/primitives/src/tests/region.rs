use claims::{assert_err, assert_ok};

use super::*;

fn range(left: &str, right: &str) -> KeyRange {
    KeyRange::bounded(left, right).unwrap()
}

#[test]
fn empty_ranges_are_rejected() {
    assert_err!(KeyRange::bounded("b", "a"));
    assert_err!(KeyRange::bounded("a", "a"));
    assert_ok!(KeyRange::bounded("a", "b"));
}

#[test]
fn universe_contains_everything() {
    let universe = KeyRange::universe();

    assert!(universe.contains_key(&StoreKey::min()));
    assert!(universe.contains_key(&StoreKey::from("zzz")));
    assert!(universe.is_superset(&range("a", "b")));
    assert!(universe.is_superset(&KeyRange::from_key("q")));
}

#[test]
fn right_edge_is_exclusive() {
    let r = range("b", "d");

    assert!(r.contains_key(&"b".into()));
    assert!(r.contains_key(&"c".into()));
    assert!(!r.contains_key(&"d".into()));
    assert!(!r.contains_key(&"a".into()));
}

#[test]
fn join_requires_adjacency() {
    let first = range("a", "f");
    let second = KeyRange::from_key("f");

    assert!(first.is_adjacent_to(&second));
    assert_eq!(first.join(&second), Some(KeyRange::from_key("a")));
    assert_eq!(second.join(&first), None);
    assert_eq!(first.join(&range("g", "h")), None);
}

#[test]
fn unbounded_sorts_last() {
    assert!(RightBound::Unbounded > RightBound::Key("zzzz".into()));
    assert!(RightBound::Key("b".into()) > RightBound::Key("a".into()));
}

#[test]
fn keys_serialize_as_text_when_possible() {
    let text = StoreKey::from("user/42");
    let bytes = StoreKey::from(vec![0xff, 0x00]);

    assert_eq!(serde_json::to_string(&text).unwrap(), "\"user/42\"");
    assert_eq!(serde_json::to_string(&bytes).unwrap(), "[255,0]");
    assert_eq!(
        serde_json::from_str::<StoreKey>("[255,0]").unwrap(),
        bytes
    );
}

#[test]
fn deserializing_an_empty_range_fails() {
    let json = r#"{"left":"b","right":{"key":"a"}}"#;

    assert_err!(serde_json::from_str::<KeyRange>(json));
}
