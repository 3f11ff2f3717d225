// SPDX-License-Identifier: MIT

use super::*;
use std::collections::HashMap;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tst-");
}

#[test]
fn define_id_round_trips_through_string() {
    let id = TestId::new();
    let parsed = TestId::from_string(id.as_str());
    assert_eq!(id, parsed);
}

#[test]
fn define_id_carries_prefix() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tst-"));
    assert_eq!(id.suffix().len(), 19);
}

#[test]
fn define_id_hash_map_lookup_by_str() {
    let id = TestId::from_string("tst-abcdefghijklmnopqrs");
    let mut map = HashMap::new();
    map.insert(id, 42);
    assert_eq!(map.get("tst-abcdefghijklmnopqrs"), Some(&42));
}

#[test]
fn define_id_short_truncates_suffix() {
    let id = TestId::from_string("tst-abcdefghijklmnopqrs");
    assert_eq!(id.short(4), "abcd");
}

#[test]
fn define_id_new_ids_are_unique() {
    assert_ne!(TestId::new(), TestId::new());
}

#[test]
fn short_fn_on_str() {
    let s = "abcdefghijklmnop";
    assert_eq!(short(s, 8), "abcdefgh");
    assert_eq!(short(s, 100), s);
    assert_eq!(short("abc", 8), "abc");
}
