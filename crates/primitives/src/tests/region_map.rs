use claims::{assert_err, assert_matches};

use super::*;

fn range(left: &str, right: &str) -> KeyRange {
    KeyRange::bounded(left, right).unwrap()
}

fn three_way() -> RegionMap<u32> {
    RegionMap::from_entries(
        KeyRange::universe(),
        vec![
            (KeyRange::bounded("", "g").unwrap(), 1),
            (range("g", "p"), 2),
            (KeyRange::from_key("p"), 3),
        ],
    )
    .unwrap()
}

#[test]
fn lookup_returns_owning_entry() {
    let map = three_way();

    assert_eq!(map.lookup(&range("a", "c")), Ok(&1));
    assert_eq!(map.lookup(&range("g", "p")), Ok(&2));
    assert_eq!(map.lookup(&KeyRange::from_key("x")), Ok(&3));
}

#[test]
fn lookup_rejects_straddling_regions() {
    let map = three_way();

    assert_matches!(
        map.lookup(&range("f", "h")),
        Err(RegionMapError::NotHomogeneous { boundary, .. }) if boundary == StoreKey::from("g")
    );
}

#[test]
fn lookup_rejects_regions_outside_domain() {
    let map = RegionMap::new(range("c", "f"), ());

    assert_matches!(
        map.lookup(&range("a", "d")),
        Err(RegionMapError::OutOfDomain { .. })
    );
}

#[test]
fn entries_must_tile_domain() {
    assert_matches!(
        RegionMap::from_entries(
            KeyRange::universe(),
            vec![(KeyRange::bounded("", "g").unwrap(), 1), (KeyRange::from_key("h"), 2)],
        ),
        Err(RegionMapError::Tiling { .. })
    );

    assert_matches!(
        RegionMap::from_entries(KeyRange::universe(), vec![(KeyRange::bounded("", "g").unwrap(), 1)]),
        Err(RegionMapError::Incomplete { .. })
    );

    assert_err!(RegionMap::<u32>::from_entries(range("a", "b"), Vec::new()));
}

#[test]
fn iter_yields_ranges_in_key_order() {
    let map = three_way();
    let ranges: Vec<_> = map.iter().map(|(range, value)| (range, *value)).collect();

    assert_eq!(
        ranges,
        vec![
            (KeyRange::bounded("", "g").unwrap(), 1),
            (range("g", "p"), 2),
            (KeyRange::from_key("p"), 3),
        ]
    );
}

#[test]
fn serde_roundtrip_keeps_tiling() {
    let map = three_way();
    let json = serde_json::to_string(&map).unwrap();

    assert_eq!(serde_json::from_str::<RegionMap<u32>>(&json).unwrap(), map);
}
