use pdp_engine::error::ErrorKind;
use pdp_engine::trie::Node32;
use pdp_engine::value::{AttributeValue, Network};
use pdp_engine::wire::{marshal_request, unmarshal_request};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fn mask(bits: usize) -> u32 {
    if bits == 0 {
        0
    } else {
        u32::MAX << (32 - bits)
    }
}

fn prefixes() -> impl Strategy<Value = Vec<(u32, usize)>> {
    prop::collection::vec((any::<u32>(), 0usize..=32), 1..24)
}

fn scalar() -> impl Strategy<Value = AttributeValue> {
    prop_oneof![
        any::<bool>().prop_map(AttributeValue::Boolean),
        "[a-z0-9 ]{0,12}".prop_map(AttributeValue::String),
        any::<i64>().prop_map(AttributeValue::Integer),
        any::<f64>()
            .prop_filter("not NaN", |f| !f.is_nan())
            .prop_map(AttributeValue::Float),
        any::<[u8; 4]>().prop_map(|a| AttributeValue::Address(IpAddr::V4(Ipv4Addr::from(a)))),
        any::<[u8; 16]>()
            .prop_filter("not mapped", |a| Ipv6Addr::from(*a).to_ipv4_mapped().is_none())
            .prop_map(|a| AttributeValue::Address(IpAddr::V6(Ipv6Addr::from(a)))),
        (any::<[u8; 4]>(), 0u8..=32).prop_map(|(a, m)| {
            AttributeValue::Network(Network::new(IpAddr::V4(Ipv4Addr::from(a)), m).unwrap())
        }),
    ]
}

fn attributes() -> impl Strategy<Value = Vec<(String, AttributeValue)>> {
    prop::collection::vec(("[a-z]{1,8}", scalar()), 0..8)
}

fn fingerprint(attrs: &[(String, AttributeValue)]) -> Vec<(String, String, String)> {
    attrs
        .iter()
        .map(|(id, v)| {
            (
                id.clone(),
                v.get_result_type().name().to_string(),
                v.serialize().unwrap(),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_longest_prefix_match(items in prefixes(), query in any::<u32>()) {
        let mut tree = Node32::new();
        let mut expected: BTreeMap<(u32, usize), usize> = BTreeMap::new();
        for (i, &(key, bits)) in items.iter().enumerate() {
            tree = tree.insert(key, bits, i).unwrap();
            expected.insert((key & mask(bits), bits), i);
        }

        let best = expected
            .iter()
            .filter(|((key, bits), _)| query & mask(*bits) == *key)
            .max_by_key(|((_, bits), _)| *bits)
            .map(|(_, v)| *v);

        prop_assert_eq!(tree.get(query, 32).copied(), best);
    }

    #[test]
    fn prop_insertion_order_independent(items in prefixes()) {
        let mut unique: BTreeMap<(u32, usize), ()> = BTreeMap::new();
        for &(key, bits) in &items {
            unique.insert((key & mask(bits), bits), ());
        }

        let forward = unique
            .keys()
            .try_fold(Node32::new(), |t, &(k, b)| t.insert(k, b, (k, b)))
            .unwrap();
        let backward = unique
            .keys()
            .rev()
            .try_fold(Node32::new(), |t, &(k, b)| t.insert(k, b, (k, b)))
            .unwrap();

        let mut a: Vec<_> = forward.iter().map(|(k, b, _)| (k, b)).collect();
        let mut b: Vec<_> = backward.iter().map(|(k, b, _)| (k, b)).collect();
        a.sort_unstable();
        b.sort_unstable();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.len(), unique.len());

        let (first, _) = unique.keys().next().copied().unwrap();
        let bits = unique.keys().next().map(|k| k.1).unwrap();
        let (deleted, ok) = forward.delete(first, bits);
        prop_assert!(ok);
        prop_assert_eq!(deleted.iter().count(), unique.len() - 1);
        prop_assert!(deleted.get_exact(first, bits).is_none());
    }

    #[test]
    fn prop_wire_round_trip(attrs in attributes()) {
        let b = marshal_request(&attrs).unwrap();
        let back = unmarshal_request(&b).unwrap();
        prop_assert_eq!(fingerprint(&back), fingerprint(&attrs));
    }

    #[test]
    fn prop_wire_truncation(attrs in attributes()) {
        let b = marshal_request(&attrs).unwrap();
        for cut in 0..b.len() {
            let err = unmarshal_request(&b[..cut]).unwrap_err();
            prop_assert!(
                matches!(err.kind(), ErrorKind::RequestBufferUnderflow),
                "cut at {} gave {}", cut, err
            );
        }
    }
}
